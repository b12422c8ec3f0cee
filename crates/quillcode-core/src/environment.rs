//! Environment details for seed and resume messages.

use async_trait::async_trait;
use std::path::PathBuf;

/// Produces the `<environment_details>` block appended to the first user
/// turn of a task and to resumption messages.
#[async_trait]
pub trait EnvironmentReporter: Send + Sync {
    async fn details(&self) -> String;
}

/// Reports the working directory and the current time.
pub struct DefaultEnvironmentReporter {
    cwd: PathBuf,
}

impl DefaultEnvironmentReporter {
    pub fn new(cwd: PathBuf) -> Self {
        Self { cwd }
    }
}

#[async_trait]
impl EnvironmentReporter for DefaultEnvironmentReporter {
    async fn details(&self) -> String {
        format!(
            "# Working Directory\n{}\n\n# Current Time\n{}",
            self.cwd.display(),
            chrono::Local::now().to_rfc2822()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_reporter_includes_cwd() {
        let reporter = DefaultEnvironmentReporter::new(PathBuf::from("/srv/project"));
        let details = reporter.details().await;
        assert!(details.contains("# Working Directory\n/srv/project"));
        assert!(details.contains("# Current Time\n"));
    }
}
