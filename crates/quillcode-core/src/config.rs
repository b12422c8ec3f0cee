//! Task configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for a task executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Provider requests allowed before the user is asked to continue.
    pub max_requests_per_task: u32,
    /// Auto-approve read-only tools (file reads, listings, searches).
    pub always_allow_read_only: bool,
    /// Auto-approve everything that is not a must-confirm question.
    pub always_allow_write_only: bool,
    /// Extra instructions appended to the system prompt.
    pub custom_instructions: Option<String>,
    /// Sampling profile for provider requests.
    pub creativity: Creativity,
    /// Working directory for tools and subprocesses.
    pub cwd: PathBuf,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            max_requests_per_task: 20,
            always_allow_read_only: false,
            always_allow_write_only: false,
            custom_instructions: None,
            creativity: Creativity::Normal,
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

/// Sampling profile, mapped to (temperature, top_p) pairs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Creativity {
    #[default]
    Normal,
    Creative,
    Deterministic,
}

impl Creativity {
    /// The (temperature, top_p) pair for this profile.
    pub fn sampling(&self) -> (f32, f32) {
        match self {
            Creativity::Normal => (0.2, 0.8),
            Creativity::Creative => (0.3, 0.9),
            Creativity::Deterministic => (0.1, 0.8),
        }
    }
}
