//! Request-loop hooks.
//!
//! A hook runs on a round-trip cadence and may inject text into the next
//! user turn (a reminder, a freshness note, a lint summary). Hook failures
//! are logged and never abort the task.

use crate::error::TaskResult;
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tracing::{debug, warn};

/// A periodic injection into the request loop.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Hook name, for logging.
    fn name(&self) -> &str;

    /// Run every N completed round trips. Zero disables the hook.
    fn trigger_every(&self) -> u32;

    /// Produce the text to inject, or None to stay silent this round.
    async fn execute(&self) -> TaskResult<Option<String>>;
}

struct HookEntry {
    hook: Box<dyn Hook>,
    rounds_since_fire: u32,
}

/// Owns the registered hooks of one task and their cadence counters.
pub struct HookManager {
    entries: Vec<HookEntry>,
}

impl HookManager {
    pub fn new(hooks: Vec<Box<dyn Hook>>) -> Self {
        Self {
            entries: hooks
                .into_iter()
                .map(|hook| HookEntry {
                    hook,
                    rounds_since_fire: 0,
                })
                .collect(),
        }
    }

    pub fn register(&mut self, hook: Box<dyn Hook>) {
        self.entries.push(HookEntry {
            hook,
            rounds_since_fire: 0,
        });
    }

    /// Advance every counter by one round trip and run the hooks that are
    /// due. Outputs are concatenated in registration order.
    pub async fn check_and_execute(&mut self) -> Option<String> {
        let mut outputs = Vec::new();
        for entry in &mut self.entries {
            let cadence = entry.hook.trigger_every();
            if cadence == 0 {
                continue;
            }
            entry.rounds_since_fire += 1;
            if entry.rounds_since_fire < cadence {
                continue;
            }
            entry.rounds_since_fire = 0;

            let name = entry.hook.name().to_string();
            match AssertUnwindSafe(entry.hook.execute()).catch_unwind().await {
                Ok(Ok(Some(output))) if !output.is_empty() => {
                    debug!(hook = %name, "Hook injected output");
                    outputs.push(output);
                }
                Ok(Ok(_)) => {}
                Ok(Err(error)) => warn!(hook = %name, %error, "Hook failed"),
                Err(_) => warn!(hook = %name, "Hook panicked"),
            }
        }
        if outputs.is_empty() {
            None
        } else {
            Some(outputs.join("\n\n"))
        }
    }
}

/// Re-injects a fixed instruction on a cadence, countering drift in long
/// tasks.
pub struct ReminderHook {
    instructions: String,
    every: u32,
}

impl ReminderHook {
    pub fn new(instructions: impl Into<String>, every: u32) -> Self {
        Self {
            instructions: instructions.into(),
            every,
        }
    }
}

#[async_trait]
impl Hook for ReminderHook {
    fn name(&self) -> &str {
        "reminder"
    }

    fn trigger_every(&self) -> u32 {
        self.every
    }

    async fn execute(&self) -> TaskResult<Option<String>> {
        Ok(Some(format!(
            "<reminder>\n{}\n</reminder>",
            self.instructions
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct CountingHook {
        every: u32,
        fired: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Hook for CountingHook {
        fn name(&self) -> &str {
            "counting"
        }
        fn trigger_every(&self) -> u32 {
            self.every
        }
        async fn execute(&self) -> TaskResult<Option<String>> {
            let n = self.fired.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Some(format!("fire {n}")))
        }
    }

    struct FailingHook;

    #[async_trait]
    impl Hook for FailingHook {
        fn name(&self) -> &str {
            "failing"
        }
        fn trigger_every(&self) -> u32 {
            1
        }
        async fn execute(&self) -> TaskResult<Option<String>> {
            Err(TaskError::validation("broken hook"))
        }
    }

    struct PanickingHook;

    #[async_trait]
    impl Hook for PanickingHook {
        fn name(&self) -> &str {
            "panicking"
        }
        fn trigger_every(&self) -> u32 {
            1
        }
        async fn execute(&self) -> TaskResult<Option<String>> {
            panic!("hook bug");
        }
    }

    #[tokio::test]
    async fn test_cadence() {
        let fired = Arc::new(AtomicU32::new(0));
        let mut manager = HookManager::new(vec![Box::new(CountingHook {
            every: 3,
            fired: fired.clone(),
        })]);

        assert!(manager.check_and_execute().await.is_none());
        assert!(manager.check_and_execute().await.is_none());
        assert_eq!(
            manager.check_and_execute().await.as_deref(),
            Some("fire 1")
        );
        // Counter reset; fires again three rounds later.
        assert!(manager.check_and_execute().await.is_none());
        assert!(manager.check_and_execute().await.is_none());
        assert_eq!(
            manager.check_and_execute().await.as_deref(),
            Some("fire 2")
        );
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_outputs_concatenated_in_order() {
        let fired = Arc::new(AtomicU32::new(0));
        let mut manager = HookManager::new(vec![
            Box::new(ReminderHook::new("stay on task", 1)),
            Box::new(CountingHook {
                every: 1,
                fired: fired.clone(),
            }),
        ]);

        let output = manager.check_and_execute().await.unwrap();
        assert_eq!(
            output,
            "<reminder>\nstay on task\n</reminder>\n\nfire 1"
        );
    }

    #[tokio::test]
    async fn test_failures_and_panics_are_swallowed() {
        let mut manager = HookManager::new(vec![
            Box::new(FailingHook),
            Box::new(PanickingHook),
            Box::new(ReminderHook::new("still here", 1)),
        ]);

        let output = manager.check_and_execute().await.unwrap();
        assert_eq!(output, "<reminder>\nstill here\n</reminder>");
    }

    #[tokio::test]
    async fn test_zero_cadence_disables() {
        let fired = Arc::new(AtomicU32::new(0));
        let mut manager = HookManager::new(vec![Box::new(CountingHook {
            every: 0,
            fired: fired.clone(),
        })]);

        for _ in 0..5 {
            assert!(manager.check_and_execute().await.is_none());
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
