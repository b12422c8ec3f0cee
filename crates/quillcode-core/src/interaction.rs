//! Engine side of the ask/say protocol.
//!
//! [`TaskInteraction`] is the handle tools (and the executor itself) use to
//! talk to the user. Every ask and say lands in the display log; asks then
//! either resolve immediately under the always-allow policy or park in the
//! task's mailbox until the host answers.

use crate::ask::AskChannel;
use crate::config::TaskConfig;
use crate::conversation::ConversationStore;
use crate::display::DisplayMessage;
use crate::error::TaskError;
use async_trait::async_trait;
use quillcode_storage::Storage;
use quillcode_tools::{
    AskKind, AskOutcome, Interaction, SayKind, ToolError, ToolName, ToolResult,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// The engine's [`Interaction`] implementation, bound to one task.
pub struct TaskInteraction<S: Storage + 'static> {
    conversation: Arc<ConversationStore<S>>,
    channel: Arc<AskChannel>,
    config: TaskConfig,
}

impl<S: Storage + 'static> TaskInteraction<S> {
    pub fn new(
        conversation: Arc<ConversationStore<S>>,
        channel: Arc<AskChannel>,
        config: TaskConfig,
    ) -> Self {
        Self {
            conversation,
            channel,
            config,
        }
    }

    /// Whether the always-allow policy answers this ask without the user.
    ///
    /// Must-confirm kinds and tools are never bypassed, and neither is the
    /// mid-run command prompt (an auto "yes" there would interrupt the
    /// command the user just approved).
    fn auto_approves(&self, kind: AskKind, payload: &Value) -> bool {
        if kind.must_confirm() || kind == AskKind::CommandOutput {
            return false;
        }
        if let Some(tool) = payload["tool"].as_str().and_then(ToolName::parse) {
            if tool.must_confirm() {
                return false;
            }
            if tool.is_read_only() && self.config.always_allow_read_only {
                return true;
            }
        }
        self.config.always_allow_write_only
    }
}

#[async_trait]
impl<S: Storage + 'static> Interaction for TaskInteraction<S> {
    async fn ask(&self, kind: AskKind, payload: Value) -> ToolResult<AskOutcome> {
        let auto = self.auto_approves(kind, &payload);
        let mut message = DisplayMessage::ask(kind, Some(payload.to_string()));
        message.auto_approved = auto;
        let ts = message.ts;
        self.conversation
            .append_display(message)
            .await
            .map_err(to_tool_error)?;

        if auto {
            debug!(kind = ?kind, ts, "Ask auto-approved by policy");
            return Ok(AskOutcome::yes());
        }

        match self.channel.ask(ts, kind).await {
            Ok(outcome) => Ok(outcome),
            Err(TaskError::Aborted) | Err(TaskError::Superseded) => Err(ToolError::Cancelled),
            Err(err) => Err(ToolError::execution_failed(err.to_string())),
        }
    }

    async fn say(
        &self,
        kind: SayKind,
        text: Option<String>,
        images: Option<Vec<String>>,
    ) -> ToolResult<()> {
        self.conversation
            .append_display(DisplayMessage::say(kind, text, images))
            .await
            .map_err(to_tool_error)
    }
}

fn to_tool_error(err: TaskError) -> ToolError {
    match err {
        TaskError::Aborted | TaskError::Superseded => ToolError::Cancelled,
        other => ToolError::execution_failed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Bus;
    use crate::display::DisplayKind;
    use quillcode_storage::MemoryStorage;
    use serde_json::json;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn make_interaction(config: TaskConfig) -> (TaskInteraction<MemoryStorage>, Arc<AskChannel>) {
        let storage = Arc::new(MemoryStorage::new());
        let conversation = Arc::new(ConversationStore::new(storage, Bus::new(), "tsk_test"));
        let channel = Arc::new(AskChannel::new(CancellationToken::new()));
        (
            TaskInteraction::new(conversation, channel.clone(), config),
            channel,
        )
    }

    #[tokio::test]
    async fn test_read_only_ask_bypassed_under_policy() {
        let config = TaskConfig {
            always_allow_read_only: true,
            ..Default::default()
        };
        let (interaction, channel) = make_interaction(config);

        let outcome = interaction
            .ask(AskKind::Tool, json!({"tool": "read_file", "input": {}}))
            .await
            .unwrap();
        assert!(outcome.approved());
        // Nothing parked in the mailbox.
        assert_eq!(channel.pending_ts().unwrap(), None);

        // The bypassed ask still shows in the transcript, marked.
        let log = interaction.conversation.display_log().await;
        assert_eq!(log.len(), 1);
        assert!(matches!(log[0].kind, DisplayKind::Ask(AskKind::Tool)));
        assert!(log[0].auto_approved);
    }

    #[tokio::test]
    async fn test_write_ask_needs_write_policy() {
        let config = TaskConfig {
            always_allow_read_only: true,
            ..Default::default()
        };
        let (interaction, _) = make_interaction(config);
        assert!(!interaction.auto_approves(AskKind::Tool, &json!({"tool": "write_to_file"})));

        let config = TaskConfig {
            always_allow_write_only: true,
            ..Default::default()
        };
        let (interaction, _) = make_interaction(config);
        assert!(interaction.auto_approves(AskKind::Tool, &json!({"tool": "write_to_file"})));
        assert!(interaction.auto_approves(AskKind::Command, &json!({"tool": "execute_command"})));
    }

    #[tokio::test]
    async fn test_must_confirm_never_bypassed() {
        let config = TaskConfig {
            always_allow_read_only: true,
            always_allow_write_only: true,
            ..Default::default()
        };
        let (interaction, _) = make_interaction(config);

        assert!(!interaction.auto_approves(AskKind::Followup, &json!({})));
        assert!(!interaction.auto_approves(AskKind::CompletionResult, &json!({})));
        assert!(!interaction.auto_approves(AskKind::RequestLimitReached, &json!({})));
        assert!(!interaction.auto_approves(AskKind::ApiReqFailed, &json!({})));
        assert!(!interaction.auto_approves(AskKind::ResumeTask, &json!({})));
        assert!(!interaction.auto_approves(AskKind::CommandOutput, &json!({})));
        assert!(
            !interaction.auto_approves(AskKind::Tool, &json!({"tool": "ask_followup_question"}))
        );
        assert!(!interaction.auto_approves(AskKind::Tool, &json!({"tool": "attempt_completion"})));
    }

    #[tokio::test]
    async fn test_manual_ask_parks_and_resolves() {
        let (interaction, channel) = make_interaction(TaskConfig::default());
        let interaction = Arc::new(interaction);

        let asker = interaction.clone();
        let task = tokio::spawn(async move {
            asker
                .ask(AskKind::Tool, json!({"tool": "write_to_file", "input": {}}))
                .await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let ts = channel.pending_ts().unwrap().expect("ask parked");
        channel.answer(ts, AskOutcome::yes()).unwrap();
        assert!(task.await.unwrap().unwrap().approved());

        let log = interaction.conversation.display_log().await;
        assert!(!log[0].auto_approved);
    }

    #[tokio::test]
    async fn test_say_appends_to_display_log() {
        let (interaction, _) = make_interaction(TaskConfig::default());
        interaction
            .say(SayKind::Text, Some("working on it".to_string()), None)
            .await
            .unwrap();

        let log = interaction.conversation.display_log().await;
        assert_eq!(log.len(), 1);
        assert!(log[0].is_say(SayKind::Text));
        assert_eq!(log[0].text.as_deref(), Some("working on it"));
    }
}
