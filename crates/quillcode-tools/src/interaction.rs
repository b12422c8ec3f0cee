//! The ask/say protocol between running tools and the user.
//!
//! Tools never talk to a UI directly. They receive an [`Interaction`] handle:
//! `ask` poses a question and suspends until an answer (or auto-approval)
//! arrives, `say` appends an informational entry to the display log. The
//! engine owns the other end and routes answers through its single-slot ask
//! mailbox.

use crate::ToolResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Kinds of questions a task can pose to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AskKind {
    /// The model asked a clarifying question.
    Followup,
    /// Approval to run a command.
    Command,
    /// Mid-run command interaction (terminate, or feed stdin).
    CommandOutput,
    /// Approval to run a non-command tool.
    Tool,
    /// The model believes the task is complete; accept or push back.
    CompletionResult,
    /// A provider request failed; retry or give up.
    ApiReqFailed,
    /// The per-task request ceiling was reached; continue or stop.
    RequestLimitReached,
    /// Resume an interrupted task.
    ResumeTask,
    /// Resume a task that had already completed.
    ResumeCompletedTask,
}

impl AskKind {
    /// Kinds that always require a human answer, regardless of the
    /// always-allow policy.
    pub fn must_confirm(&self) -> bool {
        matches!(
            self,
            AskKind::Followup
                | AskKind::CompletionResult
                | AskKind::ApiReqFailed
                | AskKind::RequestLimitReached
                | AskKind::ResumeTask
                | AskKind::ResumeCompletedTask
        )
    }
}

/// Kinds of informational display entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SayKind {
    /// The task text itself, at the top of the log.
    Task,
    /// Assistant prose.
    Text,
    /// An error surfaced to the user.
    Error,
    /// A provider request is in flight.
    ApiReqStarted,
    /// A provider request finished (tokens, cost).
    ApiReqFinished,
    /// A failed provider request is being retried.
    ApiReqRetried,
    /// The model's completion result text.
    CompletionResult,
    /// Free-text feedback from the user.
    UserFeedback,
    /// A line of subprocess output.
    CommandOutput,
    /// A tool ran (title + summary).
    Tool,
    /// Miscellaneous information.
    Info,
    /// Older conversation was dropped to fit the context window.
    ChatTruncated,
    /// A hook injected content into the next request.
    Hook,
    /// The provider rejected the request for lack of credit.
    PaymentRequired,
    /// The provider rejected the credentials.
    Unauthorized,
}

/// How the user answered an ask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AskResponse {
    /// The approve button.
    YesButtonTapped,
    /// The reject button.
    NoButtonTapped,
    /// Free text instead of a button. For approval asks this is
    /// denial-with-feedback.
    MessageResponse,
}

/// A resolved ask: the button (or message) plus any text and images.
#[derive(Debug, Clone)]
pub struct AskOutcome {
    pub response: AskResponse,
    pub text: Option<String>,
    pub images: Option<Vec<String>>,
}

impl AskOutcome {
    /// A plain approval.
    pub fn yes() -> Self {
        Self {
            response: AskResponse::YesButtonTapped,
            text: None,
            images: None,
        }
    }

    /// A plain rejection.
    pub fn no() -> Self {
        Self {
            response: AskResponse::NoButtonTapped,
            text: None,
            images: None,
        }
    }

    /// A free-text answer.
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            response: AskResponse::MessageResponse,
            text: Some(text.into()),
            images: None,
        }
    }

    /// Whether the user approved without reservation.
    pub fn approved(&self) -> bool {
        matches!(self.response, AskResponse::YesButtonTapped)
    }
}

/// The channel from a running tool back to the user.
#[async_trait]
pub trait Interaction: Send + Sync {
    /// Pose a question and suspend until it is answered. Fails with
    /// [`crate::ToolError::Cancelled`] when the task aborts, and may resolve
    /// immediately under an always-allow policy.
    async fn ask(&self, kind: AskKind, payload: Value) -> ToolResult<AskOutcome>;

    /// Append an informational entry to the display log.
    async fn say(
        &self,
        kind: SayKind,
        text: Option<String>,
        images: Option<Vec<String>>,
    ) -> ToolResult<()>;
}

/// A shared interaction handle.
pub type SharedInteraction = Arc<dyn Interaction>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(serde_json::to_value(AskKind::Followup).unwrap(), json!("followup"));
        assert_eq!(
            serde_json::to_value(AskKind::RequestLimitReached).unwrap(),
            json!("request_limit_reached")
        );
        assert_eq!(
            serde_json::to_value(SayKind::ApiReqStarted).unwrap(),
            json!("api_req_started")
        );
        assert_eq!(
            serde_json::to_value(SayKind::UserFeedback).unwrap(),
            json!("user_feedback")
        );
    }

    #[test]
    fn test_must_confirm_kinds() {
        assert!(AskKind::Followup.must_confirm());
        assert!(AskKind::CompletionResult.must_confirm());
        assert!(AskKind::ResumeTask.must_confirm());
        assert!(AskKind::ResumeCompletedTask.must_confirm());
        assert!(AskKind::RequestLimitReached.must_confirm());
        assert!(AskKind::ApiReqFailed.must_confirm());
        assert!(!AskKind::Tool.must_confirm());
        assert!(!AskKind::Command.must_confirm());
    }

    #[test]
    fn test_outcome_helpers() {
        assert!(AskOutcome::yes().approved());
        assert!(!AskOutcome::no().approved());
        let msg = AskOutcome::message("try something else");
        assert!(!msg.approved());
        assert_eq!(msg.text.as_deref(), Some("try something else"));
    }
}
