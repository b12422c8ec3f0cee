//! Display-log records.
//!
//! The display log is the user-facing transcript of a task: every ask and
//! say lands here. Records are keyed by a strictly-increasing millisecond
//! timestamp (see [`quillcode_util::id::display_ts`]), which is also the
//! handle the host uses to answer an ask.

use quillcode_tools::{AskKind, SayKind};
use quillcode_util::id::display_ts;
use serde::{Deserialize, Serialize};

/// Whether a record is a question or an informational entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum DisplayKind {
    Ask(AskKind),
    Say(SayKind),
}

/// One record in the display log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayMessage {
    /// Unique timestamp key for this record.
    pub ts: i64,
    #[serde(flatten)]
    pub kind: DisplayKind,
    /// Text payload. For asks this is the question payload as JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Attached images (base64 data).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    /// Set when an always-allow policy answered the ask without the user.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub auto_approved: bool,
}

impl DisplayMessage {
    /// Create an informational record.
    pub fn say(kind: SayKind, text: Option<String>, images: Option<Vec<String>>) -> Self {
        Self {
            ts: display_ts(),
            kind: DisplayKind::Say(kind),
            text,
            images,
            auto_approved: false,
        }
    }

    /// Create a question record.
    pub fn ask(kind: AskKind, text: Option<String>) -> Self {
        Self {
            ts: display_ts(),
            kind: DisplayKind::Ask(kind),
            text,
            images: None,
            auto_approved: false,
        }
    }

    /// Whether this record is an ask of the given kind.
    pub fn is_ask(&self, kind: AskKind) -> bool {
        self.kind == DisplayKind::Ask(kind)
    }

    /// Whether this record is a say of the given kind.
    pub fn is_say(&self, kind: SayKind) -> bool {
        self.kind == DisplayKind::Say(kind)
    }

    /// Resume prompts are stripped from the log before a task restarts, so
    /// repeated interruptions do not stack stale questions.
    pub fn is_resume_ask(&self) -> bool {
        self.is_ask(AskKind::ResumeTask) || self.is_ask(AskKind::ResumeCompletedTask)
    }
}
