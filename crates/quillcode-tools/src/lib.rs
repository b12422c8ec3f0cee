//! Tool implementations for quillcode.
//!
//! This crate provides the tools an agent can invoke to interact with the
//! workspace and environment, plus the [`Interaction`] protocol tools use to
//! talk back to the user (ask for approval or input, stream informational
//! output) while a task is running.

pub mod error;
pub mod interaction;
pub mod registry;

// Tool implementations
pub mod command;
pub mod completion;
pub mod followup;
pub mod list;
pub mod process_group;
pub mod read;
pub mod search;
pub mod web_search;
pub mod write;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{ToolError, ToolResult};
pub use interaction::{AskKind, AskOutcome, AskResponse, Interaction, SayKind, SharedInteraction};
pub use registry::ToolRegistry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// The closed set of tool kinds.
///
/// Dispatch is by enum variant, not by string, so a request for an unknown
/// tool is rejected at parse time rather than falling through a default case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    WriteToFile,
    ReadFile,
    ListFiles,
    SearchFiles,
    ExecuteCommand,
    WebSearch,
    AskFollowupQuestion,
    AttemptCompletion,
    SpawnAgent,
}

impl ToolName {
    /// All tool kinds, in schema order.
    pub const ALL: [ToolName; 9] = [
        ToolName::WriteToFile,
        ToolName::ReadFile,
        ToolName::ListFiles,
        ToolName::SearchFiles,
        ToolName::ExecuteCommand,
        ToolName::WebSearch,
        ToolName::AskFollowupQuestion,
        ToolName::AttemptCompletion,
        ToolName::SpawnAgent,
    ];

    /// The wire name of the tool.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::WriteToFile => "write_to_file",
            ToolName::ReadFile => "read_file",
            ToolName::ListFiles => "list_files",
            ToolName::SearchFiles => "search_files",
            ToolName::ExecuteCommand => "execute_command",
            ToolName::WebSearch => "web_search",
            ToolName::AskFollowupQuestion => "ask_followup_question",
            ToolName::AttemptCompletion => "attempt_completion",
            ToolName::SpawnAgent => "spawn_agent",
        }
    }

    /// Parse a wire name back into a tool kind.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name)
    }

    /// Whether the tool only observes state (no file mutation, no
    /// subprocess side effects).
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            ToolName::ReadFile | ToolName::ListFiles | ToolName::SearchFiles | ToolName::WebSearch
        )
    }

    /// Tools that always need an explicit user answer and can never be
    /// auto-approved.
    pub fn must_confirm(&self) -> bool {
        matches!(
            self,
            ToolName::AskFollowupQuestion | ToolName::AttemptCompletion
        )
    }

    /// Whether the tool mutates files. Used to mark the last write of a
    /// same-response batch.
    pub fn is_write(&self) -> bool {
        matches!(self, ToolName::WriteToFile)
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context provided to tools during execution.
pub struct ToolContext {
    /// Task ID.
    pub task_id: String,
    /// The tool-use call ID this execution answers.
    pub call_id: String,
    /// Working directory for path resolution and subprocesses.
    pub cwd: PathBuf,
    /// Cancellation token for task-level abort.
    pub abort: CancellationToken,
    /// Ask/say channel back to the user.
    pub interaction: SharedInteraction,
    /// True when this call is the last file write of the current assistant
    /// turn; the finalize hook for batched writes fires only then.
    pub last_write_of_batch: bool,
}

/// Result of tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Title/summary of the operation.
    pub title: String,
    /// Output text, fed back to the model as the tool result.
    pub output: String,
    /// Tool-specific metadata.
    pub metadata: Value,
    /// Set by the terminal tool when the user accepted the result and the
    /// request loop should end.
    pub did_end_loop: bool,
}

impl ToolOutput {
    /// Create a new tool output.
    pub fn new(title: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            output: output.into(),
            metadata: Value::Null,
            did_end_loop: false,
        }
    }

    /// Add metadata to the output.
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Mark this output as ending the request loop.
    pub fn ending_loop(mut self) -> Self {
        self.did_end_loop = true;
        self
    }
}

/// The main trait for tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Which tool kind this implementation provides.
    fn name(&self) -> ToolName;

    /// Get the tool description (for the model).
    fn description(&self) -> &str;

    /// Get the JSON Schema for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult<ToolOutput>;
}

/// A boxed tool for dynamic dispatch.
pub type BoxedTool = std::sync::Arc<dyn Tool>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_name_round_trip() {
        for tool in ToolName::ALL {
            assert_eq!(ToolName::parse(tool.as_str()), Some(tool));
        }
        assert_eq!(ToolName::parse("no_such_tool"), None);
    }

    #[test]
    fn test_tool_name_categories() {
        assert!(ToolName::ReadFile.is_read_only());
        assert!(ToolName::WebSearch.is_read_only());
        assert!(!ToolName::WriteToFile.is_read_only());
        assert!(!ToolName::ExecuteCommand.is_read_only());

        assert!(ToolName::AskFollowupQuestion.must_confirm());
        assert!(ToolName::AttemptCompletion.must_confirm());
        assert!(!ToolName::ReadFile.must_confirm());

        assert!(ToolName::WriteToFile.is_write());
        assert!(!ToolName::ReadFile.is_write());
    }

    #[test]
    fn test_tool_name_serde_matches_wire_name() {
        for tool in ToolName::ALL {
            let serialized = serde_json::to_value(tool).unwrap();
            assert_eq!(serialized, json!(tool.as_str()));
        }
    }

    #[test]
    fn test_tool_output_builders() {
        let output = ToolOutput::new("Title", "Content")
            .with_metadata(json!({"key": "value"}))
            .ending_loop();
        assert_eq!(output.title, "Title");
        assert_eq!(output.output, "Content");
        assert_eq!(output.metadata["key"], "value");
        assert!(output.did_end_loop);

        let plain = ToolOutput::new("t", "o");
        assert!(plain.metadata.is_null());
        assert!(!plain.did_end_loop);
    }
}
