//! Tool-call lifecycle.
//!
//! Each tool_use block from the model walks one path here: validate the
//! name, obtain approval (unless the tool drives its own interaction),
//! execute, and produce exactly one tool_result block for the next user
//! turn. Aborts are the single exception that produces no result.

use crate::error::TaskResult;
use quillcode_provider::ContentBlock;
use quillcode_tools::{
    AskKind, AskResponse, SayKind, SharedInteraction, ToolError, ToolContext, ToolName,
    ToolRegistry,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const DENIED: &str = "The user denied this operation.";

/// One tool_use block, ready to execute.
#[derive(Debug, Clone)]
pub struct PlannedToolCall {
    pub name: ToolName,
    pub input: Value,
    pub call_id: String,
    /// True for the final file write of this assistant turn.
    pub last_write_of_batch: bool,
}

/// How a tool call ended.
#[derive(Debug)]
pub enum ToolDisposition {
    /// The tool ran and produced a result.
    Finalized {
        result: ContentBlock,
        did_end_loop: bool,
    },
    /// The user rejected the call before it ran.
    Denied { result: ContentBlock },
    /// The call failed; the error went back to the model as its result.
    Errored { result: ContentBlock },
    /// The task aborted mid-call. No result exists.
    Aborted,
}

impl ToolDisposition {
    /// The tool_result block this disposition contributes, if any.
    pub fn into_result(self) -> Option<(ContentBlock, bool)> {
        match self {
            ToolDisposition::Finalized {
                result,
                did_end_loop,
            } => Some((result, did_end_loop)),
            ToolDisposition::Denied { result } | ToolDisposition::Errored { result } => {
                Some((result, false))
            }
            ToolDisposition::Aborted => None,
        }
    }
}

/// Drives individual tool calls for a task.
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    interaction: SharedInteraction,
    task_id: String,
    cwd: PathBuf,
    abort: CancellationToken,
}

impl ToolExecutor {
    pub fn new(
        registry: Arc<ToolRegistry>,
        interaction: SharedInteraction,
        task_id: impl Into<String>,
        cwd: PathBuf,
        abort: CancellationToken,
    ) -> Self {
        Self {
            registry,
            interaction,
            task_id: task_id.into(),
            cwd,
            abort,
        }
    }

    /// Run one planned call through its full lifecycle.
    pub async fn execute(&self, call: PlannedToolCall) -> TaskResult<ToolDisposition> {
        debug!(task_id = %self.task_id, tool = %call.name, call_id = %call.call_id, "Executing tool");

        let Some(tool) = self.registry.get(call.name) else {
            let text = format!("Tool '{}' is not available.", call.name);
            let _ = self
                .interaction
                .say(SayKind::Error, Some(text.clone()), None)
                .await;
            return Ok(ToolDisposition::Errored {
                result: ContentBlock::tool_error(call.call_id, text),
            });
        };
        let tool = tool.clone();

        // Interactive tools pose their own question; everything else gets an
        // up-front approval ask.
        if !call.name.must_confirm() {
            match self.confirm(&call).await {
                Confirmation::Approved => {}
                Confirmation::Denied(result) => return Ok(ToolDisposition::Denied { result }),
                Confirmation::Aborted => return Ok(ToolDisposition::Aborted),
            }
        }

        let ctx = ToolContext {
            task_id: self.task_id.clone(),
            call_id: call.call_id.clone(),
            cwd: self.cwd.clone(),
            abort: self.abort.clone(),
            interaction: self.interaction.clone(),
            last_write_of_batch: call.last_write_of_batch,
        };

        match tool.execute(call.input, &ctx).await {
            Ok(output) => {
                let _ = self
                    .interaction
                    .say(SayKind::Tool, Some(output.title.clone()), None)
                    .await;
                Ok(ToolDisposition::Finalized {
                    result: ContentBlock::tool_result(call.call_id, output.output),
                    did_end_loop: output.did_end_loop,
                })
            }
            Err(ToolError::MissingParameter { tool, param }) => {
                let _ = self
                    .interaction
                    .say(
                        SayKind::Error,
                        Some(format!(
                            "Claude tried to use {tool} without value for required parameter '{param}'. Retrying..."
                        )),
                        None,
                    )
                    .await;
                Ok(ToolDisposition::Errored {
                    result: ContentBlock::tool_error(
                        call.call_id,
                        format!(
                            "Error: Missing value for required parameter '{param}'. Please retry with complete response."
                        ),
                    ),
                })
            }
            Err(ToolError::Cancelled) => Ok(ToolDisposition::Aborted),
            Err(err) => {
                warn!(task_id = %self.task_id, tool = %call.name, error = %err, "Tool failed");
                let _ = self
                    .interaction
                    .say(
                        SayKind::Error,
                        Some(format!("Error executing {}: {err}", call.name)),
                        None,
                    )
                    .await;
                Ok(ToolDisposition::Errored {
                    result: ContentBlock::tool_error(call.call_id, format!("Error: {err}")),
                })
            }
        }
    }

    async fn confirm(&self, call: &PlannedToolCall) -> Confirmation {
        let kind = if call.name == ToolName::ExecuteCommand {
            AskKind::Command
        } else {
            AskKind::Tool
        };
        let payload = json!({"tool": call.name, "input": call.input});

        match self.interaction.ask(kind, payload).await {
            Ok(outcome) => match outcome.response {
                AskResponse::YesButtonTapped => Confirmation::Approved,
                AskResponse::NoButtonTapped => Confirmation::Denied(ContentBlock::tool_error(
                    call.call_id.clone(),
                    DENIED.to_string(),
                )),
                AskResponse::MessageResponse => {
                    let feedback = outcome.text.unwrap_or_default();
                    let _ = self
                        .interaction
                        .say(
                            SayKind::UserFeedback,
                            Some(feedback.clone()),
                            outcome.images,
                        )
                        .await;
                    Confirmation::Denied(ContentBlock::tool_error(
                        call.call_id.clone(),
                        format!(
                            "{DENIED} The user provided the following feedback:\n<feedback>\n{feedback}\n</feedback>"
                        ),
                    ))
                }
            },
            Err(ToolError::Cancelled) => Confirmation::Aborted,
            Err(err) => {
                warn!(task_id = %self.task_id, error = %err, "Approval ask failed");
                Confirmation::Aborted
            }
        }
    }
}

enum Confirmation {
    Approved,
    Denied(ContentBlock),
    Aborted,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quillcode_provider::ResultContent;
    use quillcode_tools::{AskOutcome, Interaction, Tool, ToolOutput, ToolResult};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Interaction stub that pops scripted answers and records traffic.
    struct Scripted {
        answers: Mutex<VecDeque<ToolResult<AskOutcome>>>,
        says: Mutex<Vec<(SayKind, Option<String>)>>,
        asks: Mutex<Vec<AskKind>>,
    }

    impl Scripted {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(VecDeque::new()),
                says: Mutex::new(Vec::new()),
                asks: Mutex::new(Vec::new()),
            })
        }

        fn push(&self, answer: ToolResult<AskOutcome>) {
            self.answers.lock().unwrap().push_back(answer);
        }

        fn said(&self, kind: SayKind) -> Vec<String> {
            self.says
                .lock()
                .unwrap()
                .iter()
                .filter(|(k, _)| *k == kind)
                .filter_map(|(_, text)| text.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Interaction for Scripted {
        async fn ask(&self, kind: AskKind, _payload: Value) -> ToolResult<AskOutcome> {
            self.asks.lock().unwrap().push(kind);
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| panic!("unscripted ask: {kind:?}"))
        }

        async fn say(
            &self,
            kind: SayKind,
            text: Option<String>,
            _images: Option<Vec<String>>,
        ) -> ToolResult<()> {
            self.says.lock().unwrap().push((kind, text));
            Ok(())
        }
    }

    /// A trivial tool standing in for the real ones.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> ToolName {
            ToolName::ReadFile
        }
        fn description(&self) -> &str {
            "echo"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, args: Value, _ctx: &ToolContext) -> ToolResult<ToolOutput> {
            let text = args["path"]
                .as_str()
                .ok_or(ToolError::missing_parameter(ToolName::ReadFile, "path"))?;
            Ok(ToolOutput::new("Echoed", text))
        }
    }

    fn executor(interaction: Arc<Scripted>) -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        ToolExecutor::new(
            Arc::new(registry),
            interaction,
            "tsk_test",
            PathBuf::from("/tmp"),
            CancellationToken::new(),
        )
    }

    fn call(input: Value) -> PlannedToolCall {
        PlannedToolCall {
            name: ToolName::ReadFile,
            input,
            call_id: "cal_1".to_string(),
            last_write_of_batch: false,
        }
    }

    fn result_text(block: &ContentBlock) -> String {
        match block {
            ContentBlock::ToolResult { content, .. } => content
                .iter()
                .filter_map(|c| match c {
                    ResultContent::Text { text } => Some(text.clone()),
                    _ => None,
                })
                .collect(),
            other => panic!("expected tool_result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_approved_call_finalizes() {
        let interaction = Scripted::new();
        interaction.push(Ok(AskOutcome::yes()));
        let executor = executor(interaction.clone());

        let disposition = executor
            .execute(call(json!({"path": "hello"})))
            .await
            .unwrap();
        match disposition {
            ToolDisposition::Finalized {
                result,
                did_end_loop,
            } => {
                assert_eq!(result_text(&result), "hello");
                assert!(!did_end_loop);
            }
            other => panic!("expected Finalized, got {other:?}"),
        }
        assert_eq!(interaction.asks.lock().unwrap().as_slice(), &[AskKind::Tool]);
        assert_eq!(interaction.said(SayKind::Tool), vec!["Echoed".to_string()]);
    }

    #[tokio::test]
    async fn test_denied_call_produces_denial_result() {
        let interaction = Scripted::new();
        interaction.push(Ok(AskOutcome::no()));
        let executor = executor(interaction);

        let disposition = executor.execute(call(json!({"path": "x"}))).await.unwrap();
        match disposition {
            ToolDisposition::Denied { result } => {
                assert_eq!(result_text(&result), DENIED);
            }
            other => panic!("expected Denied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_denial_with_feedback_carries_feedback() {
        let interaction = Scripted::new();
        interaction.push(Ok(AskOutcome::message("use the other file")));
        let executor = executor(interaction.clone());

        let disposition = executor.execute(call(json!({"path": "x"}))).await.unwrap();
        match disposition {
            ToolDisposition::Denied { result } => {
                let text = result_text(&result);
                assert!(text.starts_with(DENIED));
                assert!(text.contains("<feedback>\nuse the other file\n</feedback>"));
            }
            other => panic!("expected Denied, got {other:?}"),
        }
        assert_eq!(
            interaction.said(SayKind::UserFeedback),
            vec!["use the other file".to_string()]
        );
    }

    #[tokio::test]
    async fn test_missing_parameter_becomes_corrective_result() {
        let interaction = Scripted::new();
        interaction.push(Ok(AskOutcome::yes()));
        let executor = executor(interaction.clone());

        let disposition = executor.execute(call(json!({}))).await.unwrap();
        match disposition {
            ToolDisposition::Errored { result } => {
                assert_eq!(
                    result_text(&result),
                    "Error: Missing value for required parameter 'path'. Please retry with complete response."
                );
            }
            other => panic!("expected Errored, got {other:?}"),
        }
        let errors = interaction.said(SayKind::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("required parameter 'path'"));
    }

    #[tokio::test]
    async fn test_unregistered_tool_errors_without_ask() {
        let interaction = Scripted::new();
        let executor = executor(interaction.clone());

        let disposition = executor
            .execute(PlannedToolCall {
                name: ToolName::WriteToFile,
                input: json!({}),
                call_id: "cal_2".to_string(),
                last_write_of_batch: false,
            })
            .await
            .unwrap();
        match disposition {
            ToolDisposition::Errored { result } => {
                assert_eq!(result_text(&result), "Tool 'write_to_file' is not available.");
            }
            other => panic!("expected Errored, got {other:?}"),
        }
        assert!(interaction.asks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_ask_aborts_without_result() {
        let interaction = Scripted::new();
        interaction.push(Err(ToolError::Cancelled));
        let executor = executor(interaction);

        let disposition = executor.execute(call(json!({"path": "x"}))).await.unwrap();
        assert!(matches!(disposition, ToolDisposition::Aborted));
        assert!(disposition.into_result().is_none());
    }
}
