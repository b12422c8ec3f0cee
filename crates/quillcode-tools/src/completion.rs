//! Completion tool - present the result and end the task.
//!
//! This is the terminal tool of the request loop. An accepted result ends
//! the loop; user feedback keeps it going with the feedback as the next
//! tool result.

use crate::interaction::{AskKind, SayKind};
use crate::{Tool, ToolContext, ToolError, ToolName, ToolOutput, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Present the task result to the user for acceptance.
pub struct AttemptCompletionTool;

#[async_trait]
impl Tool for AttemptCompletionTool {
    fn name(&self) -> ToolName {
        ToolName::AttemptCompletion
    }

    fn description(&self) -> &str {
        r#"Present the result of your work to the user once the task is complete. The user may accept the result or respond with feedback, in which case you should use the feedback to improve the result and attempt completion again.

Usage:
- Only use this tool after confirming previous tool uses succeeded
- Formulate the result as final; do not end with questions or offers of further assistance"#
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["result"],
            "properties": {
                "result": {
                    "type": "string",
                    "description": "The final result of the task"
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult<ToolOutput> {
        let result = args["result"]
            .as_str()
            .ok_or(ToolError::missing_parameter(self.name(), "result"))?
            .to_string();

        ctx.interaction
            .say(SayKind::CompletionResult, Some(result.clone()), None)
            .await?;

        let outcome = ctx
            .interaction
            .ask(AskKind::CompletionResult, json!({ "result": result }))
            .await?;

        let accepted = outcome.approved();
        let feedback = outcome.text.unwrap_or_default();
        if accepted && feedback.is_empty() {
            return Ok(ToolOutput::new("Task completed", "").ending_loop());
        }

        ctx.interaction
            .say(SayKind::UserFeedback, Some(feedback.clone()), outcome.images)
            .await?;

        Ok(ToolOutput::new(
            "Completion feedback",
            format!(
                "The user has provided feedback on the results. Consider their input to continue the task, and then attempt completion again.\n<feedback>\n{feedback}\n</feedback>"
            ),
        ))
    }
}
