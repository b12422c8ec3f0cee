//! Follow-up tool - ask the user a clarifying question.

use crate::interaction::{AskKind, SayKind};
use crate::{Tool, ToolContext, ToolError, ToolName, ToolOutput, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Ask the user a question and return the answer as the tool result.
pub struct AskFollowupQuestionTool;

#[async_trait]
impl Tool for AskFollowupQuestionTool {
    fn name(&self) -> ToolName {
        ToolName::AskFollowupQuestion
    }

    fn description(&self) -> &str {
        r#"Ask the user a question to gather additional information needed to complete the task. Use this when you are blocked on an ambiguity or a missing detail that only the user can resolve. Prefer making progress with the information you have over asking unnecessary questions."#
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["question"],
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The question to ask the user"
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult<ToolOutput> {
        let question = args["question"]
            .as_str()
            .ok_or(ToolError::missing_parameter(self.name(), "question"))?
            .to_string();

        let outcome = ctx
            .interaction
            .ask(AskKind::Followup, json!({ "question": question }))
            .await?;

        let answer = outcome.text.unwrap_or_default();
        ctx.interaction
            .say(SayKind::UserFeedback, Some(answer.clone()), outcome.images)
            .await?;

        Ok(ToolOutput::new(
            format!("Asked: {question}"),
            format!("<answer>\n{answer}\n</answer>"),
        ))
    }
}
