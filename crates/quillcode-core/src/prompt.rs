//! System prompt assembly and request summaries.

use quillcode_provider::{ContentBlock, ToolDefinition};
use quillcode_tools::ToolRegistry;
use std::path::Path;

const BASE_PROMPT: &str = r#"You are an autonomous software engineering agent. You complete coding tasks end to end: exploring the project, writing and editing files, running commands, and verifying your work.

RULES

- Work step by step. Each of your responses should either invoke tools to make progress or, when the task is done, present the result with the attempt_completion tool.
- Read before you write. Inspect the relevant files and project structure before changing anything.
- Use the ask_followup_question tool only when you are blocked on information that only the user can provide. Prefer making progress with reasonable assumptions.
- Commands run in a non-interactive shell from the working directory. Do not use commands that require an interactive terminal.
- When you believe the task is complete, use the attempt_completion tool to present the result. Formulate the result as final; do not end with questions or offers of further assistance.
- Tool results, command output, and user feedback arrive in the next message. Base your next step on them rather than assuming success.
- Never pad your responses with conversational filler. The user sees your text output alongside tool activity; keep it purposeful."#;

const CUSTOM_INSTRUCTIONS_HEADER: &str = "USER'S CUSTOM INSTRUCTIONS";

/// How much of the seed text survives into an `api_req_started` summary.
const SUMMARY_MAX_CHARS: usize = 200;

/// Build the system prompt for a task.
pub fn system_prompt(cwd: &Path, custom_instructions: Option<&str>) -> String {
    let mut prompt = format!(
        "{BASE_PROMPT}\n\n====\n\nWORKING DIRECTORY\n\nThe current working directory is: {}",
        cwd.display()
    );
    if let Some(instructions) = custom_instructions.filter(|text| !text.trim().is_empty()) {
        prompt.push_str(&format!(
            "\n\n====\n\n{CUSTOM_INSTRUCTIONS_HEADER}\n\nThe following additional instructions are provided by the user. They should be followed to the best of your ability without interfering with the rules above.\n\n{instructions}"
        ));
    }
    prompt
}

/// A short single-line description of an outgoing request, shown in the
/// display log while the request is in flight.
pub fn request_summary(content: &[ContentBlock]) -> String {
    let text = content
        .iter()
        .find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .unwrap_or("(no text content)");
    let line = text.lines().next().unwrap_or_default();
    if line.len() > SUMMARY_MAX_CHARS {
        let cut = line
            .char_indices()
            .take_while(|(i, _)| *i < SUMMARY_MAX_CHARS)
            .map(|(i, c)| i + c.len_utf8())
            .last()
            .unwrap_or(0);
        format!("{}...", &line[..cut])
    } else {
        line.to_string()
    }
}

/// Schemas for every registered tool, in a stable order.
pub fn tool_definitions(registry: &ToolRegistry) -> Vec<ToolDefinition> {
    let mut definitions: Vec<ToolDefinition> = registry
        .all()
        .map(|tool| ToolDefinition {
            name: tool.name().as_str().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters_schema(),
        })
        .collect();
    definitions.sort_by(|a, b| a.name.cmp(&b.name));
    definitions
}
