//! Write tool - create or overwrite a file.

use crate::interaction::SayKind;
use crate::{Tool, ToolContext, ToolError, ToolName, ToolOutput, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use similar::TextDiff;
use tracing::{debug, warn};

/// Write file contents, reporting a diff when overwriting.
pub struct WriteToFileTool;

#[async_trait]
impl Tool for WriteToFileTool {
    fn name(&self) -> ToolName {
        ToolName::WriteToFile
    }

    fn description(&self) -> &str {
        r#"Write content to a file at the specified path. If the file exists it is overwritten with the provided content; if it doesn't exist it is created, along with any missing parent directories.

Usage:
- The path may be relative to the working directory or absolute
- Always provide the complete intended content of the file, without truncation"#
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["path", "content"],
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The path of the file to write (relative to the working directory)"
                },
                "content": {
                    "type": "string",
                    "description": "The full content to write to the file"
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult<ToolOutput> {
        let raw_path = args["path"]
            .as_str()
            .ok_or(ToolError::missing_parameter(self.name(), "path"))?;
        let content = args["content"]
            .as_str()
            .ok_or(ToolError::missing_parameter(self.name(), "content"))?;

        let path = quillcode_util::path::resolve(&ctx.cwd, raw_path.as_ref());
        if !quillcode_util::path::is_within(&path, &ctx.cwd) {
            warn!(path = %path.display(), cwd = %ctx.cwd.display(), "Write outside working directory rejected");
            return Err(ToolError::permission_denied(format!(
                "Cannot write to '{}' - path is outside the working directory {}",
                path.display(),
                ctx.cwd.display()
            )));
        }

        let existing = tokio::fs::read_to_string(&path).await.ok();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;

        let display_path = path
            .strip_prefix(&ctx.cwd)
            .unwrap_or(&path)
            .display()
            .to_string();

        debug!(path = %display_path, bytes = content.len(), "Wrote file");

        let (feedback, diff) = match existing {
            Some(old) => {
                let diff = TextDiff::from_lines(old.as_str(), content)
                    .unified_diff()
                    .context_radius(3)
                    .header(&display_path, &display_path)
                    .to_string();
                (format!("Changes applied to {display_path}"), Some(diff))
            }
            None => (format!("New file written to {display_path}"), None),
        };

        ctx.interaction
            .say(SayKind::UserFeedback, Some(feedback), None)
            .await?;

        // last_write_of_batch marks the final write of one assistant turn.
        // Hosts that defer per-write work (reformatting, re-running
        // diagnostics, refreshing an editor view) should run it when they see
        // this marker rather than after every file.
        let mut metadata = json!({
            "path": display_path,
            "bytes": content.len(),
            "last_write_of_batch": ctx.last_write_of_batch,
        });
        if let Some(diff) = &diff {
            metadata["diff"] = json!(diff);
        }

        Ok(ToolOutput::new(
            format!("Wrote {display_path}"),
            format!("Successfully wrote {} bytes to {display_path}", content.len()),
        )
        .with_metadata(metadata))
    }
}
