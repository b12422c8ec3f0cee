//! Read tool - read file contents.

use crate::{Tool, ToolContext, ToolError, ToolName, ToolOutput, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Maximum file size to read (10MB).
const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Maximum characters fed back to the model.
const MAX_RESULT_CHARS: usize = 100_000;

/// Read file contents.
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> ToolName {
        ToolName::ReadFile
    }

    fn description(&self) -> &str {
        r#"Read the contents of a file at the specified path. Use this to examine existing files before modifying them, or to inspect configuration and source code.

Usage:
- The path may be relative to the working directory or absolute
- Binary files cannot be read with this tool"#
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["path"],
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The path of the file to read (relative to the working directory)"
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult<ToolOutput> {
        let raw_path = args["path"]
            .as_str()
            .ok_or(ToolError::missing_parameter(self.name(), "path"))?;

        let path = quillcode_util::path::resolve(&ctx.cwd, raw_path.as_ref());

        if !path.exists() {
            return Err(ToolError::file_not_found(path.display().to_string()));
        }

        let metadata = tokio::fs::metadata(&path).await?;
        if metadata.len() > MAX_FILE_SIZE {
            return Err(ToolError::validation(format!(
                "File too large ({} bytes). Maximum allowed size is {} bytes.",
                metadata.len(),
                MAX_FILE_SIZE
            )));
        }

        let bytes = tokio::fs::read(&path).await?;

        // Null bytes in the first 8KB mean binary content.
        let sample_size = std::cmp::min(bytes.len(), 8192);
        if bytes[..sample_size].contains(&0) {
            return Err(ToolError::validation(format!(
                "Cannot read binary file: {}",
                path.display()
            )));
        }

        let content = String::from_utf8_lossy(&bytes);
        let display_path = path
            .strip_prefix(&ctx.cwd)
            .unwrap_or(&path)
            .display()
            .to_string();

        Ok(ToolOutput::new(
            format!("Read {display_path}"),
            quillcode_util::truncate_output(&content, MAX_RESULT_CHARS),
        )
        .with_metadata(json!({
            "path": display_path,
            "bytes": bytes.len(),
        })))
    }
}
