//! List tool - list directory contents.

use crate::{Tool, ToolContext, ToolError, ToolName, ToolOutput, ToolResult};
use async_trait::async_trait;
use ignore::WalkBuilder;
use serde_json::{json, Value};

/// Maximum number of entries returned.
const MAX_ENTRIES: usize = 1000;

/// List files and directories, respecting gitignore rules.
pub struct ListFilesTool;

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> ToolName {
        ToolName::ListFiles
    }

    fn description(&self) -> &str {
        r#"List files and directories at the specified path. Directories are listed with a trailing slash. Entries ignored by gitignore rules are skipped.

Usage:
- The path may be relative to the working directory or absolute; it defaults to the working directory
- Set recursive to true to descend into subdirectories"#
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The directory to list (defaults to the working directory)"
                },
                "recursive": {
                    "type": "boolean",
                    "description": "Whether to list recursively (default: false)",
                    "default": false
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult<ToolOutput> {
        let raw_path = args["path"].as_str().unwrap_or(".");
        let recursive = args["recursive"].as_bool().unwrap_or(false);

        let root = quillcode_util::path::resolve(&ctx.cwd, raw_path.as_ref());
        if !root.is_dir() {
            return Err(ToolError::file_not_found(root.display().to_string()));
        }

        // ignore's walker is synchronous; the listing is bounded so run it
        // on the blocking pool.
        let walk_root = root.clone();
        let entries = tokio::task::spawn_blocking(move || {
            let mut entries: Vec<String> = Vec::new();
            let walker = WalkBuilder::new(&walk_root)
                .max_depth(if recursive { None } else { Some(1) })
                .build();
            for entry in walker.flatten() {
                if entry.depth() == 0 {
                    continue;
                }
                let relative = entry
                    .path()
                    .strip_prefix(&walk_root)
                    .unwrap_or(entry.path());
                let mut name = relative.display().to_string();
                if entry.file_type().is_some_and(|ft| ft.is_dir()) {
                    name.push('/');
                }
                entries.push(name);
                if entries.len() >= MAX_ENTRIES {
                    break;
                }
            }
            entries.sort();
            entries
        })
        .await
        .map_err(|e| ToolError::execution_failed(format!("List task failed: {e}")))?;

        let truncated = entries.len() >= MAX_ENTRIES;
        let count = entries.len();
        let mut output = entries.join("\n");
        if output.is_empty() {
            output = "(empty directory)".to_string();
        }
        if truncated {
            output.push_str("\n... (listing truncated)");
        }

        Ok(
            ToolOutput::new(format!("Listed {}", root.display()), output).with_metadata(json!({
                "path": root.display().to_string(),
                "count": count,
                "recursive": recursive,
                "truncated": truncated,
            })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_context, ScriptedInteraction};

    #[tokio::test]
    async fn test_list_top_level() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), "").unwrap();
        let ctx = test_context(dir.path().to_path_buf(), ScriptedInteraction::new());

        let output = ListFilesTool.execute(json!({}), &ctx).await.unwrap();
        assert!(output.output.contains("a.txt"));
        assert!(output.output.contains("sub/"));
        assert!(!output.output.contains("b.txt"));
    }

    #[tokio::test]
    async fn test_list_recursive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), "").unwrap();
        let ctx = test_context(dir.path().to_path_buf(), ScriptedInteraction::new());

        let output = ListFilesTool
            .execute(json!({"recursive": true}), &ctx)
            .await
            .unwrap();
        assert!(output.output.contains("sub/b.txt"));
    }

    #[tokio::test]
    async fn test_list_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path().to_path_buf(), ScriptedInteraction::new());

        let err = ListFilesTool
            .execute(json!({"path": "missing"}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::FileNotFound(_)));
    }
}
