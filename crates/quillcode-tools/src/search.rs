//! Search tool - regex search across files.

use crate::{Tool, ToolContext, ToolError, ToolName, ToolOutput, ToolResult};
use async_trait::async_trait;
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use regex::Regex;
use serde_json::{json, Value};
use std::path::Path;

/// Maximum number of matching lines returned.
const MAX_MATCHES: usize = 300;

/// Files larger than this are skipped.
const MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Regex search across files, respecting gitignore rules.
pub struct SearchFilesTool;

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> ToolName {
        ToolName::SearchFiles
    }

    fn description(&self) -> &str {
        r#"Search file contents with a regular expression. Matches are reported per file with line numbers. Entries ignored by gitignore rules and binary files are skipped.

Usage:
- The regex parameter uses Rust regex syntax
- Restrict the search to certain files with file_pattern, a glob such as *.rs"#
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["regex"],
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The directory to search (defaults to the working directory)"
                },
                "regex": {
                    "type": "string",
                    "description": "The regular expression to search for"
                },
                "file_pattern": {
                    "type": "string",
                    "description": "Glob restricting which files are searched (e.g. *.rs)"
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult<ToolOutput> {
        let pattern = args["regex"]
            .as_str()
            .ok_or(ToolError::missing_parameter(self.name(), "regex"))?;
        let raw_path = args["path"].as_str().unwrap_or(".");
        let file_pattern = args["file_pattern"].as_str().map(str::to_string);

        let regex = Regex::new(pattern)
            .map_err(|e| ToolError::validation(format!("Invalid regex: {e}")))?;

        let root = quillcode_util::path::resolve(&ctx.cwd, raw_path.as_ref());
        if !root.is_dir() {
            return Err(ToolError::file_not_found(root.display().to_string()));
        }

        let walk_root = root.clone();
        let (output, match_count, truncated) = tokio::task::spawn_blocking(move || {
            search_tree(&walk_root, &regex, file_pattern.as_deref())
        })
        .await
        .map_err(|e| ToolError::execution_failed(format!("Search task failed: {e}")))?
        .map_err(|e| ToolError::execution_failed(format!("Search failed: {e}")))?;

        let summary = if match_count == 0 {
            format!("No matches found for `{pattern}`")
        } else {
            output
        };

        Ok(
            ToolOutput::new(format!("Searched for `{pattern}`"), summary).with_metadata(json!({
                "path": root.display().to_string(),
                "matches": match_count,
                "truncated": truncated,
            })),
        )
    }
}

fn search_tree(
    root: &Path,
    regex: &Regex,
    file_pattern: Option<&str>,
) -> Result<(String, usize, bool), ignore::Error> {
    let mut builder = WalkBuilder::new(root);
    if let Some(glob) = file_pattern {
        let mut overrides = OverrideBuilder::new(root);
        overrides.add(glob)?;
        builder.overrides(overrides.build()?);
    }

    let mut output = String::new();
    let mut match_count = 0;
    let mut truncated = false;

    'files: for entry in builder.build().flatten() {
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        if entry
            .metadata()
            .map(|m| m.len() > MAX_FILE_SIZE)
            .unwrap_or(true)
        {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(entry.path()) else {
            // Binary or unreadable files are skipped.
            continue;
        };

        let mut file_header_written = false;
        for (index, line) in content.lines().enumerate() {
            if !regex.is_match(line) {
                continue;
            }
            if match_count >= MAX_MATCHES {
                truncated = true;
                break 'files;
            }
            if !file_header_written {
                let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
                if !output.is_empty() {
                    output.push('\n');
                }
                output.push_str(&format!("{}\n", relative.display()));
                file_header_written = true;
            }
            output.push_str(&format!("{:>5} | {}\n", index + 1, line.trim_end()));
            match_count += 1;
        }
    }

    if truncated {
        output.push_str("\n... (results truncated)");
    }
    Ok((output, match_count, truncated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_context, ScriptedInteraction};

    #[tokio::test]
    async fn test_search_finds_matches_with_line_numbers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn main() {}\nlet x = 1;\n").unwrap();
        std::fs::write(dir.path().join("b.txt"), "fn not_rust() {}\n").unwrap();
        let ctx = test_context(dir.path().to_path_buf(), ScriptedInteraction::new());

        let output = SearchFilesTool
            .execute(json!({"regex": "fn \\w+"}), &ctx)
            .await
            .unwrap();
        assert!(output.output.contains("a.rs"));
        assert!(output.output.contains("1 | fn main() {}"));
        assert!(output.output.contains("b.txt"));
        assert_eq!(output.metadata["matches"], 2);
    }

    #[tokio::test]
    async fn test_search_with_file_pattern() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "needle\n").unwrap();
        std::fs::write(dir.path().join("b.txt"), "needle\n").unwrap();
        let ctx = test_context(dir.path().to_path_buf(), ScriptedInteraction::new());

        let output = SearchFilesTool
            .execute(json!({"regex": "needle", "file_pattern": "*.rs"}), &ctx)
            .await
            .unwrap();
        assert!(output.output.contains("a.rs"));
        assert!(!output.output.contains("b.txt"));
    }

    #[tokio::test]
    async fn test_search_no_matches() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "nothing here\n").unwrap();
        let ctx = test_context(dir.path().to_path_buf(), ScriptedInteraction::new());

        let output = SearchFilesTool
            .execute(json!({"regex": "absent_term"}), &ctx)
            .await
            .unwrap();
        assert!(output.output.contains("No matches found"));
        assert_eq!(output.metadata["matches"], 0);
    }

    #[tokio::test]
    async fn test_invalid_regex_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path().to_path_buf(), ScriptedInteraction::new());

        let err = SearchFilesTool
            .execute(json!({"regex": "(["}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
    }
}
