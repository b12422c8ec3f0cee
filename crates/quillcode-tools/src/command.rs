//! Execute tool - run a shell command with streamed output.
//!
//! While the command runs the user can interact with it through the ask
//! channel: a button answer interrupts the process group, free text with the
//! `stdin:` prefix is forwarded to the child's stdin, and any other free text
//! is treated as user feedback and terminates the command.

use crate::interaction::{AskKind, AskResponse, SayKind, SharedInteraction};
use crate::process_group::{self, GroupSignal};
use crate::{Tool, ToolContext, ToolError, ToolName, ToolOutput, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Default wall-clock timeout for commands.
const DEFAULT_TIMEOUT_SECS: u64 = 90;

/// Maximum output characters fed back to the model.
const MAX_OUTPUT_CHARS: usize = 30_000;

/// Free-text answers with this prefix are written to the child's stdin.
pub const STDIN_PREFIX: &str = "stdin:";

/// Run a shell command.
pub struct ExecuteCommandTool;

#[async_trait]
impl Tool for ExecuteCommandTool {
    fn name(&self) -> ToolName {
        ToolName::ExecuteCommand
    }

    fn description(&self) -> &str {
        r#"Execute a shell command in the working directory. Output is streamed back as it is produced and returned in full when the command finishes.

Usage:
- Commands run under bash with a hard timeout (default 90 seconds)
- Long-running interactive commands are not supported; prefer non-interactive flags"#
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["command"],
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": "Wall-clock timeout in seconds (default: 90)",
                    "default": 90
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult<ToolOutput> {
        let command = args["command"]
            .as_str()
            .ok_or(ToolError::missing_parameter(self.name(), "command"))?
            .to_string();
        let timeout_secs = args["timeout_secs"].as_u64().unwrap_or(DEFAULT_TIMEOUT_SECS);

        debug!(command = %truncate_command(&command), "Executing command");

        let mut cmd = Command::new("bash");
        cmd.arg("-c")
            .arg(&command)
            .current_dir(&ctx.cwd)
            .env("TERM", "dumb")
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("NO_COLOR", "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        process_group::spawn_in_own_group(&mut cmd);

        let mut child = cmd
            .spawn()
            .map_err(|e| ToolError::execution_failed(format!("Failed to spawn command: {e}")))?;
        let pid = child.id();
        let mut stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ToolError::execution_failed("stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ToolError::execution_failed("stderr not captured"))?;

        let stdout_buf = Arc::new(Mutex::new(String::new()));
        let stderr_buf = Arc::new(Mutex::new(String::new()));
        let stdout_task = spawn_reader(stdout, stdout_buf.clone(), ctx.interaction.clone());
        let stderr_task = spawn_reader(stderr, stderr_buf.clone(), ctx.interaction.clone());

        let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout_secs);
        let mut interrupted = false;
        let mut timed_out = false;
        let mut feedback: Option<String> = None;

        let ask_payload = json!({ "command": command });
        let mut ask = ctx
            .interaction
            .ask(AskKind::CommandOutput, ask_payload.clone());

        let status = loop {
            tokio::select! {
                status = child.wait() => break Some(status?),
                _ = tokio::time::sleep_until(deadline) => {
                    warn!(command = %truncate_command(&command), timeout_secs, "Command timed out");
                    timed_out = true;
                    kill_group(pid, &mut child);
                    break child.wait().await.ok();
                }
                _ = ctx.abort.cancelled() => {
                    kill_group(pid, &mut child);
                    let _ = child.wait().await;
                    return Err(ToolError::Cancelled);
                }
                outcome = &mut ask => {
                    let outcome = match outcome {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            // The ask channel is gone; the task is tearing down.
                            kill_group(pid, &mut child);
                            let _ = child.wait().await;
                            return Err(ToolError::Cancelled);
                        }
                    };
                    match outcome.response {
                        AskResponse::YesButtonTapped | AskResponse::NoButtonTapped => {
                            interrupted = true;
                            if let Some(pid) = pid {
                                let _ = process_group::signal_group(pid, GroupSignal::Interrupt);
                            }
                            break child.wait().await.ok();
                        }
                        AskResponse::MessageResponse => {
                            let text = outcome.text.unwrap_or_default();
                            match text.strip_prefix(STDIN_PREFIX) {
                                Some(rest) => {
                                    if let Some(stdin) = stdin.as_mut() {
                                        let _ = stdin.write_all(rest.as_bytes()).await;
                                        let _ = stdin.write_all(b"\n").await;
                                        let _ = stdin.flush().await;
                                    }
                                    ask = ctx
                                        .interaction
                                        .ask(AskKind::CommandOutput, ask_payload.clone());
                                }
                                None => {
                                    let _ = ctx
                                        .interaction
                                        .say(SayKind::UserFeedback, Some(text.clone()), outcome.images)
                                        .await;
                                    feedback = Some(text);
                                    kill_group(pid, &mut child);
                                    break child.wait().await.ok();
                                }
                            }
                        }
                    }
                }
            }
        };

        drop(stdin);
        let _ = stdout_task.await;
        let _ = stderr_task.await;

        let stdout_text = stdout_buf.lock().await.clone();
        let stderr_text = stderr_buf.lock().await.clone();

        let mut combined = stdout_text;
        if !stderr_text.is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str("--- stderr ---\n");
            combined.push_str(&stderr_text);
        }

        let mut result = quillcode_util::truncate_output(&combined, MAX_OUTPUT_CHARS);
        if result.is_empty() {
            result.push_str("(no output)");
        }
        if timed_out {
            result.push_str(&format!(
                "\n\n[Command timed out after {timeout_secs}s and was terminated. Partial output is shown above.]"
            ));
        }
        if interrupted {
            result.push_str("\n\n[Command was interrupted before completion.]");
        }
        if let Some(feedback) = &feedback {
            result.push_str(&format!(
                "\n\nThe user interrupted the command and provided this feedback:\n<feedback>\n{feedback}\n</feedback>"
            ));
        }

        let short = truncate_command(&command);
        let exit_code = status.as_ref().and_then(|s| s.code());
        let title = match &status {
            Some(s) if s.success() => format!("Ran `{short}`"),
            Some(s) => format!("Ran `{short}` (exit code: {})", s.code().unwrap_or(-1)),
            None => format!("Ran `{short}`"),
        };

        Ok(ToolOutput::new(title, result).with_metadata(json!({
            "command": command,
            "exit_code": exit_code,
            "timed_out": timed_out,
            "interrupted": interrupted,
        })))
    }
}

fn spawn_reader<R>(
    reader: R,
    buffer: Arc<Mutex<String>>,
    interaction: SharedInteraction,
) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let _ = interaction
                .say(SayKind::CommandOutput, Some(line.clone()), None)
                .await;
            let mut buffer = buffer.lock().await;
            buffer.push_str(&line);
            buffer.push('\n');
        }
    })
}

fn kill_group(pid: Option<u32>, child: &mut Child) {
    if let Some(pid) = pid {
        let _ = process_group::signal_group(pid, GroupSignal::Kill);
    }
    let _ = child.start_kill();
}

/// First line of the command, clipped for titles and logs.
fn truncate_command(command: &str) -> String {
    let first_line = command.lines().next().unwrap_or_default();
    if first_line.len() <= 50 {
        first_line.to_string()
    } else {
        let end = (0..=50)
            .rev()
            .find(|&i| first_line.is_char_boundary(i))
            .unwrap_or(0);
        format!("{}...", &first_line[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_context, ScriptedInteraction};
    use crate::AskOutcome;

    fn ctx_with(interaction: Arc<ScriptedInteraction>) -> (tempfile::TempDir, ToolContext) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path().to_path_buf(), interaction);
        (dir, ctx)
    }

    #[tokio::test]
    async fn test_echo_streams_and_returns_output() {
        let interaction = ScriptedInteraction::new();
        let (_dir, ctx) = ctx_with(interaction.clone());

        let output = ExecuteCommandTool
            .execute(json!({"command": "echo hello"}), &ctx)
            .await
            .unwrap();

        assert!(output.output.contains("hello"));
        assert_eq!(output.title, "Ran `echo hello`");
        assert_eq!(output.metadata["exit_code"], 0);
        assert_eq!(
            interaction.said(SayKind::CommandOutput),
            vec!["hello".to_string()]
        );
    }

    #[tokio::test]
    async fn test_stderr_is_separated() {
        let interaction = ScriptedInteraction::new();
        let (_dir, ctx) = ctx_with(interaction);

        let output = ExecuteCommandTool
            .execute(json!({"command": "echo out; echo err 1>&2"}), &ctx)
            .await
            .unwrap();

        assert!(output.output.contains("out"));
        assert!(output.output.contains("--- stderr ---"));
        assert!(output.output.contains("err"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_code_in_title() {
        let interaction = ScriptedInteraction::new();
        let (_dir, ctx) = ctx_with(interaction);

        let output = ExecuteCommandTool
            .execute(json!({"command": "exit 3"}), &ctx)
            .await
            .unwrap();

        assert!(output.title.contains("(exit code: 3)"));
        assert_eq!(output.output, "(no output)");
    }

    #[tokio::test]
    async fn test_timeout_terminates_and_annotates() {
        let interaction = ScriptedInteraction::new();
        let (_dir, ctx) = ctx_with(interaction);

        let output = ExecuteCommandTool
            .execute(json!({"command": "sleep 30", "timeout_secs": 1}), &ctx)
            .await
            .unwrap();

        assert_eq!(output.metadata["timed_out"], true);
        assert!(output.output.contains("timed out after 1s"));
    }

    #[tokio::test]
    async fn test_stdin_answer_is_forwarded() {
        let interaction = ScriptedInteraction::new();
        interaction.answer_with(AskOutcome::message("stdin:abc"));
        let (_dir, ctx) = ctx_with(interaction);

        let output = ExecuteCommandTool
            .execute(json!({"command": "read line && echo \"got:$line\""}), &ctx)
            .await
            .unwrap();

        assert!(output.output.contains("got:abc"));
        assert_eq!(output.metadata["interrupted"], false);
    }

    #[tokio::test]
    async fn test_button_answer_interrupts() {
        let interaction = ScriptedInteraction::new();
        interaction.answer_with(AskOutcome::yes());
        let (_dir, ctx) = ctx_with(interaction);

        let output = ExecuteCommandTool
            .execute(json!({"command": "sleep 30"}), &ctx)
            .await
            .unwrap();

        assert_eq!(output.metadata["interrupted"], true);
        assert!(output.output.contains("interrupted before completion"));
    }

    #[tokio::test]
    async fn test_feedback_answer_terminates_with_feedback() {
        let interaction = ScriptedInteraction::new();
        interaction.answer_with(AskOutcome::message("try a different approach"));
        let (_dir, ctx) = ctx_with(interaction.clone());

        let output = ExecuteCommandTool
            .execute(json!({"command": "sleep 30"}), &ctx)
            .await
            .unwrap();

        assert!(output.output.contains("<feedback>"));
        assert!(output.output.contains("try a different approach"));
        assert_eq!(
            interaction.said(SayKind::UserFeedback),
            vec!["try a different approach".to_string()]
        );
    }

    #[tokio::test]
    async fn test_abort_cancels_command() {
        let interaction = ScriptedInteraction::new();
        let (_dir, ctx) = ctx_with(interaction);
        ctx.abort.cancel();

        let err = ExecuteCommandTool
            .execute(json!({"command": "sleep 30"}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Cancelled));
    }

    #[tokio::test]
    async fn test_missing_command_parameter() {
        let interaction = ScriptedInteraction::new();
        let (_dir, ctx) = ctx_with(interaction);

        let err = ExecuteCommandTool
            .execute(json!({}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ToolError::MissingParameter { param: "command", .. }
        ));
    }

    #[test]
    fn test_truncate_command() {
        assert_eq!(truncate_command("ls -la"), "ls -la");
        let long = "a".repeat(80);
        let truncated = truncate_command(&long);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.len(), 53);
        assert_eq!(truncate_command("line1\nline2"), "line1");
    }
}
