//! Sub-agent tool.
//!
//! `spawn_agent` runs a delegated task in a child [`TaskExecutor`] with its
//! own conversation store and an automatic interaction (the child cannot
//! reach the user). Children get the builtin registry, which does not
//! include `spawn_agent`, so delegation is one level deep.

use crate::bus::Bus;
use crate::config::TaskConfig;
use crate::error::TaskError;
use crate::task::{TaskExecutor, TaskOptions};
use async_trait::async_trait;
use quillcode_provider::BoxedGateway;
use quillcode_storage::Storage;
use quillcode_tools::{
    AskKind, AskOutcome, Interaction, SayKind, Tool, ToolContext, ToolError, ToolName, ToolOutput,
    ToolResult,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// Delegate a self-contained piece of work to a sub-agent.
pub struct SpawnAgentTool<S: Storage + 'static> {
    gateway: BoxedGateway,
    storage: Arc<S>,
    bus: Bus,
    config: TaskConfig,
}

impl<S: Storage + 'static> SpawnAgentTool<S> {
    pub fn new(gateway: BoxedGateway, storage: Arc<S>, bus: Bus, config: TaskConfig) -> Self {
        Self {
            gateway,
            storage,
            bus,
            config,
        }
    }
}

#[async_trait]
impl<S: Storage + 'static> Tool for SpawnAgentTool<S> {
    fn name(&self) -> ToolName {
        ToolName::SpawnAgent
    }

    fn description(&self) -> &str {
        r#"Delegate a self-contained piece of work to a sub-agent. The sub-agent works autonomously with the same tools (except spawning further agents) and returns its final result.

Use this for work that is clearly separable from your current task, such as exploring an unfamiliar part of the codebase or applying a mechanical change across many files. State the task completely; the sub-agent cannot ask you or the user questions."#
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["task"],
            "properties": {
                "task": {
                    "type": "string",
                    "description": "The complete, self-contained task for the sub-agent"
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult<ToolOutput> {
        let task = args["task"]
            .as_str()
            .ok_or(ToolError::missing_parameter(self.name(), "task"))?
            .to_string();

        let auto = Arc::new(AutoInteraction::new(ctx.interaction.clone()));
        let mut options = TaskOptions::new(
            self.config.clone(),
            self.gateway.clone(),
            self.storage.clone(),
            self.bus.clone(),
        );
        options.interaction = Some(auto.clone());

        let child = TaskExecutor::new(options);
        let child_id = child.task_id().to_string();
        info!(parent = %ctx.task_id, child = %child_id, "Spawning sub-agent");

        tokio::select! {
            _ = ctx.abort.cancelled() => {
                let _ = child.abort().await;
                return Err(ToolError::Cancelled);
            }
            result = child.start(task.clone(), None) => {
                match result {
                    Ok(()) => {}
                    Err(TaskError::Aborted) => return Err(ToolError::Cancelled),
                    Err(err) => {
                        return Err(ToolError::execution_failed(format!(
                            "Sub-agent failed: {err}"
                        )))
                    }
                }
            }
        }

        let result = auto.completion_text().unwrap_or_else(|| {
            "The sub-agent finished without producing a completion result.".to_string()
        });
        ctx.interaction
            .say(
                SayKind::Info,
                Some(format!("Sub-agent {child_id} completed")),
                None,
            )
            .await?;

        Ok(ToolOutput::new(
            "Sub-agent completed",
            format!("<sub_agent_result>\n{result}\n</sub_agent_result>"),
        )
        .with_metadata(json!({"child_task_id": child_id, "task": task})))
    }
}

/// Interaction for a sub-agent: no user exists, so policy answers stand in.
///
/// Approvals resolve to yes, a follow-up question gets a stock answer, and
/// failure or limit prompts resolve to no so a stuck child winds down
/// instead of looping. The child's completion result is captured for the
/// parent's tool result.
struct AutoInteraction {
    parent: quillcode_tools::SharedInteraction,
    completion: Mutex<Option<String>>,
}

impl AutoInteraction {
    fn new(parent: quillcode_tools::SharedInteraction) -> Self {
        Self {
            parent,
            completion: Mutex::new(None),
        }
    }

    fn completion_text(&self) -> Option<String> {
        self.completion
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Interaction for AutoInteraction {
    async fn ask(&self, kind: AskKind, payload: Value) -> ToolResult<AskOutcome> {
        match kind {
            AskKind::CompletionResult => {
                if let Some(result) = payload["result"].as_str() {
                    *self
                        .completion
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner) = Some(result.to_string());
                }
                Ok(AskOutcome::yes())
            }
            AskKind::Followup => Ok(AskOutcome::message(
                "No further information is available. Proceed with your best judgment.",
            )),
            // A child that hits its limit or a failing provider winds down.
            AskKind::ApiReqFailed | AskKind::RequestLimitReached => Ok(AskOutcome::no()),
            // Never interrupt a running command; the command's own wait and
            // timeout branches resolve the race.
            AskKind::CommandOutput => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            _ => Ok(AskOutcome::yes()),
        }
    }

    async fn say(
        &self,
        kind: SayKind,
        text: Option<String>,
        images: Option<Vec<String>>,
    ) -> ToolResult<()> {
        match kind {
            // Request bookkeeping stays out of the parent transcript so the
            // parent's totals only count its own requests.
            SayKind::ApiReqStarted | SayKind::ApiReqFinished | SayKind::ApiReqRetried => {
                debug!(kind = ?kind, "Sub-agent request bookkeeping");
                Ok(())
            }
            other => self.parent.say(other, text, images).await,
        }
    }
}
