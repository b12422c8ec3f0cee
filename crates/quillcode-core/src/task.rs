//! The per-task request loop.
//!
//! A [`TaskExecutor`] owns everything one task needs: its conversation
//! store, its ask mailbox, its tool executor, and its hooks. The loop is
//! iterative: prepare the user turn, send the request, route the response,
//! execute tool calls, and feed their results back in as the next user turn
//! until the model attempts completion or the user stops it.

use crate::ask::AskChannel;
use crate::bus::{Bus, TaskStateChanged};
use crate::config::TaskConfig;
use crate::context_window;
use crate::conversation::{ApiMetrics, ConversationStore};
use crate::display::DisplayMessage;
use crate::environment::{DefaultEnvironmentReporter, EnvironmentReporter};
use crate::error::{TaskError, TaskResult};
use crate::hook::{Hook, HookManager};
use crate::interaction::TaskInteraction;
use crate::prompt;
use crate::tool_executor::{PlannedToolCall, ToolDisposition, ToolExecutor};
use quillcode_provider::{
    ApiRequest, BoxedGateway, ContentBlock, GatewayError, ImageSource, Message, Role,
};
use quillcode_storage::Storage;
use quillcode_tools::{AskKind, AskOutcome, SayKind, SharedInteraction, ToolName, ToolRegistry};
use quillcode_util::{elapsed_phrase, Identifier};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Idle,
    WaitingForApi,
    ProcessingResponse,
    ExecutingTool,
    WaitingForUser,
    Completed,
    Aborted,
}

/// Per-task counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskStats {
    /// Provider requests since the task started or the limit was last reset.
    pub request_count: u32,
}

/// Everything needed to construct a [`TaskExecutor`].
pub struct TaskOptions<S: Storage + 'static> {
    pub config: TaskConfig,
    pub gateway: BoxedGateway,
    pub storage: Arc<S>,
    pub bus: Bus,
    pub registry: Arc<ToolRegistry>,
    /// Environment reporter; defaults to [`DefaultEnvironmentReporter`].
    pub environment: Option<Arc<dyn EnvironmentReporter>>,
    /// Interaction override. When absent the executor wires up its own
    /// [`TaskInteraction`]; sub-agents substitute an automatic one.
    pub interaction: Option<SharedInteraction>,
    pub hooks: Vec<Box<dyn Hook>>,
}

impl<S: Storage + 'static> TaskOptions<S> {
    pub fn new(config: TaskConfig, gateway: BoxedGateway, storage: Arc<S>, bus: Bus) -> Self {
        Self {
            config,
            gateway,
            storage,
            bus,
            registry: Arc::new(ToolRegistry::with_builtins()),
            environment: None,
            interaction: None,
            hooks: Vec::new(),
        }
    }
}

const NO_TOOL_NUDGE: &str = "If you have completed the user's task, use the attempt_completion tool. If you require additional information from the user, use the ask_followup_question tool. Otherwise, if you have not completed the task and do not need additional information, then proceed with the next step of the task. (This is an automated message, so do not respond to it conversationally.)";

const INTERRUPTED_RESULT: &str = "Task was interrupted before this tool call could be completed.";

const REQUEST_LIMIT_FAREWELL: &str =
    "Failure: I have reached the request limit for this task. Do you have a new task for me?";

const COMPLETION_FAREWELL: &str =
    "I am pleased you are satisfied with the result. Do you have a new task for me?";

const EMPTY_RESPONSE_APOLOGY: &str = "Failure: I did not have a response to provide.";

/// Drives one task from seed (or resume) to completion.
pub struct TaskExecutor<S: Storage + 'static> {
    task_id: String,
    config: TaskConfig,
    gateway: BoxedGateway,
    bus: Bus,
    registry: Arc<ToolRegistry>,
    conversation: Arc<ConversationStore<S>>,
    channel: Arc<AskChannel>,
    interaction: SharedInteraction,
    executor: ToolExecutor,
    hooks: tokio::sync::Mutex<HookManager>,
    environment: Arc<dyn EnvironmentReporter>,
    abort: CancellationToken,
    state: Mutex<TaskState>,
    stats: Mutex<TaskStats>,
}

impl<S: Storage + 'static> TaskExecutor<S> {
    /// Create an executor for a fresh task.
    pub fn new(options: TaskOptions<S>) -> Self {
        let task_id = Identifier::task();
        let conversation = Arc::new(ConversationStore::new(
            options.storage.clone(),
            options.bus.clone(),
            task_id.clone(),
        ));
        Self::assemble(task_id, conversation, options)
    }

    /// Create an executor over the persisted logs of an existing task.
    pub async fn restore(task_id: impl Into<String>, options: TaskOptions<S>) -> TaskResult<Self> {
        let task_id = task_id.into();
        let conversation = Arc::new(
            ConversationStore::load(
                options.storage.clone(),
                options.bus.clone(),
                task_id.clone(),
            )
            .await?,
        );
        Ok(Self::assemble(task_id, conversation, options))
    }

    fn assemble(
        task_id: String,
        conversation: Arc<ConversationStore<S>>,
        options: TaskOptions<S>,
    ) -> Self {
        let abort = CancellationToken::new();
        let channel = Arc::new(AskChannel::new(abort.clone()));
        let interaction: SharedInteraction = match options.interaction {
            Some(interaction) => interaction,
            None => Arc::new(TaskInteraction::new(
                conversation.clone(),
                channel.clone(),
                options.config.clone(),
            )),
        };
        let executor = ToolExecutor::new(
            options.registry.clone(),
            interaction.clone(),
            task_id.clone(),
            options.config.cwd.clone(),
            abort.clone(),
        );
        let environment = options
            .environment
            .unwrap_or_else(|| Arc::new(DefaultEnvironmentReporter::new(options.config.cwd.clone())));
        Self {
            task_id,
            config: options.config,
            gateway: options.gateway,
            bus: options.bus,
            registry: options.registry,
            conversation,
            channel,
            interaction,
            executor,
            hooks: tokio::sync::Mutex::new(HookManager::new(options.hooks)),
            environment,
            abort,
            state: Mutex::new(TaskState::Idle),
            stats: Mutex::new(TaskStats::default()),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn state(&self) -> TaskState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stats(&self) -> TaskStats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn conversation(&self) -> &Arc<ConversationStore<S>> {
        &self.conversation
    }

    /// Deliver the user's answer to the pending ask identified by `for_ts`.
    /// Stale timestamps route to the current ask; see [`AskChannel::answer`].
    pub fn answer(&self, for_ts: i64, outcome: AskOutcome) -> TaskResult<bool> {
        self.channel.answer(for_ts, outcome)
    }

    /// Abort the task: cancels in-flight provider requests, tool executions
    /// and pending asks, then flushes the conversation logs.
    pub async fn abort(&self) -> TaskResult<()> {
        info!(task_id = %self.task_id, "Aborting task");
        self.abort.cancel();
        self.set_state(TaskState::Aborted).await;
        self.conversation.flush().await
    }

    async fn set_state(&self, state: TaskState) {
        {
            let mut current = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *current == state {
                return;
            }
            *current = state;
        }
        self.bus
            .publish(TaskStateChanged {
                task_id: self.task_id.clone(),
                state,
            })
            .await;
    }

    /// Start a fresh task from the user's task text.
    pub async fn start(&self, task: impl Into<String>, images: Option<Vec<String>>) -> TaskResult<()> {
        let task = task.into();
        info!(task_id = %self.task_id, "Starting task");
        self.conversation
            .append_display(DisplayMessage::say(
                SayKind::Task,
                Some(task.clone()),
                images.clone(),
            ))
            .await?;

        let environment = self.environment.details().await;
        let text =
            format!("<task>\n{task}\n</task>\n\n<environment_details>\n{environment}\n</environment_details>");
        let mut content = vec![ContentBlock::text(text)];
        for data in images.into_iter().flatten() {
            content.push(ContentBlock::Image {
                source: ImageSource::Base64 {
                    media_type: "image/png".to_string(),
                    data,
                },
            });
        }
        self.run_loop(content).await
    }

    /// Resume an interrupted (or completed) task from its persisted logs.
    pub async fn resume(&self) -> TaskResult<()> {
        info!(task_id = %self.task_id, "Resuming task");

        // Strip stale resume prompts so repeated interruptions do not stack.
        let mut log = self.conversation.display_log().await;
        let before = log.len();
        while log.last().is_some_and(DisplayMessage::is_resume_ask) {
            log.pop();
        }
        if log.len() != before {
            self.conversation.overwrite_display(log.clone()).await?;
        }

        let was_completed = log
            .last()
            .is_some_and(|m| m.is_ask(AskKind::CompletionResult));
        let interrupted_at = log.last().map(|m| m.ts).unwrap_or_else(quillcode_util::now_ms);

        // Close every tool_use gap the interruption left behind. Results
        // answering the final assistant turn travel in the upcoming
        // resumption turn instead, keeping the history alternating.
        let mut history = self.conversation.api_history().await;
        let unresolved_user_text = repair_history(&mut history);
        let mut carried: Vec<ContentBlock> = Vec::new();
        if history.last().is_some_and(|m| m.role == Role::User) {
            if let Some(last) = history.pop() {
                carried = last.content;
            }
        }
        self.conversation.overwrite_api(history).await?;

        let kind = if was_completed {
            AskKind::ResumeCompletedTask
        } else {
            AskKind::ResumeTask
        };
        let outcome = match self.interaction.ask(kind, json!({})).await {
            Ok(outcome) => outcome,
            Err(quillcode_tools::ToolError::Cancelled) => {
                self.set_state(TaskState::Aborted).await;
                return Ok(());
            }
            Err(err) => return Err(TaskError::Tool(err)),
        };
        if !outcome.approved() && outcome.text.is_none() {
            debug!(task_id = %self.task_id, "User declined to resume");
            return Ok(());
        }

        let mut text = format!(
            "Task resumption: This autonomous coding task was interrupted {}. It may or may not be complete, so please reassess the task context. Be aware that the project state may have changed since then. The current working directory is now '{}'. If the task has not been completed, retry the last step before interruption and proceed with completing the task.",
            elapsed_phrase(interrupted_at),
            self.config.cwd.display()
        );
        if let Some(previous) = unresolved_user_text {
            text.push_str(&format!("\n\n<previous_message>\n{previous}\n</previous_message>"));
        }
        if let Some(reply) = outcome.text.filter(|t| !t.is_empty()) {
            text.push_str(&format!("\n\n<user_message>\n{reply}\n</user_message>"));
        }
        let environment = self.environment.details().await;
        text.push_str(&format!("\n\n<environment_details>\n{environment}\n</environment_details>"));

        let mut content = carried;
        content.push(ContentBlock::text(text));
        self.run_loop(content).await
    }

    /// The iterative request loop.
    async fn run_loop(&self, mut user_content: Vec<ContentBlock>) -> TaskResult<()> {
        let mut retrying = false;
        loop {
            if self.abort.is_cancelled() {
                self.set_state(TaskState::Aborted).await;
                break;
            }

            if !retrying {
                if !self.check_request_limit().await? {
                    break;
                }
                if let Some(injected) = self.hooks.lock().await.check_and_execute().await {
                    self.conversation
                        .append_display(DisplayMessage::say(
                            SayKind::Hook,
                            Some(injected.clone()),
                            None,
                        ))
                        .await?;
                    user_content.push(ContentBlock::text(injected));
                }
                self.conversation
                    .append_api(Message {
                        role: Role::User,
                        content: user_content.clone(),
                    })
                    .await?;
            }
            retrying = false;

            let response = match self.send_request(&user_content).await? {
                RequestOutcome::Response(response) => response,
                RequestOutcome::Retry => {
                    retrying = true;
                    continue;
                }
                RequestOutcome::Stop => break,
            };

            self.set_state(TaskState::ProcessingResponse).await;
            if response.content.is_empty() {
                self.interaction
                    .say(
                        SayKind::Error,
                        Some(
                            "Unexpected Error: No assistant messages were found in the API response"
                                .to_string(),
                        ),
                        None,
                    )
                    .await?;
                self.conversation
                    .append_api(Message::assistant(EMPTY_RESPONSE_APOLOGY))
                    .await?;
                user_content = vec![ContentBlock::text(NO_TOOL_NUDGE)];
                continue;
            }

            self.conversation
                .append_api(Message {
                    role: Role::Assistant,
                    content: response.content.clone(),
                })
                .await?;

            for block in &response.content {
                if let ContentBlock::Text { text } = block {
                    if !text.trim().is_empty() {
                        self.interaction
                            .say(SayKind::Text, Some(text.clone()), None)
                            .await?;
                    }
                }
            }

            match self.run_tool_calls(&response.content).await? {
                BatchOutcome::Aborted => {
                    self.set_state(TaskState::Aborted).await;
                    break;
                }
                BatchOutcome::Completed { results } => {
                    if !results.is_empty() {
                        self.conversation
                            .append_api(Message {
                                role: Role::User,
                                content: results,
                            })
                            .await?;
                    }
                    self.conversation
                        .append_api(Message::assistant(COMPLETION_FAREWELL))
                        .await?;
                    self.set_state(TaskState::Completed).await;
                    break;
                }
                BatchOutcome::Continue { results } => {
                    user_content = if results.is_empty() {
                        vec![ContentBlock::text(NO_TOOL_NUDGE)]
                    } else {
                        results
                    };
                }
            }
        }
        self.conversation.flush().await
    }

    /// Enforce the per-task request ceiling. Returns false when the task
    /// should stop.
    async fn check_request_limit(&self) -> TaskResult<bool> {
        let count = self.stats().request_count;
        if count < self.config.max_requests_per_task {
            return Ok(true);
        }

        self.set_state(TaskState::WaitingForUser).await;
        let outcome = match self
            .interaction
            .ask(AskKind::RequestLimitReached, json!({"request_count": count}))
            .await
        {
            Ok(outcome) => outcome,
            Err(quillcode_tools::ToolError::Cancelled) => {
                self.set_state(TaskState::Aborted).await;
                return Ok(false);
            }
            Err(err) => return Err(TaskError::Tool(err)),
        };

        if outcome.approved() {
            self.stats
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .request_count = 0;
            return Ok(true);
        }

        self.interaction
            .say(SayKind::Text, Some(REQUEST_LIMIT_FAREWELL.to_string()), None)
            .await?;
        self.conversation
            .append_api(Message::assistant(REQUEST_LIMIT_FAREWELL))
            .await?;
        self.set_state(TaskState::Completed).await;
        Ok(false)
    }

    /// Fit the history, send one provider request, and record its metrics.
    async fn send_request(&self, user_content: &[ContentBlock]) -> TaskResult<RequestOutcome> {
        let history = self.conversation.api_history().await;
        let context_limit = self.gateway.model_info().limit.context;
        let fitted = context_window::fit(&history, context_limit);
        if fitted.len() < history.len() {
            let dropped = history.len() - fitted.len();
            self.interaction
                .say(
                    SayKind::ChatTruncated,
                    Some(format!(
                        "Older conversation was removed to fit within the context window ({dropped} messages dropped)."
                    )),
                    None,
                )
                .await?;
        }

        self.interaction
            .say(
                SayKind::ApiReqStarted,
                Some(json!({"request": prompt::request_summary(user_content)}).to_string()),
                None,
            )
            .await?;

        let (temperature, top_p) = self.config.creativity.sampling();
        let request = ApiRequest {
            system: Some(prompt::system_prompt(
                &self.config.cwd,
                self.config.custom_instructions.as_deref(),
            )),
            messages: fitted,
            tools: prompt::tool_definitions(&self.registry),
            temperature: Some(temperature),
            top_p: Some(top_p),
            max_tokens: Some(self.gateway.model_info().limit.output),
            abort: Some(self.abort.clone()),
        };

        self.set_state(TaskState::WaitingForApi).await;
        let response = match self.gateway.send(request).await {
            Ok(response) => response,
            Err(GatewayError::Cancelled) => {
                self.set_state(TaskState::Aborted).await;
                return Ok(RequestOutcome::Stop);
            }
            Err(GatewayError::PaymentRequired) => {
                self.interaction
                    .say(
                        SayKind::PaymentRequired,
                        Some(GatewayError::PaymentRequired.to_string()),
                        None,
                    )
                    .await?;
                return Err(TaskError::Provider(GatewayError::PaymentRequired));
            }
            Err(GatewayError::Unauthorized) => {
                self.interaction
                    .say(
                        SayKind::Unauthorized,
                        Some(GatewayError::Unauthorized.to_string()),
                        None,
                    )
                    .await?;
                return Err(TaskError::Provider(GatewayError::Unauthorized));
            }
            Err(err) => return self.handle_request_failure(err).await,
        };

        {
            let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
            stats.request_count += 1;
        }

        let usage = &response.usage;
        let cost = self.gateway.model_info().cost.calculate_with_cache(
            usage.input_tokens,
            usage.output_tokens,
            usage.cache_read_tokens,
            usage.cache_write_tokens,
        );
        let metrics = ApiMetrics {
            tokens_in: u64::from(usage.input_tokens),
            tokens_out: u64::from(usage.output_tokens),
            cache_read: u64::from(usage.cache_read_tokens),
            cache_write: u64::from(usage.cache_write_tokens),
            cost,
        };
        self.interaction
            .say(
                SayKind::ApiReqFinished,
                Some(serde_json::to_string(&metrics)?),
                None,
            )
            .await?;

        Ok(RequestOutcome::Response(response))
    }

    /// Ask the user whether to retry a failed request. Only recoverable
    /// errors get the question; anything else ends the task with the error.
    async fn handle_request_failure(&self, err: GatewayError) -> TaskResult<RequestOutcome> {
        warn!(task_id = %self.task_id, error = %err, "Provider request failed");
        if !err.is_retryable() {
            self.interaction
                .say(SayKind::Error, Some(err.to_string()), None)
                .await?;
            return Err(TaskError::Provider(err));
        }

        self.set_state(TaskState::WaitingForUser).await;
        let outcome = match self
            .interaction
            .ask(AskKind::ApiReqFailed, json!({"error": err.to_string()}))
            .await
        {
            Ok(outcome) => outcome,
            Err(quillcode_tools::ToolError::Cancelled) => {
                self.set_state(TaskState::Aborted).await;
                return Ok(RequestOutcome::Stop);
            }
            Err(ask_err) => return Err(TaskError::Tool(ask_err)),
        };

        // Both the retry button and a free-text reply mean "try again"; only
        // an outright "no" gives up.
        if outcome.approved() || outcome.text.is_some() {
            self.interaction
                .say(SayKind::ApiReqRetried, Some(err.to_string()), None)
                .await?;
            Ok(RequestOutcome::Retry)
        } else {
            Err(TaskError::Provider(err))
        }
    }

    /// Plan and execute the tool calls of one assistant turn.
    async fn run_tool_calls(&self, content: &[ContentBlock]) -> TaskResult<BatchOutcome> {
        let plan = plan_tool_calls(content);
        if plan.is_empty() {
            return Ok(BatchOutcome::Continue {
                results: Vec::new(),
            });
        }

        self.set_state(TaskState::ExecutingTool).await;
        let mut results = Vec::new();
        let mut ended = false;
        for item in plan {
            match item {
                PlannedItem::Unknown { call_id, name } => {
                    self.interaction
                        .say(
                            SayKind::Error,
                            Some(format!("The model requested an unknown tool: {name}")),
                            None,
                        )
                        .await?;
                    results.push(ContentBlock::tool_error(
                        call_id,
                        format!("Unknown tool: {name}"),
                    ));
                }
                PlannedItem::Call(call) => match self.executor.execute(call).await? {
                    ToolDisposition::Aborted => return Ok(BatchOutcome::Aborted),
                    disposition => {
                        if let Some((result, did_end_loop)) = disposition.into_result() {
                            results.push(result);
                            ended |= did_end_loop;
                        }
                    }
                },
            }
        }

        if ended {
            Ok(BatchOutcome::Completed { results })
        } else {
            Ok(BatchOutcome::Continue { results })
        }
    }
}

enum RequestOutcome {
    Response(quillcode_provider::ApiResponse),
    Retry,
    Stop,
}

enum BatchOutcome {
    Continue { results: Vec<ContentBlock> },
    Completed { results: Vec<ContentBlock> },
    Aborted,
}

enum PlannedItem {
    Call(PlannedToolCall),
    Unknown { call_id: String, name: String },
}

/// Turn the tool_use blocks of an assistant turn into an execution plan.
///
/// `attempt_completion` is moved to the end so every sibling call still
/// produces its result first, and the last file write of the batch is marked
/// for the write tool's finalize behavior.
fn plan_tool_calls(content: &[ContentBlock]) -> Vec<PlannedItem> {
    let mut calls = Vec::new();
    let mut completions = Vec::new();
    for block in content {
        let ContentBlock::ToolUse { id, name, input } = block else {
            continue;
        };
        match ToolName::parse(name) {
            Some(tool) => {
                let call = PlannedToolCall {
                    name: tool,
                    input: input.clone(),
                    call_id: id.clone(),
                    last_write_of_batch: false,
                };
                if tool == ToolName::AttemptCompletion {
                    completions.push(PlannedItem::Call(call));
                } else {
                    calls.push(PlannedItem::Call(call));
                }
            }
            None => calls.push(PlannedItem::Unknown {
                call_id: id.clone(),
                name: name.clone(),
            }),
        }
    }
    calls.extend(completions);

    let last_write = calls.iter().rposition(|item| {
        matches!(item, PlannedItem::Call(call) if call.name.is_write())
    });
    if let Some(index) = last_write {
        if let PlannedItem::Call(call) = &mut calls[index] {
            call.last_write_of_batch = true;
        }
    }
    calls
}

/// Close the tool_use gaps an interruption left in the history.
///
/// Every assistant turn with tool_use blocks must be followed by a user turn
/// answering each id exactly once. Missing answers get a placeholder result;
/// a dangling trailing user message (text the user sent that never got a
/// response) is removed and returned so the resumption message can carry it.
pub fn repair_history(history: &mut Vec<Message>) -> Option<String> {
    let mut index = 0;
    while index < history.len() {
        if history[index].role != Role::Assistant {
            index += 1;
            continue;
        }
        let pending: Vec<String> = history[index]
            .tool_use_ids()
            .into_iter()
            .filter(|id| {
                history
                    .get(index + 1)
                    .map_or(true, |next| !next.tool_result_ids().contains(id))
            })
            .map(str::to_string)
            .collect();
        if pending.is_empty() {
            index += 1;
            continue;
        }

        let placeholders = pending
            .into_iter()
            .map(|id| ContentBlock::tool_result(id, INTERRUPTED_RESULT));
        match history.get_mut(index + 1) {
            Some(next) if next.role == Role::User => {
                next.content.extend(placeholders);
            }
            _ => {
                history.insert(
                    index + 1,
                    Message {
                        role: Role::User,
                        content: placeholders.collect(),
                    },
                );
            }
        }
        index += 1;
    }

    // A trailing user message with no tool results is the user's own text
    // that never received a response; it travels in the resumption message
    // instead of dangling in the history.
    let dangling = history
        .last()
        .is_some_and(|last| last.role == Role::User && last.tool_result_ids().is_empty());
    if dangling {
        let last = history.pop()?;
        let text = last.text();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_use_turn(ids: &[&str]) -> Message {
        Message {
            role: Role::Assistant,
            content: ids
                .iter()
                .map(|id| ContentBlock::tool_use(*id, "read_file", json!({"path": "a"})))
                .collect(),
        }
    }

    #[test]
    fn test_plan_moves_completion_last_and_marks_last_write() {
        let content = vec![
            ContentBlock::tool_use("cal_1", "attempt_completion", json!({"result": "done"})),
            ContentBlock::tool_use("cal_2", "write_to_file", json!({"path": "a", "content": ""})),
            ContentBlock::tool_use("cal_3", "write_to_file", json!({"path": "b", "content": ""})),
        ];
        let plan = plan_tool_calls(&content);
        assert_eq!(plan.len(), 3);

        let calls: Vec<&PlannedToolCall> = plan
            .iter()
            .map(|item| match item {
                PlannedItem::Call(call) => call,
                PlannedItem::Unknown { .. } => panic!("unexpected unknown"),
            })
            .collect();
        assert_eq!(calls[0].call_id, "cal_2");
        assert_eq!(calls[1].call_id, "cal_3");
        assert_eq!(calls[2].name, ToolName::AttemptCompletion);
        assert!(!calls[0].last_write_of_batch);
        assert!(calls[1].last_write_of_batch);
    }

    #[test]
    fn test_plan_flags_unknown_tools() {
        let content = vec![ContentBlock::tool_use("cal_9", "format_disk", json!({}))];
        let plan = plan_tool_calls(&content);
        assert!(matches!(
            &plan[0],
            PlannedItem::Unknown { call_id, name } if call_id == "cal_9" && name == "format_disk"
        ));
    }

    #[test]
    fn test_repair_appends_missing_user_turn() {
        let mut history = vec![Message::user("task"), tool_use_turn(&["cal_1", "cal_2"])];
        let previous = repair_history(&mut history);

        assert!(previous.is_none());
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].role, Role::User);
        assert_eq!(history[2].tool_result_ids(), vec!["cal_1", "cal_2"]);
        assert_eq!(history[2].text(), "");
    }

    #[test]
    fn test_repair_completes_partial_user_turn() {
        let mut history = vec![
            Message::user("task"),
            tool_use_turn(&["cal_1", "cal_2"]),
            Message::tool_result("cal_1", "done"),
        ];
        repair_history(&mut history);

        assert_eq!(history.len(), 3);
        assert_eq!(history[2].tool_result_ids(), vec!["cal_1", "cal_2"]);
    }

    #[test]
    fn test_repair_closes_interior_gaps() {
        let mut history = vec![
            Message::user("task"),
            tool_use_turn(&["cal_1"]),
            // Gap: next turn is another assistant message.
            Message::assistant("carrying on"),
            tool_use_turn(&["cal_2"]),
        ];
        repair_history(&mut history);

        // Every tool_use id is now answered by the following user turn.
        for i in 0..history.len() {
            if history[i].role != Role::Assistant {
                continue;
            }
            for id in history[i].tool_use_ids() {
                let answered = history
                    .get(i + 1)
                    .is_some_and(|next| next.tool_result_ids().contains(&id));
                assert!(answered, "tool_use {id} left unanswered");
            }
        }
    }

    #[test]
    fn test_repair_extracts_dangling_user_text() {
        let mut history = vec![
            Message::user("task"),
            Message::assistant("ok"),
            Message::user("also rename the module"),
        ];
        let previous = repair_history(&mut history);

        assert_eq!(previous.as_deref(), Some("also rename the module"));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_repair_leaves_complete_history_alone() {
        let mut history = vec![
            Message::user("task"),
            tool_use_turn(&["cal_1"]),
            Message::tool_result("cal_1", "content"),
            Message::assistant("done"),
        ];
        let before = serde_json::to_value(&history).unwrap();
        let previous = repair_history(&mut history);

        assert!(previous.is_none());
        assert_eq!(serde_json::to_value(&history).unwrap(), before);
    }

    #[test]
    fn test_repair_is_idempotent() {
        let mut history = vec![Message::user("task"), tool_use_turn(&["cal_1"])];
        repair_history(&mut history);
        let once = serde_json::to_value(&history).unwrap();
        repair_history(&mut history);
        assert_eq!(serde_json::to_value(&history).unwrap(), once);
    }
}
