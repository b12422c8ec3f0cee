//! Dual conversation logs with queued persistence.
//!
//! Each task keeps two parallel histories:
//!
//! - the API history, the exact `Message` sequence sent to the provider
//! - the display log, the user-facing transcript of asks and says
//!
//! Mutations update the in-memory state synchronously and enqueue a snapshot
//! for a background writer, so the request loop never blocks on disk. A
//! failed write is logged and surfaced at the next [`ConversationStore::flush`].

use crate::bus::{Bus, DisplayUpdated, TaskSummary, TaskSummaryUpdated};
use crate::display::DisplayMessage;
use crate::error::{TaskError, TaskResult};
use quillcode_provider::Message;
use quillcode_storage::Storage;
use quillcode_tools::SayKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, error};

/// Token and cost figures carried in the text of an `api_req_finished` say.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiMetrics {
    pub tokens_in: u64,
    pub tokens_out: u64,
    #[serde(default)]
    pub cache_read: u64,
    #[serde(default)]
    pub cache_write: u64,
    pub cost: f64,
}

enum PersistJob {
    ApiHistory(Vec<Message>),
    DisplayLog(Vec<DisplayMessage>),
    Summary(TaskSummary),
    Flush(oneshot::Sender<Option<String>>),
}

/// The two conversation logs of one task.
pub struct ConversationStore<S: Storage + 'static> {
    task_id: String,
    bus: Bus,
    api_history: RwLock<Vec<Message>>,
    display_log: RwLock<Vec<DisplayMessage>>,
    persist_tx: mpsc::UnboundedSender<PersistJob>,
    _storage: Arc<S>,
}

impl<S: Storage + 'static> ConversationStore<S> {
    /// Create a store for a fresh task.
    pub fn new(storage: Arc<S>, bus: Bus, task_id: impl Into<String>) -> Self {
        Self::build(storage, bus, task_id.into(), Vec::new(), Vec::new())
    }

    /// Load the logs of an existing task. Missing keys load as empty logs.
    pub async fn load(storage: Arc<S>, bus: Bus, task_id: impl Into<String>) -> TaskResult<Self> {
        let task_id = task_id.into();
        let api_history: Vec<Message> = storage
            .read(&["tasks", &task_id, "api_history"])
            .await?
            .unwrap_or_default();
        let display_log: Vec<DisplayMessage> = storage
            .read(&["tasks", &task_id, "display_log"])
            .await?
            .unwrap_or_default();
        Ok(Self::build(storage, bus, task_id, api_history, display_log))
    }

    fn build(
        storage: Arc<S>,
        bus: Bus,
        task_id: String,
        api_history: Vec<Message>,
        display_log: Vec<DisplayMessage>,
    ) -> Self {
        let (persist_tx, persist_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(storage.clone(), task_id.clone(), persist_rx));
        Self {
            task_id,
            bus,
            api_history: RwLock::new(api_history),
            display_log: RwLock::new(display_log),
            persist_tx,
            _storage: storage,
        }
    }

    /// The task this store belongs to.
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Append a message to the API history.
    pub async fn append_api(&self, message: Message) -> TaskResult<()> {
        let mut history = self.api_history.write().await;
        history.push(message);
        self.enqueue(PersistJob::ApiHistory(history.clone()))
    }

    /// Replace the API history wholesale (resume repair, truncation).
    pub async fn overwrite_api(&self, messages: Vec<Message>) -> TaskResult<()> {
        let mut history = self.api_history.write().await;
        *history = messages;
        self.enqueue(PersistJob::ApiHistory(history.clone()))
    }

    /// Snapshot of the API history.
    pub async fn api_history(&self) -> Vec<Message> {
        self.api_history.read().await.clone()
    }

    /// Append a record to the display log and notify subscribers.
    pub async fn append_display(&self, message: DisplayMessage) -> TaskResult<()> {
        let snapshot = {
            let mut log = self.display_log.write().await;
            log.push(message.clone());
            log.clone()
        };
        self.enqueue(PersistJob::DisplayLog(snapshot))?;
        self.bus
            .publish(DisplayUpdated {
                task_id: self.task_id.clone(),
                message,
            })
            .await;
        self.refresh_summary().await
    }

    /// Patch an existing record by its timestamp key. Returns false when no
    /// record has that timestamp.
    pub async fn update_display(
        &self,
        ts: i64,
        patch: impl FnOnce(&mut DisplayMessage),
    ) -> TaskResult<bool> {
        let (snapshot, updated) = {
            let mut log = self.display_log.write().await;
            let Some(message) = log.iter_mut().find(|m| m.ts == ts) else {
                return Ok(false);
            };
            patch(message);
            let updated = message.clone();
            (log.clone(), updated)
        };
        self.enqueue(PersistJob::DisplayLog(snapshot))?;
        self.bus
            .publish(DisplayUpdated {
                task_id: self.task_id.clone(),
                message: updated,
            })
            .await;
        self.refresh_summary().await?;
        Ok(true)
    }

    /// Replace the display log wholesale (resume cleanup).
    pub async fn overwrite_display(&self, messages: Vec<DisplayMessage>) -> TaskResult<()> {
        {
            let mut log = self.display_log.write().await;
            *log = messages.clone();
        }
        self.enqueue(PersistJob::DisplayLog(messages))?;
        self.refresh_summary().await
    }

    /// Snapshot of the display log.
    pub async fn display_log(&self) -> Vec<DisplayMessage> {
        self.display_log.read().await.clone()
    }

    /// Running totals folded from the display log.
    pub async fn summary(&self) -> TaskSummary {
        let log = self.display_log.read().await;
        fold_summary(&log)
    }

    /// Wait until every queued write has landed. Reports the most recent
    /// deferred write failure, if any.
    pub async fn flush(&self) -> TaskResult<()> {
        let (tx, rx) = oneshot::channel();
        self.enqueue(PersistJob::Flush(tx))?;
        match rx.await {
            Ok(None) => Ok(()),
            Ok(Some(message)) => Err(TaskError::persistence(message)),
            Err(_) => Err(TaskError::persistence("persistence writer stopped")),
        }
    }

    fn enqueue(&self, job: PersistJob) -> TaskResult<()> {
        self.persist_tx
            .send(job)
            .map_err(|_| TaskError::persistence("persistence writer stopped"))
    }

    async fn refresh_summary(&self) -> TaskResult<()> {
        let summary = self.summary().await;
        self.enqueue(PersistJob::Summary(summary.clone()))?;
        self.bus
            .publish(TaskSummaryUpdated {
                task_id: self.task_id.clone(),
                summary,
            })
            .await;
        Ok(())
    }
}

fn fold_summary(log: &[DisplayMessage]) -> TaskSummary {
    let mut summary = TaskSummary::default();
    for message in log {
        if !message.is_say(SayKind::ApiReqFinished) {
            continue;
        }
        let Some(metrics) = message
            .text
            .as_deref()
            .and_then(|text| serde_json::from_str::<ApiMetrics>(text).ok())
        else {
            continue;
        };
        summary.request_count += 1;
        summary.tokens_in += metrics.tokens_in;
        summary.tokens_out += metrics.tokens_out;
        summary.cache_read += metrics.cache_read;
        summary.cache_write += metrics.cache_write;
        summary.cost += metrics.cost;
    }
    summary
}

async fn run_writer<S: Storage>(
    storage: Arc<S>,
    task_id: String,
    mut rx: mpsc::UnboundedReceiver<PersistJob>,
) {
    let mut last_failure: Option<String> = None;
    while let Some(job) = rx.recv().await {
        let result = match &job {
            PersistJob::ApiHistory(history) => {
                storage.write(&["tasks", &task_id, "api_history"], history).await
            }
            PersistJob::DisplayLog(log) => {
                storage.write(&["tasks", &task_id, "display_log"], log).await
            }
            PersistJob::Summary(summary) => {
                storage.write(&["tasks", &task_id, "summary"], summary).await
            }
            PersistJob::Flush(_) => Ok(()),
        };
        if let Err(err) = result {
            error!(task_id = %task_id, error = %err, "Deferred conversation write failed");
            last_failure = Some(err.to_string());
        }
        if let PersistJob::Flush(reply) = job {
            let _ = reply.send(last_failure.take());
        }
    }
    debug!(task_id = %task_id, "Conversation writer stopped");
}
