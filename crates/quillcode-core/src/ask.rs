//! Single-slot ask mailbox.
//!
//! At most one question is pending per task. A newer ask supersedes the old
//! one, which fails with [`TaskError::Superseded`]; an answer arriving for a
//! stale timestamp falls through to whatever ask is currently pending, since
//! the user was looking at the latest question when they tapped.

use crate::error::{TaskError, TaskResult};
use quillcode_tools::{AskKind, AskOutcome};
use std::sync::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

enum Resolution {
    Answered(AskOutcome),
    Superseded,
}

struct PendingAsk {
    ts: i64,
    kind: AskKind,
    reply: oneshot::Sender<Resolution>,
}

/// The mailbox holding the (at most one) pending ask of a task.
pub struct AskChannel {
    pending: Mutex<Option<PendingAsk>>,
    abort: CancellationToken,
}

impl AskChannel {
    pub fn new(abort: CancellationToken) -> Self {
        Self {
            pending: Mutex::new(None),
            abort,
        }
    }

    /// Park a question and wait for its answer.
    ///
    /// Replaces any pending ask; the replaced caller gets
    /// [`TaskError::Superseded`]. Task abort resolves the wait with
    /// [`TaskError::Aborted`].
    pub async fn ask(&self, ts: i64, kind: AskKind) -> TaskResult<AskOutcome> {
        let (reply, rx) = oneshot::channel();
        {
            let mut slot = self.lock()?;
            if let Some(stale) = slot.take() {
                debug!(stale_ts = stale.ts, kind = ?stale.kind, "Superseding pending ask");
                let _ = stale.reply.send(Resolution::Superseded);
            }
            *slot = Some(PendingAsk { ts, kind, reply });
        }

        tokio::select! {
            _ = self.abort.cancelled() => Err(TaskError::Aborted),
            resolution = rx => match resolution {
                Ok(Resolution::Answered(outcome)) => Ok(outcome),
                Ok(Resolution::Superseded) => Err(TaskError::Superseded),
                Err(_) => Err(TaskError::Aborted),
            },
        }
    }

    /// Resolve the pending ask with the user's answer.
    ///
    /// Returns false when nothing was pending and the answer was dropped.
    pub fn answer(&self, for_ts: i64, outcome: AskOutcome) -> TaskResult<bool> {
        let mut slot = self.lock()?;
        match slot.take() {
            Some(pending) => {
                if pending.ts != for_ts {
                    debug!(
                        for_ts,
                        pending_ts = pending.ts,
                        "Answer for a stale ask routed to the current one"
                    );
                }
                let _ = pending.reply.send(Resolution::Answered(outcome));
                Ok(true)
            }
            None => {
                debug!(for_ts, "Answer arrived with no pending ask; dropped");
                Ok(false)
            }
        }
    }

    /// Timestamp of the pending ask, if any.
    pub fn pending_ts(&self) -> TaskResult<Option<i64>> {
        Ok(self.lock()?.as_ref().map(|pending| pending.ts))
    }

    fn lock(&self) -> TaskResult<std::sync::MutexGuard<'_, Option<PendingAsk>>> {
        self.pending
            .lock()
            .map_err(|e| TaskError::LockPoisoned(e.to_string()))
    }
}
