//! Shared test doubles for tool tests.

use crate::interaction::{AskKind, AskOutcome, Interaction, SayKind};
use crate::{ToolContext, ToolResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Records every ask and say, replaying scripted answers in order. When the
/// script runs out, `ask` suspends forever, which mirrors a user who never
/// answers.
#[derive(Default)]
pub struct ScriptedInteraction {
    answers: Mutex<VecDeque<AskOutcome>>,
    asks: Mutex<Vec<(AskKind, Value)>>,
    says: Mutex<Vec<(SayKind, Option<String>)>>,
}

impl ScriptedInteraction {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn answer_with(&self, outcome: AskOutcome) {
        self.answers.lock().unwrap().push_back(outcome);
    }

    pub fn asks(&self) -> Vec<(AskKind, Value)> {
        self.asks.lock().unwrap().clone()
    }

    /// All say texts of the given kind, in order.
    pub fn said(&self, kind: SayKind) -> Vec<String> {
        self.says
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .filter_map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl Interaction for ScriptedInteraction {
    async fn ask(&self, kind: AskKind, payload: Value) -> ToolResult<AskOutcome> {
        self.asks.lock().unwrap().push((kind, payload));
        let next = self.answers.lock().unwrap().pop_front();
        match next {
            Some(outcome) => Ok(outcome),
            None => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    async fn say(
        &self,
        kind: SayKind,
        text: Option<String>,
        _images: Option<Vec<String>>,
    ) -> ToolResult<()> {
        self.says.lock().unwrap().push((kind, text));
        Ok(())
    }
}

/// A tool context wired to a scripted interaction.
pub fn test_context(cwd: PathBuf, interaction: Arc<ScriptedInteraction>) -> ToolContext {
    ToolContext {
        task_id: "tsk_test".to_string(),
        call_id: "cal_test".to_string(),
        cwd,
        abort: CancellationToken::new(),
        interaction,
        last_write_of_batch: false,
    }
}
