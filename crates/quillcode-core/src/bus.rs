//! Event bus for engine-to-host communication.
//!
//! Hosts embedding the engine (a TUI, an IDE extension, a server) observe a
//! running task through the bus rather than polling. Events are typed and can
//! also be consumed as JSON through a wildcard channel.
//!
//! # Example
//!
//! ```ignore
//! let bus = Bus::new();
//!
//! // Subscribe to display-log updates
//! let mut rx = bus.subscribe::<DisplayUpdated>().await;
//! tokio::spawn(async move {
//!     while let Ok(event) = rx.recv().await {
//!         render(&event.message);
//!     }
//! });
//! ```

use crate::display::DisplayMessage;
use crate::task::TaskState;
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::RwLock;

/// Default channel capacity.
const DEFAULT_CAPACITY: usize = 256;

/// Trait for events that can be published on the bus.
pub trait Event: Clone + Send + Sync + 'static {
    /// Event type name for serialization/logging.
    fn event_type() -> &'static str;
}

/// The event bus for pub/sub communication.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<BusInner>,
}

struct BusInner {
    /// Typed channels by TypeId.
    channels: RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
    /// Wildcard subscribers (receive all events as JSON).
    wildcard: broadcast::Sender<BusEvent>,
}

/// A serialized event for wildcard subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEvent {
    /// Event type name.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload as JSON.
    pub payload: serde_json::Value,
}

impl Bus {
    /// Create a new event bus.
    pub fn new() -> Self {
        let (wildcard, _) = broadcast::channel(DEFAULT_CAPACITY);
        Self {
            inner: Arc::new(BusInner {
                channels: RwLock::new(HashMap::new()),
                wildcard,
            }),
        }
    }

    /// Publish an event to all subscribers.
    pub async fn publish<E: Event + Serialize>(&self, event: E) {
        let type_id = TypeId::of::<E>();

        // Send to typed subscribers
        let channels = self.inner.channels.read().await;
        if let Some(sender) = channels.get(&type_id) {
            if let Some(tx) = sender.downcast_ref::<broadcast::Sender<E>>() {
                // Ignore send errors (no receivers)
                let _ = tx.send(event.clone());
            }
        }
        drop(channels);

        // Send to wildcard subscribers
        if let Ok(payload) = serde_json::to_value(&event) {
            let bus_event = BusEvent {
                event_type: E::event_type().to_string(),
                payload,
            };
            let _ = self.inner.wildcard.send(bus_event);
        }
    }

    /// Subscribe to events of type E.
    pub async fn subscribe<E: Event>(&self) -> broadcast::Receiver<E> {
        let type_id = TypeId::of::<E>();

        // Check if channel exists
        {
            let channels = self.inner.channels.read().await;
            if let Some(sender) = channels.get(&type_id) {
                if let Some(tx) = sender.downcast_ref::<broadcast::Sender<E>>() {
                    return tx.subscribe();
                }
            }
        }

        // Create new channel
        let mut channels = self.inner.channels.write().await;
        let (tx, rx) = broadcast::channel::<E>(DEFAULT_CAPACITY);
        channels.insert(type_id, Box::new(tx));
        rx
    }

    /// Subscribe to all events (wildcard).
    pub fn subscribe_all(&self) -> broadcast::Receiver<BusEvent> {
        self.inner.wildcard.subscribe()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Built-in Event Types
// ============================================================================

/// A record was appended to (or patched in) a task's display log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayUpdated {
    pub task_id: String,
    pub message: DisplayMessage,
}

impl Event for DisplayUpdated {
    fn event_type() -> &'static str {
        "display.updated"
    }
}

/// A task's running totals changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummaryUpdated {
    pub task_id: String,
    pub summary: TaskSummary,
}

impl Event for TaskSummaryUpdated {
    fn event_type() -> &'static str {
        "task.summary"
    }
}

/// Running totals for a task, folded from its display log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub request_count: u32,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cache_read: u64,
    pub cache_write: u64,
    pub cost: f64,
}

/// A task moved to a new lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStateChanged {
    pub task_id: String,
    pub state: TaskState,
}

impl Event for TaskStateChanged {
    fn event_type() -> &'static str {
        "task.state"
    }
}

/// The provider reported a remaining credit balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditBalanceUpdated {
    pub balance: f64,
}

impl Event for CreditBalanceUpdated {
    fn event_type() -> &'static str {
        "credit.balance"
    }
}
