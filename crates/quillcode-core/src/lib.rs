//! Task execution engine for quillcode.
//!
//! The core crate ties the workspace together: it owns the request loop that
//! turns a user's task into provider round trips and tool executions, the
//! dual conversation logs behind it, and the ask/say plumbing through which
//! a host surfaces questions to the user.
//!
//! The entry point is [`TaskExecutor`]: construct one with [`TaskOptions`],
//! call [`TaskExecutor::start`] (or [`TaskExecutor::resume`] for a persisted
//! task), observe it through the [`Bus`], and deliver answers with
//! [`TaskExecutor::answer`].

pub mod ask;
pub mod bus;
pub mod config;
pub mod context_window;
pub mod conversation;
pub mod display;
pub mod environment;
pub mod error;
pub mod hook;
pub mod interaction;
pub mod prompt;
pub mod subtask;
pub mod task;
pub mod tool_executor;

pub use ask::AskChannel;
pub use bus::{
    Bus, BusEvent, CreditBalanceUpdated, DisplayUpdated, Event, TaskStateChanged, TaskSummary,
    TaskSummaryUpdated,
};
pub use config::{Creativity, TaskConfig};
pub use conversation::{ApiMetrics, ConversationStore};
pub use display::{DisplayKind, DisplayMessage};
pub use environment::{DefaultEnvironmentReporter, EnvironmentReporter};
pub use error::{TaskError, TaskResult};
pub use hook::{Hook, HookManager, ReminderHook};
pub use interaction::TaskInteraction;
pub use subtask::SpawnAgentTool;
pub use task::{TaskExecutor, TaskOptions, TaskState, TaskStats};
pub use tool_executor::{PlannedToolCall, ToolDisposition, ToolExecutor};
