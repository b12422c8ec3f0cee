//! Shared utilities for quillcode.
//!
//! This crate provides common utilities used across the quillcode workspace:
//! - Identifier generation (task ids, display-message timestamps)
//! - Elapsed-time phrasing for resumption banners
//! - Output truncation
//! - Logging setup with tracing
//! - Path utilities

pub mod id;
pub mod log;
pub mod path;
pub mod text;
pub mod time;

pub use id::Identifier;
pub use text::truncate_output;
pub use time::{elapsed_phrase, now_ms};
