//! Storage layer for quillcode.
//!
//! This crate provides a key-value storage abstraction with multiple backends:
//! - JSON file storage (default)
//! - In-memory storage (for testing)
//!
//! Task conversation state lives under the `tasks` prefix:
//! `["tasks", task_id, "api_history"]`, `["tasks", task_id, "display_log"]`
//! and `["tasks", task_id, "summary"]`.

pub mod error;
pub mod json;
pub mod memory;

pub use error::{StorageError, StorageResult};
pub use json::JsonStorage;
pub use memory::MemoryStorage;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// A trait for key-value storage backends.
///
/// Keys are represented as path segments, e.g., `["tasks", task_id, "api_history"]`.
/// Values are serialized/deserialized as JSON.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read a value from storage.
    ///
    /// Returns `None` if the key doesn't exist.
    async fn read<T: DeserializeOwned + Send>(&self, key: &[&str]) -> StorageResult<Option<T>>;

    /// Write a value to storage.
    ///
    /// Creates parent directories if necessary.
    async fn write<T: Serialize + Send + Sync>(&self, key: &[&str], value: &T)
        -> StorageResult<()>;

    /// Remove a value from storage.
    async fn remove(&self, key: &[&str]) -> StorageResult<()>;

    /// List all keys under a prefix.
    ///
    /// Returns the full key paths for each item.
    async fn list(&self, prefix: &[&str]) -> StorageResult<Vec<Vec<String>>>;

    /// Check if a key exists.
    async fn exists(&self, key: &[&str]) -> StorageResult<bool>;
}
