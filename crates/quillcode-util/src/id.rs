//! Identifier generation.
//!
//! Identifiers in quillcode follow the pattern: `prefix_ulid`
//! For example: `tsk_01HQXYZ...` for tasks.
//!
//! Display-log records use a different scheme: a millisecond timestamp that
//! doubles as the record's unique key. `display_ts()` guarantees strictly
//! increasing values within a process even when called in the same
//! millisecond.

use std::sync::atomic::{AtomicI64, Ordering};
use ulid::Ulid;

/// Known identifier prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPrefix {
    Task,
    Call,
    Hook,
}

impl IdPrefix {
    /// Get the string prefix for this identifier type.
    pub fn as_str(&self) -> &'static str {
        match self {
            IdPrefix::Task => "tsk",
            IdPrefix::Call => "cal",
            IdPrefix::Hook => "hok",
        }
    }

    /// Parse a prefix from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tsk" => Some(IdPrefix::Task),
            "cal" => Some(IdPrefix::Call),
            "hok" => Some(IdPrefix::Hook),
            _ => None,
        }
    }
}

/// Identifier generation and parsing utilities.
pub struct Identifier;

impl Identifier {
    /// Generate a new ascending identifier (newer = larger).
    pub fn ascending(prefix: IdPrefix) -> String {
        let ulid = Ulid::new();
        format!("{}_{}", prefix.as_str(), ulid.to_string().to_lowercase())
    }

    /// Parse an identifier into its prefix and ULID parts.
    pub fn parse(id: &str) -> Option<(IdPrefix, Ulid)> {
        let parts: Vec<&str> = id.splitn(2, '_').collect();
        if parts.len() != 2 {
            return None;
        }

        let prefix = IdPrefix::parse(parts[0])?;
        let ulid = Ulid::from_string(parts[1]).ok()?;
        Some((prefix, ulid))
    }

    /// Check if an identifier has the expected prefix.
    pub fn has_prefix(id: &str, prefix: IdPrefix) -> bool {
        id.starts_with(prefix.as_str()) && id.chars().nth(prefix.as_str().len()) == Some('_')
    }

    /// Generate a task ID.
    pub fn task() -> String {
        Self::ascending(IdPrefix::Task)
    }

    /// Generate a tool call ID.
    pub fn call() -> String {
        Self::ascending(IdPrefix::Call)
    }
}

static LAST_TS: AtomicI64 = AtomicI64::new(0);

/// Generate a unique millisecond timestamp for a display-log record.
///
/// Values are strictly increasing within the process, so two records created
/// in the same millisecond still get distinct keys.
pub fn display_ts() -> i64 {
    let now = crate::time::now_ms();
    LAST_TS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(if now > last { now } else { last + 1 })
        })
        .map(|last| if now > last { now } else { last + 1 })
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id() {
        let id = Identifier::task();
        assert!(id.starts_with("tsk_"));
        assert_eq!(id.len(), 30); // "tsk_" (4) + ULID (26)
    }

    #[test]
    fn test_ascending_order() {
        let id1 = Identifier::ascending(IdPrefix::Call);
        std::thread::sleep(std::time::Duration::from_millis(1));
        let id2 = Identifier::ascending(IdPrefix::Call);
        assert!(id1 < id2, "Ascending IDs should increase over time");
    }

    #[test]
    fn test_parse_id() {
        let id = Identifier::task();
        let (prefix, _ulid) = Identifier::parse(&id).unwrap();
        assert_eq!(prefix, IdPrefix::Task);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Identifier::parse("nounderscore").is_none());
        assert!(Identifier::parse("xyz_01HQXYZ").is_none());
        assert!(Identifier::parse("tsk_notaulid").is_none());
    }

    #[test]
    fn test_has_prefix() {
        let id = Identifier::task();
        assert!(Identifier::has_prefix(&id, IdPrefix::Task));
        assert!(!Identifier::has_prefix(&id, IdPrefix::Call));
        assert!(!Identifier::has_prefix("tsk123", IdPrefix::Task));
    }

    #[test]
    fn test_display_ts_unique() {
        let a = display_ts();
        let b = display_ts();
        let c = display_ts();
        assert!(a < b);
        assert!(b < c);
    }
}
