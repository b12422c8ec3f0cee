//! Time helpers.

use chrono::Utc;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Human-readable phrase for how long ago a millisecond timestamp was.
///
/// Used in task resumption banners: "just now", "5 minutes ago",
/// "2 hours ago", "1 day ago".
pub fn elapsed_phrase(since_ms: i64) -> String {
    let elapsed = (now_ms() - since_ms).max(0);
    let minutes = elapsed / 60_000;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{} day{} ago", days, if days > 1 { "s" } else { "" })
    } else if hours > 0 {
        format!("{} hour{} ago", hours, if hours > 1 { "s" } else { "" })
    } else if minutes > 0 {
        format!("{} minute{} ago", minutes, if minutes > 1 { "s" } else { "" })
    } else {
        "just now".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_just_now() {
        assert_eq!(elapsed_phrase(now_ms()), "just now");
    }

    #[test]
    fn test_minutes() {
        assert_eq!(elapsed_phrase(now_ms() - 60_000), "1 minute ago");
        assert_eq!(elapsed_phrase(now_ms() - 5 * 60_000), "5 minutes ago");
    }

    #[test]
    fn test_hours() {
        assert_eq!(elapsed_phrase(now_ms() - 3_600_000), "1 hour ago");
        assert_eq!(elapsed_phrase(now_ms() - 2 * 3_600_000), "2 hours ago");
    }

    #[test]
    fn test_days() {
        assert_eq!(elapsed_phrase(now_ms() - 86_400_000), "1 day ago");
        assert_eq!(elapsed_phrase(now_ms() - 3 * 86_400_000), "3 days ago");
    }

    #[test]
    fn test_future_timestamp_clamps() {
        assert_eq!(elapsed_phrase(now_ms() + 60_000), "just now");
    }
}
