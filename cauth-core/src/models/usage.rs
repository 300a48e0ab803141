//! Usage windows and remaining-time rendering.

use chrono::{DateTime, Utc};

// ============================================================================
// Usage Window
// ============================================================================

/// One quota window returned by the usage endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageWindow {
    /// Utilization as an integer percentage.
    pub utilization: i64,
    /// When the window resets.
    pub resets_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Rendering
// ============================================================================

/// Formats a remaining duration in seconds.
///
/// `"expired"` when nothing remains; `"Xd Yh Zm"` when full days remain;
/// `"Yh Zm"` otherwise.
pub fn format_ttl(remaining_secs: i64) -> String {
    if remaining_secs <= 0 {
        return "expired".to_string();
    }
    let days = remaining_secs / 86_400;
    let hours = (remaining_secs % 86_400) / 3_600;
    let minutes = (remaining_secs % 3_600) / 60;
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else {
        format!("{hours}h {minutes}m")
    }
}

/// Renders a usage window as `<pct>% (<ttl>)`, `--` for absent values.
pub fn format_window(window: Option<&UsageWindow>, now: DateTime<Utc>) -> String {
    let Some(window) = window else {
        return "--".to_string();
    };
    let ttl = match window.resets_at {
        Some(resets_at) => format_ttl(resets_at.signed_duration_since(now).num_seconds()),
        None => "--".to_string(),
    };
    format!("{}% ({})", window.utilization, ttl)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_ttl() {
        assert_eq!(format_ttl(0), "expired");
        assert_eq!(format_ttl(-30), "expired");
        assert_eq!(format_ttl(59), "0h 0m");
        assert_eq!(format_ttl(3 * 3600 + 25 * 60), "3h 25m");
        assert_eq!(format_ttl(2 * 86_400 + 5 * 3600 + 60), "2d 5h 1m");
    }

    #[test]
    fn test_format_window() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        assert_eq!(format_window(None, now), "--");

        let window = UsageWindow {
            utilization: 42,
            resets_at: Some(now + chrono::Duration::hours(2) + chrono::Duration::minutes(13)),
        };
        assert_eq!(format_window(Some(&window), now), "42% (2h 13m)");

        let no_reset = UsageWindow {
            utilization: 7,
            resets_at: None,
        };
        assert_eq!(format_window(Some(&no_reset), now), "7% (--)");

        let lapsed = UsageWindow {
            utilization: 100,
            resets_at: Some(now - chrono::Duration::minutes(1)),
        };
        assert_eq!(format_window(Some(&lapsed), now), "100% (expired)");
    }
}
