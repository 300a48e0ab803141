//! Refresh cycle results and the per-profile report line.

use chrono::{DateTime, Utc};

use cauth_core::{format_ttl, format_window, PlanTag, UsageWindow};

// ============================================================================
// Refresh Outcome
// ============================================================================

/// Everything a successful refresh produced for one account.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    /// The credential bytes as committed to disk.
    pub bytes: Vec<u8>,
    /// Account email, when extractable.
    pub email: Option<String>,
    /// Subscription plan tag.
    pub plan: Option<PlanTag>,
    /// Access-token expiry, epoch milliseconds.
    pub expires_at_ms: Option<i64>,
    /// 5-hour quota window.
    pub five_hour: Option<UsageWindow>,
    /// 7-day quota window.
    pub seven_day: Option<UsageWindow>,
}

// ============================================================================
// Report Line
// ============================================================================

/// Renders one report line:
/// `<name>: <email> <plan> 5h <pct (ttl)> 7d <pct (ttl)> (key) <ttl>`.
///
/// Profiles with no successful refresh render every field as `-` / `--`.
pub fn format_profile_line(
    name: &str,
    outcome: Option<&RefreshOutcome>,
    now: DateTime<Utc>,
) -> String {
    let Some(outcome) = outcome else {
        return format!("{name}: - - 5h -- 7d -- (key) -");
    };

    let email = outcome.email.as_deref().unwrap_or("-");
    let plan = outcome
        .plan
        .map_or_else(|| "-".to_string(), |p| p.to_string());
    let five = format_window(outcome.five_hour.as_ref(), now);
    let seven = format_window(outcome.seven_day.as_ref(), now);
    let key = outcome.expires_at_ms.map_or_else(
        || "-".to_string(),
        |ms| format_ttl((ms - now.timestamp_millis()) / 1000),
    );

    format!("{name}: {email} {plan} 5h {five} 7d {seven} (key) {key}")
}

// ============================================================================
// Tests
// ============================================================================
