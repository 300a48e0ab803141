//! Best-effort usage quota fetches.
//!
//! Usage is informational: any network error, non-2xx status, or parse
//! failure yields an absent result and never fails the surrounding
//! refresh.

use chrono::{TimeZone, Utc};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use cauth_core::credential::parse_timestamp_ms;
use cauth_core::UsageWindow;

// ============================================================================
// Constants
// ============================================================================

/// Default usage endpoint.
pub const DEFAULT_USAGE_URL: &str = "https://api.anthropic.com/api/oauth/usage";

/// Environment override for the usage endpoint.
pub const USAGE_URL_ENV: &str = "CLAUDE_CODE_USAGE_URL";

/// OAuth beta header required by the usage endpoint.
const OAUTH_BETA: &str = "oauth-2025-04-20";

/// Request timeout.
const USAGE_TIMEOUT: Duration = Duration::from_secs(8);

// ============================================================================
// Usage Snapshot
// ============================================================================

/// The two quota windows reported by the usage endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageSnapshot {
    /// Rolling 5-hour window.
    pub five_hour: Option<UsageWindow>,
    /// Rolling 7-day window.
    pub seven_day: Option<UsageWindow>,
}

// ============================================================================
// Usage Client
// ============================================================================

/// Client for the usage endpoint.
#[derive(Debug, Clone)]
pub struct UsageClient {
    usage_url: String,
}

impl Default for UsageClient {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageClient {
    /// Creates a client against the default (or env-overridden) endpoint.
    pub fn new() -> Self {
        let usage_url =
            std::env::var(USAGE_URL_ENV).unwrap_or_else(|_| DEFAULT_USAGE_URL.to_string());
        Self::with_endpoint(usage_url)
    }

    /// Creates a client with an explicit endpoint.
    pub fn with_endpoint(usage_url: impl Into<String>) -> Self {
        Self {
            usage_url: usage_url.into(),
        }
    }

    /// Fetches the quota windows. Absent on any failure.
    pub async fn fetch(&self, access_token: &str) -> Option<UsageSnapshot> {
        let client = reqwest::Client::builder()
            .timeout(USAGE_TIMEOUT)
            .build()
            .ok()?;
        let response = client
            .get(&self.usage_url)
            .header("Authorization", format!("Bearer {access_token}"))
            .header("anthropic-beta", OAUTH_BETA)
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            debug!(status = %response.status(), "Usage endpoint unavailable");
            return None;
        }

        let body: Value = response.json().await.ok()?;
        Some(parse_usage(&body))
    }
}

fn parse_usage(body: &Value) -> UsageSnapshot {
    UsageSnapshot {
        five_hour: window_at(body, "five_hour").or_else(|| window_at(body, "fiveHour")),
        seven_day: window_at(body, "seven_day").or_else(|| window_at(body, "sevenDay")),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn window_at(body: &Value, key: &str) -> Option<UsageWindow> {
    let window = body.get(key)?.as_object()?;
    let utilization = window.get("utilization")?.as_f64()?.round() as i64;
    let resets_at = window
        .get("resets_at")
        .or_else(|| window.get("resetsAt"))
        .and_then(parse_timestamp_ms)
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single());
    Some(UsageWindow {
        utilization,
        resets_at,
    })
}

// ============================================================================
// Tests
// ============================================================================
