//! Fire-and-forget analytics events.
//!
//! The sink is stub-swappable: the CLI installs the tracing-backed sink,
//! tests install recorders, and the default is a no-op. Recording an event
//! can never fail or block an operation.

use tracing::debug;

// ============================================================================
// Events
// ============================================================================

/// Events emitted by the rotation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyticsEvent {
    /// A profile was saved.
    ProfileSaved {
        /// Profile name.
        profile: String,
    },
    /// The active credential switched to a profile.
    ProfileSwitched {
        /// Profile name.
        profile: String,
    },
    /// A refresh cycle finished.
    RefreshCycleCompleted {
        /// Accounts refreshed (including dedup reuse).
        refreshed: usize,
        /// Profiles that failed to refresh.
        failed: usize,
    },
}

// ============================================================================
// Sink
// ============================================================================

/// Destination for analytics events.
pub trait AnalyticsSink: Send + Sync {
    /// Records one event. Must not fail and must not block.
    fn record(&self, event: AnalyticsEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl AnalyticsSink for NoopSink {
    fn record(&self, _event: AnalyticsEvent) {}
}

/// Logs events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AnalyticsSink for TracingSink {
    fn record(&self, event: AnalyticsEvent) {
        debug!(event = ?event, "analytics");
    }
}
