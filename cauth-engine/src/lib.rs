// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # cauth Engine
//!
//! The credential rotation engine:
//!
//! - [`ActiveCredentialResolver`] - canonical-file-preferred merge of the
//!   credential file and the keychain mirror
//! - [`TokenRefresher`] - the OAuth token endpoint client
//! - [`UsageClient`] - best-effort quota window fetches
//! - [`RotationEngine`] - `save` / `switch` / `refresh_all`, the atomic
//!   rotation pipeline with refresh-token-keyed deduplication
//! - [`AnalyticsSink`] - fire-and-forget event channel

pub mod analytics;
pub mod error;
pub mod report;
pub mod resolver;
pub mod refresher;
pub mod rotation;
pub mod usage;

pub use analytics::{AnalyticsEvent, AnalyticsSink, NoopSink, TracingSink};
pub use error::EngineError;
pub use report::RefreshOutcome;
pub use resolver::ActiveCredentialResolver;
pub use refresher::TokenRefresher;
pub use rotation::RotationEngine;
pub use usage::{UsageClient, UsageSnapshot};
