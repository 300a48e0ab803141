// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # cauth Core
//!
//! Core types and the credential codec for the cauth credential manager.
//!
//! This crate provides the foundational abstractions used across all other
//! cauth crates, including:
//!
//! - The credential blob codec (parse, extract, merge, reserialize)
//! - Domain models (accounts, profiles, the persisted snapshot)
//! - Usage window and TTL formatting
//! - Error types
//!
//! ## Key Types
//!
//! ### Credential Types
//! - [`CredentialBlob`] - Parsed credential JSON with unknown fields preserved
//! - [`TokenMaterial`] - The `(accessToken, refreshToken, expiresAt)` triple
//! - [`RefreshPayload`] - Token endpoint response merged back into a blob
//! - [`PlanTag`] - Subscription plan derived from credential metadata
//!
//! ### Store Types
//! - [`Account`] - Stable identity for one upstream account
//! - [`Profile`] - Named binding from a label to account IDs
//! - [`AccountsSnapshot`] - The persisted accounts + profiles document
//!
//! ### Usage Types
//! - [`UsageWindow`] - One quota window (utilization + reset time)
//! - [`format_ttl`] - Human-readable remaining-time rendering

pub mod credential;
pub mod error;
pub mod models;

// Re-export error types
pub use error::CoreError;

// Re-export codec types
pub use credential::{
    fingerprint, slugify, CredentialBlob, PlanTag, RefreshPayload, TokenMaterial,
};

// Re-export model types
pub use models::{
    format_ttl, format_window, Account, AccountsSnapshot, Profile, Service, UsageWindow,
};
