// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # cauth Store
//!
//! The on-disk account store and layout helpers:
//!
//! - [`Paths`] - every path the manager owns or shares, rooted at an
//!   injectable home directory
//! - [`AccountStore`] - the `accounts.json` snapshot with locked
//!   whole-document rewrites
//! - [`migration`] - one-time copy of the legacy store directory

pub mod account_store;
pub mod error;
pub mod migration;
pub mod paths;

pub use account_store::AccountStore;
pub use error::StoreError;
pub use migration::migrate_legacy_store;
pub use paths::Paths;
