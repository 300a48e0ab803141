// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # cauth Host
//!
//! Host-level primitives shared by the cauth crates:
//!
//! - [`process`] - subprocess execution behind a swappable runner interface
//! - [`atomic`] - crash-safe file writes with owner-only permissions
//! - [`lock`] - named advisory file locks with bounded waits
//! - [`keychain`] - the system-keychain mirror driven through the
//!   platform `security` CLI
//!
//! Everything that shells out goes through [`process::CommandRunner`], so
//! tests substitute a recorder instead of touching the real system.

pub mod atomic;
pub mod error;
pub mod keychain;
pub mod lock;
pub mod process;

pub use atomic::write_atomic;
pub use error::{KeychainError, LockError, ProcessError};
pub use keychain::{Keychain, SecurityCliKeychain, KEYCHAIN_SERVICE};
pub use lock::FileLock;
pub use process::{CommandOutput, CommandRunner, SystemRunner};
