//! The system-keychain mirror.
//!
//! Claude CLI keeps a copy of the active credential in the platform
//! keychain under a fixed service name. This module reads and writes that
//! entry through the `security` CLI, never linking against keychain APIs,
//! so the whole surface stays behind the [`CommandRunner`] seam.
//!
//! Reads are lenient (a missing or unreadable entry is simply absent);
//! writes are strict and surface errors, because callers roll back file
//! state when the mirror cannot be updated.

use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::KeychainError;
use crate::process::CommandRunner;

// ============================================================================
// Constants
// ============================================================================

/// Keychain service name for the Claude CLI credential entry.
pub const KEYCHAIN_SERVICE: &str = "Claude Code-credentials";

/// Environment override for the keychain CLI path.
pub const SECURITY_BIN_ENV: &str = "CAUTH_SECURITY_BIN";

/// Default keychain CLI path.
const DEFAULT_SECURITY_BIN: &str = "/usr/bin/security";

/// Account used when neither the keychain nor the login name yields one.
const FALLBACK_ACCOUNT: &str = "default";

// ============================================================================
// Keychain Interface
// ============================================================================

/// API for the credential mirror.
#[async_trait]
pub trait Keychain: Send + Sync {
    /// Returns the stored credential string, or absent.
    async fn read(&self) -> Result<Option<String>, KeychainError>;

    /// Stores or updates the credential string.
    async fn write(&self, secret: &str) -> Result<(), KeychainError>;
}

// ============================================================================
// Security CLI Implementation
// ============================================================================

/// Mirror implementation driving the platform `security` CLI.
pub struct SecurityCliKeychain {
    runner: Arc<dyn CommandRunner>,
    security_bin: PathBuf,
}

impl SecurityCliKeychain {
    /// Creates a mirror using `CAUTH_SECURITY_BIN` or the system default.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        let security_bin = std::env::var(SECURITY_BIN_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_SECURITY_BIN));
        Self::with_security_bin(runner, security_bin)
    }

    /// Creates a mirror with an explicit CLI path.
    pub fn with_security_bin(runner: Arc<dyn CommandRunner>, security_bin: PathBuf) -> Self {
        Self {
            runner,
            security_bin,
        }
    }

    /// Discovers the account name of the existing keychain item.
    ///
    /// The verbose `find-generic-password -g` output carries an
    /// `"acct"<blob>="..."` attribute line. Falls back to the process
    /// owner's login name, then `"default"`.
    async fn discover_account(&self) -> String {
        let args = vec![
            "find-generic-password".to_string(),
            "-s".to_string(),
            KEYCHAIN_SERVICE.to_string(),
            "-g".to_string(),
        ];

        if let Ok(output) = self.runner.run(&self.security_bin, &args).await {
            if output.success() {
                // Attribute dump goes to stdout, the password line to stderr;
                // scan both.
                let combined = format!("{}\n{}", output.stdout, output.stderr);
                if let Some(account) = parse_account_attribute(&combined) {
                    debug!(account = %account, "Discovered keychain account name");
                    return account;
                }
            }
        }

        let login = whoami::username();
        if login.is_empty() {
            FALLBACK_ACCOUNT.to_string()
        } else {
            login
        }
    }
}

#[async_trait]
impl Keychain for SecurityCliKeychain {
    async fn read(&self) -> Result<Option<String>, KeychainError> {
        let args = vec![
            "find-generic-password".to_string(),
            "-s".to_string(),
            KEYCHAIN_SERVICE.to_string(),
            "-w".to_string(),
        ];

        match self.runner.run(&self.security_bin, &args).await {
            Ok(output) if output.success() => {
                let secret = output.stdout.trim_end_matches('\n').to_string();
                if secret.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(secret))
                }
            }
            Ok(output) => {
                debug!(exit_code = output.exit_code, "Keychain entry not readable");
                Ok(None)
            }
            Err(err) => {
                warn!(error = %err, "Keychain CLI unavailable, treating mirror as absent");
                Ok(None)
            }
        }
    }

    async fn write(&self, secret: &str) -> Result<(), KeychainError> {
        let account = self.discover_account().await;

        let args = vec![
            "add-generic-password".to_string(),
            "-U".to_string(),
            "-s".to_string(),
            KEYCHAIN_SERVICE.to_string(),
            "-a".to_string(),
            account,
            "-w".to_string(),
            secret.to_string(),
        ];

        let output = self.runner.run(&self.security_bin, &args).await?;
        if output.success() {
            debug!("Keychain mirror updated");
            Ok(())
        } else {
            Err(KeychainError::WriteFailed(output.stderr.trim().to_string()))
        }
    }
}

/// Extracts the account name from `"acct"<blob>="..."` in verbose output.
fn parse_account_attribute(verbose: &str) -> Option<String> {
    let re = Regex::new(r#""acct"<blob>="([^"]*)""#).ok()?;
    let account = re.captures(verbose)?.get(1)?.as_str().trim();
    if account.is_empty() {
        None
    } else {
        Some(account.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
