//! Accounts, profiles, and the persisted snapshot document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Service
// ============================================================================

/// Upstream service an account belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    /// Claude Code.
    Claude,
}

// ============================================================================
// Account
// ============================================================================

/// A stable identity representing one upstream account.
///
/// Created on first save; mutated only by save and by refresh (to bump
/// `updated_at`); never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Stable account ID (see the codec's account-ID derivation).
    pub id: String,
    /// Owning service.
    pub service: Service,
    /// Human-readable label, derived from email or fingerprint.
    pub label: String,
    /// Absolute directory containing this account's credential tree.
    pub root_path: PathBuf,
    /// Last time a save or refresh touched this account.
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Profile
// ============================================================================

/// A named binding of a profile name to zero or one account IDs per service.
///
/// Foreign-service slots are reserved and preserved across saves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Unique profile name.
    pub name: String,
    /// Bound Claude account, if any.
    pub claude_account_id: Option<String>,
    /// Reserved slot.
    pub codex_account_id: Option<String>,
    /// Reserved slot.
    pub gemini_account_id: Option<String>,
}

impl Profile {
    /// A new profile bound only to a Claude account.
    pub fn for_claude(name: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            claude_account_id: Some(account_id.into()),
            codex_account_id: None,
            gemini_account_id: None,
        }
    }
}

// ============================================================================
// Accounts Snapshot
// ============================================================================

/// The persisted document: ordered accounts and ordered profiles.
///
/// Mutations are whole-snapshot rewrites; upserts keep insertion order for
/// new entries and replace existing ones in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountsSnapshot {
    /// All known accounts, in insertion order.
    pub accounts: Vec<Account>,
    /// All known profiles, in insertion order.
    pub profiles: Vec<Profile>,
}

impl AccountsSnapshot {
    /// Looks up an account by ID.
    pub fn account(&self, id: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == id)
    }

    /// Looks up a profile by name.
    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Inserts or replaces an account, keyed by ID.
    pub fn upsert_account(&mut self, account: Account) {
        if let Some(existing) = self.accounts.iter_mut().find(|a| a.id == account.id) {
            *existing = account;
        } else {
            self.accounts.push(account);
        }
    }

    /// Binds a profile name to a Claude account.
    ///
    /// An existing profile keeps its foreign-service slots; only the Claude
    /// binding is rewritten.
    pub fn bind_claude_profile(&mut self, name: &str, account_id: &str) {
        if let Some(existing) = self.profiles.iter_mut().find(|p| p.name == name) {
            existing.claude_account_id = Some(account_id.to_string());
        } else {
            self.profiles.push(Profile::for_claude(name, account_id));
        }
    }

    /// Bumps `updated_at` on an account if it exists.
    pub fn touch_account(&mut self, id: &str, now: DateTime<Utc>) {
        if let Some(account) = self.accounts.iter_mut().find(|a| a.id == id) {
            account.updated_at = now;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
