//! On-disk layout.
//!
//! The manager exclusively owns `~/.agent-island/` (account roots, the
//! snapshot, and the lock subtree) and shares
//! `~/.claude/.credentials.json` with the upstream CLI. All paths hang off
//! an injectable home directory so tests run against a tempdir.

use std::path::{Path, PathBuf};

/// Directory owned by the manager under the home directory.
const ISLAND_DIR: &str = ".agent-island";

/// Legacy store directory migrated into [`ISLAND_DIR`].
const LEGACY_ISLAND_DIR: &str = ".claude-island";

/// Relative path of a credential file inside any account root or home.
const CREDENTIALS_REL: &str = ".claude/.credentials.json";

/// Every path the manager reads or writes.
#[derive(Debug, Clone)]
pub struct Paths {
    home: PathBuf,
}

impl Paths {
    /// Roots the layout at an explicit home directory.
    pub fn from_home(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Roots the layout at the process owner's home directory.
    pub fn discover() -> Option<Self> {
        dirs::home_dir().map(Self::from_home)
    }

    /// The home directory this layout is rooted at.
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// `~/.claude/.credentials.json`: the canonical active credential,
    /// shared with the upstream CLI.
    pub fn claude_credentials(&self) -> PathBuf {
        self.home.join(CREDENTIALS_REL)
    }

    /// `~/.agent-island/`: the store root.
    pub fn island_dir(&self) -> PathBuf {
        self.home.join(ISLAND_DIR)
    }

    /// `~/.claude-island/`: the legacy store root.
    pub fn legacy_island_dir(&self) -> PathBuf {
        self.home.join(LEGACY_ISLAND_DIR)
    }

    /// `~/.agent-island/accounts.json`: the persisted snapshot.
    pub fn accounts_file(&self) -> PathBuf {
        self.island_dir().join("accounts.json")
    }

    /// An account's root directory.
    pub fn account_root(&self, account_id: &str) -> PathBuf {
        self.island_dir().join("accounts").join(account_id)
    }

    /// An account's stored credential file.
    pub fn account_credentials(&self, account_id: &str) -> PathBuf {
        self.account_root(account_id).join(CREDENTIALS_REL)
    }

    /// The lock subtree.
    pub fn locks_dir(&self) -> PathBuf {
        self.island_dir().join("locks")
    }

    /// Advisory lock for one refresh identity.
    pub fn refresh_lock(&self, lock_id: &str) -> PathBuf {
        self.locks_dir().join(format!("cauth-refresh-{lock_id}.lock"))
    }

    /// Advisory lock serializing snapshot rewrites.
    pub fn store_lock(&self) -> PathBuf {
        self.locks_dir().join("cauth-accounts.lock")
    }

    /// Advisory lock held for the process lifetime by the singleton guard.
    pub fn singleton_lock(&self) -> PathBuf {
        self.locks_dir().join("cauth.lock")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let paths = Paths::from_home("/home/dev");

        assert_eq!(
            paths.claude_credentials(),
            PathBuf::from("/home/dev/.claude/.credentials.json")
        );
        assert_eq!(
            paths.accounts_file(),
            PathBuf::from("/home/dev/.agent-island/accounts.json")
        );
        assert_eq!(
            paths.account_credentials("acct_claude_z_iq_io"),
            PathBuf::from(
                "/home/dev/.agent-island/accounts/acct_claude_z_iq_io/.claude/.credentials.json"
            )
        );
        assert_eq!(
            paths.refresh_lock("abcd1234abcd1234"),
            PathBuf::from("/home/dev/.agent-island/locks/cauth-refresh-abcd1234abcd1234.lock")
        );
        assert_eq!(
            paths.legacy_island_dir(),
            PathBuf::from("/home/dev/.claude-island")
        );
    }
}
