//! The `accounts.json` snapshot store.
//!
//! Mutations are whole-snapshot rewrites performed under the store's
//! advisory lock; the write itself goes through the atomic writer so
//! concurrent readers never observe a torn document.

use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use cauth_core::AccountsSnapshot;
use cauth_host::{write_atomic, FileLock};

use crate::error::StoreError;
use crate::paths::Paths;

/// Bounded wait for the store lock.
const STORE_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Load/save access to the persisted accounts + profiles document.
#[derive(Debug, Clone)]
pub struct AccountStore {
    accounts_file: PathBuf,
    lock_path: PathBuf,
}

impl AccountStore {
    /// Creates a store over the given layout.
    pub fn new(paths: &Paths) -> Self {
        Self {
            accounts_file: paths.accounts_file(),
            lock_path: paths.store_lock(),
        }
    }

    /// Loads the snapshot; an absent file is an empty snapshot.
    pub async fn load(&self) -> Result<AccountsSnapshot, StoreError> {
        match tokio::fs::read(&self.accounts_file).await {
            Ok(bytes) => {
                let snapshot = serde_json::from_slice(&bytes)?;
                debug!(path = %self.accounts_file.display(), "Snapshot loaded");
                Ok(snapshot)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok(AccountsSnapshot::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Persists the snapshot: sorted keys, pretty-printed, mode `0600`.
    pub async fn save(&self, snapshot: &AccountsSnapshot) -> Result<(), StoreError> {
        // Through a Value so object keys serialize sorted.
        let value = serde_json::to_value(snapshot)?;
        let bytes = serde_json::to_vec_pretty(&value)?;
        write_atomic(&self.accounts_file, &bytes).await?;
        debug!(
            path = %self.accounts_file.display(),
            accounts = snapshot.accounts.len(),
            profiles = snapshot.profiles.len(),
            "Snapshot saved"
        );
        Ok(())
    }

    /// Runs a mutation under the store lock: lock, load, mutate, save.
    ///
    /// Returns the snapshot as persisted.
    pub async fn mutate<F>(&self, mutation: F) -> Result<AccountsSnapshot, StoreError>
    where
        F: FnOnce(&mut AccountsSnapshot),
    {
        let _guard = FileLock::acquire(&self.lock_path, STORE_LOCK_TIMEOUT).await?;
        let mut snapshot = self.load().await?;
        mutation(&mut snapshot);
        self.save(&snapshot).await?;
        Ok(snapshot)
    }
}

// ============================================================================
// Tests
// ============================================================================
