//! The rotation engine: `save`, `switch`, `refresh_all`.
//!
//! One refresh attempt moves through lock, refresh, stage, commit, mirror,
//! reconcile. Two properties carry the design:
//!
//! - **Refresh-token-keyed locking.** Refresh tokens are single-use, and
//!   legacy duplicate accounts can share one. Mutual exclusion is keyed on
//!   the refresh-token fingerprint rather than the account, so one token is
//!   consumed at most once per cycle no matter how many accounts hold it.
//! - **Active-sync-on-unchanged.** Every refresh that touches the active
//!   account rewrites the canonical file and the keychain mirror, even when
//!   the refreshed bytes match what is already on disk. An "unchanged means
//!   skip" guard would leave a stale mirror in place indefinitely.

use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use cauth_core::{Account, CredentialBlob, Service};
use cauth_host::{write_atomic, FileLock, Keychain};
use cauth_store::{AccountStore, Paths};

use crate::analytics::{AnalyticsEvent, AnalyticsSink};
use crate::error::EngineError;
use crate::refresher::TokenRefresher;
use crate::report::{format_profile_line, RefreshOutcome};
use crate::resolver::ActiveCredentialResolver;
use crate::usage::UsageClient;

/// Bounded wait for a refresh-identity lock.
const REFRESH_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Rotation Engine
// ============================================================================

/// Orchestrates credential rotation across the store, the canonical file,
/// and the keychain mirror.
pub struct RotationEngine {
    paths: Paths,
    store: AccountStore,
    keychain: Arc<dyn Keychain>,
    refresher: TokenRefresher,
    usage: UsageClient,
    analytics: Arc<dyn AnalyticsSink>,
}

impl RotationEngine {
    /// Creates an engine over the given layout and collaborators.
    pub fn new(
        paths: Paths,
        keychain: Arc<dyn Keychain>,
        refresher: TokenRefresher,
        usage: UsageClient,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> Self {
        let store = AccountStore::new(&paths);
        Self {
            paths,
            store,
            keychain,
            refresher,
            usage,
            analytics,
        }
    }

    fn resolver(&self) -> ActiveCredentialResolver {
        ActiveCredentialResolver::new(&self.paths, Arc::clone(&self.keychain))
    }

    // ========================================================================
    // save
    // ========================================================================

    /// Captures the currently-active credential into a named profile.
    ///
    /// Returns the derived account ID.
    pub async fn save(&self, profile_name: &str) -> Result<String, EngineError> {
        let name = profile_name.trim();
        if name.is_empty() {
            return Err(EngineError::Usage(
                "profile name must not be empty".to_string(),
            ));
        }

        let blob = self
            .resolver()
            .resolve()
            .await
            .ok_or(EngineError::NoActiveCredential)?;

        let account_id = blob.account_id();
        let bytes = blob.to_bytes()?;
        write_atomic(&self.paths.account_credentials(&account_id), &bytes).await?;

        let label = format!("claude:{}", blob.fingerprint()?);
        let root_path = self.paths.account_root(&account_id);
        self.store
            .mutate(|snapshot| {
                snapshot.upsert_account(Account {
                    id: account_id.clone(),
                    service: Service::Claude,
                    label,
                    root_path,
                    updated_at: Utc::now(),
                });
                snapshot.bind_claude_profile(name, &account_id);
            })
            .await?;

        info!(profile = %name, account = %account_id, "Profile saved");
        self.analytics.record(AnalyticsEvent::ProfileSaved {
            profile: name.to_string(),
        });
        Ok(account_id)
    }

    // ========================================================================
    // switch
    // ========================================================================

    /// Makes a saved profile's credential the active one.
    ///
    /// The canonical file and the keychain mirror must move together: when
    /// the mirror write fails, the file is rolled back to its pre-switch
    /// bytes so the two sides stay convergent.
    pub async fn switch(&self, profile_name: &str) -> Result<(), EngineError> {
        let snapshot = self.store.load().await?;
        let profile = snapshot
            .profile(profile_name)
            .ok_or_else(|| EngineError::ProfileNotFound(profile_name.to_string()))?;
        let account_id = profile
            .claude_account_id
            .as_ref()
            .ok_or_else(|| EngineError::ProfileHasNoClaudeAccount(profile_name.to_string()))?;
        let account = snapshot
            .account(account_id)
            .ok_or_else(|| EngineError::AccountNotFound(account_id.clone()))?;

        let stored_path = self.paths.account_credentials(&account.id);
        let stored = match tokio::fs::read(&stored_path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(EngineError::StoredCredentialMissing(stored_path));
            }
            Err(err) => return Err(err.into()),
        };

        let active_path = self.paths.claude_credentials();
        let previous = match tokio::fs::read(&active_path).await {
            Ok(bytes) => Some(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };

        write_atomic(&active_path, &stored).await?;

        if let Err(err) = self.keychain.write(&String::from_utf8_lossy(&stored)).await {
            warn!(error = %err, "Keychain write failed, rolling back active file");
            match &previous {
                Some(bytes) => {
                    if let Err(rollback) = write_atomic(&active_path, bytes).await {
                        warn!(error = %rollback, "Rollback write failed");
                    }
                }
                None => {
                    let _ = tokio::fs::remove_file(&active_path).await;
                }
            }
            return Err(err.into());
        }

        info!(profile = %profile_name, account = %account.id, "Switched active credential");
        self.analytics.record(AnalyticsEvent::ProfileSwitched {
            profile: profile_name.to_string(),
        });
        Ok(())
    }

    // ========================================================================
    // refresh_all
    // ========================================================================

    /// Refreshes every profile's underlying account, at most once per
    /// account and at most once per refresh-token identity per cycle.
    ///
    /// Failures are isolated per profile. Returns one report line per
    /// profile, in the snapshot's original profile order.
    pub async fn refresh_all(&self) -> Result<Vec<String>, EngineError> {
        let active_account_id = self.resolver().resolve().await.map(|b| b.account_id());
        let snapshot = self.store.load().await?;

        let mut refreshed_by_account: HashMap<String, RefreshOutcome> = HashMap::new();
        let mut refreshed_by_lock: HashMap<String, RefreshOutcome> = HashMap::new();
        let mut touched: BTreeSet<String> = BTreeSet::new();
        let mut failed = 0usize;

        let mut ordered: Vec<_> = snapshot.profiles.iter().collect();
        ordered.sort_by(|a, b| a.name.cmp(&b.name));

        for profile in ordered {
            let Some(account_id) = profile.claude_account_id.clone() else {
                continue;
            };
            let Some(account) = snapshot.account(&account_id) else {
                debug!(profile = %profile.name, account = %account_id, "Account missing, skipping");
                continue;
            };
            if account.service != Service::Claude {
                continue;
            }
            if refreshed_by_account.contains_key(&account_id) {
                continue;
            }

            let cred_path = self.paths.account_credentials(&account_id);
            let bytes = match tokio::fs::read(&cred_path).await {
                Ok(bytes) => bytes,
                Err(_) => {
                    debug!(profile = %profile.name, path = %cred_path.display(), "Stored credential missing, skipping");
                    continue;
                }
            };
            let blob = match CredentialBlob::from_slice(&bytes) {
                Ok(blob) => blob,
                Err(err) => {
                    warn!(profile = %profile.name, error = %err, "Stored credential unparseable");
                    failed += 1;
                    continue;
                }
            };

            let lock_id = blob.refresh_lock_id();

            // Dedup: a profile sharing an already-consumed refresh identity
            // reuses that result instead of burning the token again.
            if let Some(outcome) = refreshed_by_lock.get(&lock_id).cloned() {
                debug!(profile = %profile.name, lock_id = %lock_id, "Reusing refresh result");
                match self
                    .adopt_shared_refresh(&account_id, &cred_path, &outcome, active_account_id.as_deref())
                    .await
                {
                    Ok(()) => {
                        refreshed_by_account.insert(account_id.clone(), outcome);
                        touched.insert(account_id);
                    }
                    Err(err) => {
                        warn!(profile = %profile.name, error = %err, "Shared refresh adoption failed");
                        failed += 1;
                    }
                }
                continue;
            }

            match self
                .refresh_account(&blob, &account_id, &cred_path, &lock_id, active_account_id.as_deref())
                .await
            {
                Ok(outcome) => {
                    refreshed_by_lock.insert(lock_id, outcome.clone());
                    refreshed_by_account.insert(account_id.clone(), outcome);
                    touched.insert(account_id);
                }
                Err(err) => {
                    warn!(profile = %profile.name, error = %err, "Refresh failed");
                    failed += 1;
                }
            }
        }

        // Timestamp bumps land in one locked snapshot rewrite.
        self.store
            .mutate(|snap| {
                let now = Utc::now();
                for account_id in &touched {
                    snap.touch_account(account_id, now);
                }
            })
            .await?;

        let now = Utc::now();
        let lines = snapshot
            .profiles
            .iter()
            .map(|profile| {
                let outcome = profile
                    .claude_account_id
                    .as_ref()
                    .and_then(|id| refreshed_by_account.get(id));
                format_profile_line(&profile.name, outcome, now)
            })
            .collect();

        info!(
            refreshed = refreshed_by_account.len(),
            failed = failed,
            "Refresh cycle complete"
        );
        self.analytics.record(AnalyticsEvent::RefreshCycleCompleted {
            refreshed: refreshed_by_account.len(),
            failed,
        });
        Ok(lines)
    }

    /// One network refresh under the refresh-identity lock.
    async fn refresh_account(
        &self,
        blob: &CredentialBlob,
        account_id: &str,
        cred_path: &Path,
        lock_id: &str,
        active_account_id: Option<&str>,
    ) -> Result<RefreshOutcome, EngineError> {
        let lock_path = self.paths.refresh_lock(lock_id);
        let _guard = FileLock::acquire(&lock_path, REFRESH_LOCK_TIMEOUT).await?;

        // The endpoint is always called; unchanged material is not a skip
        // reason at this level.
        let refresh_token = blob.refresh_token().unwrap_or_default();
        let scope = blob.scopes().join(" ");
        let payload = self.refresher.refresh(&refresh_token, &scope).await?;

        let mut updated = blob.clone();
        updated.apply_refresh(&payload, Utc::now().timestamp_millis());
        let bytes = updated.to_bytes()?;
        write_atomic(cred_path, &bytes).await?;

        if active_account_id == Some(account_id) {
            self.sync_active(&bytes).await?;
        }

        let usage = self
            .usage
            .fetch(&payload.access_token)
            .await
            .unwrap_or_default();

        Ok(RefreshOutcome {
            bytes,
            email: updated.email(),
            plan: updated.plan(),
            expires_at_ms: updated.expires_at_ms(),
            five_hour: usage.five_hour,
            seven_day: usage.seven_day,
        })
    }

    /// Propagates an already-refreshed result to a duplicate account.
    async fn adopt_shared_refresh(
        &self,
        account_id: &str,
        cred_path: &Path,
        outcome: &RefreshOutcome,
        active_account_id: Option<&str>,
    ) -> Result<(), EngineError> {
        write_atomic(cred_path, &outcome.bytes).await?;
        if active_account_id == Some(account_id) {
            self.sync_active(&outcome.bytes).await?;
        }
        Ok(())
    }

    /// Converges the canonical file and the keychain mirror on `bytes`.
    ///
    /// Runs on every refresh that touches the active account, including
    /// byte-identical ones, so a stale mirror is repaired by the next
    /// successful refresh.
    async fn sync_active(&self, bytes: &[u8]) -> Result<(), EngineError> {
        write_atomic(&self.paths.claude_credentials(), bytes).await?;
        self.keychain.write(&String::from_utf8_lossy(bytes)).await?;
        Ok(())
    }
}
