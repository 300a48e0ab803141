//! Single-instance guard.
//!
//! Two concurrent manager processes could interleave snapshot rewrites and
//! keychain writes, so startup takes a process-lifetime advisory lock. A
//! newcomer that finds the lock held fails fast with a lock-unavailable
//! error instead of waiting.

use tracing::{debug, warn};

use cauth_engine::EngineError;
use cauth_host::FileLock;
use cauth_store::Paths;

/// Holds the singleton lock for the life of the process.
#[derive(Debug)]
pub struct SingletonGuard {
    _lock: FileLock,
}

impl SingletonGuard {
    /// Acquires the singleton lock, failing when another instance runs.
    pub fn acquire(paths: &Paths) -> Result<Self, EngineError> {
        let lock_path = paths.singleton_lock();
        match FileLock::try_acquire(&lock_path)? {
            Some(lock) => {
                debug!(path = %lock.path().display(), "Singleton lock acquired");
                Ok(Self { _lock: lock })
            }
            None => {
                warn!(path = %lock_path.display(), "Another cauth instance is already running");
                Err(EngineError::RefreshLockUnavailable(
                    lock_path.display().to_string(),
                ))
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_then_conflict_then_release() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::from_home(dir.path());

        let guard = SingletonGuard::acquire(&paths).unwrap();
        let err = SingletonGuard::acquire(&paths).unwrap_err();
        assert!(matches!(err, EngineError::RefreshLockUnavailable(_)));

        drop(guard);
        assert!(SingletonGuard::acquire(&paths).is_ok());
    }
}
