//! Named advisory file locks.
//!
//! Cross-process mutual exclusion for refresh cycles and snapshot writes.
//! Locks are `fs2` advisory locks with a bounded acquisition wait; release
//! is guaranteed by the guard's `Drop`, so every exit path out of a
//! critical section unlocks.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::LockError;

/// Poll interval while waiting for a contended lock.
const RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// An exclusive advisory lock, released on drop.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Acquires the lock at `path`, waiting at most `timeout`.
    ///
    /// The lock file and its parents are created as needed. Acquisition
    /// polls rather than blocking so a wedged holder cannot hang the
    /// process past the bounded wait.
    pub async fn acquire(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        let file = Self::open(path)?;
        let started = Instant::now();

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!(path = %path.display(), "Lock acquired");
                    return Ok(Self {
                        file,
                        path: path.to_path_buf(),
                    });
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    if started.elapsed() >= timeout {
                        warn!(path = %path.display(), waited = ?timeout, "Lock wait expired");
                        return Err(LockError::Timeout {
                            path: path.to_path_buf(),
                            waited: timeout,
                        });
                    }
                    tokio::time::sleep(RETRY_INTERVAL).await;
                }
                Err(err) => return Err(LockError::Io(err)),
            }
        }
    }

    /// Attempts the lock without waiting. `None` when another holder has it.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>, LockError> {
        let file = Self::open(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                file,
                path: path.to_path_buf(),
            })),
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(LockError::Io(err)),
        }
    }

    fn open(path: &Path) -> Result<File, LockError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?)
    }

    /// The lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(err) = fs2::FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %err, "Failed to release lock");
        } else {
            debug!(path = %self.path.display(), "Lock released");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_and_reacquire_after_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locks/test.lock");

        let guard = FileLock::acquire(&path, Duration::from_secs(1)).await.unwrap();
        drop(guard);

        // Released on drop, so a second acquisition succeeds immediately.
        let again = FileLock::acquire(&path, Duration::from_millis(50)).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn test_try_acquire_reports_contention() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.lock");

        let _held = FileLock::try_acquire(&path).unwrap().unwrap();

        // Same-process relock via a second handle is refused.
        let second = FileLock::try_acquire(&path).unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_bounded_wait_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.lock");

        let _held = FileLock::try_acquire(&path).unwrap().unwrap();

        let result = FileLock::acquire(&path, Duration::from_millis(250)).await;
        assert!(matches!(result, Err(LockError::Timeout { .. })));
    }
}
