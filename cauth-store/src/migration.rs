//! One-time migration of the legacy store directory.
//!
//! Earlier releases kept the store under `~/.claude-island/`. Startup
//! copies every file from there into `~/.agent-island/`, skipping targets
//! that already exist. Failures are logged and never block startup.

use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::paths::Paths;

/// Copies the legacy store into the current layout.
///
/// Returns the number of files copied. Any individual failure is logged
/// and skipped.
pub async fn migrate_legacy_store(paths: &Paths) -> usize {
    let legacy = paths.legacy_island_dir();
    if !legacy.is_dir() {
        return 0;
    }

    info!(from = %legacy.display(), to = %paths.island_dir().display(), "Migrating legacy store");

    let mut copied = 0;
    let mut pending: Vec<(PathBuf, PathBuf)> = vec![(legacy, paths.island_dir())];

    while let Some((src_dir, dst_dir)) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&src_dir).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = %src_dir.display(), error = %err, "Skipping unreadable directory");
                continue;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    warn!(path = %src_dir.display(), error = %err, "Directory walk failed");
                    break;
                }
            };

            let src = entry.path();
            let dst = dst_dir.join(entry.file_name());

            match entry.file_type().await {
                Ok(file_type) if file_type.is_dir() => pending.push((src, dst)),
                Ok(file_type) if file_type.is_file() => {
                    if dst.exists() {
                        debug!(path = %dst.display(), "Target exists, skipping");
                        continue;
                    }
                    if let Some(parent) = dst.parent() {
                        if let Err(err) = tokio::fs::create_dir_all(parent).await {
                            warn!(path = %parent.display(), error = %err, "Could not create directory");
                            continue;
                        }
                    }
                    match tokio::fs::copy(&src, &dst).await {
                        Ok(_) => copied += 1,
                        Err(err) => {
                            warn!(from = %src.display(), to = %dst.display(), error = %err, "Copy failed");
                        }
                    }
                }
                Ok(_) => debug!(path = %src.display(), "Skipping special file"),
                Err(err) => warn!(path = %src.display(), error = %err, "Could not stat entry"),
            }
        }
    }

    if copied > 0 {
        info!(copied = copied, "Legacy store migration complete");
    }
    copied
}

// ============================================================================
// Tests
// ============================================================================
