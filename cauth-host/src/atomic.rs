//! Crash-safe file writes.
//!
//! A reader that opens the target path at any instant sees either the
//! previous contents intact or the new contents intact: bytes are
//! materialized in a sibling temporary file, synced, and renamed over the
//! destination. The rename is atomic on the local filesystem.

use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// File mode for credential-bearing files: owner read/write only.
const FILE_MODE: u32 = 0o600;

/// Writes `bytes` to `path` atomically with mode `0600`.
///
/// Parent directories are created as needed. Permissions are set on the
/// temporary file before the rename, so the destination never exists with
/// a wider mode.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp_path = sibling_tmp_path(path);

    let mut file = tokio::fs::File::create(&tmp_path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);

    set_owner_only(&tmp_path).await?;
    tokio::fs::rename(&tmp_path, path).await?;

    debug!(path = %path.display(), len = bytes.len(), "Atomic write committed");
    Ok(())
}

/// Temp name beside the destination: same directory, so the rename never
/// crosses a filesystem boundary. The pid suffix keeps concurrent writers
/// from clobbering each other's staging file.
fn sibling_tmp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    path.with_file_name(format!(".{name}.{}.tmp", std::process::id()))
}

#[cfg(unix)]
async fn set_owner_only(path: &Path) -> Result<(), std::io::Error> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = tokio::fs::metadata(path).await?;
    let mut perms = metadata.permissions();
    perms.set_mode(FILE_MODE);
    tokio::fs::set_permissions(path, perms).await
}

#[cfg(not(unix))]
async fn set_owner_only(_path: &Path) -> Result<(), std::io::Error> {
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_creates_parents_and_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c/creds.json");

        write_atomic(&path, b"{\"k\":1}").await.unwrap();

        let content = tokio::fs::read(&path).await.unwrap();
        assert_eq!(content, b"{\"k\":1}");
    }

    #[tokio::test]
    async fn test_overwrite_replaces_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");

        write_atomic(&path, b"first-longer-content").await.unwrap();
        write_atomic(&path, b"second").await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, "second");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_mode_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");

        write_atomic(&path, b"secret").await.unwrap();

        let mode = tokio::fs::metadata(&path)
            .await
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[tokio::test]
    async fn test_no_staging_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");

        write_atomic(&path, b"data").await.unwrap();

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["creds.json"]);
    }
}
