//! Active-credential resolution.
//!
//! The upstream CLI keeps the active credential in two places: the
//! canonical file at `~/.claude/.credentials.json` and a keychain mirror.
//! The two have a documented split-brain history, so reads follow a fixed
//! policy: when the canonical file is usable its token material always
//! wins, and the mirror only contributes metadata the file lacks. A stale
//! or revoked mirror never overrides a usable file.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

use cauth_core::CredentialBlob;
use cauth_host::Keychain;
use cauth_store::Paths;

// ============================================================================
// Source Classification
// ============================================================================

/// One side of the dual store, classified for the merge.
#[derive(Debug)]
enum Source {
    /// Nothing present (or unreadable, or unparseable).
    Missing,
    /// Parses as a credential blob; `usable` when it carries an access token.
    Parsed {
        blob: CredentialBlob,
        usable: bool,
    },
}

impl Source {
    fn classify(bytes: Option<&[u8]>, origin: &str) -> Self {
        let Some(bytes) = bytes else {
            return Source::Missing;
        };
        match CredentialBlob::from_slice(bytes) {
            Ok(blob) => {
                let usable = blob.is_usable();
                debug!(origin = origin, usable = usable, "Classified credential source");
                Source::Parsed { blob, usable }
            }
            Err(err) => {
                warn!(origin = origin, error = %err, "Credential source unparseable");
                Source::Missing
            }
        }
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Resolves "the currently-active credential" from file + mirror.
pub struct ActiveCredentialResolver {
    credentials_path: PathBuf,
    keychain: Arc<dyn Keychain>,
}

impl ActiveCredentialResolver {
    /// Creates a resolver over the canonical file and mirror.
    pub fn new(paths: &Paths, keychain: Arc<dyn Keychain>) -> Self {
        Self {
            credentials_path: paths.claude_credentials(),
            keychain,
        }
    }

    /// Returns the merged active credential, or absent.
    ///
    /// Merge order:
    /// 1. usable file: file's token material and metadata, mirror metadata
    ///    filling gaps;
    /// 2. usable mirror: mirror's token material, file metadata filling
    ///    gaps;
    /// 3. whichever side parses at all, file first;
    /// 4. absent.
    pub async fn resolve(&self) -> Option<CredentialBlob> {
        let file_bytes = match tokio::fs::read(&self.credentials_path).await {
            Ok(bytes) => Some(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                warn!(path = %self.credentials_path.display(), error = %err, "Credential file unreadable");
                None
            }
        };
        let mirror_bytes = self
            .keychain
            .read()
            .await
            .ok()
            .flatten()
            .map(String::into_bytes);

        let file = Source::classify(file_bytes.as_deref(), "file");
        let mirror = Source::classify(mirror_bytes.as_deref(), "keychain");

        match (file, mirror) {
            (
                Source::Parsed {
                    blob: mut file_blob,
                    usable: true,
                },
                mirror,
            ) => {
                if let Source::Parsed {
                    blob: mirror_blob, ..
                } = mirror
                {
                    file_blob.fill_gaps_from(&mirror_blob);
                }
                Some(file_blob)
            }
            (
                file,
                Source::Parsed {
                    blob: mut mirror_blob,
                    usable: true,
                },
            ) => {
                if let Source::Parsed {
                    blob: file_blob, ..
                } = file
                {
                    mirror_blob.fill_gaps_from(&file_blob);
                }
                Some(mirror_blob)
            }
            (Source::Parsed { blob, .. }, _) | (_, Source::Parsed { blob, .. }) => Some(blob),
            (Source::Missing, Source::Missing) => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cauth_host::KeychainError;
    use std::sync::Mutex;

    struct FixedKeychain {
        value: Mutex<Option<String>>,
    }

    impl FixedKeychain {
        fn holding(value: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                value: Mutex::new(value.map(ToString::to_string)),
            })
        }
    }

    #[async_trait::async_trait]
    impl Keychain for FixedKeychain {
        async fn read(&self) -> Result<Option<String>, KeychainError> {
            Ok(self.value.lock().unwrap().clone())
        }

        async fn write(&self, secret: &str) -> Result<(), KeychainError> {
            *self.value.lock().unwrap() = Some(secret.to_string());
            Ok(())
        }
    }

    async fn resolver_with(
        dir: &tempfile::TempDir,
        file: Option<&str>,
        keychain: Arc<FixedKeychain>,
    ) -> ActiveCredentialResolver {
        let paths = Paths::from_home(dir.path());
        if let Some(content) = file {
            let path = paths.claude_credentials();
            tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
            tokio::fs::write(&path, content).await.unwrap();
        }
        ActiveCredentialResolver::new(&paths, keychain)
    }

    #[tokio::test]
    async fn test_usable_file_wins_over_stale_mirror() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver_with(
            &dir,
            Some(r#"{"claudeAiOauth": {"accessToken": "at-file", "refreshToken": "rt-file"}}"#),
            FixedKeychain::holding(Some(
                r#"{"claudeAiOauth": {"accessToken": "at-stale", "email": "gap@x.io"}}"#,
            )),
        )
        .await;

        let blob = resolver.resolve().await.unwrap();
        assert_eq!(blob.access_token().as_deref(), Some("at-file"));
        // Mirror metadata fills the gap without touching token material
        assert_eq!(blob.email().as_deref(), Some("gap@x.io"));
    }

    #[tokio::test]
    async fn test_mirror_used_when_file_unusable() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver_with(
            &dir,
            Some(r#"{"email": "meta@x.io", "claudeAiOauth": {}}"#),
            FixedKeychain::holding(Some(r#"{"claudeAiOauth": {"accessToken": "at-mirror"}}"#)),
        )
        .await;

        let blob = resolver.resolve().await.unwrap();
        assert_eq!(blob.access_token().as_deref(), Some("at-mirror"));
        // File metadata fills gaps in the mirror blob
        assert_eq!(blob.email().as_deref(), Some("meta@x.io"));
    }

    #[tokio::test]
    async fn test_unusable_file_returned_when_mirror_missing() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver_with(
            &dir,
            Some(r#"{"claudeAiOauth": {"refreshToken": "rt-only"}}"#),
            FixedKeychain::holding(None),
        )
        .await;

        let blob = resolver.resolve().await.unwrap();
        assert!(!blob.is_usable());
        assert_eq!(blob.refresh_token().as_deref(), Some("rt-only"));
    }

    #[tokio::test]
    async fn test_absent_everywhere() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver_with(&dir, None, FixedKeychain::holding(None)).await;
        assert!(resolver.resolve().await.is_none());
    }

    #[tokio::test]
    async fn test_garbage_file_falls_back_to_mirror() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver_with(
            &dir,
            Some("not json at all"),
            FixedKeychain::holding(Some(r#"{"claudeAiOauth": {"accessToken": "at-mirror"}}"#)),
        )
        .await;

        let blob = resolver.resolve().await.unwrap();
        assert_eq!(blob.access_token().as_deref(), Some("at-mirror"));
    }
}
