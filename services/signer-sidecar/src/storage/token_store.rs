//! File-backed credential persistence.

use super::credential::{CredentialCodec, SessionCredential};
use crate::error::{SignerError, SignerResult};
use std::ffi::OsString;
use std::fs::Permissions;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

/// Loads and saves the session credential document.
///
/// A store without a path is disabled: saves succeed without touching disk.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    path: Option<PathBuf>,
}

impl TokenStore {
    /// Store backed by `path`. An empty path disables persistence.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            path: (!path.as_os_str().is_empty()).then_some(path),
        }
    }

    /// Store that never persists.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { path: None }
    }

    /// Backing file, if persistence is enabled.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load the credential from the backing file.
    ///
    /// # Errors
    ///
    /// `NotFound` if the file does not exist, `Malformed` if it is not a
    /// credential document, `Persistence` for other read failures and
    /// `Config` if the store is disabled.
    #[instrument(skip(self), fields(path = ?self.path))]
    pub async fn load(&self) -> SignerResult<SessionCredential> {
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| SignerError::config("no credential file configured"))?;

        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => SignerError::NotFound(path.to_path_buf()),
            _ => SignerError::Persistence {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        let credential = CredentialCodec::decode(&bytes).map_err(|e| SignerError::Malformed {
            path: path.to_path_buf(),
            source: e,
        })?;

        debug!(
            extra_keys = credential.extra_fields().len(),
            "Loaded credential document"
        );
        Ok(credential)
    }

    /// Persist the credential, replacing the backing file.
    ///
    /// The document is written to a sibling temporary file and renamed over
    /// the existing file, so a crash never leaves a truncated credential behind.
    /// A symlinked path is resolved first so the link target is updated. The
    /// existing file's permissions carry over; new files are created `0600`.
    ///
    /// # Errors
    ///
    /// `Persistence` if the file cannot be written.
    #[instrument(skip(self, credential), fields(path = ?self.path))]
    pub async fn save(&self, credential: &SessionCredential) -> SignerResult<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let persistence = |source: io::Error| SignerError::Persistence {
            path: path.to_path_buf(),
            source,
        };

        let bytes = CredentialCodec::encode(credential).map_err(|e| persistence(e.into()))?;

        let target = resolve_target(path).await.map_err(persistence)?;
        let permissions = match tokio::fs::metadata(&target).await {
            Ok(metadata) => Some(metadata.permissions()),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(persistence(e)),
        };

        let tmp = tmp_path(&target);
        if let Err(e) = write_private(&tmp, &bytes, permissions).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(persistence(e));
        }

        match tokio::fs::rename(&tmp, &target).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::ResourceBusy => {
                // Mount points cannot be renamed over.
                let _ = tokio::fs::remove_file(&tmp).await;
                debug!("Credential file is busy, writing in place");
                tokio::fs::write(&target, &bytes).await.map_err(persistence)?;
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(persistence(e));
            }
        }

        debug!(bytes = bytes.len(), target = ?target, "Saved credential document");
        Ok(())
    }
}

/// Follow symlinks to the file that actually holds the credential.
async fn resolve_target(path: &Path) -> io::Result<PathBuf> {
    match tokio::fs::canonicalize(path).await {
        Ok(target) => Ok(target),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(path.to_path_buf()),
        Err(e) => Err(e),
    }
}

async fn write_private(
    path: &Path,
    bytes: &[u8],
    permissions: Option<Permissions>,
) -> io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    if let Some(permissions) = permissions {
        file.set_permissions(permissions).await?;
    }
    file.write_all(bytes).await?;
    file.sync_all().await
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
