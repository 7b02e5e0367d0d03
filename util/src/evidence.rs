//! Evidence blob storage for leave requests.
//!
//! The core only ever holds opaque handles; the bytes live behind an
//! [`EvidenceStore`]. The default implementation keeps files on disk under
//! `EVIDENCE_STORAGE_ROOT`, one file per handle.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Stable reference to a stored blob. Treat as opaque outside the store.
pub type EvidenceHandle = String;

#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Persists `bytes` and returns the handle to retrieve them later.
    async fn store(&self, filename: &str, bytes: &[u8]) -> io::Result<EvidenceHandle>;

    /// Reads a previously stored blob back.
    async fn fetch(&self, handle: &EvidenceHandle) -> io::Result<Vec<u8>>;

    /// Removes a blob. Missing blobs are not an error.
    async fn remove(&self, handle: &EvidenceHandle) -> io::Result<()>;
}

/// Filesystem-backed store. Handles are `{uuid}_{sanitized-filename}` so a
/// directory listing stays readable during support work.
pub struct FsEvidenceStore {
    root: PathBuf,
}

impl FsEvidenceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, handle: &str) -> io::Result<PathBuf> {
        // Handles never contain separators; reject anything that tries.
        if handle.contains('/') || handle.contains('\\') || handle.contains("..") {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid evidence handle",
            ));
        }
        Ok(self.root.join(handle))
    }

    fn sanitize(filename: &str) -> String {
        let name = Path::new(filename)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("evidence");
        name.chars()
            .map(|c| if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
            .collect()
    }
}

#[async_trait]
impl EvidenceStore for FsEvidenceStore {
    async fn store(&self, filename: &str, bytes: &[u8]) -> io::Result<EvidenceHandle> {
        tokio::fs::create_dir_all(&self.root).await?;
        let handle = format!("{}_{}", Uuid::new_v4(), Self::sanitize(filename));
        let path = self.path_for(&handle)?;
        tokio::fs::write(&path, bytes).await?;
        Ok(handle)
    }

    async fn fetch(&self, handle: &EvidenceHandle) -> io::Result<Vec<u8>> {
        let path = self.path_for(handle)?;
        tokio::fs::read(&path).await
    }

    async fn remove(&self, handle: &EvidenceHandle) -> io::Result<()> {
        let path = self.path_for(handle)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
