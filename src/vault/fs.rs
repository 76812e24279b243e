use std::path::{Path, PathBuf};

use super::{check_relative, DocumentStore, StoreError};
use crate::util::atomic_write;

/// A vault backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a vault-relative path.
    pub fn resolve(&self, path: &Path) -> Result<PathBuf, StoreError> {
        check_relative(path)?;
        Ok(self.root.join(path))
    }
}

impl DocumentStore for FsVault {
    fn read(&self, path: &Path) -> Result<Option<String>, StoreError> {
        let full = self.resolve(path)?;
        match std::fs::read_to_string(&full) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Read { path: full, source }),
        }
    }

    fn write(&self, path: &Path, content: &str) -> Result<(), StoreError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            if !parent.is_dir() {
                return Err(StoreError::MissingFolder(parent.to_path_buf()));
            }
        }
        atomic_write(&full, content.as_bytes())
            .map_err(|source| StoreError::Write { path: full, source })?;
        tracing::debug!(path = %path.display(), bytes = content.len(), "Wrote note");
        Ok(())
    }

    fn create_folder(&self, path: &Path) -> Result<(), StoreError> {
        let full = self.resolve(path)?;
        if full.is_dir() {
            return Ok(());
        }
        std::fs::create_dir_all(&full)
            .map_err(|source| StoreError::CreateFolder { path: full, source })?;
        tracing::info!(folder = %path.display(), "Created vault folder");
        Ok(())
    }
}
