//! The document vault: where the diary note lives.
//!
//! - [`DocumentStore`] is the capability the sync needs from its host: read a
//!   note, write a note, create a folder. Paths are relative to the vault root.
//! - [`FsVault`] backs it with a directory on disk and replaces files atomically.
//! - [`MemoryVault`] keeps everything in memory, for tests and embedding hosts.
//! - [`merge`] reconciles rendered diary lines with an existing note.

mod fs;
mod memory;
mod merge;

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

pub use fs::FsVault;
pub use memory::MemoryVault;
pub use merge::{merge, split_metadata, MergeOutcome, SortDirection, METADATA_DELIMITER};

/// Errors raised by a [`DocumentStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create folder '{path}': {source}")]
    CreateFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// SEC-008: Absolute paths and `..` components are refused.
    #[error("Path is outside the vault: {0}")]
    OutsideVault(PathBuf),

    #[error("Folder does not exist: {0}")]
    MissingFolder(PathBuf),

    #[error("Vault is read-only")]
    ReadOnly,
}

/// Host capability for reading and writing notes.
///
/// All paths are relative to the vault root.
pub trait DocumentStore {
    /// Read a note. `Ok(None)` when it does not exist.
    fn read(&self, path: &Path) -> Result<Option<String>, StoreError>;

    /// Replace a note's contents in one step. The parent folder must exist.
    fn write(&self, path: &Path, content: &str) -> Result<(), StoreError>;

    /// Create a folder and any missing parents. Existing folders are fine.
    fn create_folder(&self, path: &Path) -> Result<(), StoreError>;
}

/// Reject absolute paths and parent-directory components.
pub(crate) fn check_relative(path: &Path) -> Result<(), StoreError> {
    let escapes = path.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(StoreError::OutsideVault(path.to_path_buf()));
    }
    Ok(())
}

/// Build the vault-relative path of the diary note from a folder and a
/// filename. `.md` is appended when the filename has no extension.
pub fn note_path(folder: &str, filename: &str) -> PathBuf {
    let mut name = PathBuf::from(filename.trim());
    if name.extension().is_none() {
        name.set_extension("md");
    }

    let folder = folder.trim().trim_matches('/');
    if folder.is_empty() {
        name
    } else {
        Path::new(folder).join(name)
    }
}
