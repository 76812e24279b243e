use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use super::{check_relative, DocumentStore, StoreError};

/// An in-memory vault.
///
/// The root folder always exists. Writes into a folder that was never
/// created fail the same way a real directory would.
#[derive(Debug, Default)]
pub struct MemoryVault {
    notes: RefCell<BTreeMap<PathBuf, String>>,
    folders: RefCell<BTreeSet<PathBuf>>,
    read_only: Cell<bool>,
    writes: Cell<usize>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a note, creating its parent folders.
    pub fn with_note(self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        let path = path.into();
        if let Some(parent) = path.parent() {
            self.insert_folders(parent);
        }
        self.notes.borrow_mut().insert(path, content.into());
        self
    }

    /// Make every subsequent write fail with [`StoreError::ReadOnly`].
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.set(read_only);
    }

    /// Current contents of a note, if any.
    pub fn note(&self, path: impl AsRef<Path>) -> Option<String> {
        self.notes.borrow().get(path.as_ref()).cloned()
    }

    pub fn has_folder(&self, path: impl AsRef<Path>) -> bool {
        self.folders.borrow().contains(path.as_ref())
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    fn insert_folders(&self, path: &Path) {
        let mut folders = self.folders.borrow_mut();
        for ancestor in path.ancestors() {
            if !ancestor.as_os_str().is_empty() {
                folders.insert(ancestor.to_path_buf());
            }
        }
    }
}

impl DocumentStore for MemoryVault {
    fn read(&self, path: &Path) -> Result<Option<String>, StoreError> {
        check_relative(path)?;
        Ok(self.notes.borrow().get(path).cloned())
    }

    fn write(&self, path: &Path, content: &str) -> Result<(), StoreError> {
        check_relative(path)?;
        if self.read_only.get() {
            return Err(StoreError::ReadOnly);
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !self.has_folder(parent) {
                return Err(StoreError::MissingFolder(parent.to_path_buf()));
            }
        }
        self.notes
            .borrow_mut()
            .insert(path.to_path_buf(), content.to_string());
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn create_folder(&self, path: &Path) -> Result<(), StoreError> {
        check_relative(path)?;
        self.insert_folders(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_requires_folder() {
        let vault = MemoryVault::new();
        assert!(matches!(
            vault.write(Path::new("Films/d.md"), "x"),
            Err(StoreError::MissingFolder(_))
        ));

        vault.create_folder(Path::new("Films")).unwrap();
        vault.write(Path::new("Films/d.md"), "x").unwrap();
        assert_eq!(vault.note("Films/d.md").as_deref(), Some("x"));
        assert_eq!(vault.write_count(), 1);
    }

    #[test]
    fn test_root_level_write_needs_no_folder() {
        let vault = MemoryVault::new();
        vault.write(Path::new("d.md"), "x").unwrap();
        assert_eq!(vault.read(Path::new("d.md")).unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn test_read_only_keeps_content() {
        let vault = MemoryVault::new().with_note("d.md", "before");
        vault.set_read_only(true);
        assert!(matches!(
            vault.write(Path::new("d.md"), "after"),
            Err(StoreError::ReadOnly)
        ));
        assert_eq!(vault.note("d.md").as_deref(), Some("before"));
    }

    #[test]
    fn test_create_folder_registers_ancestors() {
        let vault = MemoryVault::new();
        vault.create_folder(Path::new("a/b/c")).unwrap();
        assert!(vault.has_folder("a"));
        assert!(vault.has_folder("a/b"));
        assert!(vault.has_folder("a/b/c"));
    }
}
