//! Filesystem capability used by the executor, baseline store and restore engine.
//!
//! Every call is atomic from the engine's point of view and reports failure
//! through `io::Result`. Production code uses [`RealFileSystem`]; tests and dry
//! runs use [`crate::memory::MemoryFileSystem`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Kind of a directory entry, with symlinks resolved to their target kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Other,
}

/// One entry returned by [`FileSystem::read_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub path: PathBuf,
    pub name: String,
    pub kind: EntryKind,
    pub is_symlink: bool,
}

impl EntryInfo {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Filesystem primitives the engine depends on.
pub trait FileSystem {
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    /// Creates a directory and its parents. Succeeds when it already exists.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
    /// Moves a file or directory. Must not overwrite an existing destination.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    /// Direct children of a directory, sorted by path.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<EntryInfo>>;
    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;
    /// Resolves symlinks; used as the visited-set key during recursive walks.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;
}

/// [`FileSystem`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        if to.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("destination already exists: {}", to.display()),
            ));
        }
        fs::rename(from, to)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<EntryInfo>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let entry_path = entry.path();
            let is_symlink = entry.file_type()?.is_symlink();
            // Follow symlinks for the kind; a dangling link is neither file nor folder.
            let kind = match fs::metadata(&entry_path) {
                Ok(meta) if meta.is_dir() => EntryKind::Directory,
                Ok(meta) if meta.is_file() => EntryKind::File,
                _ => EntryKind::Other,
            };
            entries.push(EntryInfo {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry_path,
                kind,
                is_symlink,
            });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        if fs::symlink_metadata(path)?.file_type().is_symlink() {
            return fs::remove_file(path);
        }
        fs::remove_dir_all(path)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        fs::write(path, contents)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rename_refuses_to_overwrite() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let a = temp_dir.path().join("a.txt");
        let b = temp_dir.path().join("b.txt");
        fs::write(&a, "a").expect("Failed to write a");
        fs::write(&b, "b").expect("Failed to write b");

        let result = RealFileSystem.rename(&a, &b);
        assert_eq!(
            result.expect_err("rename should fail").kind(),
            io::ErrorKind::AlreadyExists
        );
        assert_eq!(fs::read_to_string(&b).unwrap(), "b");
    }

    #[test]
    fn test_read_dir_reports_kinds_sorted() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir(temp_dir.path().join("b_dir")).unwrap();
        fs::write(temp_dir.path().join("a.txt"), "a").unwrap();

        let entries = RealFileSystem.read_dir(temp_dir.path()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.txt");
        assert!(entries[0].is_file());
        assert!(entries[1].is_dir());
    }

    #[test]
    fn test_create_dir_all_is_idempotent() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = temp_dir.path().join("x").join("y");
        RealFileSystem.create_dir_all(&dir).unwrap();
        RealFileSystem.create_dir_all(&dir).unwrap();
        assert!(dir.is_dir());
    }
}
