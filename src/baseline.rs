//! Baseline snapshots: the root's direct children as they were right before
//! the first mutation of an organize run.
//!
//! The snapshot is persisted as a single JSON array of
//! `{absolutePath, filename, isFile, isFolder}` objects sorted by path, under
//! the protected metadata folder. Each organize run overwrites it; restore only
//! ever reads it.

use crate::error::BaselineError;
use crate::fs::FileSystem;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One direct child of the root at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineEntry {
    pub absolute_path: PathBuf,
    pub filename: String,
    pub is_file: bool,
    pub is_folder: bool,
}

/// Ordered baseline entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BaselineSnapshot {
    entries: Vec<BaselineEntry>,
}

impl BaselineSnapshot {
    /// Builds a snapshot from entries, sorting them by path.
    pub fn new(mut entries: Vec<BaselineEntry>) -> Self {
        entries.sort_by(|a, b| a.absolute_path.cmp(&b.absolute_path));
        Self { entries }
    }

    /// Records the root's direct children, skipping protected entries and
    /// anything that is neither a file nor a folder (e.g. dangling links).
    pub fn capture(fs: &dyn FileSystem, root: &Path) -> Result<Self, BaselineError> {
        let children = fs.read_dir(root).map_err(|source| BaselineError::Io {
            path: root.to_path_buf(),
            source,
        })?;

        let entries = children
            .into_iter()
            .filter(|entry| !paths::is_protected(root, &entry.path))
            .filter(|entry| entry.is_file() || entry.is_dir())
            .map(|entry| BaselineEntry {
                is_file: entry.is_file(),
                is_folder: entry.is_dir(),
                absolute_path: entry.path,
                filename: entry.name,
            })
            .collect();

        Ok(Self::new(entries))
    }

    pub fn entries(&self) -> &[BaselineEntry] {
        &self.entries
    }

    pub fn files(&self) -> impl Iterator<Item = &BaselineEntry> {
        self.entries.iter().filter(|entry| entry.is_file)
    }

    pub fn folders(&self) -> impl Iterator<Item = &BaselineEntry> {
        self.entries.iter().filter(|entry| entry.is_folder)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reads and writes the baseline of one root through a [`FileSystem`].
pub struct BaselineStore<'a> {
    fs: &'a dyn FileSystem,
    root: PathBuf,
}

impl<'a> BaselineStore<'a> {
    pub fn new(fs: &'a dyn FileSystem, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
        }
    }

    /// Location of the persisted snapshot.
    pub fn path(&self) -> PathBuf {
        paths::baseline_path(&self.root)
    }

    pub fn exists(&self) -> bool {
        self.fs.exists(&self.path())
    }

    /// Writes the snapshot, creating the metadata folder when needed.
    pub fn save(&self, snapshot: &BaselineSnapshot) -> Result<PathBuf, BaselineError> {
        let path = self.path();
        let metadata_dir = paths::metadata_dir(&self.root);
        self.fs
            .create_dir_all(&metadata_dir)
            .map_err(|source| BaselineError::Io {
                path: metadata_dir.clone(),
                source,
            })?;

        let json = serde_json::to_string_pretty(snapshot).map_err(|e| BaselineError::Corrupt {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        self.fs
            .write(&path, &json)
            .map_err(|source| BaselineError::Io {
                path: path.clone(),
                source,
            })?;

        tracing::info!(path = %path.display(), entries = snapshot.len(), "baseline saved");
        Ok(path)
    }

    /// Captures the root's current state and saves it.
    pub fn capture_and_save(&self) -> Result<BaselineSnapshot, BaselineError> {
        let snapshot = BaselineSnapshot::capture(self.fs, &self.root)?;
        self.save(&snapshot)?;
        Ok(snapshot)
    }

    /// Loads the snapshot. Missing, empty or unparsable files are errors.
    pub fn load(&self) -> Result<BaselineSnapshot, BaselineError> {
        let path = self.path();
        if !self.fs.exists(&path) {
            return Err(BaselineError::Missing { path });
        }

        let contents = self
            .fs
            .read_to_string(&path)
            .map_err(|source| BaselineError::Io {
                path: path.clone(),
                source,
            })?;
        if contents.trim().is_empty() {
            return Err(BaselineError::Empty { path });
        }

        let entries: Vec<BaselineEntry> =
            serde_json::from_str(&contents).map_err(|e| BaselineError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let total = entries.len();
        let entries: Vec<BaselineEntry> = entries
            .into_iter()
            .filter(|entry| !paths::is_protected(&self.root, &entry.absolute_path))
            .collect();
        if entries.len() < total {
            tracing::warn!(
                dropped = total - entries.len(),
                "baseline listed protected entries, ignoring them"
            );
        }

        if entries.is_empty() {
            return Err(BaselineError::Empty { path });
        }
        Ok(BaselineSnapshot::new(entries))
    }
}
