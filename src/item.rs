//! Scanned directory entries.

use crate::paths::{self, canonical_key, extension_of};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One direct child of the organized root, captured at scan time.
///
/// Items are never mutated after a scan; a fresh scan supersedes them.
/// Identity is the canonical key of `absolute_path`. An item without a path
/// falls back to its name, which only happens for malformed input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesktopItem {
    /// File or folder name including extension.
    pub name: String,
    /// Absolute path of the entry.
    pub absolute_path: PathBuf,
    /// Whether the entry is a directory.
    pub is_directory: bool,
    /// Lowercased extension without the dot, empty for folders and extensionless files.
    pub extension: String,
}

impl DesktopItem {
    /// Builds an item from its path, deriving name and extension.
    pub fn new(absolute_path: impl Into<PathBuf>, is_directory: bool) -> Self {
        let absolute_path = absolute_path.into();
        let name = paths::file_name_string(&absolute_path).unwrap_or_default();
        let extension = if is_directory {
            String::new()
        } else {
            extension_of(&name)
        };
        Self {
            name,
            absolute_path,
            is_directory,
            extension,
        }
    }

    /// Convenience constructor for a file entry.
    pub fn file(absolute_path: impl Into<PathBuf>) -> Self {
        Self::new(absolute_path, false)
    }

    /// Convenience constructor for a folder entry.
    pub fn folder(absolute_path: impl Into<PathBuf>) -> Self {
        Self::new(absolute_path, true)
    }

    /// True when the scan supplied a usable path.
    pub fn has_path(&self) -> bool {
        !self.absolute_path.as_os_str().is_empty()
    }

    /// Identity key used for every comparison between items and plan entries.
    pub fn key(&self) -> String {
        if self.has_path() {
            canonical_key(&self.absolute_path)
        } else {
            tracing::warn!(name = %self.name, "item has no path, falling back to name identity");
            self.name.to_lowercase()
        }
    }

    /// An item may be planned iff it is a file and not organizer metadata.
    pub fn is_eligible(&self, root: &Path) -> bool {
        !self.is_directory
            && !paths::is_protected_name(&self.name)
            && !paths::is_protected(root, &self.absolute_path)
    }
}
