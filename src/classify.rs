//! Item classification by filename prefix, plus the fixed extension tables the
//! normalizer falls back to.
//!
//! The primary classifier is deliberately crude: the first token of a filename,
//! split on `-`, `_` or a space and case folded, names the group. Files whose
//! whole name would become the key (no separator at all) are left unclassified
//! and end up in the default group downstream.
//!
//! # Examples
//!
//! ```
//! use deskgroup::classify::classify;
//! use deskgroup::item::DesktopItem;
//!
//! let items = vec![
//!     DesktopItem::file("/d/invoice-march.pdf"),
//!     DesktopItem::file("/d/invoice-april.pdf"),
//!     DesktopItem::file("/d/readme.txt"),
//! ];
//! let groups = classify(&items);
//! assert_eq!(groups["invoice"].len(), 2);
//! assert!(!groups.contains_key("readme.txt"));
//! ```

use crate::item::DesktopItem;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Characters that end the group-key token of a filename.
pub const GROUP_SEPARATORS: [char; 3] = ['-', '_', ' '];

/// Group name mapped to its members. Ordered so iteration is deterministic.
pub type Groups = BTreeMap<String, Vec<DesktopItem>>;

/// Derives the candidate group key of a filename.
pub fn group_key(name: &str) -> String {
    name.split(GROUP_SEPARATORS)
        .next()
        .unwrap_or(name)
        .to_lowercase()
}

/// Maps scanned items to named groups.
///
/// Directories are never classified. A file whose key equals its own
/// case-folded name, or whose key is empty, is left out of every group.
pub fn classify(items: &[DesktopItem]) -> Groups {
    let mut groups = Groups::new();

    for item in items.iter().filter(|item| !item.is_directory) {
        let key = group_key(&item.name);
        if key.is_empty() || key == item.name.to_lowercase() {
            tracing::debug!(name = %item.name, "left unclassified");
            continue;
        }
        groups.entry(key).or_default().push(item.clone());
    }

    groups
}

/// Folder a stranded file is routed to by extension alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FallbackCategory {
    /// Word processor documents (DOC, DOCX)
    WordDocuments,
    /// Raster images (JPG, PNG, GIF, WEBP)
    Images,
}

impl FallbackCategory {
    /// Every fallback category.
    pub const ALL: [FallbackCategory; 2] = [FallbackCategory::WordDocuments, FallbackCategory::Images];

    /// Returns the folder name for this category.
    ///
    /// ```
    /// use deskgroup::classify::FallbackCategory;
    ///
    /// assert_eq!(FallbackCategory::Images.dir_name(), "Images");
    /// ```
    pub fn dir_name(&self) -> &'static str {
        match self {
            FallbackCategory::WordDocuments => "Word Documents",
            FallbackCategory::Images => "Images",
        }
    }
}

/// Extension lookups used by plan normalization.
///
/// Holds two tables: the extensions that mark a group name as a misclassified
/// filename, and the small extension-to-folder table for stranded files.
#[derive(Debug, Clone)]
pub struct ExtensionTable {
    recognized: HashSet<String>,
    fallback: HashMap<String, FallbackCategory>,
}

impl ExtensionTable {
    /// Creates a table with the standard mappings.
    pub fn new() -> Self {
        let mut table = Self {
            recognized: HashSet::new(),
            fallback: HashMap::new(),
        };
        table.populate_standard_mappings();
        table
    }

    fn populate_standard_mappings(&mut self) {
        for ext in [
            "lnk", "url", "docx", "doc", "pdf", "txt", "rtf", "md", "odt", "jpg", "jpeg", "png",
            "gif", "bmp", "ico", "svg", "webp", "tiff", "tif", "heic", "xls", "xlsx", "csv",
            "ppt", "pptx", "zip", "rar", "7z", "tar", "gz", "mp3", "wav", "flac", "mp4", "avi",
            "mov", "wmv", "flv", "mkv", "webm", "html", "htm", "css", "js", "json", "xml",
            "exe", "msi", "bat", "cmd", "ps1", "sh", "iso",
        ] {
            self.add_recognized(ext);
        }

        self.add_fallback("doc", FallbackCategory::WordDocuments);
        self.add_fallback("docx", FallbackCategory::WordDocuments);

        self.add_fallback("jpg", FallbackCategory::Images);
        self.add_fallback("jpeg", FallbackCategory::Images);
        self.add_fallback("png", FallbackCategory::Images);
        self.add_fallback("gif", FallbackCategory::Images);
        self.add_fallback("webp", FallbackCategory::Images);
    }

    /// Marks an extension as a known file extension.
    pub fn add_recognized(&mut self, ext: &str) {
        self.recognized.insert(ext.trim_start_matches('.').to_lowercase());
    }

    /// Routes an extension to a fallback folder. Implies [`Self::add_recognized`].
    pub fn add_fallback(&mut self, ext: &str, category: FallbackCategory) {
        let ext = ext.trim_start_matches('.').to_lowercase();
        self.recognized.insert(ext.clone());
        self.fallback.insert(ext, category);
    }

    /// True when `name` ends in a recognized extension, e.g. `"readme.txt"`.
    pub fn ends_with_recognized_extension(&self, name: &str) -> bool {
        match name.rfind('.') {
            Some(dot) if dot + 1 < name.len() => {
                self.recognized.contains(&name[dot + 1..].to_lowercase())
            }
            _ => false,
        }
    }

    /// Looks up the fallback folder for an extension.
    pub fn fallback_for(&self, ext: &str) -> Option<FallbackCategory> {
        self.fallback
            .get(&ext.trim_start_matches('.').to_lowercase())
            .copied()
    }
}

impl Default for ExtensionTable {
    fn default() -> Self {
        Self::new()
    }
}
