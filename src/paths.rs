//! Path identity and protected-location helpers.
//!
//! Every stage of the pipeline compares paths through [`canonical_key`] so that
//! `C:\Users\me\Desktop\A.txt` and `c:/users/me/desktop/a.txt` are the same item.
//! The organizer keeps its own metadata under `<root>/.desktop`; anything there,
//! and the metadata files themselves wherever they appear, is protected and must
//! never be scanned, grouped, moved or restored.

use std::path::{Component, Path, PathBuf};

/// Name of the metadata folder created directly under the organized root.
pub const METADATA_DIR: &str = ".desktop";

/// File name of the persisted baseline snapshot.
pub const BASELINE_FILE: &str = ".desktop_organizer_baseline.json";

/// File name of the persisted run history.
pub const HISTORY_FILE: &str = ".desktop_organizer_history.json";

/// Returns the identity key of a path: separators normalized to `/`, repeated
/// and trailing separators removed, case folded.
///
/// # Examples
///
/// ```
/// use deskgroup::paths::canonical_key_str;
///
/// assert_eq!(canonical_key_str("C:\\Users\\Me\\Desktop\\"), "c:/users/me/desktop");
/// assert_eq!(canonical_key_str("/home//me/A.txt"), "/home/me/a.txt");
/// ```
pub fn canonical_key_str(raw: &str) -> String {
    let replaced = raw.trim().replace('\\', "/");
    let mut key = String::with_capacity(replaced.len());
    let mut previous_was_separator = false;

    for ch in replaced.chars() {
        if ch == '/' {
            if previous_was_separator {
                continue;
            }
            previous_was_separator = true;
        } else {
            previous_was_separator = false;
        }
        key.push(ch);
    }

    while key.len() > 1 && key.ends_with('/') {
        key.pop();
    }

    key.to_lowercase()
}

/// Returns the identity key of a path. See [`canonical_key_str`].
pub fn canonical_key(path: &Path) -> String {
    canonical_key_str(&path.to_string_lossy())
}

/// True when both paths refer to the same item under case-folded comparison.
pub fn same_path(a: &Path, b: &Path) -> bool {
    canonical_key(a) == canonical_key(b)
}

/// Strips trailing separators and `.` components without touching the filesystem.
pub fn clean_root(root: &Path) -> PathBuf {
    root.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

/// The organizer's metadata folder for a root.
pub fn metadata_dir(root: &Path) -> PathBuf {
    root.join(METADATA_DIR)
}

/// Location of the baseline snapshot for a root.
pub fn baseline_path(root: &Path) -> PathBuf {
    metadata_dir(root).join(BASELINE_FILE)
}

/// Location of the run history for a root.
pub fn history_path(root: &Path) -> PathBuf {
    metadata_dir(root).join(HISTORY_FILE)
}

/// True for the organizer's own metadata file names.
pub fn is_protected_name(name: &str) -> bool {
    name == BASELINE_FILE || name == HISTORY_FILE
}

/// True when `path` is the metadata folder of `root`, lies inside it, or is
/// named like one of the metadata files.
pub fn is_protected(root: &Path, path: &Path) -> bool {
    if let Some(name) = file_name_string(path)
        && is_protected_name(&name)
    {
        return true;
    }

    let metadata_key = canonical_key(&metadata_dir(root));
    let key = canonical_key(path);
    key == metadata_key || key.starts_with(&format!("{metadata_key}/"))
}

/// The final component of a path as an owned string.
pub fn file_name_string(path: &Path) -> Option<String> {
    path.file_name().map(|name| name.to_string_lossy().into_owned())
}

/// Number of components in a path, ignoring `.` components.
pub fn depth(path: &Path) -> usize {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .count()
}

/// True when `destination` has exactly the shape `<root>/<folder>/<filename>`.
pub fn destination_depth_ok(root: &Path, destination: &Path) -> bool {
    if depth(destination) != depth(root) + 2 {
        return false;
    }
    destination
        .parent()
        .and_then(Path::parent)
        .is_some_and(|grandparent| same_path(grandparent, root))
}

/// The folder a destination lands in (its parent directory).
pub fn destination_folder(destination: &Path) -> Option<&Path> {
    destination.parent()
}

/// File extension of a name, lowercased, without the dot. Empty when absent.
pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Name without its final extension, lowercased.
pub fn base_name_of(name: &str) -> String {
    match name.rfind('.') {
        Some(dot) if dot > 0 => name[..dot].to_lowercase(),
        _ => name.to_lowercase(),
    }
}
