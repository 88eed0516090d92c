//! In-memory [`FileSystem`] for driving the engine without touching disk.
//! The unit tests run on it; the CLI always uses the real filesystem.
//!
//! Paths are stored exactly as given (case-sensitive, like a Unix filesystem).
//! Symlinks are resolved per component on every lookup, so loops can be built
//! and walked the same way as on disk.

use crate::fs::{EntryInfo, EntryKind, FileSystem};
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

const MAX_SYMLINK_HOPS: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    File(String),
    Dir,
    Symlink(PathBuf),
}

#[derive(Debug, Default)]
struct State {
    nodes: BTreeMap<PathBuf, Node>,
    failing_renames: HashSet<PathBuf>,
    dropped_renames: HashSet<PathBuf>,
    failing_removals: HashSet<PathBuf>,
}

/// A filesystem tree held in a mutex-guarded map.
#[derive(Debug)]
pub struct MemoryFileSystem {
    state: Mutex<State>,
}

impl MemoryFileSystem {
    /// Creates an empty tree containing only `/`.
    pub fn new() -> Self {
        let mut state = State::default();
        state.nodes.insert(PathBuf::from("/"), Node::Dir);
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a directory and any missing parents.
    pub fn add_dir(&self, path: impl AsRef<Path>) -> &Self {
        let mut state = self.lock();
        insert_parents(&mut state, path.as_ref());
        state.nodes.insert(path.as_ref().to_path_buf(), Node::Dir);
        self
    }

    /// Adds a file and any missing parents.
    pub fn add_file(&self, path: impl AsRef<Path>, contents: &str) -> &Self {
        let mut state = self.lock();
        insert_parents(&mut state, path.as_ref());
        state
            .nodes
            .insert(path.as_ref().to_path_buf(), Node::File(contents.to_string()));
        self
    }

    /// Adds a symlink at `link` pointing to the absolute path `target`.
    pub fn add_symlink(&self, link: impl AsRef<Path>, target: impl AsRef<Path>) -> &Self {
        let mut state = self.lock();
        insert_parents(&mut state, link.as_ref());
        state.nodes.insert(
            link.as_ref().to_path_buf(),
            Node::Symlink(target.as_ref().to_path_buf()),
        );
        self
    }

    /// Makes every later rename of `source` fail with `PermissionDenied`.
    pub fn fail_renames_from(&self, source: impl AsRef<Path>) -> &Self {
        self.lock()
            .failing_renames
            .insert(source.as_ref().to_path_buf());
        self
    }

    /// Makes every later rename of `source` report success without moving anything.
    pub fn drop_renames_from(&self, source: impl AsRef<Path>) -> &Self {
        self.lock()
            .dropped_renames
            .insert(source.as_ref().to_path_buf());
        self
    }

    /// Makes every later `remove_dir_all` of `path` fail with `PermissionDenied`.
    pub fn fail_removals_of(&self, path: impl AsRef<Path>) -> &Self {
        self.lock()
            .failing_removals
            .insert(path.as_ref().to_path_buf());
        self
    }

    /// True when a regular file exists at `path`.
    pub fn is_file(&self, path: &Path) -> bool {
        let state = self.lock();
        resolve(&state, path)
            .ok()
            .is_some_and(|resolved| matches!(state.nodes.get(&resolved), Some(Node::File(_))))
    }

    /// Every stored path, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.lock().nodes.keys().cloned().collect()
    }
}

impl Default for MemoryFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

fn insert_parents(state: &mut State, path: &Path) {
    for ancestor in path.ancestors().skip(1) {
        if ancestor.as_os_str().is_empty() {
            continue;
        }
        state
            .nodes
            .entry(ancestor.to_path_buf())
            .or_insert(Node::Dir);
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file or directory: {}", path.display()),
    )
}

/// Follows symlinks component by component. The final path need not exist.
fn resolve(state: &State, path: &Path) -> io::Result<PathBuf> {
    let parts = path
        .components()
        .map(|component| PathBuf::from(component.as_os_str()))
        .collect();
    resolve_parts(state, parts, 0, path)
}

fn resolve_parts(
    state: &State,
    parts: Vec<PathBuf>,
    hops: usize,
    original: &Path,
) -> io::Result<PathBuf> {
    if hops > MAX_SYMLINK_HOPS {
        return Err(io::Error::other(format!(
            "too many levels of symbolic links: {}",
            original.display()
        )));
    }
    let mut current = PathBuf::new();
    for (index, part) in parts.iter().enumerate() {
        if part.as_os_str() == "." {
            continue;
        }
        if part.as_os_str() == ".." {
            current.pop();
            continue;
        }
        current.push(part);
        if let Some(Node::Symlink(target)) = state.nodes.get(&current) {
            // Replay the target's components ahead of the rest of the path.
            let mut replay: Vec<PathBuf> = target
                .components()
                .map(|component| PathBuf::from(component.as_os_str()))
                .collect();
            replay.extend(parts[index + 1..].iter().cloned());
            return resolve_parts(state, replay, hops + 1, original);
        }
    }
    Ok(current)
}

fn require_dir(state: &State, path: &Path) -> io::Result<PathBuf> {
    let resolved = resolve(state, path)?;
    match state.nodes.get(&resolved) {
        Some(Node::Dir) => Ok(resolved),
        Some(_) => Err(io::Error::other(format!(
            "not a directory: {}",
            path.display()
        ))),
        None => Err(not_found(path)),
    }
}

fn kind_of(state: &State, path: &Path) -> EntryKind {
    match resolve(state, path).map(|resolved| state.nodes.get(&resolved).cloned()) {
        Ok(Some(Node::Dir)) => EntryKind::Directory,
        Ok(Some(Node::File(_))) => EntryKind::File,
        _ => EntryKind::Other,
    }
}

impl FileSystem for MemoryFileSystem {
    fn exists(&self, path: &Path) -> bool {
        let state = self.lock();
        resolve(&state, path)
            .ok()
            .is_some_and(|resolved| state.nodes.contains_key(&resolved))
    }

    fn is_dir(&self, path: &Path) -> bool {
        let state = self.lock();
        kind_of(&state, path) == EntryKind::Directory
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut state = self.lock();
        let resolved = resolve(&state, path)?;
        let mut current = PathBuf::new();
        for component in resolved.components() {
            current.push(component.as_os_str());
            match state.nodes.get(&current) {
                Some(Node::Dir) => {}
                Some(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("file exists: {}", current.display()),
                    ));
                }
                None => {
                    state.nodes.insert(current.clone(), Node::Dir);
                }
            }
        }
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut state = self.lock();
        if state.failing_renames.contains(from) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("permission denied: {}", from.display()),
            ));
        }
        if state.dropped_renames.contains(from) {
            return Ok(());
        }
        if !state.nodes.contains_key(from) {
            return Err(not_found(from));
        }
        let resolved_to = resolve(&state, to)?;
        if state.nodes.contains_key(&resolved_to) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("destination already exists: {}", to.display()),
            ));
        }
        if let Some(parent) = resolved_to.parent() {
            require_dir(&state, parent)?;
        }

        let moved: Vec<PathBuf> = state
            .nodes
            .keys()
            .filter(|key| key.starts_with(from))
            .cloned()
            .collect();
        for old in moved {
            if let Some(node) = state.nodes.remove(&old) {
                let suffix = old.strip_prefix(from).map(Path::to_path_buf).unwrap_or_default();
                let new_path = if suffix.as_os_str().is_empty() {
                    resolved_to.clone()
                } else {
                    resolved_to.join(suffix)
                };
                state.nodes.insert(new_path, node);
            }
        }
        Ok(())
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<EntryInfo>> {
        let state = self.lock();
        let resolved = require_dir(&state, path)?;
        let mut entries: Vec<EntryInfo> = state
            .nodes
            .iter()
            .filter(|(key, _)| key.parent() == Some(resolved.as_path()))
            .filter_map(|(key, node)| {
                let name = key.file_name()?.to_string_lossy().into_owned();
                let entry_path = path.join(&name);
                Some(EntryInfo {
                    kind: kind_of(&state, key),
                    is_symlink: matches!(node, Node::Symlink(_)),
                    path: entry_path,
                    name,
                })
            })
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut state = self.lock();
        if state.failing_removals.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("permission denied: {}", path.display()),
            ));
        }
        match state.nodes.get(path) {
            Some(Node::Symlink(_)) => {
                state.nodes.remove(path);
                return Ok(());
            }
            Some(Node::Dir) => {}
            Some(Node::File(_)) => {
                return Err(io::Error::other(format!(
                    "not a directory: {}",
                    path.display()
                )));
            }
            None => return Err(not_found(path)),
        }
        state.nodes.retain(|key, _| !key.starts_with(path));
        Ok(())
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let state = self.lock();
        let resolved = resolve(&state, path)?;
        match state.nodes.get(&resolved) {
            Some(Node::File(contents)) => Ok(contents.clone()),
            Some(_) => Err(io::Error::other(format!(
                "not a file: {}",
                path.display()
            ))),
            None => Err(not_found(path)),
        }
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        let mut state = self.lock();
        let resolved = resolve(&state, path)?;
        if let Some(parent) = resolved.parent() {
            require_dir(&state, parent)?;
        }
        if matches!(state.nodes.get(&resolved), Some(Node::Dir)) {
            return Err(io::Error::other(format!(
                "is a directory: {}",
                path.display()
            )));
        }
        state.nodes.insert(resolved, Node::File(contents.to_string()));
        Ok(())
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        let state = self.lock();
        let resolved = resolve(&state, path)?;
        if state.nodes.contains_key(&resolved) {
            Ok(resolved)
        } else {
            Err(not_found(path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_file_creates_parents() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/d/a/b.txt", "x");
        assert!(fs.is_dir(Path::new("/d/a")));
        assert!(fs.is_file(Path::new("/d/a/b.txt")));
        assert_eq!(fs.read_to_string(Path::new("/d/a/b.txt")).unwrap(), "x");
    }

    #[test]
    fn test_rename_moves_subtree() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/d/src/inner/x.txt", "x").add_dir("/d/dst");
        fs.rename(Path::new("/d/src"), Path::new("/d/dst/moved"))
            .unwrap();
        assert!(fs.is_file(Path::new("/d/dst/moved/inner/x.txt")));
        assert!(!fs.exists(Path::new("/d/src")));
    }

    #[test]
    fn test_rename_refuses_existing_destination() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/d/a.txt", "a").add_file("/d/b.txt", "b");
        let err = fs
            .rename(Path::new("/d/a.txt"), Path::new("/d/b.txt"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_rename_requires_destination_parent() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/d/a.txt", "a");
        assert!(fs
            .rename(Path::new("/d/a.txt"), Path::new("/d/missing/a.txt"))
            .is_err());
        assert!(fs.is_file(Path::new("/d/a.txt")));
    }

    #[test]
    fn test_injected_failures() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/d/a.txt", "a")
            .add_file("/d/b.txt", "b")
            .add_dir("/d/x")
            .fail_renames_from("/d/a.txt")
            .drop_renames_from("/d/b.txt");

        assert_eq!(
            fs.rename(Path::new("/d/a.txt"), Path::new("/d/x/a.txt"))
                .unwrap_err()
                .kind(),
            io::ErrorKind::PermissionDenied
        );
        fs.rename(Path::new("/d/b.txt"), Path::new("/d/x/b.txt"))
            .unwrap();
        assert!(fs.is_file(Path::new("/d/b.txt")));
        assert!(!fs.exists(Path::new("/d/x/b.txt")));
    }

    #[test]
    fn test_read_dir_follows_symlinks() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/d/real/f.txt", "f")
            .add_symlink("/d/link", "/d/real");

        let entries = fs.read_dir(Path::new("/d")).unwrap();
        let link = entries.iter().find(|e| e.name == "link").unwrap();
        assert!(link.is_dir());
        assert!(link.is_symlink);

        let through = fs.read_dir(Path::new("/d/link")).unwrap();
        assert_eq!(through[0].path, PathBuf::from("/d/link/f.txt"));
        assert_eq!(
            fs.canonicalize(Path::new("/d/link/f.txt")).unwrap(),
            PathBuf::from("/d/real/f.txt")
        );
    }

    #[test]
    fn test_symlink_loop_is_an_error() {
        let fs = MemoryFileSystem::new();
        fs.add_symlink("/d/a", "/d/b").add_symlink("/d/b", "/d/a");
        assert!(fs.canonicalize(Path::new("/d/a/x")).is_err());
        assert!(!fs.exists(Path::new("/d/a")));
    }

    #[test]
    fn test_remove_dir_all_removes_subtree_only() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/d/x/a.txt", "a").add_file("/d/xy.txt", "b");
        fs.remove_dir_all(Path::new("/d/x")).unwrap();
        assert!(!fs.exists(Path::new("/d/x/a.txt")));
        assert!(fs.is_file(Path::new("/d/xy.txt")));
    }

    #[test]
    fn test_create_dir_all_over_file_fails() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/d/a", "a");
        assert!(fs.create_dir_all(Path::new("/d/a/b")).is_err());
        fs.create_dir_all(Path::new("/d/c/e")).unwrap();
        fs.create_dir_all(Path::new("/d/c/e")).unwrap();
        assert!(fs.is_dir(Path::new("/d/c/e")));
    }
}
