//! Reverses an organize run using the persisted baseline.
//!
//! Files are matched back to their baseline entry by file name only, found
//! anywhere under the root. Folders that exist now but were not direct
//! children at baseline time are treated as organizer-created and deleted.
//! Folders nested inside a baseline folder belong to the user and are left alone.

use crate::baseline::{BaselineEntry, BaselineStore};
use crate::error::{OperationError, RestoreError};
use crate::fs::FileSystem;
use crate::paths::{self, canonical_key};
use crate::plan::FileMove;
use crate::shell::ShellNotifier;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Outcome of a restore that moved at least one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Files moved back, as `current -> original` moves.
    pub restored: Vec<FileMove>,
    /// Baseline files already at their original path.
    pub already_in_place: usize,
    /// Baseline files found nowhere under the root; treated as deleted.
    pub missing: Vec<PathBuf>,
    pub folders_deleted: Vec<PathBuf>,
    pub errors: Vec<OperationError>,
    pub shell_notified: bool,
}

impl RestoreReport {
    pub fn files_restored(&self) -> usize {
        self.restored.len()
    }

    pub fn skipped(&self) -> usize {
        self.already_in_place + self.missing.len()
    }

    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Everything currently under the root, found by a symlink-safe walk.
#[derive(Debug, Default)]
struct Tree {
    files: Vec<PathBuf>,
    folders: Vec<PathBuf>,
}

/// Clears the in-progress flag when dropped.
struct RestoreGuard<'g> {
    flag: &'g AtomicBool,
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Restores one root from its baseline.
///
/// Only one restore runs per engine at a time; overlapping calls are rejected,
/// not queued.
pub struct RestoreEngine<'a> {
    fs: &'a dyn FileSystem,
    notifier: &'a dyn ShellNotifier,
    root: PathBuf,
    in_progress: AtomicBool,
}

impl<'a> RestoreEngine<'a> {
    pub fn new(
        fs: &'a dyn FileSystem,
        notifier: &'a dyn ShellNotifier,
        root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fs,
            notifier,
            root: root.into(),
            in_progress: AtomicBool::new(false),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    fn begin(&self) -> Option<RestoreGuard<'_>> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RestoreGuard {
                flag: &self.in_progress,
            })
    }

    /// Moves files back to their baseline locations and deletes
    /// organizer-created folders.
    ///
    /// Fails before touching anything when the baseline is missing, empty or
    /// corrupt. Fails after cleanup when not a single file was restored.
    pub fn restore(&self) -> Result<RestoreReport, RestoreError> {
        let Some(_guard) = self.begin() else {
            tracing::warn!("restore already in progress, ignoring request");
            return Err(RestoreError::AlreadyInProgress);
        };

        if !self.fs.is_dir(&self.root) {
            return Err(RestoreError::RootMissing {
                root: self.root.clone(),
            });
        }

        let baseline = BaselineStore::new(self.fs, self.root.as_path())
            .load()
            .inspect_err(|e| tracing::error!(error = %e, "cannot restore"))?;
        tracing::info!(root = %self.root.display(), entries = baseline.len(), "restoring");

        let baseline_folders: HashSet<String> = baseline
            .folders()
            .map(|entry| canonical_key(&entry.absolute_path))
            .collect();

        let mut report = RestoreReport::default();
        let tree = self.walk();
        let mut candidates = self.index_candidates(&tree.files, &baseline_folders);

        for entry in baseline.files() {
            self.restore_file(entry, &mut candidates, &mut report);
        }

        self.delete_created_folders(&baseline_folders, &mut report);

        if report.restored.is_empty() {
            tracing::error!(
                skipped = report.skipped(),
                folders_deleted = report.folders_deleted.len(),
                errors = report.errors.len(),
                "restore moved nothing back"
            );
            return Err(RestoreError::NothingRestored {
                skipped: report.skipped(),
                folders_deleted: report.folders_deleted.len(),
                errors: report.errors.len(),
            });
        }

        match self.notifier.notify(&self.root) {
            Ok(()) => report.shell_notified = true,
            Err(e) => tracing::warn!(error = %e, "shell refresh failed"),
        }
        tracing::info!(
            restored = report.files_restored(),
            skipped = report.skipped(),
            folders_deleted = report.folders_deleted.len(),
            "restore finished"
        );
        Ok(report)
    }

    fn restore_file(
        &self,
        entry: &BaselineEntry,
        candidates: &mut BTreeMap<String, Vec<PathBuf>>,
        report: &mut RestoreReport,
    ) {
        let original = &entry.absolute_path;
        let original_key = canonical_key(original);
        let matches = candidates.entry(entry.filename.clone()).or_default();
        matches.retain(|path| canonical_key(path) != original_key);

        if self.fs.exists(original) {
            if self.fs.is_dir(original) {
                tracing::warn!(path = %original.display(), "a folder now occupies a file's original path");
                report.errors.push(OperationError::Restore {
                    path: original.clone(),
                    reason: "a folder occupies the original path".to_string(),
                });
            } else {
                tracing::debug!(path = %original.display(), "already in place");
                report.already_in_place += 1;
            }
            return;
        }

        if matches.is_empty() {
            tracing::debug!(file = %entry.filename, "not found, treating as deleted");
            report.missing.push(original.clone());
            return;
        }
        let current = matches.remove(0);

        if let Some(parent) = original.parent()
            && let Err(e) = self.fs.create_dir_all(parent)
        {
            report.errors.push(OperationError::Restore {
                path: original.clone(),
                reason: e.to_string(),
            });
            return;
        }

        match self.fs.rename(&current, original) {
            Ok(()) => {
                tracing::info!(from = %current.display(), to = %original.display(), "restored");
                report.restored.push(FileMove::new(current, original.clone()));
            }
            Err(e) => {
                tracing::warn!(from = %current.display(), error = %e, "restore move failed");
                report.errors.push(OperationError::Restore {
                    path: current,
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Files by exact name. Candidates outside baseline folders come first so
    /// organizer-created folders are drained before pre-existing ones.
    fn index_candidates(
        &self,
        files: &[PathBuf],
        baseline_folders: &HashSet<String>,
    ) -> BTreeMap<String, Vec<PathBuf>> {
        let mut index: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        for file in files {
            if let Some(name) = paths::file_name_string(file) {
                index.entry(name).or_default().push(file.clone());
            }
        }
        for matches in index.values_mut() {
            matches.sort_by_key(|path| (self.inside_any(path, baseline_folders), path.clone()));
        }
        index
    }

    /// True when an ancestor of `path` below the root is one of `folders`.
    fn inside_any(&self, path: &Path, folders: &HashSet<String>) -> bool {
        let root_key = canonical_key(&self.root);
        path.ancestors()
            .skip(1)
            .map(canonical_key)
            .take_while(|key| *key != root_key)
            .any(|key| folders.contains(&key))
    }

    fn delete_created_folders(&self, baseline_folders: &HashSet<String>, report: &mut RestoreReport) {
        // Folders still holding a file that failed to move back are kept.
        let held: Vec<PathBuf> = report
            .errors
            .iter()
            .filter_map(|error| match error {
                OperationError::Restore { path, .. } => Some(path.clone()),
                _ => None,
            })
            .collect();

        let tree = self.walk();
        let mut deleted: HashSet<String> = HashSet::new();

        for folder in tree.folders {
            let key = canonical_key(&folder);
            if baseline_folders.contains(&key)
                || self.inside_any(&folder, baseline_folders)
                || self.inside_any(&folder, &deleted)
            {
                continue;
            }
            if held.iter().any(|file| file.starts_with(&folder)) {
                tracing::warn!(folder = %folder.display(), "keeping folder that still holds unrestored files");
                continue;
            }

            match self.fs.remove_dir_all(&folder) {
                Ok(()) => {
                    tracing::info!(folder = %folder.display(), "deleted folder not in baseline");
                    deleted.insert(key);
                    report.folders_deleted.push(folder);
                }
                Err(e) => report.errors.push(OperationError::FolderCleanup {
                    path: folder,
                    reason: e.to_string(),
                }),
            }
        }
    }

    /// Recursive walk from the root that follows symlinked folders once and
    /// never enters the metadata folder.
    fn walk(&self) -> Tree {
        let mut tree = Tree::default();
        let mut visited: HashSet<PathBuf> = HashSet::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let identity = self.fs.canonicalize(&dir).unwrap_or_else(|_| dir.clone());
            if !visited.insert(identity) {
                tracing::debug!(dir = %dir.display(), "already visited, skipping");
                continue;
            }

            let entries = match self.fs.read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "cannot read folder");
                    continue;
                }
            };

            for entry in entries {
                if paths::is_protected(&self.root, &entry.path) {
                    continue;
                }
                if entry.is_dir() {
                    tree.folders.push(entry.path.clone());
                    pending.push(entry.path);
                } else if entry.is_file() {
                    tree.files.push(entry.path);
                }
            }
        }

        tree.files.sort();
        tree.folders.sort();
        tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::BaselineSnapshot;
    use crate::memory::MemoryFileSystem;
    use crate::shell::{NullNotifier, RecordingNotifier};

    fn save_baseline(fs: &MemoryFileSystem) {
        BaselineStore::new(fs, "/d").capture_and_save().unwrap();
    }

    #[test]
    fn test_restore_moves_file_back_and_deletes_created_folder() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/d/X.txt", "x");
        save_baseline(&fs);
        fs.add_dir("/d/invoice");
        fs.rename(Path::new("/d/X.txt"), Path::new("/d/invoice/X.txt"))
            .unwrap();

        let notifier = RecordingNotifier::default();
        let report = RestoreEngine::new(&fs, &notifier, "/d").restore().unwrap();

        assert_eq!(report.files_restored(), 1);
        assert_eq!(report.folders_deleted, vec![PathBuf::from("/d/invoice")]);
        assert!(fs.is_file(Path::new("/d/X.txt")));
        assert!(!fs.exists(Path::new("/d/invoice")));
        assert_eq!(notifier.calls().len(), 1);
    }

    #[test]
    fn test_preexisting_folders_and_their_contents_survive() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/d/a.txt", "a")
            .add_file("/d/C/nested/keep.txt", "k");
        save_baseline(&fs);
        fs.add_dir("/d/Unsorted");
        fs.rename(Path::new("/d/a.txt"), Path::new("/d/Unsorted/a.txt"))
            .unwrap();

        let report = RestoreEngine::new(&fs, &NullNotifier, "/d").restore().unwrap();
        assert_eq!(report.folders_deleted, vec![PathBuf::from("/d/Unsorted")]);
        assert!(fs.is_file(Path::new("/d/C/nested/keep.txt")));
        assert!(fs.is_dir(Path::new("/d/C/nested")));
    }

    #[test]
    fn test_file_moved_into_existing_folder_comes_back() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/d/invoice-1.pdf", "1").add_dir("/d/invoice");
        save_baseline(&fs);
        fs.rename(
            Path::new("/d/invoice-1.pdf"),
            Path::new("/d/invoice/invoice-1.pdf"),
        )
        .unwrap();

        let report = RestoreEngine::new(&fs, &NullNotifier, "/d").restore().unwrap();
        assert_eq!(report.files_restored(), 1);
        assert!(report.folders_deleted.is_empty());
        assert!(fs.is_dir(Path::new("/d/invoice")));
    }

    #[test]
    fn test_missing_files_are_skipped_not_errors() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/d/a.txt", "a").add_file("/d/gone.txt", "g");
        save_baseline(&fs);
        fs.add_dir("/d/x");
        fs.rename(Path::new("/d/a.txt"), Path::new("/d/x/a.txt"))
            .unwrap();
        fs.rename(Path::new("/d/gone.txt"), Path::new("/d/x/gone.txt"))
            .unwrap();
        fs.remove_dir_all(Path::new("/d/x")).ok();
        fs.add_file("/d/x/a.txt", "a");

        let report = RestoreEngine::new(&fs, &NullNotifier, "/d").restore().unwrap();
        assert_eq!(report.files_restored(), 1);
        assert_eq!(report.missing, vec![PathBuf::from("/d/gone.txt")]);
        assert!(report.success());
    }

    #[test]
    fn test_second_restore_changes_nothing_and_fails_loudly() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/d/a.txt", "a").add_dir("/d/C");
        save_baseline(&fs);
        fs.add_dir("/d/Unsorted");
        fs.rename(Path::new("/d/a.txt"), Path::new("/d/Unsorted/a.txt"))
            .unwrap();

        let engine = RestoreEngine::new(&fs, &NullNotifier, "/d");
        engine.restore().unwrap();
        let after_first = fs.paths();

        let err = engine.restore().unwrap_err();
        assert!(matches!(
            err,
            RestoreError::NothingRestored {
                skipped: 1,
                folders_deleted: 0,
                errors: 0
            }
        ));
        assert_eq!(fs.paths(), after_first);
    }

    #[test]
    fn test_bad_baseline_touches_nothing() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/d/Unsorted/a.txt", "a");
        let before = fs.paths();
        let engine = RestoreEngine::new(&fs, &NullNotifier, "/d");

        assert!(matches!(
            engine.restore().unwrap_err(),
            RestoreError::Baseline(crate::error::BaselineError::Missing { .. })
        ));

        fs.add_file("/d/.desktop/.desktop_organizer_baseline.json", "garbage");
        assert!(matches!(
            engine.restore().unwrap_err(),
            RestoreError::Baseline(crate::error::BaselineError::Corrupt { .. })
        ));

        let mut expected = before;
        expected.push(PathBuf::from("/d/.desktop"));
        expected.push(PathBuf::from("/d/.desktop/.desktop_organizer_baseline.json"));
        expected.sort();
        assert_eq!(fs.paths(), expected);
    }

    #[test]
    fn test_missing_root() {
        let fs = MemoryFileSystem::new();
        let err = RestoreEngine::new(&fs, &NullNotifier, "/nope")
            .restore()
            .unwrap_err();
        assert!(matches!(err, RestoreError::RootMissing { .. }));
    }

    #[test]
    fn test_overlapping_restore_is_rejected() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/d/a.txt", "a");
        save_baseline(&fs);
        let engine = RestoreEngine::new(&fs, &NullNotifier, "/d");

        let guard = engine.begin().unwrap();
        assert!(engine.is_in_progress());
        assert!(matches!(
            engine.restore().unwrap_err(),
            RestoreError::AlreadyInProgress
        ));
        drop(guard);
        assert!(!engine.is_in_progress());
    }

    #[test]
    fn test_metadata_folder_is_never_deleted_or_searched() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/d/a.txt", "a");
        save_baseline(&fs);
        fs.add_dir("/d/Unsorted");
        fs.rename(Path::new("/d/a.txt"), Path::new("/d/Unsorted/a.txt"))
            .unwrap();
        fs.add_file("/d/.desktop/a.txt", "decoy");

        let report = RestoreEngine::new(&fs, &NullNotifier, "/d").restore().unwrap();
        assert_eq!(report.restored[0].source_path, PathBuf::from("/d/Unsorted/a.txt"));
        assert!(fs.is_file(Path::new("/d/.desktop/a.txt")));
        assert!(BaselineStore::new(&fs, "/d").exists());
    }

    #[test]
    fn test_symlink_loop_is_walked_once() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/d/a.txt", "a");
        save_baseline(&fs);
        fs.add_dir("/d/Unsorted");
        fs.rename(Path::new("/d/a.txt"), Path::new("/d/Unsorted/a.txt"))
            .unwrap();
        fs.add_symlink("/d/Unsorted/again", "/d/Unsorted");

        let report = RestoreEngine::new(&fs, &NullNotifier, "/d").restore().unwrap();
        assert_eq!(report.files_restored(), 1);
        assert!(fs.is_file(Path::new("/d/a.txt")));
        assert!(!fs.exists(Path::new("/d/Unsorted")));
    }

    #[test]
    fn test_failed_restore_keeps_its_folder() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/d/a.txt", "a").add_file("/d/b.txt", "b");
        save_baseline(&fs);
        fs.add_dir("/d/Unsorted").add_dir("/d/other");
        fs.rename(Path::new("/d/a.txt"), Path::new("/d/Unsorted/a.txt"))
            .unwrap();
        fs.rename(Path::new("/d/b.txt"), Path::new("/d/other/b.txt"))
            .unwrap();
        fs.fail_renames_from("/d/Unsorted/a.txt");

        let report = RestoreEngine::new(&fs, &NullNotifier, "/d").restore().unwrap();
        assert!(!report.success());
        assert_eq!(report.files_restored(), 1);
        assert!(fs.is_file(Path::new("/d/Unsorted/a.txt")));
        assert!(!fs.exists(Path::new("/d/other")));
    }

    #[test]
    fn test_cleanup_failure_is_recorded_next_to_restore_failure() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/d/a.txt", "a").add_file("/d/b.txt", "b");
        save_baseline(&fs);
        fs.add_dir("/d/Unsorted").add_dir("/d/other").add_dir("/d/locked");
        fs.rename(Path::new("/d/a.txt"), Path::new("/d/Unsorted/a.txt"))
            .unwrap();
        fs.rename(Path::new("/d/b.txt"), Path::new("/d/other/b.txt"))
            .unwrap();
        fs.fail_renames_from("/d/Unsorted/a.txt")
            .fail_removals_of("/d/locked");

        let report = RestoreEngine::new(&fs, &NullNotifier, "/d").restore().unwrap();

        assert_eq!(report.files_restored(), 1);
        assert_eq!(report.errors.len(), 2);
        assert!(matches!(
            &report.errors[0],
            OperationError::Restore { path, .. } if path == Path::new("/d/Unsorted/a.txt")
        ));
        assert!(matches!(
            &report.errors[1],
            OperationError::FolderCleanup { path, .. } if path == Path::new("/d/locked")
        ));
        assert!(fs.exists(Path::new("/d/Unsorted")));
        assert!(fs.exists(Path::new("/d/locked")));
        assert!(!fs.exists(Path::new("/d/other")));
        assert_eq!(report.folders_deleted, vec![PathBuf::from("/d/other")]);
    }

    #[test]
    fn test_snapshot_entries_drive_restore() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/d/Unsorted/a.txt", "a");
        let snapshot = BaselineSnapshot::new(vec![BaselineEntry {
            absolute_path: PathBuf::from("/d/a.txt"),
            filename: "a.txt".to_string(),
            is_file: true,
            is_folder: false,
        }]);
        BaselineStore::new(&fs, "/d").save(&snapshot).unwrap();

        let report = RestoreEngine::new(&fs, &NullNotifier, "/d").restore().unwrap();
        assert_eq!(report.files_restored(), 1);
        assert_eq!(report.folders_deleted, vec![PathBuf::from("/d/Unsorted")]);
    }
}
