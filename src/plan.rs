//! The execution plan value object and the checks every stage shares.

use crate::error::PlanError;
use crate::item::DesktopItem;
use crate::paths::{self, canonical_key, destination_depth_ok};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// One file move, always `<root>/<name>` to `<root>/<folder>/<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMove {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
}

impl FileMove {
    pub fn new(source_path: impl Into<PathBuf>, destination_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            destination_path: destination_path.into(),
        }
    }

    /// True when source and destination canonicalize to the same path.
    pub fn is_noop(&self) -> bool {
        paths::same_path(&self.source_path, &self.destination_path)
    }
}

/// Folders to create and files to move for one reorganization.
///
/// Produced fresh for every organize action and never merged with another plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    /// Canonical root the plan was generated for.
    pub root: PathBuf,
    pub folders_to_create: Vec<PathBuf>,
    pub files_to_move: Vec<FileMove>,
}

impl ExecutionPlan {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files_to_move.is_empty()
    }

    /// Moves grouped by destination folder, in plan order.
    pub fn moves_by_folder(&self) -> Vec<(PathBuf, Vec<&FileMove>)> {
        let mut folders: Vec<(PathBuf, Vec<&FileMove>)> = Vec::new();
        for file_move in &self.files_to_move {
            let folder = file_move
                .destination_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            match folders.iter_mut().find(|(existing, _)| *existing == folder) {
                Some((_, moves)) => moves.push(file_move),
                None => folders.push((folder, vec![file_move])),
            }
        }
        folders
    }

    /// Fails on an empty plan or on any move whose source equals its destination.
    pub fn check_nontrivial(&self, eligible: usize) -> Result<(), PlanError> {
        if self.files_to_move.is_empty() {
            return Err(PlanError::NoMoves { eligible });
        }
        if let Some(identity) = self.files_to_move.iter().find(|m| m.is_noop()) {
            return Err(PlanError::IdentityMove {
                path: identity.source_path.clone(),
            });
        }
        Ok(())
    }

    /// [`Self::check_nontrivial`] plus the one-level destination shape.
    pub fn check_invariants(&self, eligible: usize) -> Result<(), PlanError> {
        self.check_nontrivial(eligible)?;
        for file_move in &self.files_to_move {
            if !destination_depth_ok(&self.root, &file_move.destination_path) {
                return Err(PlanError::MalformedDestination {
                    root: self.root.clone(),
                    destination: file_move.destination_path.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Why a group was left out of planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionReason {
    /// A file with the group's name already exists, so no folder can be created.
    CollidesWithFile,
    /// The group name would be organizer metadata.
    Protected,
    /// The group name is empty or contains a path separator.
    InvalidName,
    /// The group name ends in a file extension.
    ExtensionLikeName,
    /// A single member whose base name is the group name.
    SelfNamedSingleItem,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ExclusionReason::CollidesWithFile => "name collides with an existing file",
            ExclusionReason::Protected => "name is reserved for organizer metadata",
            ExclusionReason::InvalidName => "name is not a valid folder name",
            ExclusionReason::ExtensionLikeName => "name ends in a file extension",
            ExclusionReason::SelfNamedSingleItem => "single item named after its group",
        };
        f.write_str(text)
    }
}

/// Counters and exclusions gathered while planning. Informational only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanDiagnostics {
    pub eligible: usize,
    pub grouped: usize,
    pub defaulted: usize,
    pub fallback: usize,
    pub noops_filtered: usize,
    pub directories_skipped: usize,
    pub protected_skipped: usize,
    pub excluded_groups: Vec<(String, ExclusionReason)>,
}

/// Where a group's files should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderTarget {
    /// A folder with this name already exists; reuse its path.
    Existing(PathBuf),
    /// The folder has to be created.
    Create(PathBuf),
    /// A file with this name exists, so the folder cannot be created.
    CollidesWithFile,
}

impl FolderTarget {
    pub fn path(&self) -> Option<&Path> {
        match self {
            FolderTarget::Existing(path) | FolderTarget::Create(path) => Some(path),
            FolderTarget::CollidesWithFile => None,
        }
    }
}

/// Lookup tables derived from one scan, ignoring protected entries.
#[derive(Debug, Clone, Default)]
pub struct ScanIndex {
    folders_by_name: HashMap<String, PathBuf>,
    file_names: HashSet<String>,
    directory_keys: HashSet<String>,
}

impl ScanIndex {
    pub fn new(root: &Path, items: &[DesktopItem]) -> Self {
        let mut index = Self::default();
        for item in items {
            if paths::is_protected_name(&item.name) || paths::is_protected(root, &item.absolute_path)
            {
                continue;
            }
            let name = item.name.to_lowercase();
            if item.is_directory {
                index.directory_keys.insert(item.key());
                index
                    .folders_by_name
                    .insert(name, item.absolute_path.clone());
            } else {
                index.file_names.insert(name);
            }
        }
        index
    }

    /// Resolves a folder name under `root`, case-insensitively.
    pub fn resolve_folder(&self, root: &Path, name: &str) -> FolderTarget {
        let lowered = name.to_lowercase();
        if let Some(existing) = self.folders_by_name.get(&lowered) {
            return FolderTarget::Existing(existing.clone());
        }
        if self.file_names.contains(&lowered) {
            return FolderTarget::CollidesWithFile;
        }
        FolderTarget::Create(root.join(name))
    }

    /// True when the scan saw a directory at this path.
    pub fn is_directory(&self, path: &Path) -> bool {
        self.directory_keys.contains(&canonical_key(path))
    }
}

/// Folder spellings already chosen for one plan, keyed case-insensitively.
///
/// Two names that differ only by case must land in one folder, spelled the
/// way it was first planned, or moves into the second spelling fail on a
/// case-sensitive filesystem.
#[derive(Debug, Clone, Default)]
pub struct FolderSpellings {
    chosen: HashMap<String, PathBuf>,
}

impl FolderSpellings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `target` spelled like the first folder planned with the same key.
    pub fn settle(&mut self, target: FolderTarget) -> FolderTarget {
        match target {
            FolderTarget::Create(path) => {
                let chosen = self.choose(&path);
                if chosen != path {
                    tracing::debug!(
                        requested = %path.display(),
                        chosen = %chosen.display(),
                        "folder already planned under another spelling"
                    );
                }
                FolderTarget::Create(chosen)
            }
            FolderTarget::Existing(path) => FolderTarget::Existing(self.choose(&path)),
            FolderTarget::CollidesWithFile => FolderTarget::CollidesWithFile,
        }
    }

    /// Rewrites each destination folder to the first spelling seen for it,
    /// walking `moves` in order.
    pub fn unify(&mut self, moves: &mut [FileMove]) {
        for file_move in moves {
            let (Some(folder), Some(name)) = (
                file_move.destination_path.parent(),
                file_move.destination_path.file_name(),
            ) else {
                continue;
            };
            let chosen = self.choose(folder);
            if chosen != folder {
                let destination = chosen.join(name);
                tracing::debug!(
                    from = %file_move.destination_path.display(),
                    to = %destination.display(),
                    "respelled destination folder"
                );
                file_move.destination_path = destination;
            }
        }
    }

    fn choose(&mut self, folder: &Path) -> PathBuf {
        self.chosen
            .entry(canonical_key(folder))
            .or_insert_with(|| folder.to_path_buf())
            .clone()
    }
}

/// True when a folder name can be created directly under a root.
pub fn is_valid_folder_name(name: &str) -> bool {
    let trimmed = name.trim();
    !trimmed.is_empty()
        && trimmed != "."
        && trimmed != ".."
        && !name.contains(['/', '\\'])
}

/// Resolves the catch-all folder, falling back to `alternate` when a file
/// already holds `preferred`.
pub fn resolve_default_folder(
    index: &ScanIndex,
    root: &Path,
    preferred: &str,
    alternate: &str,
) -> Result<FolderTarget, PlanError> {
    match index.resolve_folder(root, preferred) {
        FolderTarget::CollidesWithFile => {
            tracing::warn!(
                group = preferred,
                alternate,
                "default group name collides with an existing file"
            );
            match index.resolve_folder(root, alternate) {
                FolderTarget::CollidesWithFile => Err(PlanError::DefaultGroupUnavailable {
                    name: alternate.to_string(),
                }),
                target => Ok(target),
            }
        }
        target => {
            if let FolderTarget::Existing(existing) = &target {
                let expected = root.join(preferred);
                if !paths::same_path(existing, &expected) {
                    tracing::warn!(
                        existing = %existing.display(),
                        expected = %expected.display(),
                        "existing default folder differs from the canonical location"
                    );
                }
            }
            Ok(target)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> PathBuf {
        PathBuf::from("/home/me/Desktop")
    }

    #[test]
    fn test_check_invariants_accepts_well_formed_plan() {
        let mut plan = ExecutionPlan::new(root());
        plan.files_to_move.push(FileMove::new(
            root().join("a.txt"),
            root().join("Unsorted").join("a.txt"),
        ));
        assert_eq!(plan.check_invariants(1), Ok(()));
    }

    #[test]
    fn test_check_invariants_rejects_empty_plan() {
        let plan = ExecutionPlan::new(root());
        assert_eq!(plan.check_invariants(3), Err(PlanError::NoMoves { eligible: 3 }));
    }

    #[test]
    fn test_check_invariants_rejects_identity_move() {
        let mut plan = ExecutionPlan::new(root());
        plan.files_to_move.push(FileMove::new(
            root().join("Docs").join("a.txt"),
            root().join("docs").join("A.TXT"),
        ));
        assert!(matches!(
            plan.check_invariants(1),
            Err(PlanError::IdentityMove { .. })
        ));
    }

    #[test]
    fn test_check_invariants_rejects_shallow_destination() {
        let mut plan = ExecutionPlan::new(root());
        plan.files_to_move
            .push(FileMove::new(root().join("a.txt"), root().join("b.txt")));
        assert!(matches!(
            plan.check_invariants(1),
            Err(PlanError::MalformedDestination { .. })
        ));
    }

    #[test]
    fn test_scan_index_resolves_case_insensitively() {
        let items = vec![
            DesktopItem::folder(root().join("Invoice")),
            DesktopItem::file(root().join("notes")),
        ];
        let index = ScanIndex::new(&root(), &items);

        assert_eq!(
            index.resolve_folder(&root(), "invoice"),
            FolderTarget::Existing(root().join("Invoice"))
        );
        assert_eq!(
            index.resolve_folder(&root(), "NOTES"),
            FolderTarget::CollidesWithFile
        );
        assert_eq!(
            index.resolve_folder(&root(), "tax"),
            FolderTarget::Create(root().join("tax"))
        );
        assert!(index.is_directory(&root().join("INVOICE")));
    }

    #[test]
    fn test_scan_index_ignores_protected_folder() {
        let items = vec![DesktopItem::folder(root().join(".desktop"))];
        let index = ScanIndex::new(&root(), &items);
        assert!(!index.is_directory(&root().join(".desktop")));
    }

    #[test]
    fn test_default_folder_uses_alternate_on_collision() {
        let items = vec![DesktopItem::file(root().join("Unsorted"))];
        let index = ScanIndex::new(&root(), &items);
        let target =
            resolve_default_folder(&index, &root(), "Unsorted", "Unsorted Files").unwrap();
        assert_eq!(target, FolderTarget::Create(root().join("Unsorted Files")));
    }

    #[test]
    fn test_default_folder_unavailable_when_both_collide() {
        let items = vec![
            DesktopItem::file(root().join("Unsorted")),
            DesktopItem::file(root().join("Unsorted Files")),
        ];
        let index = ScanIndex::new(&root(), &items);
        assert!(matches!(
            resolve_default_folder(&index, &root(), "Unsorted", "Unsorted Files"),
            Err(PlanError::DefaultGroupUnavailable { .. })
        ));
    }

    #[test]
    fn test_moves_by_folder_preserves_order() {
        let mut plan = ExecutionPlan::new(root());
        plan.files_to_move = vec![
            FileMove::new(root().join("a-1.txt"), root().join("a").join("a-1.txt")),
            FileMove::new(root().join("b-1.txt"), root().join("b").join("b-1.txt")),
            FileMove::new(root().join("a-2.txt"), root().join("a").join("a-2.txt")),
        ];
        let grouped = plan.moves_by_folder();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].0, root().join("a"));
        assert_eq!(grouped[0].1.len(), 2);
    }

    #[test]
    fn test_folder_spellings_keep_first_choice() {
        let mut spellings = FolderSpellings::new();
        assert_eq!(
            spellings.settle(FolderTarget::Create(root().join("unsorted"))),
            FolderTarget::Create(root().join("unsorted"))
        );
        assert_eq!(
            spellings.settle(FolderTarget::Create(root().join("Unsorted"))),
            FolderTarget::Create(root().join("unsorted"))
        );
        assert_eq!(
            spellings.settle(FolderTarget::CollidesWithFile),
            FolderTarget::CollidesWithFile
        );

        let mut moves = vec![
            FileMove::new(root().join("a.txt"), root().join("UNSORTED").join("a.txt")),
            FileMove::new(root().join("b.png"), root().join("Images").join("b.png")),
        ];
        spellings.unify(&mut moves);
        assert_eq!(moves[0].destination_path, root().join("unsorted").join("a.txt"));
        assert_eq!(moves[1].destination_path, root().join("Images").join("b.png"));
    }

    #[test]
    fn test_folder_name_validation() {
        assert!(is_valid_folder_name("invoice"));
        assert!(!is_valid_folder_name(""));
        assert!(!is_valid_folder_name(".."));
        assert!(!is_valid_folder_name("a/b"));
    }
}
