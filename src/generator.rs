//! Plan generation: turns classified groups into folder creates and file moves.
//!
//! Generation is pure. It never touches the filesystem; existing folders and
//! name collisions are resolved from the scan that produced the groups.

use crate::classify::Groups;
use crate::error::PlanError;
use crate::item::DesktopItem;
use crate::paths::{self, canonical_key, clean_root};
use crate::plan::{
    ExclusionReason, ExecutionPlan, FileMove, FolderSpellings, FolderTarget, PlanDiagnostics,
    ScanIndex, is_valid_folder_name, resolve_default_folder,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Catch-all group for eligible items no other group claimed.
pub const DEFAULT_GROUP: &str = "Unsorted";

/// Used instead of [`DEFAULT_GROUP`] when a file already carries that name.
pub const DEFAULT_GROUP_ALTERNATE: &str = "Unsorted Files";

/// Builds raw execution plans for one target directory.
#[derive(Debug, Clone)]
pub struct PlanGenerator {
    target_root: PathBuf,
    default_group: String,
    default_alternate: String,
}

/// Accumulates moves and folder creates while walking groups.
struct PlanBuilder {
    plan: ExecutionPlan,
    folder_keys: HashSet<String>,
    spellings: FolderSpellings,
    assigned: HashSet<String>,
    diagnostics: PlanDiagnostics,
}

impl PlanBuilder {
    fn new(root: PathBuf) -> Self {
        Self {
            plan: ExecutionPlan::new(root),
            folder_keys: HashSet::new(),
            spellings: FolderSpellings::new(),
            assigned: HashSet::new(),
            diagnostics: PlanDiagnostics::default(),
        }
    }

    fn require_folder(&mut self, target: &FolderTarget) {
        if let FolderTarget::Create(path) = target
            && self.folder_keys.insert(canonical_key(path))
        {
            self.plan.folders_to_create.push(path.clone());
        }
    }

    /// Adds the move of `item` into `folder`. Returns false for a no-op.
    fn push_move(&mut self, item: &DesktopItem, folder: &Path) -> bool {
        let file_move = FileMove::new(item.absolute_path.clone(), folder.join(&item.name));
        self.assigned.insert(item.key());
        if file_move.is_noop() {
            tracing::debug!(path = %item.absolute_path.display(), "already in place, dropping no-op move");
            self.diagnostics.noops_filtered += 1;
            return false;
        }
        self.plan.files_to_move.push(file_move);
        true
    }
}

impl PlanGenerator {
    /// Creates a generator anchored at the canonical target directory.
    pub fn new(target_root: impl AsRef<Path>) -> Self {
        Self {
            target_root: clean_root(target_root.as_ref()),
            default_group: DEFAULT_GROUP.to_string(),
            default_alternate: DEFAULT_GROUP_ALTERNATE.to_string(),
        }
    }

    /// Overrides the catch-all group name.
    pub fn with_default_group(mut self, name: impl Into<String>) -> Self {
        self.default_group = name.into();
        self
    }

    pub fn target_root(&self) -> &Path {
        &self.target_root
    }

    pub fn default_group(&self) -> &str {
        &self.default_group
    }

    pub fn default_alternate(&self) -> &str {
        &self.default_alternate
    }

    /// Generates the raw plan. See [`Self::generate_with_diagnostics`].
    pub fn generate(
        &self,
        groups: &Groups,
        root: &Path,
        items: &[DesktopItem],
    ) -> Result<ExecutionPlan, PlanError> {
        self.generate_with_diagnostics(groups, root, items)
            .map(|(plan, _)| plan)
    }

    /// Generates the raw plan along with planning counters.
    ///
    /// Group folders are placed under `root`; the default group is always
    /// anchored at the generator's target root. Groups and members are walked
    /// in sorted order so the same input always yields the same plan.
    ///
    /// # Errors
    ///
    /// Fails when no move survives (whether or not anything was eligible), when
    /// a move with identical source and destination survives, or when an
    /// eligible item has no path. No partial plan is returned.
    pub fn generate_with_diagnostics(
        &self,
        groups: &Groups,
        root: &Path,
        items: &[DesktopItem],
    ) -> Result<(ExecutionPlan, PlanDiagnostics), PlanError> {
        let root = clean_root(root);
        let index = ScanIndex::new(&root, items);
        let mut builder = PlanBuilder::new(self.target_root.clone());

        let mut eligible: Vec<&DesktopItem> = Vec::new();
        for item in items {
            if item.is_directory {
                builder.diagnostics.directories_skipped += 1;
            } else if !item.is_eligible(&root) || !item.is_eligible(&self.target_root) {
                builder.diagnostics.protected_skipped += 1;
            } else if !item.has_path() {
                return Err(PlanError::MissingPath {
                    name: item.name.clone(),
                });
            } else {
                eligible.push(item);
            }
        }
        eligible.sort_by(|a, b| a.absolute_path.cmp(&b.absolute_path));
        builder.diagnostics.eligible = eligible.len();

        let mut group_names: Vec<&String> = groups.keys().collect();
        group_names.sort();

        for group_name in group_names {
            let members = &groups[group_name];
            if members.is_empty() {
                continue;
            }

            let target = match self.group_folder(&index, &root, group_name) {
                Ok(target) => builder.spellings.settle(target),
                Err(reason) => {
                    tracing::warn!(group = %group_name, %reason, "excluded group from planning");
                    builder
                        .diagnostics
                        .excluded_groups
                        .push((group_name.clone(), reason));
                    continue;
                }
            };
            let Some(folder) = target.path().map(Path::to_path_buf) else {
                continue;
            };

            let mut sorted_members: Vec<&DesktopItem> = members.iter().collect();
            sorted_members.sort_by(|a, b| a.absolute_path.cmp(&b.absolute_path));

            let mut group_moved = false;
            for member in sorted_members {
                if member.is_directory {
                    builder.diagnostics.directories_skipped += 1;
                    continue;
                }
                if !member.is_eligible(&root) {
                    tracing::debug!(name = %member.name, "protected member skipped");
                    builder.diagnostics.protected_skipped += 1;
                    continue;
                }
                if !member.has_path() {
                    return Err(PlanError::MissingPath {
                        name: member.name.clone(),
                    });
                }
                if builder.assigned.contains(&member.key()) {
                    continue;
                }
                if builder.push_move(member, &folder) {
                    builder.diagnostics.grouped += 1;
                    group_moved = true;
                }
            }
            if group_moved {
                builder.require_folder(&target);
            }
        }

        self.assign_default_group(&mut builder, &index, &eligible)?;

        tracing::info!(
            eligible = builder.diagnostics.eligible,
            grouped = builder.diagnostics.grouped,
            defaulted = builder.diagnostics.defaulted,
            moves = builder.plan.files_to_move.len(),
            folders = builder.plan.folders_to_create.len(),
            excluded_groups = builder.diagnostics.excluded_groups.len(),
            "generated raw plan"
        );

        builder
            .plan
            .check_nontrivial(builder.diagnostics.eligible)
            .inspect_err(|e| tracing::error!(error = %e, "raw plan validation failed"))?;

        Ok((builder.plan, builder.diagnostics))
    }

    /// Resolves the destination folder of a named group.
    fn group_folder(
        &self,
        index: &ScanIndex,
        root: &Path,
        group_name: &str,
    ) -> Result<FolderTarget, ExclusionReason> {
        if !is_valid_folder_name(group_name) {
            return Err(ExclusionReason::InvalidName);
        }
        if paths::is_protected_name(group_name)
            || paths::is_protected(root, &root.join(group_name))
        {
            return Err(ExclusionReason::Protected);
        }
        match index.resolve_folder(root, group_name) {
            FolderTarget::CollidesWithFile => Err(ExclusionReason::CollidesWithFile),
            target => Ok(target),
        }
    }

    /// Sends every eligible, still-unassigned item to the default group.
    fn assign_default_group(
        &self,
        builder: &mut PlanBuilder,
        index: &ScanIndex,
        eligible: &[&DesktopItem],
    ) -> Result<(), PlanError> {
        let unassigned: Vec<&&DesktopItem> = eligible
            .iter()
            .filter(|item| !builder.assigned.contains(&item.key()))
            .collect();
        if unassigned.is_empty() {
            return Ok(());
        }

        let target = builder.spellings.settle(resolve_default_folder(
            index,
            &self.target_root,
            &self.default_group,
            &self.default_alternate,
        )?);
        let Some(folder) = target.path().map(Path::to_path_buf) else {
            return Err(PlanError::DefaultGroupUnavailable {
                name: self.default_group.clone(),
            });
        };

        let mut moved_any = false;
        for item in unassigned {
            if builder.push_move(item, &folder) {
                builder.diagnostics.defaulted += 1;
                moved_any = true;
            }
        }
        if moved_any {
            builder.require_folder(&target);
        }
        Ok(())
    }
}
