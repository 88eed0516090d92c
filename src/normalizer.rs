//! Plan normalization: the second, independent pass over a raw plan.
//!
//! The normalizer re-derives everything it can from the scan instead of
//! trusting the generator. It drops moves of misnamed groups and reroutes their
//! members by extension, strips directories and protected paths, rebuilds the
//! folder list from the moves that survive, and re-asserts the plan invariants.

use crate::classify::{ExtensionTable, FallbackCategory, Groups};
use crate::error::PlanError;
use crate::generator::{DEFAULT_GROUP, DEFAULT_GROUP_ALTERNATE};
use crate::item::DesktopItem;
use crate::paths::{self, base_name_of, canonical_key};
use crate::plan::{
    ExclusionReason, ExecutionPlan, FileMove, FolderSpellings, FolderTarget, PlanDiagnostics,
    ScanIndex, resolve_default_folder,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Sanitizes raw plans against naming and safety rules.
#[derive(Debug, Clone)]
pub struct PlanNormalizer {
    extensions: ExtensionTable,
    default_group: String,
    default_alternate: String,
}

impl Default for PlanNormalizer {
    fn default() -> Self {
        Self::new(ExtensionTable::default())
    }
}

impl PlanNormalizer {
    pub fn new(extensions: ExtensionTable) -> Self {
        Self {
            extensions,
            default_group: DEFAULT_GROUP.to_string(),
            default_alternate: DEFAULT_GROUP_ALTERNATE.to_string(),
        }
    }

    /// Must match the generator's catch-all group name.
    pub fn with_default_group(mut self, name: impl Into<String>) -> Self {
        self.default_group = name.into();
        self
    }

    /// Produces the final plan. See [`Self::normalize_with_diagnostics`].
    pub fn normalize(
        &self,
        raw: &ExecutionPlan,
        groups: &Groups,
        items: &[DesktopItem],
    ) -> Result<ExecutionPlan, PlanError> {
        self.normalize_with_diagnostics(raw, groups, items, &mut PlanDiagnostics::default())
    }

    /// Produces the final plan, recording exclusions and skips in `diagnostics`.
    ///
    /// # Errors
    ///
    /// Fails when no move survives, when a surviving move has identical source
    /// and destination, or when a destination is not exactly
    /// `<root>/<folder>/<filename>`.
    pub fn normalize_with_diagnostics(
        &self,
        raw: &ExecutionPlan,
        groups: &Groups,
        items: &[DesktopItem],
        diagnostics: &mut PlanDiagnostics,
    ) -> Result<ExecutionPlan, PlanError> {
        let root = raw.root.as_path();
        let index = ScanIndex::new(root, items);
        let items_by_key: HashMap<String, &DesktopItem> =
            items.iter().map(|item| (item.key(), item)).collect();

        let reserved = self.reserved_folder_keys(root);
        let excluded_folders = self.excluded_group_folders(root, groups, &reserved, diagnostics);

        let mut surviving: Vec<FileMove> = Vec::new();
        let mut stranded: Vec<FileMove> = Vec::new();

        for file_move in &raw.files_to_move {
            if paths::is_protected(root, &file_move.source_path)
                || paths::is_protected(root, &file_move.destination_path)
            {
                tracing::warn!(source = %file_move.source_path.display(), "dropped move touching protected path");
                diagnostics.protected_skipped += 1;
                continue;
            }
            let source_is_directory = index.is_directory(&file_move.source_path)
                || items_by_key
                    .get(&canonical_key(&file_move.source_path))
                    .is_some_and(|item| item.is_directory);
            if source_is_directory {
                tracing::warn!(source = %file_move.source_path.display(), "dropped directory from move plan");
                diagnostics.directories_skipped += 1;
                continue;
            }
            let folder_key = file_move
                .destination_path
                .parent()
                .map(canonical_key)
                .unwrap_or_default();
            if excluded_folders.contains(&folder_key) {
                stranded.push(file_move.clone());
                continue;
            }
            surviving.push(file_move.clone());
        }

        let rerouted = self.reroute_stranded(root, &index, &stranded, diagnostics)?;
        surviving.extend(rerouted);
        FolderSpellings::new().unify(&mut surviving);

        let mut seen_sources = HashSet::new();
        surviving.retain(|file_move| seen_sources.insert(canonical_key(&file_move.source_path)));
        surviving.sort_by(|a, b| {
            a.source_path
                .cmp(&b.source_path)
                .then_with(|| a.destination_path.cmp(&b.destination_path))
        });

        let folders_to_create = derive_folders(root, &index, &surviving);

        let plan = ExecutionPlan {
            root: raw.root.clone(),
            folders_to_create,
            files_to_move: surviving,
        };

        tracing::info!(
            entering = raw.files_to_move.len(),
            leaving = plan.files_to_move.len(),
            folders = plan.folders_to_create.len(),
            "normalized plan"
        );

        plan.check_invariants(diagnostics.eligible)
            .inspect_err(|e| tracing::error!(error = %e, "normalized plan validation failed"))?;
        Ok(plan)
    }

    /// Canonical keys of folders that may never be treated as an excluded group:
    /// the default group, its alternate and every fallback folder.
    fn reserved_folder_keys(&self, root: &Path) -> HashSet<String> {
        let mut reserved: HashSet<String> = [&self.default_group, &self.default_alternate]
            .into_iter()
            .map(|name| canonical_key(&root.join(name)))
            .collect();
        for category in FallbackCategory::ALL {
            reserved.insert(canonical_key(&root.join(category.dir_name())));
        }
        reserved
    }

    /// Applies the extension-name and self-named-single-item rules and returns
    /// the canonical folder keys whose moves must be rerouted.
    fn excluded_group_folders(
        &self,
        root: &Path,
        groups: &Groups,
        reserved: &HashSet<String>,
        diagnostics: &mut PlanDiagnostics,
    ) -> HashSet<String> {
        let mut excluded = HashSet::new();
        let mut group_names: Vec<&String> = groups.keys().collect();
        group_names.sort();

        for group_name in group_names {
            let members = &groups[group_name];
            if members.is_empty() {
                continue;
            }

            let reason = if self.extensions.ends_with_recognized_extension(group_name) {
                Some(ExclusionReason::ExtensionLikeName)
            } else if members.len() == 1
                && base_name_of(&members[0].name) == base_name_of(group_name)
            {
                Some(ExclusionReason::SelfNamedSingleItem)
            } else {
                None
            };

            if let Some(reason) = reason {
                let folder_key = canonical_key(&root.join(group_name));
                if reserved.contains(&folder_key) {
                    continue;
                }
                tracing::debug!(group = %group_name, %reason, "group rerouted by normalization");
                diagnostics
                    .excluded_groups
                    .push((group_name.clone(), reason));
                excluded.insert(folder_key);
            }
        }
        excluded
    }

    /// Sends each stranded file to its extension's fallback folder, or to the
    /// default group when no fallback applies.
    fn reroute_stranded(
        &self,
        root: &Path,
        index: &ScanIndex,
        stranded: &[FileMove],
        diagnostics: &mut PlanDiagnostics,
    ) -> Result<Vec<FileMove>, PlanError> {
        let mut rerouted = Vec::new();
        if stranded.is_empty() {
            return Ok(rerouted);
        }

        let default_target =
            resolve_default_folder(index, root, &self.default_group, &self.default_alternate)?;
        let default_folder = default_target
            .path()
            .map(Path::to_path_buf)
            .ok_or_else(|| PlanError::DefaultGroupUnavailable {
                name: self.default_group.clone(),
            })?;

        for file_move in stranded {
            let Some(name) = paths::file_name_string(&file_move.source_path) else {
                continue;
            };
            let fallback_folder = self
                .extensions
                .fallback_for(&paths::extension_of(&name))
                .and_then(|category| match index.resolve_folder(root, category.dir_name()) {
                    FolderTarget::CollidesWithFile => None,
                    target => target.path().map(Path::to_path_buf),
                });

            let folder = match fallback_folder {
                Some(folder) => {
                    diagnostics.fallback += 1;
                    folder
                }
                None => {
                    diagnostics.defaulted += 1;
                    default_folder.clone()
                }
            };

            let candidate = FileMove::new(file_move.source_path.clone(), folder.join(&name));
            if candidate.is_noop() {
                diagnostics.noops_filtered += 1;
                continue;
            }
            tracing::debug!(
                source = %candidate.source_path.display(),
                destination = %candidate.destination_path.display(),
                "rerouted stranded file"
            );
            rerouted.push(candidate);
        }
        Ok(rerouted)
    }
}

/// Folders implied by the surviving moves, minus those the scan already saw,
/// sorted lexicographically.
fn derive_folders(root: &Path, index: &ScanIndex, moves: &[FileMove]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut folders = BTreeSet::new();
    for file_move in moves {
        let Some(folder) = file_move.destination_path.parent() else {
            continue;
        };
        if index.is_directory(folder) || paths::is_protected(root, folder) {
            continue;
        }
        if seen.insert(canonical_key(folder)) {
            folders.insert(folder.to_path_buf());
        }
    }
    folders.into_iter().collect()
}
