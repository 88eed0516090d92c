//! Runs a normalized plan against a filesystem.
//!
//! Pre-flight and triviality checks abort before anything is touched. After
//! that the batch always runs to the end: per-folder and per-move failures are
//! collected into the [`ExecutionReport`], and a post-flight pass verifies every
//! move that reported success. There is no rollback; the baseline written
//! before the first mutation is the recovery path.

use crate::baseline::BaselineStore;
use crate::error::{ExecuteError, OperationError};
use crate::fs::FileSystem;
use crate::history::{HistoryLog, RunRecord};
use crate::paths;
use crate::plan::{ExecutionPlan, FileMove};
use crate::shell::ShellNotifier;
use std::path::{Path, PathBuf};

/// Progress notification emitted after each folder create and move attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStep {
    Folder { path: PathBuf, ok: bool },
    Move { file_move: FileMove, ok: bool },
}

/// Outcome of one execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Folders that did not exist and were created.
    pub folders_created: usize,
    /// Moves the filesystem reported as successful.
    pub files_moved: usize,
    pub moves_performed: Vec<FileMove>,
    pub errors: Vec<OperationError>,
    pub baseline_saved: bool,
    pub shell_notified: bool,
}

impl ExecutionReport {
    /// No folder errors, no move errors, no verification mismatches.
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn verification_failures(&self) -> usize {
        self.errors.iter().filter(|e| e.is_verification()).count()
    }
}

/// Executes plans through injected filesystem and shell capabilities.
pub struct Executor<'a> {
    fs: &'a dyn FileSystem,
    notifier: &'a dyn ShellNotifier,
    record_history: bool,
}

impl<'a> Executor<'a> {
    pub fn new(fs: &'a dyn FileSystem, notifier: &'a dyn ShellNotifier) -> Self {
        Self {
            fs,
            notifier,
            record_history: true,
        }
    }

    /// Disables the run record appended after each batch.
    pub fn without_history(mut self) -> Self {
        self.record_history = false;
        self
    }

    /// Executes `plan`. See [`Self::execute_with_progress`].
    pub fn execute(
        &self,
        plan: &ExecutionPlan,
        skip_baseline: bool,
    ) -> Result<ExecutionReport, ExecuteError> {
        self.execute_with_progress(plan, skip_baseline, |_| {})
    }

    /// Executes `plan`, reporting each step to `on_step`.
    ///
    /// Returns `Err` only when nothing was mutated. A returned report may still
    /// describe a failed batch; check [`ExecutionReport::success`].
    pub fn execute_with_progress(
        &self,
        plan: &ExecutionPlan,
        skip_baseline: bool,
        mut on_step: impl FnMut(ExecutionStep),
    ) -> Result<ExecutionReport, ExecuteError> {
        let root = &plan.root;
        if !self.fs.is_dir(root) {
            tracing::error!(root = %root.display(), "pre-flight failed: root missing");
            return Err(ExecuteError::RootMissing { root: root.clone() });
        }
        plan.check_nontrivial(plan.files_to_move.len())
            .inspect_err(|e| tracing::error!(error = %e, "refusing trivial plan"))?;

        tracing::info!(
            root = %root.display(),
            folders = plan.folders_to_create.len(),
            moves = plan.files_to_move.len(),
            "executing plan"
        );

        let mut report = ExecutionReport::default();

        if skip_baseline {
            tracing::debug!("baseline capture skipped");
        } else {
            match BaselineStore::new(self.fs, root.as_path()).capture_and_save() {
                Ok(_) => report.baseline_saved = true,
                Err(e) => tracing::warn!(error = %e, "baseline not saved, continuing without undo"),
            }
        }

        self.create_folders(plan, &mut report, &mut on_step);
        self.move_files(plan, &mut report, &mut on_step);
        self.verify(&mut report);

        if self.record_history {
            self.append_history(plan, &report);
        }

        if report.success() {
            match self.notifier.notify(root) {
                Ok(()) => report.shell_notified = true,
                Err(e) => tracing::warn!(error = %e, "shell refresh failed"),
            }
            tracing::info!(
                folders_created = report.folders_created,
                files_moved = report.files_moved,
                "plan executed"
            );
        } else {
            tracing::error!(
                files_moved = report.files_moved,
                errors = report.errors.len(),
                "plan executed with errors"
            );
        }

        Ok(report)
    }

    fn create_folders(
        &self,
        plan: &ExecutionPlan,
        report: &mut ExecutionReport,
        on_step: &mut impl FnMut(ExecutionStep),
    ) {
        for folder in &plan.folders_to_create {
            let ok = if self.fs.is_dir(folder) {
                tracing::debug!(folder = %folder.display(), "folder already exists");
                true
            } else {
                match self.fs.create_dir_all(folder) {
                    Ok(()) => {
                        report.folders_created += 1;
                        true
                    }
                    Err(e) => {
                        tracing::warn!(folder = %folder.display(), error = %e, "folder creation failed");
                        report.errors.push(OperationError::Folder {
                            path: folder.clone(),
                            reason: e.to_string(),
                        });
                        false
                    }
                }
            };
            on_step(ExecutionStep::Folder {
                path: folder.clone(),
                ok,
            });
        }
    }

    fn move_files(
        &self,
        plan: &ExecutionPlan,
        report: &mut ExecutionReport,
        on_step: &mut impl FnMut(ExecutionStep),
    ) {
        for file_move in &plan.files_to_move {
            let result = self.move_one(&plan.root, file_move);
            let ok = result.is_ok();
            match result {
                Ok(()) => {
                    report.files_moved += 1;
                    report.moves_performed.push(file_move.clone());
                }
                Err(error) => {
                    tracing::warn!(%error, "move failed");
                    report.errors.push(error);
                }
            }
            on_step(ExecutionStep::Move {
                file_move: file_move.clone(),
                ok,
            });
        }
    }

    fn move_one(&self, root: &Path, file_move: &FileMove) -> Result<(), OperationError> {
        let FileMove {
            source_path,
            destination_path,
        } = file_move;
        let refuse = |reason: &str| OperationError::Move {
            from: source_path.clone(),
            to: destination_path.clone(),
            reason: reason.to_string(),
        };

        if self.fs.is_dir(source_path) {
            return Err(OperationError::DirectoryInPlan {
                path: source_path.clone(),
            });
        }
        if paths::is_protected(root, source_path) || paths::is_protected(root, destination_path) {
            return Err(refuse("protected path"));
        }
        if self.fs.exists(destination_path) {
            return Err(refuse("destination already exists"));
        }

        self.fs
            .rename(source_path, destination_path)
            .map_err(|e| refuse(&e.to_string()))?;
        tracing::debug!(
            from = %source_path.display(),
            to = %destination_path.display(),
            "moved"
        );
        Ok(())
    }

    fn verify(&self, report: &mut ExecutionReport) {
        let mut mismatches = Vec::new();
        for file_move in &report.moves_performed {
            let reason = if !self.fs.exists(&file_move.destination_path) {
                Some("destination missing after move")
            } else if self.fs.exists(&file_move.source_path) {
                Some("source still present after move")
            } else {
                None
            };
            if let Some(reason) = reason {
                tracing::error!(
                    from = %file_move.source_path.display(),
                    to = %file_move.destination_path.display(),
                    reason,
                    "verification mismatch"
                );
                mismatches.push(OperationError::Verification {
                    from: file_move.source_path.clone(),
                    to: file_move.destination_path.clone(),
                    reason: reason.to_string(),
                });
            }
        }
        report.errors.extend(mismatches);
    }

    fn append_history(&self, plan: &ExecutionPlan, report: &ExecutionReport) {
        let record = RunRecord {
            timestamp: chrono::Utc::now(),
            root: plan.root.clone(),
            folders_created: report.folders_created,
            files_moved: report.files_moved,
            errors: report.errors.len(),
            success: report.success(),
            baseline_saved: report.baseline_saved,
            moves: report.moves_performed.clone(),
        };
        if let Err(e) = HistoryLog::new(self.fs, plan.root.as_path()).append(record) {
            tracing::warn!(error = %e, "run history not written");
        }
    }
}
