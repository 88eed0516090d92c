//! Error taxonomy.
//!
//! Structural failures (`PlanError`, `ExecuteError`) mean nothing was mutated.
//! Operational failures of single filesystem calls are collected as
//! [`OperationError`] values inside an execution report instead.

use std::path::PathBuf;
use thiserror::Error;

/// The plan failed validation. No partial plan is ever returned alongside it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// No real moves survived planning.
    #[error("plan has no file moves ({eligible} eligible item(s) scanned)")]
    NoMoves { eligible: usize },
    /// A move whose source and destination are the same item survived filtering.
    #[error("move source equals destination: {}", path.display())]
    IdentityMove { path: PathBuf },
    /// A destination is not exactly `<root>/<folder>/<filename>`.
    #[error("destination {} is not directly inside a folder of {}", destination.display(), root.display())]
    MalformedDestination { root: PathBuf, destination: PathBuf },
    /// An eligible item arrived without an absolute path.
    #[error("item {name:?} has no absolute path")]
    MissingPath { name: String },
    /// Neither the default group name nor its alternate can be used as a folder.
    #[error("default group folder {name:?} collides with an existing file")]
    DefaultGroupUnavailable { name: String },
}

/// Execution aborted before any mutation.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The root directory does not exist.
    #[error("root directory does not exist: {}", root.display())]
    RootMissing { root: PathBuf },
    /// The plan failed the checks repeated at the mutation boundary.
    #[error("refusing to execute plan: {0}")]
    Validation(#[from] PlanError),
}

/// The baseline snapshot is missing, empty or unreadable.
#[derive(Debug, Error)]
pub enum BaselineError {
    #[error("baseline missing: {}", path.display())]
    Missing { path: PathBuf },
    #[error("baseline is empty: {}", path.display())]
    Empty { path: PathBuf },
    #[error("baseline at {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
    #[error("baseline I/O failed at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Restore could not run or restored nothing.
#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("root directory does not exist: {}", root.display())]
    RootMissing { root: PathBuf },
    #[error(transparent)]
    Baseline(#[from] BaselineError),
    #[error("a restore is already in progress")]
    AlreadyInProgress,
    /// Nothing was moved back; the baseline most likely no longer matches reality.
    #[error(
        "restore failed: 0 items restored ({skipped} skipped, {folders_deleted} folder(s) deleted, {errors} error(s))"
    )]
    NothingRestored {
        skipped: usize,
        folders_deleted: usize,
        errors: usize,
    },
}

/// A single filesystem operation that failed during a batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OperationError {
    #[error("failed to create folder {}: {reason}", path.display())]
    Folder { path: PathBuf, reason: String },
    #[error("failed to move {} to {}: {reason}", from.display(), to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },
    #[error("refusing to move directory {}", path.display())]
    DirectoryInPlan { path: PathBuf },
    #[error("verification failed for {} -> {}: {reason}", from.display(), to.display())]
    Verification {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },
    #[error("failed to restore {}: {reason}", path.display())]
    Restore { path: PathBuf, reason: String },
    #[error("failed to delete folder {}: {reason}", path.display())]
    FolderCleanup { path: PathBuf, reason: String },
}

impl OperationError {
    /// True for post-flight mismatches.
    pub fn is_verification(&self) -> bool {
        matches!(self, OperationError::Verification { .. })
    }
}

/// Configuration could not be loaded or compiled.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
    #[error("invalid glob pattern '{0}'")]
    InvalidGlobPattern(String),
    #[error("invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },
    #[error("IO error reading configuration: {0}")]
    IoError(String),
}

/// A manual group reassignment was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("no scanned item with key {key:?}")]
    UnknownItem { key: String },
    #[error("cannot reassign directory {key:?}")]
    Directory { key: String },
    #[error("group name {name:?} is not a valid folder name")]
    InvalidGroup { name: String },
}

/// Scanning and planning failed before anything could be executed.
#[derive(Debug, Error)]
pub enum PrepareError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot scan {}: {source}", root.display())]
    Scan {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Plan(#[from] PlanError),
}
