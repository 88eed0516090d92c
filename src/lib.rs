//! deskgroup - groups the loose files of a flat directory into folders and
//! restores the directory from a baseline snapshot afterwards.
//!
//! The engine runs as a pipeline: [`classify`] items by filename prefix,
//! [`PlanGenerator`] turns groups into a raw plan, [`PlanNormalizer`] makes it
//! safe, and [`Executor`] applies it after saving a [`BaselineSnapshot`].
//! [`RestoreEngine`] reads that baseline to put everything back.

pub mod baseline;
pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod fs;
pub mod generator;
pub mod history;
pub mod item;
pub mod memory;
pub mod normalizer;
pub mod output;
pub mod paths;
pub mod plan;
pub mod restore;
pub mod scan;
pub mod session;
pub mod shell;

pub use baseline::{BaselineEntry, BaselineSnapshot, BaselineStore};
pub use classify::{ExtensionTable, FallbackCategory, Groups, classify};
pub use config::{CompiledFilters, Config};
pub use error::{
    BaselineError, ConfigError, ExecuteError, OperationError, PlanError, PrepareError,
    RestoreError, SessionError,
};
pub use executor::{ExecutionReport, ExecutionStep, Executor};
pub use fs::{FileSystem, RealFileSystem};
pub use generator::PlanGenerator;
pub use item::DesktopItem;
pub use memory::MemoryFileSystem;
pub use normalizer::PlanNormalizer;
pub use plan::{ExecutionPlan, FileMove, PlanDiagnostics};
pub use restore::{RestoreEngine, RestoreReport};
pub use session::{Session, UndoStack, UndoStackEntry};
pub use shell::{NullNotifier, ShellNotifier, SystemShellNotifier};

pub use cli::{Command, run_cli};
