//! Command-line interface: argument parsing and command orchestration.
//!
//! Each command wires the engine together for one root:
//! scan, classify, generate, normalize, then execute, print, restore or report.

use crate::baseline::BaselineStore;
use crate::config::Config;
use crate::error::{BaselineError, PlanError, PrepareError, RestoreError};
use crate::executor::{ExecutionStep, Executor};
use crate::fs::{FileSystem, RealFileSystem};
use crate::generator::PlanGenerator;
use crate::history::HistoryLog;
use crate::normalizer::PlanNormalizer;
use crate::output::OutputFormatter;
use crate::plan::{ExecutionPlan, PlanDiagnostics};
use crate::restore::RestoreEngine;
use crate::scan::Scanner;
use crate::session::Session;
use crate::shell::{NullNotifier, ShellNotifier, SystemShellNotifier};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "deskgroup")]
#[command(version, about = "Group a cluttered directory into folders, and put it back")]
pub struct Cli {
    /// Directory whose direct children are organized
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,

    /// Configuration file (defaults to .deskgrouprc.toml, then ~/.config/deskgroup/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log engine decisions at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Move files into group folders, saving a baseline first
    Organize {
        /// Do not overwrite the saved baseline
        #[arg(long)]
        skip_baseline: bool,
    },
    /// Show the plan without touching anything (default)
    DryRun,
    /// Move files back to where the baseline recorded them
    Restore,
    /// Show baseline and last run
    Status,
}

/// A normalized plan plus what planning observed.
#[derive(Debug, Clone)]
pub struct PreparedPlan {
    pub plan: ExecutionPlan,
    pub diagnostics: PlanDiagnostics,
}

/// Scans `root` and builds the final plan for it.
pub fn prepare_plan(
    fs: &dyn FileSystem,
    root: &Path,
    config: &Config,
) -> Result<PreparedPlan, PrepareError> {
    let filters = config.compile_filters()?;
    let items = Scanner::new(fs, filters)
        .scan(root)
        .map_err(|source| PrepareError::Scan {
            root: root.to_path_buf(),
            source,
        })?;
    let session = Session::new(items);

    let default_group = &config.organizer.default_group;
    let (raw, mut diagnostics) = PlanGenerator::new(root)
        .with_default_group(default_group.clone())
        .generate_with_diagnostics(session.groups(), root, session.items())?;
    let plan = PlanNormalizer::default()
        .with_default_group(default_group.clone())
        .normalize_with_diagnostics(&raw, session.groups(), session.items(), &mut diagnostics)?;

    Ok(PreparedPlan { plan, diagnostics })
}

/// Runs a command against `root`.
///
/// # Examples
///
/// ```no_run
/// use deskgroup::cli::{run_cli, Command};
/// use std::path::Path;
///
/// if let Err(e) = run_cli(Command::DryRun, Path::new("/home/me/Desktop"), None) {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run_cli(command: Command, root: &Path, config_path: Option<&Path>) -> Result<(), String> {
    let config =
        Config::load(config_path).map_err(|e| format!("Error loading configuration: {}", e))?;
    let root = std::fs::canonicalize(root)
        .map_err(|e| format!("Root directory {} is not usable: {}", root.display(), e))?;
    if !root.is_dir() {
        return Err(format!("{} is not a directory", root.display()));
    }

    let fs = RealFileSystem;
    let notifier: &dyn ShellNotifier = if config.organizer.refresh_shell {
        &SystemShellNotifier
    } else {
        &NullNotifier
    };

    match command {
        Command::Organize { skip_baseline } => organize(&fs, notifier, &root, &config, skip_baseline),
        Command::DryRun => dry_run(&fs, &root, &config),
        Command::Restore => restore(&fs, notifier, &root),
        Command::Status => status(&fs, &root),
    }
}

/// A plan with no moves means the directory is already organized.
fn prepare_or_report(
    fs: &dyn FileSystem,
    root: &Path,
    config: &Config,
) -> Result<Option<PreparedPlan>, String> {
    match prepare_plan(fs, root, config) {
        Ok(prepared) => Ok(Some(prepared)),
        Err(PrepareError::Plan(PlanError::NoMoves { eligible })) => {
            OutputFormatter::info(&format!(
                "Nothing to organize: {} eligible file(s), all already in place.",
                eligible
            ));
            Ok(None)
        }
        Err(e) => Err(format!("Planning failed, nothing was changed: {}", e)),
    }
}

fn organize(
    fs: &dyn FileSystem,
    notifier: &dyn ShellNotifier,
    root: &Path,
    config: &Config,
    skip_baseline: bool,
) -> Result<(), String> {
    OutputFormatter::info(&format!("Organizing contents of: {}", root.display()));
    let Some(prepared) = prepare_or_report(fs, root, config)? else {
        return Ok(());
    };
    let plan = &prepared.plan;

    let pb = OutputFormatter::create_progress_bar(
        (plan.folders_to_create.len() + plan.files_to_move.len()) as u64,
    );
    let report = Executor::new(fs, notifier)
        .execute_with_progress(plan, skip_baseline, |step| {
            if let ExecutionStep::Move { file_move, .. } = &step {
                pb.set_message(
                    file_move
                        .source_path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                );
            }
            pb.inc(1);
        })
        .map_err(|e| format!("Organize aborted, nothing was changed: {}", e))?;
    pb.finish_and_clear();

    OutputFormatter::summary_table(plan);
    OutputFormatter::execution_report(&report);
    if report.baseline_saved {
        OutputFormatter::plain(&format!(
            "Baseline saved. Use 'deskgroup {} restore' to revert.",
            root.display()
        ));
    }

    if report.success() {
        Ok(())
    } else {
        Err("Some operations failed; review the errors above.".to_string())
    }
}

fn dry_run(fs: &dyn FileSystem, root: &Path, config: &Config) -> Result<(), String> {
    OutputFormatter::dry_run_notice(&format!("Analyzing contents of: {}", root.display()));
    let Some(prepared) = prepare_or_report(fs, root, config)? else {
        return Ok(());
    };

    OutputFormatter::plan(&prepared.plan);
    OutputFormatter::diagnostics(&prepared.diagnostics);
    OutputFormatter::summary_table(&prepared.plan);
    OutputFormatter::success("Dry run complete. No files were modified.");
    OutputFormatter::plain(&format!(
        "Run 'deskgroup {} organize' to apply this plan.",
        root.display()
    ));
    Ok(())
}

fn restore(fs: &dyn FileSystem, notifier: &dyn ShellNotifier, root: &Path) -> Result<(), String> {
    OutputFormatter::info(&format!("Restoring: {}", root.display()));
    match RestoreEngine::new(fs, notifier, root).restore() {
        Ok(report) => {
            OutputFormatter::restore_report(&report);
            if report.success() {
                Ok(())
            } else {
                Err("Restore finished with errors; review them above.".to_string())
            }
        }
        Err(RestoreError::Baseline(BaselineError::Missing { .. })) => {
            OutputFormatter::warning("Nothing to restore yet: no baseline has been saved.");
            Ok(())
        }
        Err(e) => Err(format!("Restore FAILED: {}", e)),
    }
}

fn status(fs: &dyn FileSystem, root: &Path) -> Result<(), String> {
    OutputFormatter::header(&format!("STATUS {}", root.display()));

    let store = BaselineStore::new(fs, root);
    match store.load() {
        Ok(snapshot) => OutputFormatter::success(&format!(
            "Baseline: {} entries ({} files, {} folders)",
            snapshot.len(),
            snapshot.files().count(),
            snapshot.folders().count()
        )),
        Err(BaselineError::Missing { .. }) => OutputFormatter::plain("Baseline: none"),
        Err(e) => OutputFormatter::warning(&format!("Baseline unusable: {}", e)),
    }

    match HistoryLog::new(fs, root).last() {
        Ok(Some(record)) => {
            let when = record.timestamp.with_timezone(&chrono::Local);
            let line = format!(
                "Last run {}: {} moved, {} folder(s) created, {} error(s)",
                when.format("%Y-%m-%d %H:%M:%S"),
                record.files_moved,
                record.folders_created,
                record.errors
            );
            if record.success {
                OutputFormatter::success(&line);
            } else {
                OutputFormatter::warning(&line);
            }
        }
        Ok(None) => OutputFormatter::plain("No runs recorded."),
        Err(e) => OutputFormatter::warning(&format!("History unreadable: {}", e)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryFileSystem;

    #[test]
    fn test_parse_defaults_to_dry_run() {
        let cli = Cli::try_parse_from(["deskgroup", "/home/me/Desktop"]).unwrap();
        assert_eq!(cli.root, PathBuf::from("/home/me/Desktop"));
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_parse_organize_flags() {
        let cli = Cli::try_parse_from([
            "deskgroup",
            "/d",
            "organize",
            "--skip-baseline",
            "--config",
            "x.toml",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.command, Some(Command::Organize { skip_baseline: true }));
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert!(cli.verbose);
    }

    #[test]
    fn test_parse_other_commands() {
        for (arg, expected) in [
            ("dry-run", Command::DryRun),
            ("restore", Command::Restore),
            ("status", Command::Status),
        ] {
            let cli = Cli::try_parse_from(["deskgroup", "/d", arg]).unwrap();
            assert_eq!(cli.command, Some(expected));
        }
    }

    #[test]
    fn test_prepare_plan_uses_configured_default_group() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/d/invoice-march.pdf", "")
            .add_file("/d/invoice-april.pdf", "")
            .add_file("/d/readme.txt", "");
        let config = Config::from_toml_str("[organizer]\ndefault_group = \"Misc\"\n").unwrap();

        let prepared = prepare_plan(&fs, Path::new("/d"), &config).unwrap();
        assert_eq!(
            prepared.plan.folders_to_create,
            vec![PathBuf::from("/d/Misc"), PathBuf::from("/d/invoice")]
        );
        assert_eq!(prepared.diagnostics.eligible, 3);
    }

    #[test]
    fn test_prepare_plan_respects_filters() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/d/desktop.ini", "").add_file("/d/notes.txt", "");
        let config =
            Config::from_toml_str("[filters.exclude]\nfilenames = [\"desktop.ini\"]\n").unwrap();

        let prepared = prepare_plan(&fs, Path::new("/d"), &config).unwrap();
        assert_eq!(prepared.plan.files_to_move.len(), 1);
        assert_eq!(
            prepared.plan.files_to_move[0].source_path,
            PathBuf::from("/d/notes.txt")
        );
    }

    #[test]
    fn test_prepare_plan_on_organized_root_reports_no_moves() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/d/Unsorted/readme.txt", "");
        let err = prepare_plan(&fs, Path::new("/d"), &Config::default()).unwrap_err();
        assert!(matches!(err, PrepareError::Plan(PlanError::NoMoves { .. })));
    }
}
