//! Terminal output: colored status lines, the progress bar and summaries of
//! plans, executions and restores.

use crate::executor::ExecutionReport;
use crate::plan::{ExecutionPlan, PlanDiagnostics};
use crate::restore::RestoreReport;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

/// All user-facing console output goes through here.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// ```no_run
    /// use deskgroup::output::OutputFormatter;
    /// OutputFormatter::success("Desktop organized");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red to stderr.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Progress bar sized for one plan's folder creates and moves.
    ///
    /// ```no_run
    /// use deskgroup::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(12);
    /// pb.inc(1);
    /// pb.finish_with_message("done");
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        let pb = ProgressBar::new(total);
        pb.set_style(style);
        pb
    }

    /// Prints folders to create and moves grouped by destination folder.
    pub fn plan(plan: &ExecutionPlan) {
        Self::header("FOLDERS TO CREATE");
        if plan.folders_to_create.is_empty() {
            Self::plain("  (none, all target folders exist)");
        }
        for folder in &plan.folders_to_create {
            println!("  {} {}", "+".green(), display_name(folder));
        }

        Self::header("MOVES");
        for (folder, moves) in plan.moves_by_folder() {
            println!("  {}/", display_name(&folder).bold());
            for file_move in moves {
                println!("    {}", display_name(&file_move.source_path));
            }
        }
    }

    /// Prints groups the planner left out and why.
    pub fn diagnostics(diagnostics: &PlanDiagnostics) {
        if !diagnostics.excluded_groups.is_empty() {
            Self::header("EXCLUDED GROUPS");
            for (name, reason) in &diagnostics.excluded_groups {
                println!("  {} {}: {}", "-".yellow(), name, reason);
            }
        }
        Self::plain(&format!(
            "\n{} eligible, {} grouped, {} by extension, {} to the default folder",
            diagnostics.eligible, diagnostics.grouped, diagnostics.fallback, diagnostics.defaulted
        ));
    }

    /// Files per destination folder, with a total row.
    pub fn summary_table(plan: &ExecutionPlan) {
        Self::header("SUMMARY");

        let rows: Vec<(String, usize)> = plan
            .moves_by_folder()
            .into_iter()
            .map(|(folder, moves)| (display_name(&folder), moves.len()))
            .collect();
        let width = rows
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0)
            .max(6);

        println!("{:<width$} | {}", "Folder".bold(), "Files".bold());
        println!("{}", "-".repeat(width + 10));
        for (name, count) in &rows {
            println!("{:<width$} | {} {}", name, count.to_string().green(), plural(*count));
        }
        println!("{}", "-".repeat(width + 10));
        let total = plan.files_to_move.len();
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total.to_string().green().bold(),
            plural(total)
        );
    }

    pub fn execution_report(report: &ExecutionReport) {
        for error in &report.errors {
            Self::error(&error.to_string());
        }
        if !report.baseline_saved {
            Self::warning("No baseline was saved; this run cannot be restored.");
        }
        let counts = format!(
            "{} folder(s) created, {} file(s) moved",
            report.folders_created, report.files_moved
        );
        if report.success() {
            Self::success(&counts);
        } else {
            Self::error(&format!(
                "Organize FAILED: {counts}, {} error(s) ({} verification)",
                report.errors.len(),
                report.verification_failures()
            ));
        }
    }

    pub fn restore_report(report: &RestoreReport) {
        for file_move in &report.restored {
            println!(
                "  {} {} -> {}",
                "↺".cyan(),
                file_move.source_path.display(),
                file_move.destination_path.display()
            );
        }
        for folder in &report.folders_deleted {
            println!("  {} {}", "-".red(), folder.display());
        }
        for error in &report.errors {
            Self::error(&error.to_string());
        }
        let counts = format!(
            "{} restored, {} already in place, {} missing, {} folder(s) deleted",
            report.files_restored(),
            report.already_in_place,
            report.missing.len(),
            report.folders_deleted.len()
        );
        if report.success() {
            Self::success(&counts);
        } else {
            Self::warning(&format!("{counts}, {} error(s)", report.errors.len()));
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}
