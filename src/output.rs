//! Output formatting and styling module.
//!
//! Everything the CLI prints goes through here: timestamped status lines, the
//! countdown spinner shown between passes, and the dry-run plan table.

use crate::cycle::{CountdownMessage, CycleObserver, StatusMessage};
use crate::rule_engine::{PassSummary, PlannedMove};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - The countdown spinner shown between passes
/// - Move listings, dry-run plans and summary tables
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Arguments
    ///
    /// * `message` - The message to display
    ///
    /// # Example
    ///
    /// ```no_run
    /// use foldersort::output::OutputFormatter;
    /// OutputFormatter::success("Sorting completed.");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    ///
    /// # Arguments
    ///
    /// * `message` - The message to display
    ///
    /// # Example
    ///
    /// ```no_run
    /// use foldersort::output::OutputFormatter;
    /// OutputFormatter::error("Error: Invalid path provided.");
    /// ```
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    ///
    /// # Arguments
    ///
    /// * `message` - The message to display
    ///
    /// # Example
    ///
    /// ```no_run
    /// use foldersort::output::OutputFormatter;
    /// OutputFormatter::warning("Rule 2 matches nothing: Misc/ (inert)");
    /// ```
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    ///
    /// # Arguments
    ///
    /// * `message` - The message to display
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates the spinner that shows the countdown between passes.
    pub fn create_countdown_spinner() -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner
    }

    /// Formats a status line with the current local time.
    ///
    /// # Example
    ///
    /// ```
    /// use foldersort::output::OutputFormatter;
    /// let line = OutputFormatter::timestamped("Sorting started...");
    /// assert!(line.starts_with('['));
    /// assert!(line.ends_with("] Sorting started..."));
    /// ```
    pub fn timestamped(message: &str) -> String {
        format!("[{}] {}", chrono::Local::now().format("%H:%M:%S"), message)
    }

    /// One-line description of a completed pass.
    pub fn pass_details(summary: &PassSummary) -> String {
        let mut details = format!(
            "{} moved, {} left in place",
            summary.moved(),
            summary.left_in_place
        );
        if summary.replaced() > 0 {
            details.push_str(&format!(", {} replaced", summary.replaced()));
        }
        if !summary.folders_created.is_empty() {
            details.push_str(&format!(
                ", {} folders created",
                summary.folders_created.len()
            ));
        }
        details
    }

    /// Lists every move of a pass, one line each.
    pub fn move_lines(summary: &PassSummary, base_path: &Path) -> Vec<String> {
        summary
            .moves
            .iter()
            .map(|record| {
                format!(
                    "   {} → {}",
                    relative(&record.source, base_path),
                    relative(&record.destination, base_path)
                )
            })
            .collect()
    }

    /// Prints what a pass would do, followed by a per-folder summary.
    pub fn plan(plan: &[PlannedMove], base_path: &Path) {
        if plan.is_empty() {
            Self::info("Nothing would be moved.");
            return;
        }

        Self::header("DRY RUN: entries would be moved as follows:");
        let mut folder_counts: HashMap<String, usize> = HashMap::new();
        for planned in plan {
            println!(
                " - {} ({})",
                relative(&planned.source, base_path),
                planned.kind.label()
            );
            println!(
                "   → Would move to {}/ (rule {})",
                planned.folder,
                planned.rule_index + 1
            );
            *folder_counts.entry(planned.folder.clone()).or_insert(0) += 1;
        }

        Self::summary_table(&folder_counts, plan.len());
    }

    /// Prints a summary table with entry counts by destination folder.
    ///
    /// # Arguments
    ///
    /// * `folder_counts` - Number of entries per destination folder
    /// * `total` - Total number of entries, printed in the last row
    pub fn summary_table(folder_counts: &HashMap<String, usize>, total: usize) {
        Self::header("SUMMARY");

        let mut folders: Vec<_> = folder_counts.iter().collect();
        folders.sort_by_key(|&(name, _)| name);

        let width = folders
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0)
            .max(6);

        println!("{:<width$} | {}", "Folder".bold(), "Entries".bold(), width = width);
        println!("{}", "-".repeat(width + 12));
        for (folder, count) in &folders {
            println!(
                "{:<width$} | {}",
                folder,
                count.to_string().green(),
                width = width
            );
        }
        println!("{}", "-".repeat(width + 12));
        println!(
            "{:<width$} | {}",
            "Total".bold(),
            total.to_string().green().bold(),
            width = width
        );
    }
}

fn relative(path: &Path, base_path: &Path) -> String {
    path.strip_prefix(base_path)
        .unwrap_or(path)
        .display()
        .to_string()
}

/// Cycle observer that renders status lines and the countdown on the terminal.
pub struct ConsoleReporter {
    spinner: ProgressBar,
    base_path: Option<PathBuf>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self {
            spinner: OutputFormatter::create_countdown_spinner(),
            base_path: None,
        }
    }

    /// Also list every moved entry, relative to `base_path`.
    pub fn with_move_listing(base_path: &Path) -> Self {
        Self {
            spinner: OutputFormatter::create_countdown_spinner(),
            base_path: Some(base_path.to_path_buf()),
        }
    }

    fn line(&self, text: String) {
        self.spinner.suspend(|| println!("{}", text));
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleObserver for ConsoleReporter {
    fn on_status(&self, status: &StatusMessage) {
        let stamped = OutputFormatter::timestamped(&status.to_string());
        match status {
            StatusMessage::Started => self.line(stamped.cyan().to_string()),
            StatusMessage::Completed(summary) => {
                self.line(format!(
                    "{} {} ({})",
                    "✓".green(),
                    stamped.green(),
                    OutputFormatter::pass_details(summary)
                ));
                if let Some(base_path) = &self.base_path {
                    for line in OutputFormatter::move_lines(summary, base_path) {
                        self.line(line);
                    }
                }
            }
            StatusMessage::Failed(_) => self.line(format!("{} {}", "✗".red(), stamped.red())),
            StatusMessage::Stopped => self.line(stamped.yellow().to_string()),
        }
    }

    fn on_countdown_tick(&self, countdown: &CountdownMessage) {
        match countdown {
            CountdownMessage::Remaining(_) => self.spinner.set_message(countdown.to_string()),
            CountdownMessage::Halted => {
                self.spinner.finish_and_clear();
                self.line(countdown.to_string().yellow().to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing_rule::EntryKind;
    use crate::rule_engine::MoveRecord;

    fn summary() -> PassSummary {
        PassSummary {
            moves: vec![MoveRecord {
                source: PathBuf::from("/inbox/report.pdf"),
                destination: PathBuf::from("/inbox/PDFs/report.pdf"),
                rule_index: 0,
                kind: EntryKind::File,
                replaced_existing: true,
            }],
            folders_created: vec![PathBuf::from("/inbox/PDFs")],
            left_in_place: 2,
            skipped_destinations: 0,
        }
    }

    #[test]
    fn test_pass_details() {
        assert_eq!(
            OutputFormatter::pass_details(&summary()),
            "1 moved, 2 left in place, 1 replaced, 1 folders created"
        );
        assert_eq!(
            OutputFormatter::pass_details(&PassSummary::default()),
            "0 moved, 0 left in place"
        );
    }

    #[test]
    fn test_move_lines_are_relative() {
        let lines = OutputFormatter::move_lines(&summary(), Path::new("/inbox"));
        assert_eq!(lines, vec!["   report.pdf → PDFs/report.pdf".to_string()]);
    }

    #[test]
    fn test_timestamped_keeps_message() {
        let line = OutputFormatter::timestamped("Sorting completed.");
        assert!(line.starts_with('['));
        assert!(line.ends_with("] Sorting completed."));
    }
}
