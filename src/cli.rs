//! Command-line interface module for foldersort.
//!
//! This module is the caller of the sorting engine:
//! - Argument parsing
//! - Merging command-line values over the configuration file
//! - Validation before anything touches the filesystem
//! - Running a single pass, a dry run, or the repeating cycle

use crate::config::{RuleEntry, SorterConfig};
use crate::cycle::{CycleController, CycleSettings};
use crate::output::{ConsoleReporter, OutputFormatter};
use crate::routing_rule::RuleSet;
use crate::rule_engine::{PassOptions, RuleEngine};
use crate::signal::setup_shutdown_signal;
use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use log::debug;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Sort the top-level entries of a directory into folders, again and again.
#[derive(Debug, Parser)]
#[command(name = "foldersort", version, about)]
pub struct Cli {
    /// Directory to sort (overrides `path` from the config file)
    pub path: Option<PathBuf>,

    /// Routing rule as FOLDER[:EXTENSION[:KEYWORD]], e.g. "PDFs:.pdf" or "Invoices::invoice".
    /// Up to five, evaluated in order. Replaces the rules from the config file.
    #[arg(short, long = "rule", value_name = "RULE")]
    pub rules: Vec<RuleEntry>,

    /// Configuration file (defaults to .foldersortrc.toml, then ~/.config/foldersort/config.toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Seconds to wait between passes
    #[arg(short, long, value_name = "SECONDS")]
    pub interval: Option<u32>,

    /// Also classify folders that are themselves rule destinations
    #[arg(long)]
    pub rescan_destinations: bool,

    /// Run a single pass and exit
    #[arg(long, conflicts_with = "dry_run")]
    pub once: bool,

    /// Show what a pass would move without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Print every moved entry after each pass
    #[arg(short, long)]
    pub list_moves: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long, conflicts_with_all = ["once", "dry_run"])]
    pub print_config: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// What the CLI has been asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortCommand {
    /// Sort repeatedly until interrupted.
    Watch { list_moves: bool },
    /// Sort once.
    Once,
    /// Report the plan of one pass without moving anything.
    DryRun,
    /// Print the merged configuration.
    PrintConfig,
}

impl Cli {
    pub fn command(&self) -> SortCommand {
        if self.print_config {
            SortCommand::PrintConfig
        } else if self.dry_run {
            SortCommand::DryRun
        } else if self.once {
            SortCommand::Once
        } else {
            SortCommand::Watch {
                list_moves: self.list_moves,
            }
        }
    }

    /// Loads the configuration file and layers the command-line values on top.
    pub fn resolve_config(&self) -> Result<SorterConfig> {
        let mut config = SorterConfig::load(self.config.as_deref())
            .context("Error loading configuration")?;

        if let Some(path) = &self.path {
            config.path = Some(path.clone());
        }
        if !self.rules.is_empty() {
            config.rules = self.rules.clone();
        }
        if let Some(interval) = self.interval {
            config.interval = interval;
        }
        config.rescan_destinations |= self.rescan_destinations;

        debug!("Effective configuration: {:?}", config);
        Ok(config)
    }
}

/// Runs the CLI application for parsed arguments.
pub fn run_cli(cli: &Cli) -> Result<()> {
    let config = cli.resolve_config()?;
    run_command(cli.command(), &config)
}

/// Runs one command against an already merged configuration.
///
/// # Examples
///
/// ```no_run
/// use foldersort::cli::{SortCommand, run_command};
/// use foldersort::config::SorterConfig;
///
/// let config = SorterConfig {
///     path: Some("/home/me/Downloads".into()),
///     rules: vec!["PDFs:.pdf".parse().unwrap()],
///     ..Default::default()
/// };
/// if let Err(e) = run_command(SortCommand::Once, &config) {
///     eprintln!("Error: {:#}", e);
/// }
/// ```
pub fn run_command(command: SortCommand, config: &SorterConfig) -> Result<()> {
    match command {
        SortCommand::PrintConfig => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
        SortCommand::DryRun => dry_run(config),
        SortCommand::Once => sort_once(config),
        SortCommand::Watch { list_moves } => watch(config, list_moves),
    }
}

fn engine_for(config: &SorterConfig) -> RuleEngine {
    RuleEngine::with_options(PassOptions {
        rescan_destinations: config.rescan_destinations,
    })
}

fn print_rules(rules: &RuleSet) {
    for (index, rule) in rules.rules().iter().enumerate() {
        if rule.is_inert() {
            OutputFormatter::warning(&format!("Rule {} matches nothing: {}", index + 1, rule));
        } else if rule.is_active() {
            println!("  {}. {}", index + 1, rule);
        }
    }
}

fn dry_run(config: &SorterConfig) -> Result<()> {
    let (target, rules) = config.validated()?;
    OutputFormatter::info(&format!("DRY RUN: analyzing {}", target.display()));
    print_rules(&rules);

    let plan = engine_for(config).plan_pass(&target, &rules)?;
    OutputFormatter::plan(&plan, &target);
    OutputFormatter::success("Dry run complete. Nothing was moved.");
    Ok(())
}

fn sort_once(config: &SorterConfig) -> Result<()> {
    let (target, rules) = config.validated()?;
    OutputFormatter::info(&format!("Sorting {}", target.display()));

    let summary = engine_for(config)
        .run_pass(&target, &rules)
        .with_context(|| format!("Sorting {} failed", target.display()))?;

    for line in OutputFormatter::move_lines(&summary, &target) {
        println!("{}", line);
    }
    OutputFormatter::success(&format!(
        "Sorting completed. ({})",
        OutputFormatter::pass_details(&summary)
    ));
    Ok(())
}

fn watch(config: &SorterConfig, list_moves: bool) -> Result<()> {
    let (target, rules) = config.validated()?;
    OutputFormatter::info(&format!(
        "Sorting {} every {} seconds. Press Ctrl-C to stop.",
        target.display(),
        config.interval
    ));
    print_rules(&rules);

    let shutdown = setup_shutdown_signal().context("Could not install Ctrl-C handler")?;
    let reporter = if list_moves {
        ConsoleReporter::with_move_listing(&target)
    } else {
        ConsoleReporter::new()
    };

    let mut controller = CycleController::new(CycleSettings {
        interval_ticks: config.interval,
        tick: Duration::from_secs(1),
        pass_options: engine_for(config).options(),
    });
    controller.start(&target, rules, Arc::new(reporter))?;

    // A closed channel means the handler is gone; stop either way.
    let _ = shutdown.recv();
    controller.stop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rules_and_flags() {
        let cli = Cli::try_parse_from([
            "foldersort",
            "/tmp/inbox",
            "-r",
            "PDFs:.pdf",
            "--rule",
            "Invoices::invoice",
            "--interval",
            "10",
            "--once",
        ])
        .unwrap();

        assert_eq!(cli.path, Some(PathBuf::from("/tmp/inbox")));
        assert_eq!(cli.rules.len(), 2);
        assert_eq!(cli.rules[1].keyword, "invoice");
        assert_eq!(cli.interval, Some(10));
        assert_eq!(cli.command(), SortCommand::Once);
    }

    #[test]
    fn test_invalid_rule_is_rejected_by_parser() {
        let result = Cli::try_parse_from(["foldersort", "-r", ":.pdf"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_once_conflicts_with_dry_run() {
        let result = Cli::try_parse_from(["foldersort", "--once", "--dry-run"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_default_command_is_watch() {
        let cli = Cli::try_parse_from(["foldersort", "-l"]).unwrap();
        assert_eq!(cli.command(), SortCommand::Watch { list_moves: true });
    }

    #[test]
    fn test_resolve_config_overrides_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let file = temp_dir.path().join("sort.toml");
        std::fs::write(
            &file,
            "path = \"/from/file\"\ninterval = 5\n[[rules]]\nfolder = \"Old\"\nextension = \".old\"\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "foldersort",
            "--config",
            file.to_str().unwrap(),
            "-r",
            "New:.new",
            "--rescan-destinations",
        ])
        .unwrap();
        let config = cli.resolve_config().unwrap();

        assert_eq!(config.path, Some(PathBuf::from("/from/file")));
        assert_eq!(config.interval, 5);
        assert_eq!(config.rules.len(), 1);
        assert_eq!(config.rules[0].folder, "New");
        assert!(config.rescan_destinations);
    }
}
