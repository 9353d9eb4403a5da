//! Command-line interface module for dirsort.
//!
//! This module handles all CLI-related functionality including:
//! - Command parsing
//! - One-shot organization of a directory
//! - Watching a directory until interrupted
//! - Printing the effective category table

use crate::category::CategoryMap;
use crate::config::{OrganizerConfig, load_category_map};
use crate::organizer::{Organizer, PassReport};
use crate::output::OutputFormatter;
use crate::watcher::{PassOutcome, WatchHandle, start_watch_with};
use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

/// Sort files dropped into a directory into category folders.
#[derive(Parser, Debug)]
#[command(name = "dirsort", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a TOML category configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Represents a CLI command to execute.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Organize a directory once and print the report
    Organize {
        /// Directory to organize
        dir: PathBuf,

        /// Show what would be moved without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Organize a directory, then keep organizing it as files arrive
    Watch {
        /// Directory to watch
        dir: PathBuf,

        /// Do not organize existing files before watching
        #[arg(long)]
        skip_initial_pass: bool,
    },

    /// Print the effective category table
    Categories {
        /// Print as JSON
        #[arg(long, conflicts_with = "toml")]
        json: bool,

        /// Print as a configuration file
        #[arg(long)]
        toml: bool,
    },
}

impl Cli {
    /// Default log filter for the chosen verbosity.
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Runs the parsed command line.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, a pass fails
/// before touching any file, or the watch cannot be started.
pub fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    let categories = load_category_map(config_path).context("failed to load category configuration")?;

    match cli.command {
        Command::Organize { dir, dry_run, json } => {
            let report = organize_directory(&dir, &categories, dry_run)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                OutputFormatter::pass_report(&report);
            }
            Ok(())
        }
        Command::Watch {
            dir,
            skip_initial_pass,
        } => watch_directory(&dir, categories, config_path, skip_initial_pass),
        Command::Categories { json, toml } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&categories)?);
            } else if toml {
                print!("{}", OrganizerConfig::from(&categories).to_toml()?);
            } else {
                OutputFormatter::category_table(&categories);
            }
            Ok(())
        }
    }
}

/// Runs a single pass over `dir`.
pub fn organize_directory(dir: &Path, categories: &CategoryMap, dry_run: bool) -> Result<PassReport> {
    Organizer::new(dir)
        .dry_run(dry_run)
        .run(categories)
        .with_context(|| format!("failed to organize {}", dir.display()))
}

/// Organizes `dir`, then watches it until Ctrl+C or SIGTERM.
///
/// On unix, SIGHUP reloads the category configuration into the running watch.
pub fn watch_directory(
    dir: &Path,
    categories: CategoryMap,
    config_path: Option<&Path>,
    skip_initial_pass: bool,
) -> Result<()> {
    let mut handle = begin_watch(dir, categories, skip_initial_pass, print_outcome)?;
    OutputFormatter::info(&format!(
        "Watching {}. Press Ctrl+C to stop.",
        dir.display()
    ));

    let waited = wait_for_shutdown(&handle, config_path);
    handle.stop();
    waited?;

    OutputFormatter::success("Stopped watching.");
    Ok(())
}

/// Starts the watch on `dir`, then runs the initial pass unless skipped.
///
/// The subscription is live before the initial pass starts; the pass lock
/// keeps the initial pass and any event-triggered pass from overlapping.
fn begin_watch<F>(
    dir: &Path,
    categories: CategoryMap,
    skip_initial_pass: bool,
    observer: F,
) -> Result<WatchHandle>
where
    F: FnMut(&PassOutcome) + Send + 'static,
{
    let initial_categories = (!skip_initial_pass).then(|| categories.clone());

    let handle = start_watch_with(dir, categories, observer)
        .with_context(|| format!("failed to watch {}", dir.display()))?;

    if let Some(categories) = initial_categories {
        let report = organize_directory(dir, &categories, false)?;
        OutputFormatter::pass_report(&report);
    }
    Ok(handle)
}

fn print_outcome(outcome: &PassOutcome) {
    match outcome {
        Ok(report) if report.moved_count() > 0 || !report.is_clean() => {
            OutputFormatter::pass_report(report)
        }
        Ok(_) => {}
        Err(e) => OutputFormatter::error(&e.to_string()),
    }
}

fn wait_for_shutdown(handle: &WatchHandle, config_path: Option<&Path>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start signal runtime")?;
    runtime.block_on(wait_for_signals(handle, config_path))
}

#[cfg(unix)]
async fn wait_for_signals(handle: &WatchHandle, config_path: Option<&Path>) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    let mut hangup = signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for Ctrl+C")?;
                info!("Received Ctrl+C, shutting down...");
                return Ok(());
            }
            _ = terminate.recv() => {
                info!("Received SIGTERM, shutting down...");
                return Ok(());
            }
            _ = hangup.recv() => reload_categories(handle, config_path),
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signals(_handle: &WatchHandle, _config_path: Option<&Path>) -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("Received Ctrl+C, shutting down...");
    Ok(())
}

#[cfg(unix)]
fn reload_categories(handle: &WatchHandle, config_path: Option<&Path>) {
    match load_category_map(config_path) {
        Ok(categories) => {
            handle.replace_categories(categories);
            OutputFormatter::info("Category configuration reloaded.");
        }
        Err(e) => {
            tracing::error!("Keeping previous categories, reload failed: {}", e);
            OutputFormatter::warning(&format!("Reload failed: {}", e));
        }
    }
}
