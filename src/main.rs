//! Media Archiver - files photos and videos into a dated archive
//!
//! Plans every operation first, optionally writes the plan out, then
//! executes it. Any fatal error stops the run with its own exit code.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use media_archiver::plan::write_plan;
use media_archiver::{Cli, Config, Error, Executor, Planner, Settings};
use std::path::{Path, PathBuf};
use tracing::{Level, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

// CLI Output Module
mod cli_output {
    //! Colored lines for the end-of-run summary

    use crossterm::{
        ExecutableCommand,
        style::{Color, Print, Stylize, style},
    };
    use std::fmt::Display;
    use std::io::stdout;

    const WIDTH: usize = 60;
    const LABEL: Color = Color::DarkGrey;

    pub const GOOD: Color = Color::Green;
    pub const INFO: Color = Color::Cyan;
    pub const SKIPPED: Color = Color::Yellow;

    pub fn rule() {
        let _ = stdout().execute(Print(format!("{}\n", "─".repeat(WIDTH))));
    }

    pub fn heading(title: &str) {
        let pad = " ".repeat(WIDTH.saturating_sub(title.len()) / 2);
        let _ = stdout().execute(Print(format!("{pad}{}\n\n", title.bold())));
    }

    /// `  label: value`, the value bold and optionally colored
    pub fn field(label: &str, value: impl Display, color: Option<Color>) {
        let value = match color {
            Some(color) => style(value.to_string()).with(color).bold(),
            None => style(value.to_string()).bold(),
        };
        let _ = stdout().execute(Print("  "));
        let _ = stdout().execute(Print(style(format!("{label}: ")).with(LABEL)));
        let _ = stdout().execute(Print(format!("{value}\n")));
    }

    pub fn warning(msg: &str) {
        let _ = stdout().execute(Print(style("⚠ ").with(Color::Yellow).bold()));
        let _ = stdout().execute(Print(format!("{msg}\n")));
    }

    pub fn failure(msg: &str) {
        let _ = stdout().execute(Print(style("✗ ").with(Color::Red).bold()));
        let _ = stdout().execute(Print(format!("{msg}\n")));
    }
}

/// Exit code for failures that are not an archiver [`Error`]
const EXIT_UNEXPECTED: i32 = 7;

fn main() {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", Config::sample_config());
        return;
    }

    let exe_dir = get_executable_dir();
    let log_path = get_log_path(&exe_dir, &cli);

    let guard = setup_logging(&cli, &log_path);
    let log_file = guard.as_ref().map(|_| log_path.as_path());

    info!(version = env!("CARGO_PKG_VERSION"), "Media Archiver starting");
    if let Some(path) = log_file {
        info!(log_file = %path.display(), "Log file location");
    }

    if let Err(e) = run_cli_mode(&cli, &exe_dir, log_file) {
        let code = exit_code_for(&e);
        error!(error = %e, exit_code = code, "Run aborted");
        cli_output::failure(&format!("{:#}", e));

        // process::exit skips destructors, flush the log writer first
        drop(guard);
        std::process::exit(code);
    }
}

fn exit_code_for(e: &anyhow::Error) -> i32 {
    e.downcast_ref::<Error>()
        .map(Error::exit_code)
        .unwrap_or(EXIT_UNEXPECTED)
}

/// Plan, export and execute one run
fn run_cli_mode(cli: &Cli, exe_dir: &Path, log_file: Option<&Path>) -> Result<()> {
    let config = load_config(cli, exe_dir)?;
    let settings = cli.merge_with_config(config)?;

    if cli.verbose {
        info!(?settings, "Settings resolved");
    }

    settings.validate()?;

    let mut planner = Planner::new(&settings);
    let operations = planner.plan()?;

    if let Some(ref plan_out) = cli.plan_out {
        write_plan(plan_out, &settings, &operations)?;
        info!(plan_file = %plan_out.display(), "Plan written");
    }

    let mut executor = Executor::new(&settings);
    executor.execute_all(&operations)?;

    print_summary(&settings, &planner, &executor, log_file);
    Ok(())
}

fn print_summary(
    settings: &Settings,
    planner: &Planner<'_>,
    executor: &Executor,
    log_file: Option<&Path>,
) {
    use cli_output::*;

    let plan = planner.stats();
    let exec = executor.stats();

    rule();
    heading("Archive run complete");
    rule();

    field("Mode", settings.mode, None);
    field("Source", settings.source.display(), None);
    field("Destination", settings.destination.display(), None);
    println!();
    field("Planned", plan.planned, Some(GOOD));
    field("Copied", exec.copied, Some(GOOD));
    field("Moved", exec.moved, Some(GOOD));
    field("Timestamps fixed", exec.retimed, Some(INFO));
    field("Folders created", exec.folders_created, Some(INFO));
    field("Unmatched extensions", plan.unmatched, Some(SKIPPED));
    field("Before cutoff", plan.before_cutoff, Some(SKIPPED));
    field("Not in archive", plan.not_found, Some(SKIPPED));
    field("Directories skipped", plan.directories_skipped, Some(SKIPPED));
    println!();

    if settings.dry_run {
        rule();
        warning("Dry run: no writing operation was done on files");
    }

    rule();
    if let Some(path) = log_file {
        field("Log file", path.display(), None);
    }
}

/// Get the directory where the executable is located
fn get_executable_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Determine the log file path based on config file or timestamp
fn get_log_path(exe_dir: &Path, cli: &Cli) -> PathBuf {
    let log_dir = exe_dir.join("Log");
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");

    if let Some(config_name) = cli.config_name() {
        log_dir
            .join(&config_name)
            .join(format!("{}_{}.log", config_name, timestamp))
    } else {
        log_dir.join(format!("Archive_{}.log", timestamp))
    }
}

/// Resolve config path - supports shorthand syntax
fn resolve_config_path(exe_dir: &Path, config_path: &Path) -> PathBuf {
    let config_path = media_archiver::config::expand_home(config_path);
    if config_path.exists() {
        return config_path;
    }

    let with_extension = if config_path.extension().is_none() {
        config_path.with_extension("toml")
    } else {
        config_path.clone()
    };

    if with_extension.exists() {
        return with_extension;
    }

    let filename = config_path
        .file_name()
        .unwrap_or(config_path.as_os_str());

    let mut in_config_dir = exe_dir.join("Config").join(filename);
    if in_config_dir.extension().is_none() {
        in_config_dir = in_config_dir.with_extension("toml");
    }

    if in_config_dir.exists() {
        return in_config_dir;
    }

    config_path
}

/// Load configuration from the given file, the default file, or built-in defaults
fn load_config(cli: &Cli, exe_dir: &Path) -> Result<Config> {
    if let Some(ref config_path) = cli.config {
        let resolved_path = resolve_config_path(exe_dir, config_path);
        info!(config_file = %resolved_path.display(), "Loading configuration from file");
        return Ok(Config::load_from_file(&resolved_path).map_err(Error::from)?);
    }

    let default_path = Config::default_path();
    if default_path.exists() {
        info!(config_file = %default_path.display(), "Loading configuration from file");
        return Ok(Config::load_from_file(&default_path).map_err(Error::from)?);
    }

    info!("No configuration file found, using built-in media types");
    Ok(Config::default())
}

fn open_log_file(log_path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }

    std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_path)
        .with_context(|| format!("opening log file {}", log_path.display()))
}

/// Setup logging (file + console)
///
/// Falls back to console-only logging when the log file cannot be opened,
/// in which case no guard is returned.
fn setup_logging(cli: &Cli, log_path: &Path) -> Option<WorkerGuard> {
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let subscriber = tracing_subscriber::registry().with(env_filter);

    let file = match open_log_file(log_path) {
        Ok(file) => file,
        Err(e) => {
            subscriber
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
            warn!(error = %format!("{e:#}"), "Log file unavailable, logging to console only");
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    if cli.json_log {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Some(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_archiver_errors_keep_their_exit_code() {
        let err = anyhow::Error::from(Error::SourceUnreadable {
            path: "in".into(),
            source: std::io::Error::other("gone"),
        });
        assert_eq!(exit_code_for(&err), 1);

        let err = anyhow::Error::from(Error::UnknownMode("sync".into()));
        assert_eq!(exit_code_for(&err), 4);
    }

    #[test]
    fn test_other_failures_do_not_reuse_archiver_codes() {
        let err = anyhow::anyhow!("creating log directory /opt/bin/Log");
        assert_eq!(exit_code_for(&err), EXIT_UNEXPECTED);
        assert!(!(1..=6).contains(&EXIT_UNEXPECTED));
    }

    #[test]
    fn test_unwritable_log_location_is_reported() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("Log");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let err = open_log_file(&blocker.join("Archive.log")).unwrap_err();
        assert!(format!("{err:#}").contains("creating log directory"));
    }
}
