//! CLI argument parsing with clap

use crate::config::{Config, Mode, Settings, expand_home};
use crate::error::{Error, Result};
use chrono::{DateTime, Local, NaiveDate, TimeZone};
use clap::Parser;
use std::path::PathBuf;

/// Media Archiver - file photos and videos into a dated archive
///
/// Every file goes to <dest>/<type>/YYYY/MM/DD/<bucket>/, where the type
/// folder comes from the file extension, the date from its modification
/// time and the bucket is a fresh letter (a-z) per run, so nothing already
/// archived is ever overwritten.
#[derive(Parser, Debug)]
#[command(name = "media-archiver")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Source directory to archive
    #[arg(short, long)]
    pub src: Option<PathBuf>,

    /// Archive root directory
    #[arg(short, long)]
    pub dest: Option<PathBuf>,

    /// Mode:
    /// - copy: copy files into the archive (default)
    /// - move: move files into the archive
    /// - retime: fix timestamps of files already in the archive
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Dry run mode - show what would be done without doing it
    #[arg(short = 'r', long)]
    pub dry_run: bool,

    /// Also archive the contents of source subdirectories
    #[arg(short = 'u', long)]
    pub recurse: bool,

    /// Only archive entries created after this date (YYYY-MM-DD)
    #[arg(short = 'n', long, value_name = "YYYY-MM-DD")]
    pub since: Option<String>,

    /// Path to configuration file (TOML format)
    ///
    /// Defaults to ~/.media-archiver/conf.toml when that file exists.
    /// CLI arguments override config file settings.
    #[arg(short = 'C', long, env = "MEDIA_ARCHIVER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write the planned operations to this file as JSON
    #[arg(long, value_name = "FILE")]
    pub plan_out: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Output log format as JSON
    #[arg(long)]
    pub json_log: bool,

    /// Print a sample configuration file and exit
    #[arg(long)]
    pub print_config: bool,
}

impl Cli {
    /// Get config file name (without extension) for log naming
    pub fn config_name(&self) -> Option<String> {
        self.config.as_ref().and_then(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.to_string())
        })
    }

    /// Merge CLI arguments with config from file into run settings
    /// CLI arguments take precedence over config file settings
    pub fn merge_with_config(&self, config: Config) -> Result<Settings> {
        let source = self
            .src
            .as_deref()
            .map(expand_home)
            .ok_or_else(|| Error::Config("no source directory given (--src)".into()))?;
        let destination = self
            .dest
            .as_deref()
            .map(expand_home)
            .ok_or_else(|| Error::Config("no destination directory given (--dest)".into()))?;

        let mode = match self.mode.as_deref().or(config.mode.as_deref()) {
            Some(value) => value.parse::<Mode>()?,
            None => Mode::default(),
        };

        let since = self.since.as_deref().map(parse_since).transpose()?;

        Ok(Settings {
            source,
            destination,
            mode,
            dry_run: self.dry_run || config.dry_run,
            recurse: self.recurse,
            since,
            rules: config.media,
        })
    }

    /// Convert CLI arguments to settings (when no config file is used)
    pub fn to_settings(&self) -> Result<Settings> {
        self.merge_with_config(Config::default())
    }
}

/// Parse a `YYYY-MM-DD` cutoff as local midnight
pub fn parse_since(value: &str) -> Result<DateTime<Local>> {
    let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| Error::Config(format!("invalid cutoff date: {value}")))?;

    Local
        .from_local_datetime(&midnight)
        .earliest()
        .ok_or_else(|| Error::Config(format!("cutoff date {value} has no local midnight")))
}
