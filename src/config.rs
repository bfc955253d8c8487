//! Configuration types for the media archiver

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::Error;

/// What a run does with each resolved file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Copy files into a fresh bucket of the archive
    #[default]
    Copy,
    /// Move files into a fresh bucket of the archive
    Move,
    /// Find the already archived copy of each file and fix its timestamps
    #[serde(alias = "date")]
    Retime,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Copy => "copy",
            Mode::Move => "move",
            Mode::Retime => "retime",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "copy" => Ok(Mode::Copy),
            "move" => Ok(Mode::Move),
            // "date" is what older configurations call retime
            "retime" | "date" => Ok(Mode::Retime),
            _ => Err(Error::UnknownMode(s.to_string())),
        }
    }
}

/// Maps a set of file extensions to a destination category directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaTypeRule {
    /// Lowercase extensions without the leading dot
    #[serde(rename = "ext")]
    pub extensions: BTreeSet<String>,

    /// Category directory under the destination root
    #[serde(rename = "dir")]
    pub directory: String,
}

impl MediaTypeRule {
    pub fn new<I, S>(directory: impl Into<String>, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| normalize_extension(e.as_ref()))
                .filter(|e| !e.is_empty())
                .collect(),
            directory: directory.into(),
        }
    }

    /// Whether this rule claims the given (already normalized) extension
    pub fn matches(&self, extension: &str) -> bool {
        self.extensions.contains(extension)
    }
}

/// Lowercase an extension and strip its leading separator
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim();
    ext.strip_prefix('.').unwrap_or(ext).to_lowercase()
}

/// Configuration file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Default mode when none is given on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    /// Dry run mode - report operations without touching the filesystem
    #[serde(default)]
    pub dry_run: bool,

    /// Extension to category rules, first match wins
    #[serde(default)]
    pub media: Vec<MediaTypeRule>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: None,
            dry_run: false,
            media: vec![
                MediaTypeRule::new(
                    "photos",
                    [
                        "jpg", "jpeg", "png", "gif", "bmp", "webp", "heic", "heif", "avif",
                        "tiff", "tif",
                    ],
                ),
                MediaTypeRule::new(
                    "videos",
                    ["mp4", "mov", "avi", "mkv", "wmv", "flv", "m4v", "3gp", "mts"],
                ),
                MediaTypeRule::new(
                    "raw",
                    [
                        "raw", "arw", "cr2", "cr3", "nef", "orf", "rw2", "dng", "raf", "srw",
                        "pef",
                    ],
                ),
            ],
        }
    }
}

impl Config {
    /// Default configuration file location: `~/.media-archiver/conf.toml`
    pub fn default_path() -> PathBuf {
        expand_home(Path::new("~/.media-archiver/conf.toml"))
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        // Hand-written files may use upper case or dotted extensions
        config.media = config
            .media
            .into_iter()
            .map(|rule| MediaTypeRule::new(rule.directory, rule.extensions))
            .collect();

        Ok(config)
    }

    /// Generate a sample configuration file content
    pub fn sample_config() -> String {
        r#"# Media Archiver Configuration File
# Default location: ~/.media-archiver/conf.toml

# Mode: "copy", "move" or "retime"
# - copy: copy files to <dest>/<dir>/YYYY/MM/DD/<bucket>/ (default)
# - move: same layout, but the source file is moved
# - retime: find each file already in the archive (same name and size)
#           and fix its access/modification times from the source
mode = "copy"

# Dry run mode - log what would be done without doing it
dry_run = false

# Category rules, checked in order. Files whose extension matches no rule
# land in the dated folders directly under the destination root.
[[media]]
dir = "photos"
ext = ["jpg", "jpeg", "png", "gif", "bmp", "webp", "heic", "heif", "avif", "tiff", "tif"]

[[media]]
dir = "videos"
ext = ["mp4", "mov", "avi", "mkv", "wmv", "flv", "m4v", "3gp", "mts"]

[[media]]
dir = "raw"
ext = ["raw", "arw", "cr2", "cr3", "nef", "orf", "rw2", "dng", "raf", "srw", "pef"]
"#
        .to_string()
    }
}

/// Immutable settings for one run, built once from CLI and configuration
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory whose entries are archived
    pub source: PathBuf,

    /// Archive root
    pub destination: PathBuf,

    pub mode: Mode,

    pub dry_run: bool,

    /// Descend into source subdirectories
    pub recurse: bool,

    /// Entries created at or before this instant are ignored
    pub since: Option<DateTime<Local>>,

    /// Extension to category rules, first match wins
    pub rules: Vec<MediaTypeRule>,
}

impl Settings {
    /// Settings with the default rules and no cutoff
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>, mode: Mode) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            mode,
            dry_run: false,
            recurse: false,
            since: None,
            rules: Config::default().media,
        }
    }

    /// Reject settings that would make the archive feed on itself
    pub fn validate(&self) -> Result<(), Error> {
        if self.source == self.destination {
            return Err(Error::Config(format!(
                "source and destination are the same directory: {}",
                self.source.display()
            )));
        }

        if self.recurse && self.destination.starts_with(&self.source) {
            return Err(Error::Config(format!(
                "destination {} is inside source {} and --recurse is set",
                self.destination.display(),
                self.source.display()
            )));
        }

        Ok(())
    }
}

/// Expand a leading `~` to the current user's home directory
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };

    match home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}

/// Errors that can occur when loading configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read configuration file
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse configuration file
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ReadError { path, source } => {
                write!(f, "Failed to read config file '{}': {}", path.display(), source)
            }
            ConfigError::ParseError { path, source } => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
        }
    }
}
