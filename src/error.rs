//! Error types for the media archiver
//!
//! Every fatal condition of a run is a variant of [`Error`]. Nothing is
//! retried: the first error aborts the run and `main` turns it into a
//! process exit code with [`Error::exit_code`].

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for media archiver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the media archiver
#[derive(Error, Debug)]
pub enum Error {
    #[error("Could not read source directory: {}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to stat the file {}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("There is already a to z directory in {}", path.display())]
    BucketsExhausted { path: PathBuf },

    #[error("Unknown mode: {0}")]
    UnknownMode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to {action} {}: {source}", path.display())]
    Execute {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory traversal error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Chrono parse error: {0}")]
    ChronoParse(#[from] chrono::ParseError),
}

impl Error {
    /// Process exit code for this error; each fatal condition has its own
    ///
    /// Codes 1 to 6 belong to these variants. Two other codes can end a run:
    /// clap exits with 2 on a command line it cannot parse, before any
    /// archiving starts, and `main` uses 7 for failures that are not an
    /// [`Error`].
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::SourceUnreadable { .. } => 1,
            Error::Stat { .. } => 2,
            Error::BucketsExhausted { .. } => 3,
            Error::UnknownMode(_) => 4,
            Error::Config(_) | Error::ChronoParse(_) => 5,
            Error::Execute { .. }
            | Error::Io(_)
            | Error::WalkDir(_)
            | Error::Serialization(_) => 6,
        }
    }
}

impl From<crate::config::ConfigError> for Error {
    fn from(e: crate::config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}
