//! File timestamps and the dated part of archive paths
//!
//! Archive folders are keyed by a file's modification time, expressed as a
//! local calendar date (`YYYY/MM/DD`). Access and creation times are carried
//! alongside so the executor can restore them on the archived copy.

use chrono::{DateTime, Local};
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::config::normalize_extension;
use crate::error::{Error, Result};

/// Format used for the dated segment of archive paths
pub const DATE_PATH_FORMAT: &str = "%Y/%m/%d";

/// Build the `YYYY/MM/DD` segment for a timestamp, in local time
pub fn date_path(timestamp: &DateTime<Local>) -> String {
    timestamp.format(DATE_PATH_FORMAT).to_string()
}

/// Join `base` with the dated segment of `timestamp`
pub fn dated_dir(base: &Path, timestamp: &DateTime<Local>) -> PathBuf {
    let mut dir = base.to_path_buf();
    // One component at a time so the result uses native separators
    for part in date_path(timestamp).split('/') {
        dir.push(part);
    }
    dir
}

/// Snapshot of one source entry, taken when it is planned
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    pub path: PathBuf,
    /// Normalized extension, empty when the file has none
    pub extension: String,
    pub access_time: DateTime<Local>,
    pub modification_time: DateTime<Local>,
    pub creation_time: DateTime<Local>,
    pub size_bytes: u64,
    pub is_directory: bool,
}

impl FileDescriptor {
    /// Stat `path` (following symlinks) and capture its times and size
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path).map_err(|e| Error::Stat {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_metadata(path, &metadata)
    }

    pub fn from_metadata(path: &Path, metadata: &Metadata) -> Result<Self> {
        let stat_err = |e| Error::Stat {
            path: path.to_path_buf(),
            source: e,
        };

        let modified = metadata.modified().map_err(stat_err)?;
        let accessed = metadata.accessed().unwrap_or(modified);
        // Not every filesystem records a birth time
        let created = metadata.created().unwrap_or(modified);

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(normalize_extension)
            .unwrap_or_default();

        Ok(Self {
            path: path.to_path_buf(),
            extension,
            access_time: to_local(accessed),
            modification_time: to_local(modified),
            creation_time: to_local(created),
            size_bytes: metadata.len(),
            is_directory: metadata.is_dir(),
        })
    }

    /// Base name of the file, as stored in the archive
    pub fn file_name(&self) -> Option<&std::ffi::OsStr> {
        self.path.file_name()
    }
}

pub fn to_local(time: SystemTime) -> DateTime<Local> {
    DateTime::<Local>::from(time)
}
