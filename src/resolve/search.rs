//! Locate an already archived copy of a file
//!
//! A file counts as archived when an entry with the same base name and the
//! same byte size sits anywhere below its dated folder. Content is never
//! compared.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::trace;
use walkdir::WalkDir;

use crate::error::Result;

/// What to look for below a dated folder
#[derive(Debug, Clone, Copy)]
pub struct SearchTarget<'a> {
    pub file_name: &'a OsStr,
    pub size: u64,
}

/// Depth-first search of `root` for a file matching `target`
///
/// Returns the first match found, or `None` when `root` does not exist or
/// holds no match. Listing order decides which of several matches wins.
pub fn find_existing(root: &Path, target: &SearchTarget<'_>) -> Result<Option<PathBuf>> {
    if !root.exists() {
        trace!(?root, "Search root does not exist");
        return Ok(None);
    }

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() || entry.file_name() != target.file_name {
            continue;
        }

        let size = entry.metadata()?.len();
        trace!(path = ?entry.path(), size, wanted = target.size, "Name match");
        if size == target.size {
            return Ok(Some(entry.into_path()));
        }
    }

    Ok(None)
}
