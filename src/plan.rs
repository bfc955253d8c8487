//! Operation planning
//!
//! Lists the source directory, filters entries by creation time and resolves
//! a destination for every regular file. Planning only reads the filesystem;
//! nothing is created until the plan is handed to the executor.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{Level, debug, info, span};

use crate::classify::classify;
use crate::config::{Mode, Settings};
use crate::error::{Error, Result};
use crate::resolve::Resolver;
use crate::time::FileDescriptor;

/// Entries written by operating systems that are never archived
pub const SYSTEM_ENTRIES: &[&str] = &[".DS_Store", "Thumbs.db"];

/// One file to place (or retime) in the archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedOperation {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    pub destination_parent_dir: PathBuf,
    pub access_time: DateTime<Local>,
    pub modification_time: DateTime<Local>,
    /// Recorded for reporting only, it cannot be restored portably
    pub creation_time: DateTime<Local>,
}

impl PlannedOperation {
    pub fn new(file: &FileDescriptor, destination: PathBuf) -> Self {
        let destination_parent_dir = destination
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Self {
            source_path: file.path.clone(),
            destination_path: destination,
            destination_parent_dir,
            access_time: file.access_time,
            modification_time: file.modification_time,
            creation_time: file.creation_time,
        }
    }
}

/// Planning counters
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PlanStats {
    /// Entries seen in source listings
    pub listed: usize,
    pub system_entries: usize,
    /// Entries created at or before the cutoff
    pub before_cutoff: usize,
    /// Subdirectories ignored because recursion is off
    pub directories_skipped: usize,
    /// Files whose extension no media rule claims
    pub unmatched: usize,
    /// Retime candidates without an archived copy
    pub not_found: usize,
    pub planned: usize,
}

impl PlanStats {
    pub fn summary(&self) -> String {
        format!(
            "Listed: {}, Planned: {}, Before cutoff: {}, Unmatched: {}, Not found: {}, Directories skipped: {}, System entries: {}",
            self.listed,
            self.planned,
            self.before_cutoff,
            self.unmatched,
            self.not_found,
            self.directories_skipped,
            self.system_entries
        )
    }
}

/// Whether an entry created at `created` passes the cutoff
///
/// Entries created at or before the cutoff are rejected.
pub fn is_after_cutoff(created: &DateTime<Local>, cutoff: Option<&DateTime<Local>>) -> bool {
    cutoff.is_none_or(|cutoff| created > cutoff)
}

/// Builds the list of operations for one run
pub struct Planner<'a> {
    settings: &'a Settings,
    resolver: Resolver<'a>,
    stats: PlanStats,
}

impl<'a> Planner<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self {
            settings,
            resolver: Resolver::new(settings),
            stats: PlanStats::default(),
        }
    }

    /// Plan the configured source directory
    pub fn plan(&mut self) -> Result<Vec<PlannedOperation>> {
        let _span = span!(Level::INFO, "plan").entered();
        let settings = self.settings;
        let operations = self.plan_dir(&settings.source)?;
        info!("{}", self.stats.summary());
        Ok(operations)
    }

    /// Plan the entries of `dir`, descending into subdirectories when recursing
    pub fn plan_dir(&mut self, dir: &Path) -> Result<Vec<PlannedOperation>> {
        let unreadable = |e| Error::SourceUnreadable {
            path: dir.to_path_buf(),
            source: e,
        };

        let entries = fs::read_dir(dir)
            .map_err(unreadable)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<PathBuf>>>()
            .map_err(unreadable)?;

        info!(dir = %dir.display(), "{} files to process.", entries.len());

        let mut operations = Vec::new();

        for path in entries {
            self.stats.listed += 1;

            if is_system_entry(&path) {
                self.stats.system_entries += 1;
                continue;
            }

            let file = FileDescriptor::from_path(&path)?;

            if !is_after_cutoff(&file.creation_time, self.settings.since.as_ref()) {
                debug!(?path, created = %file.creation_time, "Created at or before cutoff, skipping");
                self.stats.before_cutoff += 1;
                continue;
            }

            if file.is_directory {
                if self.settings.recurse {
                    debug!(?path, "Descending into directory");
                    operations.extend(self.plan_dir(&path)?);
                } else {
                    self.stats.directories_skipped += 1;
                }
                continue;
            }

            if classify(&file.extension, &self.settings.rules).is_none() {
                info!(
                    path = %path.display(),
                    extension = %file.extension,
                    size = file.size_bytes,
                    "No media type configured for extension, using destination root"
                );
                self.stats.unmatched += 1;
            }

            match self.resolver.resolve(&file)? {
                Some(destination) => {
                    debug!(source = ?path, ?destination, "Planned");
                    self.stats.planned += 1;
                    operations.push(PlannedOperation::new(&file, destination));
                }
                None => self.stats.not_found += 1,
            }
        }

        Ok(operations)
    }

    pub fn stats(&self) -> &PlanStats {
        &self.stats
    }
}

fn is_system_entry(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| SYSTEM_ENTRIES.contains(&n))
}

/// Plan as written by `--plan-out`
#[derive(Debug, Serialize)]
pub struct PlanDocument<'a> {
    pub created_at: DateTime<Local>,
    pub mode: Mode,
    pub dry_run: bool,
    pub source: &'a Path,
    pub destination: &'a Path,
    pub operations: &'a [PlannedOperation],
}

/// Write the planned operations as pretty JSON
pub fn write_plan(path: &Path, settings: &Settings, operations: &[PlannedOperation]) -> Result<()> {
    let document = PlanDocument {
        created_at: Local::now(),
        mode: settings.mode,
        dry_run: settings.dry_run,
        source: &settings.source,
        destination: &settings.destination,
        operations,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &document)?;
    writer.flush()?;

    debug!(?path, count = operations.len(), "Plan written");
    Ok(())
}
