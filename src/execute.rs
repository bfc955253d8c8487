//! Operation execution
//!
//! Applies planned operations one at a time, in plan order. The first
//! filesystem error aborts the run; operations already applied stay applied.

use filetime::FileTime;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{Level, debug, info, span};

use crate::config::{Mode, Settings};
use crate::error::{Error, Result};
use crate::plan::PlannedOperation;

const COPY_BUFFER_SIZE: usize = 256 * 1024;

/// Execution counters; in dry run they count what would have been done
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExecutionStats {
    pub folders_created: usize,
    pub copied: usize,
    pub moved: usize,
    pub retimed: usize,
}

impl ExecutionStats {
    pub fn summary(&self) -> String {
        format!(
            "Folders created: {}, Copied: {}, Moved: {}, Timestamps fixed: {}",
            self.folders_created, self.copied, self.moved, self.retimed
        )
    }
}

/// Applies planned operations for a given mode
pub struct Executor {
    mode: Mode,
    dry_run: bool,
    created_dirs: HashSet<PathBuf>,
    stats: ExecutionStats,
}

impl Executor {
    pub fn new(settings: &Settings) -> Self {
        Self {
            mode: settings.mode,
            dry_run: settings.dry_run,
            created_dirs: HashSet::new(),
            stats: ExecutionStats::default(),
        }
    }

    pub fn execute_all(&mut self, operations: &[PlannedOperation]) -> Result<()> {
        let _span = span!(Level::INFO, "execute", mode = %self.mode, dry_run = self.dry_run).entered();

        if self.dry_run {
            info!("Dry run: no writing operation will be done on files");
        }

        for operation in operations {
            self.execute(operation)?;
        }

        info!("{}", self.stats.summary());
        Ok(())
    }

    /// Create the destination folder, move the data, then fix the timestamps
    pub fn execute(&mut self, operation: &PlannedOperation) -> Result<()> {
        self.ensure_parent(&operation.destination_parent_dir)?;

        match self.mode {
            Mode::Copy => {
                info!(
                    "Copy the file {} to {}",
                    operation.source_path.display(),
                    operation.destination_path.display()
                );
                if !self.dry_run {
                    copy_file(&operation.source_path, &operation.destination_path)?;
                }
                self.stats.copied += 1;
            }
            Mode::Move => {
                info!(
                    "Move the file {} to {}",
                    operation.source_path.display(),
                    operation.destination_path.display()
                );
                if !self.dry_run {
                    move_file(&operation.source_path, &operation.destination_path)?;
                }
                self.stats.moved += 1;
            }
            Mode::Retime => {}
        }

        self.fix_dates(operation)
    }

    fn ensure_parent(&mut self, dir: &Path) -> Result<()> {
        if dir.as_os_str().is_empty() || dir.exists() || self.created_dirs.contains(dir) {
            return Ok(());
        }

        info!("Creates folder: {}", dir.display());
        if !self.dry_run {
            fs::create_dir_all(dir).map_err(|e| Error::Execute {
                action: "create folder",
                path: dir.to_path_buf(),
                source: e,
            })?;
        }

        self.created_dirs.insert(dir.to_path_buf());
        self.stats.folders_created += 1;
        Ok(())
    }

    fn fix_dates(&mut self, operation: &PlannedOperation) -> Result<()> {
        let mtime = &operation.modification_time;
        let atime = &operation.access_time;
        let btime = &operation.creation_time;

        info!(
            "Fix the date of the file: {} from file: {}",
            operation.destination_path.display(),
            operation.source_path.display()
        );
        info!("Update time: {} ({})", mtime, mtime.timestamp());
        info!("Access time: {} ({})", atime, atime.timestamp());
        info!("Birth time: {} ({}), not usable yet.", btime, btime.timestamp());

        if !self.dry_run {
            filetime::set_file_times(
                &operation.destination_path,
                FileTime::from_system_time(SystemTime::from(*atime)),
                FileTime::from_system_time(SystemTime::from(*mtime)),
            )
            .map_err(|e| Error::Execute {
                action: "set times on",
                path: operation.destination_path.clone(),
                source: e,
            })?;
        }

        self.stats.retimed += 1;
        Ok(())
    }

    pub fn stats(&self) -> &ExecutionStats {
        &self.stats
    }
}

/// Copy with buffered I/O; refuses to replace an existing destination
fn copy_file(source: &Path, dest: &Path) -> Result<()> {
    let copy_err = |path: &Path| {
        let path = path.to_path_buf();
        move |e: std::io::Error| Error::Execute {
            action: "copy",
            path,
            source: e,
        }
    };

    let src_file = File::open(source).map_err(copy_err(source))?;
    let dest_file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .map_err(copy_err(dest))?;

    let mut reader = BufReader::with_capacity(COPY_BUFFER_SIZE, src_file);
    let mut writer = BufWriter::with_capacity(COPY_BUFFER_SIZE, dest_file);

    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    loop {
        let bytes_read = reader.read(&mut buffer).map_err(copy_err(source))?;
        if bytes_read == 0 {
            break;
        }
        writer
            .write_all(&buffer[..bytes_read])
            .map_err(copy_err(dest))?;
    }

    writer.flush().map_err(copy_err(dest))?;
    debug!(?source, ?dest, "Copied");
    Ok(())
}

fn move_file(source: &Path, dest: &Path) -> Result<()> {
    if dest.exists() {
        return Err(Error::Execute {
            action: "move to",
            path: dest.to_path_buf(),
            source: std::io::Error::from(std::io::ErrorKind::AlreadyExists),
        });
    }

    // Rename is only possible within one filesystem
    if fs::rename(source, dest).is_err() {
        copy_file(source, dest)?;
        fs::remove_file(source).map_err(|e| Error::Execute {
            action: "remove",
            path: source.to_path_buf(),
            source: e,
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MediaTypeRule;
    use crate::plan::Planner;
    use chrono::{Local, TimeZone};
    use tempfile::tempdir;

    fn settings(src: &Path, dest: &Path, mode: Mode) -> Settings {
        let mut settings = Settings::new(src, dest, mode);
        settings.rules = vec![MediaTypeRule::new("photos", ["jpg"])];
        settings
    }

    fn write_photo(path: &Path, size: usize) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, vec![9u8; size]).unwrap();
        let mtime = Local.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap();
        filetime::set_file_mtime(path, FileTime::from_system_time(mtime.into())).unwrap();
    }

    fn run(settings: &Settings) -> (Vec<PlannedOperation>, ExecutionStats) {
        let operations = Planner::new(settings).plan().unwrap();
        let mut executor = Executor::new(settings);
        executor.execute_all(&operations).unwrap();
        (operations, executor.stats().clone())
    }

    fn mtime_of(path: &Path) -> FileTime {
        FileTime::from_last_modification_time(&fs::metadata(path).unwrap())
    }

    #[test]
    fn test_copy_twice_uses_next_bucket() {
        let src = tempdir().unwrap();
        let out = tempdir().unwrap();
        write_photo(&src.path().join("photo.jpg"), 100);
        let settings = settings(src.path(), out.path(), Mode::Copy);

        let (first, stats) = run(&settings);
        let a = out.path().join("photos/2023/06/01/a/photo.jpg");
        assert_eq!(first[0].destination_path, a);
        assert_eq!(fs::metadata(&a).unwrap().len(), 100);
        assert_eq!(mtime_of(&a), mtime_of(&src.path().join("photo.jpg")));
        assert_eq!(stats.copied, 1);
        assert_eq!(stats.folders_created, 1);

        let (second, _) = run(&settings);
        let b = out.path().join("photos/2023/06/01/b/photo.jpg");
        assert_eq!(second[0].destination_path, b);
        assert!(b.exists());
        assert!(src.path().join("photo.jpg").exists());
    }

    #[test]
    fn test_move_removes_source() {
        let src = tempdir().unwrap();
        let out = tempdir().unwrap();
        write_photo(&src.path().join("photo.jpg"), 100);
        let expected_mtime = mtime_of(&src.path().join("photo.jpg"));

        let (_, stats) = run(&settings(src.path(), out.path(), Mode::Move));

        let dest = out.path().join("photos/2023/06/01/a/photo.jpg");
        assert!(dest.exists());
        assert!(!src.path().join("photo.jpg").exists());
        assert_eq!(mtime_of(&dest), expected_mtime);
        assert_eq!(stats.moved, 1);
    }

    #[test]
    fn test_retime_fixes_dates_only() {
        let src = tempdir().unwrap();
        let out = tempdir().unwrap();
        write_photo(&src.path().join("photo.jpg"), 100);

        let archived = out.path().join("photos/2023/06/01/a/photo.jpg");
        fs::create_dir_all(archived.parent().unwrap()).unwrap();
        fs::write(&archived, vec![1u8; 100]).unwrap();
        filetime::set_file_mtime(&archived, FileTime::from_unix_time(0, 0)).unwrap();

        let settings = settings(src.path(), out.path(), Mode::Retime);
        let (operations, stats) = run(&settings);

        assert_eq!(operations.len(), 1);
        assert_eq!(operations[0].destination_path, archived);
        assert_eq!(mtime_of(&archived), mtime_of(&src.path().join("photo.jpg")));
        // Content is left alone
        assert_eq!(fs::read(&archived).unwrap(), vec![1u8; 100]);
        assert_eq!(stats.copied + stats.moved, 0);
        assert_eq!(stats.retimed, 1);
        assert!(!out.path().join("photos/2023/06/01/b").exists());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let src = tempdir().unwrap();
        let out = tempdir().unwrap();
        write_photo(&src.path().join("photo.jpg"), 100);

        let mut settings = settings(src.path(), out.path(), Mode::Move);
        settings.dry_run = true;
        let (operations, stats) = run(&settings);

        assert_eq!(operations.len(), 1);
        assert_eq!(stats.moved, 1);
        assert_eq!(stats.folders_created, 1);
        assert!(!out.path().join("photos").exists());
        assert!(src.path().join("photo.jpg").exists());
    }

    #[test]
    fn test_copy_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("in.jpg");
        let dest = dir.path().join("out.jpg");
        fs::write(&source, b"new").unwrap();
        fs::write(&dest, b"old").unwrap();

        let err = copy_file(&source, &dest).unwrap_err();
        assert!(matches!(err, Error::Execute { action: "copy", .. }));
        assert_eq!(err.exit_code(), 6);
        assert_eq!(fs::read(&dest).unwrap(), b"old");
    }

    #[test]
    fn test_move_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("in.jpg");
        let dest = dir.path().join("out.jpg");
        fs::write(&source, b"new").unwrap();
        fs::write(&dest, b"old").unwrap();

        assert!(move_file(&source, &dest).is_err());
        assert!(source.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"old");
    }
}
