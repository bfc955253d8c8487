//! Destination resolution
//!
//! Every file maps to `<dest>/<category>/YYYY/MM/DD/`, where the category
//! comes from its extension and the date from its modification time.
//! Below that dated folder the two modes differ:
//! - copy/move allocate a fresh letter bucket ([`bucket`])
//! - retime looks for the copy that is already archived ([`search`])

pub mod bucket;
pub mod search;

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::classify::classify;
use crate::config::{MediaTypeRule, Mode, Settings};
use crate::error::{Error, Result};
use crate::time::{FileDescriptor, dated_dir};

pub use bucket::{BUCKET_LETTERS, BucketAllocator, first_free_bucket};
pub use search::{SearchTarget, find_existing};

/// Resolves archive destinations for the files of one run
#[derive(Debug)]
pub struct Resolver<'a> {
    destination: &'a Path,
    rules: &'a [MediaTypeRule],
    mode: Mode,
    buckets: BucketAllocator,
}

impl<'a> Resolver<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self {
            destination: &settings.destination,
            rules: &settings.rules,
            mode: settings.mode,
            buckets: BucketAllocator::new(),
        }
    }

    /// `<dest>/<category>`, or the destination root for unmatched extensions
    pub fn category_base(&self, file: &FileDescriptor) -> PathBuf {
        match classify(&file.extension, self.rules) {
            Some(dir) => self.destination.join(dir),
            None => self.destination.to_path_buf(),
        }
    }

    /// Where `file` goes, or `None` when retime finds no archived copy
    pub fn resolve(&mut self, file: &FileDescriptor) -> Result<Option<PathBuf>> {
        let file_name = file
            .file_name()
            .ok_or_else(|| Error::Config(format!("Invalid source filename: {}", file.path.display())))?;

        let date_dir = dated_dir(&self.category_base(file), &file.modification_time);

        match self.mode {
            Mode::Retime => {
                let target = SearchTarget {
                    file_name,
                    size: file.size_bytes,
                };
                let found = find_existing(&date_dir, &target)?;
                match &found {
                    Some(existing) => debug!(source = ?file.path, ?existing, "Found archived copy"),
                    None => info!(
                        source = %file.path.display(),
                        searched = %date_dir.display(),
                        "No archived copy with the same name and size, skipping"
                    ),
                }
                Ok(found)
            }
            Mode::Copy | Mode::Move => self.buckets.allocate(&date_dir, file_name).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use filetime::FileTime;
    use std::fs;
    use tempfile::tempdir;

    fn settings(dest: &Path, mode: Mode) -> Settings {
        let mut settings = Settings::new("unused", dest, mode);
        settings.rules = vec![MediaTypeRule::new("photos", ["jpg"])];
        settings
    }

    fn source_file(dir: &Path, name: &str, size: usize, y: i32, m: u32, d: u32) -> FileDescriptor {
        let path = dir.join(name);
        fs::write(&path, vec![7u8; size]).unwrap();
        let mtime = Local.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap();
        filetime::set_file_mtime(&path, FileTime::from_system_time(mtime.into())).unwrap();
        FileDescriptor::from_path(&path).unwrap()
    }

    #[test]
    fn test_copy_resolves_into_first_bucket() {
        let src = tempdir().unwrap();
        let out = tempdir().unwrap();
        let settings = settings(out.path(), Mode::Copy);
        let file = source_file(src.path(), "photo.jpg", 100, 2023, 6, 1);

        let dest = Resolver::new(&settings).resolve(&file).unwrap();
        assert_eq!(dest, Some(out.path().join("photos/2023/06/01/a/photo.jpg")));
    }

    #[test]
    fn test_unmatched_extension_uses_root() {
        let src = tempdir().unwrap();
        let out = tempdir().unwrap();
        let settings = settings(out.path(), Mode::Move);
        let file = source_file(src.path(), "notes.txt", 3, 2022, 2, 3);

        let dest = Resolver::new(&settings).resolve(&file).unwrap();
        assert_eq!(dest, Some(out.path().join("2022/02/03/a/notes.txt")));
    }

    #[test]
    fn test_retime_finds_archived_copy() {
        let src = tempdir().unwrap();
        let out = tempdir().unwrap();
        let archived = out.path().join("photos/2023/01/05/c");
        fs::create_dir_all(&archived).unwrap();
        fs::write(archived.join("X.jpg"), vec![0u8; 64]).unwrap();

        let settings = settings(out.path(), Mode::Retime);
        let mut resolver = Resolver::new(&settings);

        let file = source_file(src.path(), "X.jpg", 64, 2023, 1, 5);
        assert_eq!(resolver.resolve(&file).unwrap(), Some(archived.join("X.jpg")));

        let other = tempdir().unwrap();
        let resized = source_file(other.path(), "X.jpg", 65, 2023, 1, 5);
        assert_eq!(resolver.resolve(&resized).unwrap(), None);
    }

    #[test]
    fn test_retime_only_searches_the_files_day() {
        let src = tempdir().unwrap();
        let out = tempdir().unwrap();
        let archived = out.path().join("photos/2023/01/06/a");
        fs::create_dir_all(&archived).unwrap();
        fs::write(archived.join("X.jpg"), vec![0u8; 64]).unwrap();

        let settings = settings(out.path(), Mode::Retime);
        let file = source_file(src.path(), "X.jpg", 64, 2023, 1, 5);
        assert_eq!(Resolver::new(&settings).resolve(&file).unwrap(), None);
    }
}
