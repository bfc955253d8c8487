//! Letter buckets under a dated folder
//!
//! Copy and move never write into an existing bucket. Each run claims the
//! first letter `a..=z` that does not exist yet below the dated folder and
//! files everything for that day into it. A name that was already filed into
//! the claimed bucket during the same run overflows into the next free
//! letter, so no two planned destinations collide. Names are compared
//! without case, since `IMG.JPG` and `img.jpg` are the same file on
//! case-insensitive filesystems.

use std::collections::{HashMap, HashSet};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};

/// Bucket names, in allocation order
pub const BUCKET_LETTERS: [char; 26] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r',
    's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

/// First bucket letter that does not exist under `date_dir`
///
/// Fails with [`Error::BucketsExhausted`] when all 26 are taken.
pub fn first_free_bucket(date_dir: &Path) -> Result<char> {
    next_free_bucket(date_dir, &[])
}

fn next_free_bucket(date_dir: &Path, claimed: &[char]) -> Result<char> {
    let date_dir_exists = date_dir.exists();

    BUCKET_LETTERS
        .iter()
        .copied()
        .filter(|letter| !claimed.contains(letter))
        .find(|letter| !date_dir_exists || !bucket_path(date_dir, *letter).exists())
        .ok_or_else(|| Error::BucketsExhausted {
            path: date_dir.to_path_buf(),
        })
}

fn bucket_path(date_dir: &Path, letter: char) -> PathBuf {
    date_dir.join(letter.to_string())
}

#[derive(Debug)]
struct ClaimedBucket {
    letter: char,
    names: HashSet<String>,
}

fn claim_key(file_name: &OsStr) -> String {
    file_name.to_string_lossy().to_lowercase()
}

/// Buckets claimed during one planning run, per dated folder
#[derive(Debug, Default)]
pub struct BucketAllocator {
    claimed: HashMap<PathBuf, Vec<ClaimedBucket>>,
}

impl BucketAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Destination for `file_name` under `date_dir`
    pub fn allocate(&mut self, date_dir: &Path, file_name: &OsStr) -> Result<PathBuf> {
        let key = claim_key(file_name);
        let buckets = self.claimed.entry(date_dir.to_path_buf()).or_default();

        if let Some(bucket) = buckets.iter_mut().find(|b| !b.names.contains(&key)) {
            bucket.names.insert(key);
            return Ok(bucket_path(date_dir, bucket.letter).join(file_name));
        }

        let taken: Vec<char> = buckets.iter().map(|b| b.letter).collect();
        let letter = next_free_bucket(date_dir, &taken)?;
        debug!(?date_dir, %letter, "Claimed bucket");

        buckets.push(ClaimedBucket {
            letter,
            names: HashSet::from([key]),
        });
        Ok(bucket_path(date_dir, letter).join(file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_new_date_dir_uses_a() {
        let dir = tempdir().unwrap();
        let day = dir.path().join("2023/06/01");
        assert_eq!(first_free_bucket(&day).unwrap(), 'a');

        fs::create_dir_all(&day).unwrap();
        assert_eq!(first_free_bucket(&day).unwrap(), 'a');
    }

    #[test]
    fn test_skips_existing_buckets() {
        let dir = tempdir().unwrap();
        for letter in ['a', 'b', 'c', 'd'] {
            fs::create_dir_all(dir.path().join(letter.to_string())).unwrap();
        }
        assert_eq!(first_free_bucket(dir.path()).unwrap(), 'e');
    }

    #[test]
    fn test_first_gap_wins() {
        let dir = tempdir().unwrap();
        for letter in ['a', 'c'] {
            fs::create_dir_all(dir.path().join(letter.to_string())).unwrap();
        }
        assert_eq!(first_free_bucket(dir.path()).unwrap(), 'b');
    }

    #[test]
    fn test_exhausted_buckets_are_fatal() {
        let dir = tempdir().unwrap();
        for letter in BUCKET_LETTERS {
            fs::create_dir_all(dir.path().join(letter.to_string())).unwrap();
        }

        let err = first_free_bucket(dir.path()).unwrap_err();
        assert!(matches!(err, Error::BucketsExhausted { ref path } if path == dir.path()));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_allocation_never_returns_existing_bucket() {
        let dir = tempdir().unwrap();

        for round in 0..5 {
            // A fresh allocator per round, like separate runs
            let mut allocator = BucketAllocator::new();
            let dest = allocator
                .allocate(dir.path(), OsStr::new("photo.jpg"))
                .unwrap();
            let bucket = dest.parent().unwrap();
            assert!(!bucket.exists(), "round {round} reused {}", bucket.display());
            fs::create_dir_all(bucket).unwrap();
        }
    }

    #[test]
    fn test_run_shares_bucket_for_distinct_names() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();

        let mut allocator = BucketAllocator::new();
        let first = allocator.allocate(dir.path(), OsStr::new("one.jpg")).unwrap();
        let second = allocator.allocate(dir.path(), OsStr::new("two.jpg")).unwrap();

        assert_eq!(first, dir.path().join("b/one.jpg"));
        assert_eq!(second, dir.path().join("b/two.jpg"));
    }

    #[test]
    fn test_same_name_in_one_run_overflows() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();

        let mut allocator = BucketAllocator::new();
        let paths: Vec<PathBuf> = (0..3)
            .map(|_| allocator.allocate(dir.path(), OsStr::new("photo.jpg")).unwrap())
            .collect();

        assert_eq!(
            paths,
            vec![
                dir.path().join("a/photo.jpg"),
                dir.path().join("c/photo.jpg"),
                dir.path().join("d/photo.jpg"),
            ]
        );
    }

    #[test]
    fn test_case_variants_get_separate_buckets() {
        let dir = tempdir().unwrap();
        let mut allocator = BucketAllocator::new();

        let upper = allocator.allocate(dir.path(), OsStr::new("IMG_0001.JPG")).unwrap();
        let lower = allocator.allocate(dir.path(), OsStr::new("img_0001.jpg")).unwrap();
        let other = allocator.allocate(dir.path(), OsStr::new("IMG_0002.JPG")).unwrap();

        assert_eq!(upper, dir.path().join("a/IMG_0001.JPG"));
        assert_eq!(lower, dir.path().join("b/img_0001.jpg"));
        assert_eq!(other, dir.path().join("a/IMG_0002.JPG"));
        assert_ne!(upper.parent(), lower.parent());
    }

    #[test]
    fn test_overflow_exhaustion_is_fatal() {
        let dir = tempdir().unwrap();
        let mut allocator = BucketAllocator::new();
        for _ in 0..26 {
            allocator.allocate(dir.path(), OsStr::new("photo.jpg")).unwrap();
        }

        let err = allocator
            .allocate(dir.path(), OsStr::new("photo.jpg"))
            .unwrap_err();
        assert!(matches!(err, Error::BucketsExhausted { .. }));
    }
}
