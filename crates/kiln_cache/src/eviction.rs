//! Size-bounded eviction by last-access recency.
//!
//! Eviction works from what the filesystem can tell us: each file's size and
//! last access time. Once the cache root holds more than its maximum size,
//! the most recently accessed files are kept up to two thirds of the cap and
//! everything older is deleted. Below the cap nothing is touched, even if
//! the two-thirds mark has been passed.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::error::CacheError;
use crate::store::is_pending_write;

/// Fraction of the maximum size retained after an eviction pass.
pub const TRIM_RETAIN_RATIO: f64 = 2.0 / 3.0;

/// A file in the cache root, as seen by the eviction planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheFile {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Last access time reported by the filesystem.
    pub accessed: SystemTime,
}

/// Outcome of one eviction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrimReport {
    /// Number of candidate files found in the cache root.
    pub scanned: usize,
    /// Files actually deleted.
    pub deleted: Vec<PathBuf>,
    /// Bytes reclaimed by the deletions.
    pub bytes_freed: u64,
    /// Bytes still held by the scanned files after the pass.
    pub bytes_retained: u64,
}

/// Computes which files to delete to bring `files` back under `max_size`.
///
/// Files are ordered most-recently-accessed first. If their combined size
/// never exceeds `max_size` the result is empty. Otherwise the result is
/// every file from the first index at which the running total exceeds two
/// thirds of `max_size` through the end of the list.
pub fn plan_eviction(mut files: Vec<CacheFile>, max_size: u64) -> Vec<CacheFile> {
    files.sort_by(|a, b| b.accessed.cmp(&a.accessed));

    let retain_limit = max_size as f64 * TRIM_RETAIN_RATIO;
    let mut total: u64 = 0;
    let mut boundary: Option<usize> = None;

    for (i, file) in files.iter().enumerate() {
        total = total.saturating_add(file.size);
        if boundary.is_none() && total as f64 > retain_limit {
            boundary = Some(i);
        }
        if total > max_size {
            // Exceeding the cap implies exceeding two thirds of it, so the
            // boundary is already set.
            let cut = boundary.unwrap_or(i);
            return files.split_off(cut);
        }
    }

    Vec::new()
}

/// Lists the eviction candidates in a cache root.
///
/// Only regular files are returned; pending writes and subdirectories are
/// skipped. Entries that vanish while the directory is being read are
/// ignored.
pub fn scan_cache_dir(root: &Path) -> Result<Vec<CacheFile>, CacheError> {
    let entries = std::fs::read_dir(root).map_err(|e| CacheError::io(root, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let Ok(entry) = entry else { continue };
        let name = entry.file_name();
        if is_pending_write(&name.to_string_lossy()) {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() {
            continue;
        }
        let accessed = meta
            .accessed()
            .or_else(|_| meta.modified())
            .unwrap_or(UNIX_EPOCH);
        files.push(CacheFile {
            path: entry.path(),
            size: meta.len(),
            accessed,
        });
    }

    Ok(files)
}

/// Deletes `victims`, skipping any file that cannot be removed.
///
/// Returns the paths actually removed and the bytes they held. A file that
/// is already gone or still held open elsewhere is left out.
pub fn delete_files(victims: &[CacheFile]) -> (Vec<PathBuf>, u64) {
    let mut deleted = Vec::with_capacity(victims.len());
    let mut bytes_freed = 0;
    for file in victims {
        match std::fs::remove_file(&file.path) {
            Ok(()) => {
                bytes_freed += file.size;
                deleted.push(file.path.clone());
            }
            Err(e) => debug!(path = %file.path.display(), error = %e, "skipping eviction"),
        }
    }
    (deleted, bytes_freed)
}

/// Runs one full eviction pass over `root`.
pub fn trim_dir(root: &Path, max_size: u64) -> Result<TrimReport, CacheError> {
    let files = scan_cache_dir(root)?;
    let scanned = files.len();
    let total: u64 = files.iter().map(|f| f.size).sum();

    let victims = plan_eviction(files, max_size);
    debug!(
        root = %root.display(),
        scanned,
        total,
        max_size,
        victims = victims.len(),
        "planned eviction"
    );

    let (deleted, bytes_freed) = delete_files(&victims);
    Ok(TrimReport {
        scanned,
        deleted,
        bytes_freed,
        bytes_retained: total - bytes_freed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn file(name: &str, size: u64, accessed: u64) -> CacheFile {
        CacheFile {
            path: PathBuf::from(name),
            size,
            accessed: at(accessed),
        }
    }

    fn names(files: &[CacheFile]) -> Vec<String> {
        let mut names: Vec<String> = files
            .iter()
            .map(|f| f.path.display().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn empty_listing_plans_nothing() {
        assert!(plan_eviction(Vec::new(), 100).is_empty());
    }

    #[test]
    fn at_cap_plans_nothing() {
        let files = vec![file("a", 100, 1), file("b", 100, 2), file("c", 100, 3)];
        assert!(plan_eviction(files, 300).is_empty());
    }

    #[test]
    fn over_cap_keeps_recent_two_thirds() {
        let files = vec![
            file("t1", 100, 1),
            file("t2", 100, 2),
            file("t3", 100, 3),
            file("t4", 100, 4),
        ];
        let victims = plan_eviction(files, 300);
        assert_eq!(names(&victims), vec!["t1", "t2"]);
    }

    #[test]
    fn input_order_does_not_matter() {
        let files = vec![
            file("t3", 100, 3),
            file("t1", 100, 1),
            file("t4", 100, 4),
            file("t2", 100, 2),
        ];
        let victims = plan_eviction(files, 300);
        assert_eq!(names(&victims), vec!["t1", "t2"]);
    }

    #[test]
    fn retained_set_fits_in_two_thirds() {
        let files: Vec<CacheFile> = (0..20).map(|i| file(&format!("f{i:02}"), 37 + i, i)).collect();
        let total: u64 = files.iter().map(|f| f.size).sum();
        let max_size = 500;
        assert!(total > max_size);

        let victims = plan_eviction(files.clone(), max_size);
        let freed: u64 = victims.iter().map(|f| f.size).sum();
        assert!((total - freed) as f64 <= max_size as f64 * TRIM_RETAIN_RATIO);

        // Every victim is older than every survivor.
        let oldest_survivor = files
            .iter()
            .filter(|f| !victims.contains(f))
            .map(|f| f.accessed)
            .min()
            .unwrap();
        assert!(victims.iter().all(|v| v.accessed < oldest_survivor));
    }

    #[test]
    fn single_oversized_recent_file_evicts_everything() {
        let files = vec![file("big", 1000, 10), file("small", 10, 1)];
        let victims = plan_eviction(files, 300);
        assert_eq!(names(&victims), vec!["big", "small"]);
    }

    #[test]
    fn boundary_without_breach_plans_nothing() {
        // 250 is past two thirds of 300 but not past 300.
        let files = vec![file("a", 150, 2), file("b", 100, 1)];
        assert!(plan_eviction(files, 300).is_empty());
    }

    #[test]
    fn scan_skips_pending_writes_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abc"), b"artifact").unwrap();
        std::fs::write(dir.path().join("abc.metadata"), b"meta").unwrap();
        std::fs::write(dir.path().join("artifact12345.tmp"), b"partial").unwrap();
        std::fs::write(dir.path().join("metadata67890.tmp"), b"partial").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let files = scan_cache_dir(dir.path()).unwrap();
        let mut seen: Vec<String> = files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        seen.sort();
        assert_eq!(seen, vec!["abc", "abc.metadata"]);
        assert_eq!(files.iter().map(|f| f.size).sum::<u64>(), 12);
    }

    #[test]
    fn scan_missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = scan_cache_dir(&dir.path().join("absent")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn delete_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present");
        std::fs::write(&present, b"12345").unwrap();
        let victims = vec![
            CacheFile {
                path: present.clone(),
                size: 5,
                accessed: at(1),
            },
            CacheFile {
                path: dir.path().join("already-gone"),
                size: 99,
                accessed: at(2),
            },
        ];
        let (deleted, freed) = delete_files(&victims);
        assert_eq!(deleted, vec![present.clone()]);
        assert_eq!(freed, 5);
        assert!(!present.exists());
    }

    #[test]
    fn trim_dir_under_cap_deletes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a"), vec![0u8; 50]).unwrap();
        let report = trim_dir(dir.path(), 100).unwrap();
        assert_eq!(report.scanned, 1);
        assert!(report.deleted.is_empty());
        assert_eq!(report.bytes_retained, 50);
    }
}
