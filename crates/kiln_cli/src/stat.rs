//! `kiln stat` — summarize what the cache root holds.

use kiln_cache::{CacheSettings, DirArtifactCache};
use kiln_common::{ByteSize, METADATA_SUFFIX};
use serde_json::json;
use tracing::debug;

use crate::{ReportFormat, StatArgs};

/// Snapshot of the cache root.
#[derive(Debug, Default, PartialEq, Eq)]
struct CacheStats {
    files: usize,
    entries: usize,
    bytes: u64,
}

/// Counts files, complete entries and bytes under the cache root.
///
/// An entry is complete when both its metadata file and its artifact file
/// are present.
fn collect(cache: &DirArtifactCache) -> Result<CacheStats, kiln_cache::CacheError> {
    let files = cache.entries()?;
    let entries = files
        .iter()
        .filter_map(|f| {
            let name = f.path.file_name()?.to_str()?;
            let key = name.strip_suffix(METADATA_SUFFIX)?;
            Some(cache.root().join(key))
        })
        .filter(|artifact| artifact.is_file())
        .count();
    Ok(CacheStats {
        files: files.len(),
        entries,
        bytes: files.iter().map(|f| f.size).sum(),
    })
}

/// Reads the cache root described by `settings`. A root that does not exist
/// yet is reported as empty and left uncreated.
fn inspect(settings: &CacheSettings) -> Result<CacheStats, Box<dyn std::error::Error>> {
    if !settings.root.exists() {
        debug!(root = %settings.root.display(), "cache root does not exist");
        return Ok(CacheStats::default());
    }
    let cache = DirArtifactCache::open(settings.clone())?;
    Ok(collect(&cache)?)
}

/// Runs the `kiln stat` command.
pub fn run(
    settings: &CacheSettings,
    args: &StatArgs,
) -> Result<i32, Box<dyn std::error::Error>> {
    let stats = inspect(settings)?;
    let mode = if settings.store_enabled {
        "readwrite"
    } else {
        "readonly"
    };

    match args.format {
        ReportFormat::Text => {
            println!("cache:    {}", settings.name);
            println!("root:     {}", settings.root.display());
            println!("mode:     {mode}");
            println!("entries:  {}", stats.entries);
            println!("files:    {}", stats.files);
            println!("size:     {}", ByteSize::new(stats.bytes));
            match settings.max_size {
                Some(max) => println!("max size: {}", ByteSize::new(max)),
                None => println!("max size: unbounded"),
            }
        }
        ReportFormat::Json => {
            let report = json!({
                "name": settings.name,
                "root": settings.root.display().to_string(),
                "mode": mode,
                "entries": stats.entries,
                "files": stats.files,
                "bytes": stats.bytes,
                "max_size": settings.max_size,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_cache::Metadata;

    #[test]
    fn counts_complete_entries_only() {
        let dir = tempfile::tempdir().unwrap();
        let settings = CacheSettings::new("dir", dir.path().join("c"));
        let cache = DirArtifactCache::open(settings.clone()).unwrap();
        let src = dir.path().join("src");
        std::fs::write(&src, b"0123456789").unwrap();
        let _ = cache.store(&["a".parse().unwrap(), "b".parse().unwrap()], &Metadata::new(), &src);

        // Orphaned artifact with no metadata.
        std::fs::write(cache.root().join("orphan"), b"xx").unwrap();

        let stats = inspect(&settings).unwrap();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.files, 5);
        assert_eq!(stats.bytes, cache.usage().unwrap());
    }

    #[test]
    fn empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let settings = CacheSettings::new("dir", dir.path().join("c"));
        let cache = DirArtifactCache::open(settings.clone()).unwrap();
        assert_eq!(collect(&cache).unwrap(), CacheStats::default());
        assert_eq!(run(&settings, &StatArgs { format: ReportFormat::Json }).unwrap(), 0);
    }

    #[test]
    fn missing_root_is_empty_and_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let settings = CacheSettings::new("dir", dir.path().join("never-used"));

        assert_eq!(inspect(&settings).unwrap(), CacheStats::default());
        assert_eq!(run(&settings, &StatArgs { format: ReportFormat::Text }).unwrap(), 0);
        assert!(!settings.root.exists());
    }
}
