//! `kiln store` — add a file to the cache.

use kiln_cache::{DirArtifactCache, Metadata};
use kiln_common::{ByteSize, CacheKey, ContentHash};

use crate::{GlobalArgs, StoreArgs};

/// Runs the `kiln store` command.
///
/// Storing is best-effort, so a failure partway through is reported as a
/// warning and still exits 0. Only an unreadable source file with no
/// explicit key is an error, since no key can be derived.
pub fn run(
    cache: &DirArtifactCache,
    args: &StoreArgs,
    global: &GlobalArgs,
) -> Result<i32, Box<dyn std::error::Error>> {
    if !cache.is_store_supported() {
        if !global.quiet {
            eprintln!("warning: cache '{}' is read-only, nothing stored", cache.name());
        }
        return Ok(0);
    }

    let keys = if args.keys.is_empty() {
        let hash = std::fs::File::open(&args.source)
            .and_then(ContentHash::from_reader)
            .map_err(|e| format!("cannot read {}: {e}", args.source.display()))?;
        vec![CacheKey::from(hash)]
    } else {
        args.keys.clone()
    };
    let metadata: Metadata = args.meta.iter().cloned().collect();

    let report = cache.store(&keys, &metadata, &args.source).wait();

    if !global.quiet {
        for key in &report.stored {
            println!("stored {key}");
        }
        for key in &report.skipped {
            println!("skipped {key} (already cached)");
        }
        if let Some(trim) = &report.trim {
            if !trim.deleted.is_empty() {
                println!(
                    "evicted {} files ({} freed)",
                    trim.deleted.len(),
                    ByteSize::new(trim.bytes_freed)
                );
            }
        }
    }
    if let Some(error) = &report.error {
        eprintln!("warning: store stopped early: {error}");
    }

    Ok(0)
}
