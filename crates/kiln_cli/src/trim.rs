//! `kiln trim` — run an eviction pass now.

use kiln_cache::DirArtifactCache;
use kiln_common::ByteSize;

use crate::GlobalArgs;

/// Runs the `kiln trim` command.
pub fn run(cache: &DirArtifactCache, global: &GlobalArgs) -> i32 {
    match cache.trim() {
        Some(report) => {
            if !global.quiet {
                println!(
                    "scanned {} files, evicted {} ({} freed, {} retained)",
                    report.scanned,
                    report.deleted.len(),
                    ByteSize::new(report.bytes_freed),
                    ByteSize::new(report.bytes_retained)
                );
            }
            0
        }
        None if cache.max_size().is_none() => {
            if !global.quiet {
                println!("cache '{}' has no maximum size, nothing to trim", cache.name());
            }
            0
        }
        None => {
            eprintln!("error: could not scan {}", cache.root().display());
            1
        }
    }
}
