//! `kiln fetch` — copy a cached artifact out of the cache.

use kiln_cache::{CacheResult, DirArtifactCache};

use crate::{FetchArgs, GlobalArgs};

/// Exit code for a cache miss.
pub const EXIT_MISS: i32 = 1;

/// Exit code for a fetch that found an entry but could not read it.
pub const EXIT_ERROR: i32 = 2;

/// Runs the `kiln fetch` command.
///
/// Prints `hit` followed by one `name=value` line per metadata entry, or
/// `miss`. Returns 0 on a hit, [`EXIT_MISS`] on a miss and [`EXIT_ERROR`]
/// when the entry was unreadable.
pub fn run(cache: &DirArtifactCache, args: &FetchArgs, global: &GlobalArgs) -> i32 {
    match cache.fetch(&args.key, &args.dest) {
        CacheResult::Hit { metadata, .. } => {
            if !global.quiet {
                println!("hit");
                for (name, value) in &metadata {
                    println!("{name}={value}");
                }
            }
            0
        }
        CacheResult::Miss => {
            if !global.quiet {
                println!("miss");
            }
            EXIT_MISS
        }
        CacheResult::Error {
            cache_name,
            diagnostic,
        } => {
            eprintln!("error: cache '{cache_name}' could not serve {}: {diagnostic}", args.key);
            EXIT_ERROR
        }
    }
}
