//! Directory-backed artifact store.
//!
//! Each cache entry is a pair of files in the cache root: `<key>` holds the
//! raw artifact bytes and `<key>.metadata` the encoded [`Metadata`]. Both are
//! staged in a temporary file next to their destination and renamed into
//! place, artifact first, so a reader that finds the metadata file can rely
//! on the artifact being complete. A half-written entry reads as a miss.
//!
//! Disk usage is bounded without a background process: every store adds the
//! bytes it wrote to a trim counter, and once that counter passes half the
//! maximum size an eviction pass runs inline.

use std::collections::BTreeSet;
use std::fs::File;
use std::future::{ready, IntoFuture, Ready};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use kiln_common::{CacheKey, TEMP_SUFFIX};
use tracing::{debug, info, warn};

use crate::error::CacheError;
use crate::eviction::{self, CacheFile, TrimReport};
use crate::metadata::{self, Metadata};
use crate::result::CacheResult;

/// File name prefix of a pending artifact write.
pub const ARTIFACT_TEMP_PREFIX: &str = "artifact";

/// File name prefix of a pending metadata write.
pub const METADATA_TEMP_PREFIX: &str = "metadata";

/// Fraction of the maximum size that may be written before an eviction pass.
pub const TRIM_TRIGGER_RATIO: f64 = 0.5;

/// Returns `true` if `file_name` names a temporary file staged by a store.
pub fn is_pending_write(file_name: &str) -> bool {
    file_name.ends_with(TEMP_SUFFIX)
        && (file_name.starts_with(ARTIFACT_TEMP_PREFIX)
            || file_name.starts_with(METADATA_TEMP_PREFIX))
}

/// Construction-time configuration of a [`DirArtifactCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Display name reported in results and logs.
    pub name: String,
    /// Directory holding every cache entry.
    pub root: PathBuf,
    /// Whether `store` writes anything.
    pub store_enabled: bool,
    /// Maximum size of the cache root in bytes. `None` disables eviction.
    pub max_size: Option<u64>,
}

impl CacheSettings {
    /// Creates writable, unbounded settings.
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            store_enabled: true,
            max_size: None,
        }
    }

    /// Bounds the cache root to `max_size` bytes.
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = Some(max_size);
        self
    }

    /// Disables storing.
    pub fn read_only(mut self) -> Self {
        self.store_enabled = false;
        self
    }
}

/// What a single `store` call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreReport {
    /// Keys whose entries were written.
    pub stored: Vec<CacheKey>,
    /// Keys skipped because a complete entry already existed.
    pub skipped: Vec<CacheKey>,
    /// Bytes added to the trim counter.
    pub bytes_written: u64,
    /// Diagnostic of the failure that stopped the store early, if any.
    pub error: Option<String>,
    /// The eviction pass this store triggered, if any.
    pub trim: Option<TrimReport>,
}

/// Completion token returned by [`DirArtifactCache::store`].
///
/// Stores run on the calling thread, so the token is always complete when
/// returned. Callers may drop it, inspect it, or `.await` it.
#[derive(Debug)]
pub struct StoreHandle {
    report: StoreReport,
}

impl StoreHandle {
    fn ready(report: StoreReport) -> Self {
        Self { report }
    }

    /// Always `true`.
    pub fn is_complete(&self) -> bool {
        true
    }

    /// Borrows the report.
    pub fn report(&self) -> &StoreReport {
        &self.report
    }

    /// Blocks until the store finishes and returns its report.
    pub fn wait(self) -> StoreReport {
        self.report
    }
}

impl IntoFuture for StoreHandle {
    type Output = StoreReport;
    type IntoFuture = Ready<StoreReport>;

    fn into_future(self) -> Self::IntoFuture {
        ready(self.report)
    }
}

/// A local, directory-backed artifact cache.
///
/// Safe to share between threads; several instances (or processes) may also
/// use the same root, since every write lands with an atomic rename and
/// eviction tolerates files disappearing underneath it.
#[derive(Debug)]
pub struct DirArtifactCache {
    name: String,
    root: PathBuf,
    store_enabled: bool,
    max_size: Option<u64>,
    /// Bytes written since the last eviction pass.
    bytes_since_trim: AtomicU64,
}

impl DirArtifactCache {
    /// Opens the cache, creating the root directory if it does not exist.
    pub fn open(settings: CacheSettings) -> Result<Self, CacheError> {
        std::fs::create_dir_all(&settings.root)
            .map_err(|e| CacheError::io(&settings.root, e))?;
        debug!(
            name = %settings.name,
            root = %settings.root.display(),
            max_size = ?settings.max_size,
            store_enabled = settings.store_enabled,
            "opened directory cache"
        );
        Ok(Self {
            name: settings.name,
            root: settings.root,
            store_enabled: settings.store_enabled,
            max_size: settings.max_size,
            bytes_since_trim: AtomicU64::new(0),
        })
    }

    /// Returns the display name of this cache.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the configured maximum size in bytes.
    pub fn max_size(&self) -> Option<u64> {
        self.max_size
    }

    /// Returns `true` if `store` writes entries.
    pub fn is_store_supported(&self) -> bool {
        self.store_enabled
    }

    /// Returns the bytes written since the last eviction pass.
    pub fn bytes_since_trim(&self) -> u64 {
        self.bytes_since_trim.load(Ordering::Relaxed)
    }

    /// Returns the path of the artifact file for `key`.
    pub fn artifact_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    /// Returns the path of the metadata file for `key`.
    pub fn metadata_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.metadata_file_name())
    }

    /// Copies the artifact stored under `key` to `dest`.
    ///
    /// Never fails: a missing entry is a [`CacheResult::Miss`] and any other
    /// problem a [`CacheResult::Error`]. The parent of `dest` must exist.
    pub fn fetch(&self, key: &CacheKey, dest: &Path) -> CacheResult {
        let result = match self.try_fetch(key, dest) {
            Ok(Some(metadata)) => CacheResult::Hit {
                cache_name: self.name.clone(),
                metadata,
            },
            Ok(None) => CacheResult::Miss,
            Err(e) => {
                warn!(cache = %self.name, %key, dest = %dest.display(), error = %e, "artifact fetch failed");
                CacheResult::Error {
                    cache_name: self.name.clone(),
                    diagnostic: e.diagnostic(),
                }
            }
        };
        debug!(cache = %self.name, %key, dest = %dest.display(), %result, "artifact fetch");
        result
    }

    fn try_fetch(&self, key: &CacheKey, dest: &Path) -> Result<Option<Metadata>, CacheError> {
        let metadata_path = self.metadata_path(key);
        let bytes = match std::fs::read(&metadata_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(metadata_path, e)),
        };
        let metadata = metadata::decode(&bytes)?;

        let artifact_path = self.artifact_path(key);
        let mut artifact = match File::open(&artifact_path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(artifact_path, e)),
        };
        let mut out = File::create(dest).map_err(|e| CacheError::io(dest, e))?;
        std::io::copy(&mut artifact, &mut out).map_err(|e| CacheError::io(dest, e))?;

        Ok(Some(metadata))
    }

    /// Stores the file at `source` under every key in `keys`.
    ///
    /// Best-effort: the first failure is logged, stops the loop, and is
    /// recorded in the report, but never surfaces as an error. Keys whose
    /// entry already exists are skipped. If a maximum size is configured and
    /// enough bytes have been written since the last pass, an eviction pass
    /// runs before returning.
    pub fn store(&self, keys: &[CacheKey], metadata: &Metadata, source: &Path) -> StoreHandle {
        let mut report = StoreReport::default();
        if !self.store_enabled {
            return StoreHandle::ready(report);
        }

        match metadata::encode(metadata) {
            Ok(encoded) => {
                let unique: BTreeSet<&CacheKey> = keys.iter().collect();
                for key in unique {
                    if let Err(e) = self.store_one(key, &encoded, source, &mut report) {
                        warn!(cache = %self.name, ?keys, source = %source.display(), error = %e, "artifact store failed");
                        report.error = Some(e.diagnostic());
                        break;
                    }
                }
            }
            Err(e) => {
                warn!(cache = %self.name, ?keys, error = %e, "artifact metadata not encodable");
                report.error = Some(e.diagnostic());
            }
        }

        if let Some(max_size) = self.max_size {
            if self.bytes_since_trim() as f64 > max_size as f64 * TRIM_TRIGGER_RATIO {
                report.trim = self.trim();
            }
        }

        StoreHandle::ready(report)
    }

    fn store_one(
        &self,
        key: &CacheKey,
        encoded_metadata: &[u8],
        source: &Path,
        report: &mut StoreReport,
    ) -> Result<(), CacheError> {
        let artifact_path = self.artifact_path(key);
        let metadata_path = self.metadata_path(key);

        if artifact_path.exists() && metadata_path.exists() {
            debug!(cache = %self.name, %key, "entry already present");
            report.skipped.push(key.clone());
            return Ok(());
        }

        let mut input = File::open(source).map_err(|e| CacheError::io(source, e))?;
        report.bytes_written +=
            self.persist_pending(ARTIFACT_TEMP_PREFIX, &artifact_path, |tmp| {
                std::io::copy(&mut input, tmp).map(drop)
            })?;

        // The metadata file lands second so that its presence implies a
        // complete artifact.
        report.bytes_written +=
            self.persist_pending(METADATA_TEMP_PREFIX, &metadata_path, |tmp| {
                tmp.write_all(encoded_metadata)
            })?;

        report.stored.push(key.clone());
        Ok(())
    }

    /// Stages content in a temporary file in the cache root and renames it
    /// over `dest`. The temporary file is removed on every failure path.
    fn persist_pending<F>(&self, prefix: &str, dest: &Path, fill: F) -> Result<u64, CacheError>
    where
        F: FnOnce(&mut File) -> std::io::Result<()>,
    {
        let mut tmp = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&self.root)
            .map_err(|e| CacheError::io(&self.root, e))?;

        fill(tmp.as_file_mut()).map_err(|e| CacheError::io(tmp.path(), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| CacheError::io(tmp.path(), e))?;

        let file = tmp
            .persist(dest)
            .map_err(|e| CacheError::io(dest, e.error))?;
        let size = file
            .metadata()
            .map_err(|e| CacheError::io(dest, e))?
            .len();

        self.bytes_since_trim.fetch_add(size, Ordering::Relaxed);
        Ok(size)
    }

    /// Runs an eviction pass now, resetting the trim counter.
    ///
    /// Returns `None` when no maximum size is configured or the cache root
    /// could not be listed.
    pub fn trim(&self) -> Option<TrimReport> {
        let max_size = self.max_size?;
        self.bytes_since_trim.swap(0, Ordering::Relaxed);

        match eviction::trim_dir(&self.root, max_size) {
            Ok(report) => {
                if !report.deleted.is_empty() {
                    info!(
                        cache = %self.name,
                        deleted = report.deleted.len(),
                        bytes_freed = report.bytes_freed,
                        bytes_retained = report.bytes_retained,
                        "evicted least recently used artifacts"
                    );
                }
                Some(report)
            }
            Err(e) => {
                warn!(cache = %self.name, error = %e, "eviction pass failed");
                None
            }
        }
    }

    /// Runs a final eviction pass.
    pub fn close(&self) {
        self.trim();
    }

    /// Lists the files currently in the cache root, excluding pending writes.
    pub fn entries(&self) -> Result<Vec<CacheFile>, CacheError> {
        eviction::scan_cache_dir(&self.root)
    }

    /// Returns the total size in bytes of the files in the cache root.
    pub fn usage(&self) -> Result<u64, CacheError> {
        Ok(self.entries()?.iter().map(|f| f.size).sum())
    }
}
