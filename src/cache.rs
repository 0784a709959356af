//! Persistent photo-detail cache.
//!
//! Fetching details costs two REST calls per photo, and an account with a
//! few thousand photos takes minutes to walk. The cache keeps the last
//! [`PhotoDetail`] seen for each photo id together with the time it was
//! fetched, so a re-run inside the freshness window makes no detail calls
//! at all.
//!
//! ## Freshness
//!
//! An entry is fresh while `now - last_fetched < ttl` (strict). Freshness is
//! per entry: photos fetched at different times age out independently.
//! The default TTL is one hour, long enough to re-rank with different
//! filters without hammering the API, short enough that view counts track.
//!
//! ## Storage
//!
//! The cache is a gzip-compressed JSON document at `~/.flickrank_cache`.
//! It is loaded once at start and written once at the end, and only when
//! something changed. Writes go through a temporary sibling file and a
//! rename so a crash never leaves a truncated cache behind.
//!
//! A missing, unreadable, corrupt or version-mismatched file loads as an
//! empty cache: the worst case is a full refetch.

use crate::types::PhotoDetail;
use chrono::{DateTime, TimeDelta, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Name of the cache file in the home directory.
pub const CACHE_FILENAME: &str = ".flickrank_cache";

/// Version of the on-disk format. Bump this to discard all existing caches
/// when [`CacheEntry`] or [`PhotoDetail`] change shape.
pub const CACHE_VERSION: u32 = 1;

pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache IO error: {0}")]
    Io(#[from] io::Error),
    #[error("cache encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One cached photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub id: String,
    pub detail: PhotoDetail,
    pub last_fetched: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(detail: PhotoDetail, last_fetched: DateTime<Utc>) -> Self {
        Self {
            id: detail.id.clone(),
            detail,
            last_fetched,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoCache {
    pub version: u32,
    entries: HashMap<String, CacheEntry>,
    /// Set by [`put`](Self::put), cleared by a successful save. Never serialized.
    #[serde(skip)]
    dirty: bool,
}

impl Default for PhotoCache {
    fn default() -> Self {
        Self::empty()
    }
}

impl PhotoCache {
    /// An empty cache (first run or `--no-cache`).
    pub fn empty() -> Self {
        Self {
            version: CACHE_VERSION,
            entries: HashMap::new(),
            dirty: false,
        }
    }

    /// Load from `path`. Any failure yields an empty cache.
    pub fn load(path: &Path) -> Self {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no cache file");
                return Self::empty();
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "cache unreadable, starting empty"
                );
                return Self::empty();
            }
        };
        let reader = GzDecoder::new(BufReader::new(file));
        let mut cache: Self = match serde_json::from_reader(reader) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cache corrupt, starting empty");
                return Self::empty();
            }
        };
        if cache.version != CACHE_VERSION {
            tracing::info!(
                found = cache.version,
                expected = CACHE_VERSION,
                "cache version changed, starting empty"
            );
            return Self::empty();
        }
        cache.dirty = false;
        tracing::debug!(entries = cache.entries.len(), "cache loaded");
        cache
    }

    /// Write the whole cache to `path` and clear the dirty flag.
    pub fn save(&mut self, path: &Path) -> Result<(), CacheError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let tmp = temp_path(path);
        {
            let file = File::create(&tmp)?;
            let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
            serde_json::to_writer(&mut encoder, self)?;
            encoder.finish()?.flush()?;
        }
        fs::rename(&tmp, path)?;
        self.dirty = false;
        tracing::debug!(path = %path.display(), entries = self.entries.len(), "cache saved");
        Ok(())
    }

    /// Save only if something was `put` since load. Returns whether it wrote.
    pub fn flush(&mut self, path: &Path) -> Result<bool, CacheError> {
        if !self.dirty {
            return Ok(false);
        }
        self.save(path)?;
        Ok(true)
    }

    pub fn get(&self, id: &str) -> Option<&CacheEntry> {
        self.entries.get(id)
    }

    /// The cached detail for `id` if it is still fresh at `now`.
    pub fn get_fresh(&self, id: &str, now: DateTime<Utc>, ttl: Duration) -> Option<&PhotoDetail> {
        self.get(id)
            .filter(|entry| is_fresh(entry, now, ttl))
            .map(|entry| &entry.detail)
    }

    /// Insert or replace the entry for `entry.id`.
    pub fn put(&mut self, entry: CacheEntry) {
        self.entries.insert(entry.id.clone(), entry);
        self.dirty = true;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

/// `now - last_fetched < ttl`. A TTL too large to represent never expires.
pub fn is_fresh(entry: &CacheEntry, now: DateTime<Utc>, ttl: Duration) -> bool {
    match TimeDelta::from_std(ttl) {
        Ok(ttl) => now.signed_duration_since(entry.last_fetched) < ttl,
        Err(_) => true,
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
