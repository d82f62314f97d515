//! `ResourceCache`: shared store of fetched network resources.
//!
//! Entries live in an in-memory index guarded by an `RwLock`; a stored entry
//! is swapped in whole, so readers never observe a partial write. When a
//! directory is configured, new entries are persisted on [`ResourceCache::flush`]
//! as `<stem>.body` plus `<stem>.meta.json`, each written to a temporary
//! file and renamed into place.
//!
//! Disk failures are never surfaced: they are logged and the cache behaves as
//! if the entry were absent.

use crate::entry::{file_stem, CacheEntry};
use crate::error::CacheError;
use chrono::{DateTime, Utc};
use regscope_core::CacheMode;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

const META_SUFFIX: &str = ".meta.json";
const BODY_SUFFIX: &str = ".body";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Serialize)]
struct MetaOut<'a> {
    key: &'a str,
    #[serde(flatten)]
    entry: &'a CacheEntry,
}

#[derive(Deserialize)]
struct MetaIn {
    key: String,
    #[serde(flatten)]
    entry: CacheEntry,
}

/// Content-addressed store shared by every browser session of one engine.
#[derive(Debug)]
pub struct ResourceCache {
    mode: CacheMode,
    dir: Option<PathBuf>,
    entries: RwLock<HashMap<String, Arc<CacheEntry>>>,
    pending: Mutex<HashSet<String>>,
    flush_lock: Mutex<()>,
}

impl ResourceCache {
    /// Create a cache that lives only as long as the process.
    #[must_use]
    pub fn in_memory(mode: CacheMode) -> Self {
        Self {
            mode,
            dir: None,
            entries: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashSet::new()),
            flush_lock: Mutex::new(()),
        }
    }

    /// Open a cache backed by `dir`, loading every persisted entry that is
    /// still fresh.
    ///
    /// The directory is only created on the first flush that has something to
    /// write. Unreadable or corrupt files are skipped with a warning.
    pub async fn open(mode: CacheMode, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let mut cache = Self::in_memory(mode);

        match Self::load_dir(&dir).await {
            Ok(loaded) => {
                info!(
                    count = loaded.len(),
                    dir = %dir.display(),
                    mode = ?mode,
                    "loaded resource cache"
                );
                cache.entries = RwLock::new(loaded);
            }
            Err(e) => warn!(error = %e, "starting with an empty resource cache"),
        }

        cache.dir = Some(dir);
        cache
    }

    /// The eviction policy of this cache.
    #[must_use]
    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    /// Backing directory, if any.
    #[must_use]
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Number of entries currently indexed, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the index is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Look up a fresh entry.
    pub async fn lookup(&self, key: &str) -> Option<Arc<CacheEntry>> {
        self.lookup_at(key, Utc::now()).await
    }

    /// Look up an entry as of `now`; expired entries are reported absent.
    pub async fn lookup_at(&self, key: &str, now: DateTime<Utc>) -> Option<Arc<CacheEntry>> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.is_fresh_at(now))
            .cloned()
    }

    /// Store an entry.
    ///
    /// In permanent mode an existing key is never overwritten. In TTL mode the
    /// new entry replaces the old one. Returns whether the entry was stored.
    pub async fn store(&self, key: &str, entry: CacheEntry) -> bool {
        {
            let mut entries = self.entries.write().await;
            if self.mode == CacheMode::Permanent && entries.contains_key(key) {
                return false;
            }
            entries.insert(key.to_string(), Arc::new(entry));
        }

        if self.dir.is_some() {
            self.pending.lock().await.insert(key.to_string());
        }
        debug!(key, "stored resource");
        true
    }

    /// Persist entries stored since the last flush and purge expired ones.
    ///
    /// Returns the number of entries written to disk.
    pub async fn flush(&self) -> usize {
        let _guard = self.flush_lock.lock().await;

        let expired = self.purge_expired(Utc::now()).await;

        let Some(dir) = &self.dir else {
            return 0;
        };

        for key in &expired {
            Self::remove_files(dir, key).await;
        }

        let keys: Vec<String> = self.pending.lock().await.drain().collect();
        if keys.is_empty() {
            return 0;
        }

        if let Err(e) = fs::create_dir_all(dir).await {
            warn!(error = %CacheError::io(dir, e), "cannot create cache directory");
            return 0;
        }

        let mut written = 0;
        for key in keys {
            let Some(entry) = self.entries.read().await.get(&key).cloned() else {
                continue;
            };
            match Self::write_entry(dir, &key, &entry).await {
                Ok(()) => written += 1,
                Err(e) => warn!(key = %key, error = %e, "failed to persist cache entry"),
            }
        }

        debug!(written, dir = %dir.display(), "flushed resource cache");
        written
    }

    /// Flush and release the cache.
    pub async fn close(self) {
        let written = self.flush().await;
        info!(written, "closed resource cache");
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut entries = self.entries.write().await;
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| !entry.is_fresh_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.remove(key);
        }
        expired
    }

    async fn load_dir(dir: &Path) -> Result<HashMap<String, Arc<CacheEntry>>, CacheError> {
        let mut loaded = HashMap::new();

        let mut read_dir = match fs::read_dir(dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(dir = %dir.display(), "cache directory does not exist yet");
                return Ok(loaded);
            }
            Err(e) => return Err(CacheError::io(dir, e)),
        };

        let now = Utc::now();
        while let Some(item) = read_dir
            .next_entry()
            .await
            .map_err(|e| CacheError::io(dir, e))?
        {
            let path = item.path();
            let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            if !name.ends_with(META_SUFFIX) {
                continue;
            }

            match Self::read_entry(&path).await {
                Ok((key, entry)) if entry.is_fresh_at(now) => {
                    loaded.insert(key, Arc::new(entry));
                }
                Ok((key, _)) => {
                    debug!(key = %key, "dropping expired cache entry");
                    Self::remove_files(dir, &key).await;
                }
                Err(e) => warn!(error = %e, "skipping unreadable cache entry"),
            }
        }

        Ok(loaded)
    }

    async fn read_entry(meta_path: &Path) -> Result<(String, CacheEntry), CacheError> {
        let raw = fs::read(meta_path)
            .await
            .map_err(|e| CacheError::io(meta_path, e))?;
        let meta: MetaIn = serde_json::from_slice(&raw).map_err(|source| CacheError::Corrupt {
            path: meta_path.to_path_buf(),
            source,
        })?;

        let body_path = meta_path.with_file_name(format!("{}{BODY_SUFFIX}", file_stem(&meta.key)));
        let body = fs::read(&body_path)
            .await
            .map_err(|e| CacheError::io(&body_path, e))?;

        let mut entry = meta.entry;
        entry.body = body;
        Ok((meta.key, entry))
    }

    async fn write_entry(dir: &Path, key: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        let stem = file_stem(key);
        let meta = serde_json::to_vec(&MetaOut { key, entry }).map_err(|source| {
            CacheError::Corrupt {
                path: dir.join(format!("{stem}{META_SUFFIX}")),
                source,
            }
        })?;

        // Body first: a meta file on disk always has its body next to it.
        Self::write_atomic(&dir.join(format!("{stem}{BODY_SUFFIX}")), &entry.body).await?;
        Self::write_atomic(&dir.join(format!("{stem}{META_SUFFIX}")), &meta).await
    }

    async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
        let seq = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("tmp-{}-{seq}", std::process::id()));

        fs::write(&tmp, bytes)
            .await
            .map_err(|e| CacheError::io(&tmp, e))?;
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(CacheError::io(path, e));
        }
        Ok(())
    }

    async fn remove_files(dir: &Path, key: &str) {
        let stem = file_stem(key);
        for suffix in [META_SUFFIX, BODY_SUFFIX] {
            let path = dir.join(format!("{stem}{suffix}"));
            if let Err(e) = fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(error = %CacheError::io(&path, e), "failed to remove cache file");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(body: &[u8], expires_at: Option<DateTime<Utc>>) -> CacheEntry {
        CacheEntry::new(
            200,
            vec![("content-type".to_string(), "text/css".to_string())],
            body.to_vec(),
            expires_at,
        )
    }

    #[tokio::test]
    async fn test_lookup_returns_stored_entry() {
        let cache = ResourceCache::in_memory(CacheMode::Ttl);
        let stored = entry(b"body{}", Some(Utc::now() + Duration::seconds(60)));
        assert!(cache.store("https://a.test/site.css", stored.clone()).await);

        let found = cache.lookup("https://a.test/site.css").await.expect("cached");
        assert_eq!(*found, stored);
    }

    #[tokio::test]
    async fn test_expired_entry_is_absent() {
        let cache = ResourceCache::in_memory(CacheMode::Ttl);
        let now = Utc::now();
        cache
            .store("https://a.test/x.js", entry(b"1", Some(now + Duration::seconds(5))))
            .await;

        assert!(cache.lookup_at("https://a.test/x.js", now).await.is_some());
        assert!(cache
            .lookup_at("https://a.test/x.js", now + Duration::seconds(6))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_permanent_mode_never_overwrites() {
        let cache = ResourceCache::in_memory(CacheMode::Permanent);
        assert!(cache.store("https://a.test/logo.png", entry(b"first", None)).await);
        assert!(!cache.store("https://a.test/logo.png", entry(b"second", None)).await);

        let found = cache.lookup("https://a.test/logo.png").await.expect("cached");
        assert_eq!(found.body, b"first");
    }

    #[tokio::test]
    async fn test_ttl_mode_overwrites() {
        let cache = ResourceCache::in_memory(CacheMode::Ttl);
        let later = Some(Utc::now() + Duration::seconds(60));
        cache.store("https://a.test/app.js", entry(b"v1", later)).await;
        cache.store("https://a.test/app.js", entry(b"v2", later)).await;

        let found = cache.lookup("https://a.test/app.js").await.expect("cached");
        assert_eq!(found.body, b"v2");
    }

    #[tokio::test]
    async fn test_flush_purges_expired_entries() {
        let cache = ResourceCache::in_memory(CacheMode::Ttl);
        cache
            .store("https://a.test/old.js", entry(b"1", Some(Utc::now() - Duration::seconds(1))))
            .await;
        cache.store("https://a.test/new.js", entry(b"2", None)).await;

        assert_eq!(cache.flush().await, 0);
        assert_eq!(cache.len().await, 1);
    }
}
