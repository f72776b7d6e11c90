//! Disk-backed HTML page cache
//!
//! Each cache entry is one JSON file on disk, named by a truncated SHA-256
//! fingerprint of the URL so arbitrary key lengths and characters are safe
//! as file names. Expiry is lazy: an entry older than the TTL is deleted
//! the moment a read finds it stale, there is no background sweep.

use crate::config::CacheConfig;
use crate::{CrawlError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;

/// One persisted cache entry
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    /// The URL this entry was fetched from
    url: String,
    /// Fetch time as fractional epoch seconds
    cached_at: f64,
    /// The raw HTML body
    html: String,
}

/// File-system cache keyed by URL
///
/// A disabled cache never touches the file system: `get` always misses and
/// `put` is a no-op, so no cache directory is required to exist.
#[derive(Debug)]
pub struct PageCache {
    dir: PathBuf,
    ttl: u64,
    enabled: bool,
}

impl PageCache {
    /// Creates a cache rooted at the configured directory
    ///
    /// The directory is created if caching is enabled; failure to create it
    /// is a [`CrawlError::CacheWrite`].
    pub fn new(config: &CacheConfig) -> Result<Self> {
        let cache = Self {
            dir: PathBuf::from(&config.dir),
            ttl: config.ttl,
            enabled: config.enabled,
        };

        if cache.enabled {
            fs::create_dir_all(&cache.dir).map_err(|e| CrawlError::CacheWrite {
                key: cache.dir.display().to_string(),
                detail: format!("cannot create cache directory: {e}"),
            })?;
        }

        Ok(cache)
    }

    /// Returns the cached HTML for `url`, or `None` on miss or expiry
    ///
    /// An entry that exists but cannot be decoded is a
    /// [`CrawlError::CacheRead`], not a miss: silent re-fetching would hide
    /// cache corruption from the operator.
    pub fn get(&self, url: &str) -> Result<Option<String>> {
        if !self.enabled {
            return Ok(None);
        }

        let path = self.entry_path(url);
        if !path.exists() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&path).map_err(|e| CrawlError::CacheRead {
            key: url.to_string(),
            detail: e.to_string(),
        })?;
        let entry: CacheEntry =
            serde_json::from_str(&raw).map_err(|e| CrawlError::CacheRead {
                key: url.to_string(),
                detail: e.to_string(),
            })?;

        if self.ttl > 0 {
            let age = now_epoch() - entry.cached_at;
            if age > self.ttl as f64 {
                tracing::debug!("Cache entry for {} expired ({:.0}s old), removing", url, age);
                let _ = fs::remove_file(&path);
                return Ok(None);
            }
        }

        Ok(Some(entry.html))
    }

    /// Stores `html` for `url`, overwriting any previous entry
    pub fn put(&self, url: &str, html: &str) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let entry = CacheEntry {
            url: url.to_string(),
            cached_at: now_epoch(),
            html: html.to_string(),
        };
        let payload = serde_json::to_string(&entry).map_err(|e| CrawlError::CacheWrite {
            key: url.to_string(),
            detail: e.to_string(),
        })?;

        fs::write(self.entry_path(url), payload).map_err(|e| CrawlError::CacheWrite {
            key: url.to_string(),
            detail: e.to_string(),
        })
    }

    /// Removes a single entry, returning `true` if it existed
    pub fn invalidate(&self, url: &str) -> bool {
        let path = self.entry_path(url);
        if path.exists() {
            let _ = fs::remove_file(&path);
            true
        } else {
            false
        }
    }

    /// Removes every entry file in the cache root, returning the count
    ///
    /// A missing cache root counts as empty, not as an error.
    pub fn clear(&self) -> u64 {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return 0;
        };

        let mut count = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && fs::remove_file(&path).is_ok()
            {
                count += 1;
            }
        }
        count
    }

    /// Whether an entry file currently exists for `url` (expired or not)
    ///
    /// Management companion to [`Self::invalidate`] and [`Self::clear`].
    /// A `true` result does not promise a future [`Self::get`] will hit:
    /// expiry is only checked on read.
    pub fn contains(&self, url: &str) -> bool {
        self.enabled && self.entry_path(url).exists()
    }

    fn entry_path(&self, url: &str) -> PathBuf {
        let digest = Sha256::digest(url.as_bytes());
        let fingerprint = &hex::encode(digest)[..16];
        self.dir.join(format!("{fingerprint}.json"))
    }
}

fn now_epoch() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_cache(ttl: u64) -> (TempDir, PageCache) {
        let dir = TempDir::new().unwrap();
        let cache = PageCache::new(&CacheConfig {
            dir: dir.path().join("cache").display().to_string(),
            ttl,
            enabled: true,
        })
        .unwrap();
        (dir, cache)
    }

    /// Rewrites an entry on disk with a back-dated timestamp.
    fn backdate_entry(cache: &PageCache, url: &str, age_secs: f64) {
        let path = cache.entry_path(url);
        let raw = fs::read_to_string(&path).unwrap();
        let mut entry: CacheEntry = serde_json::from_str(&raw).unwrap();
        entry.cached_at = now_epoch() - age_secs;
        fs::write(&path, serde_json::to_string(&entry).unwrap()).unwrap();
    }

    #[test]
    fn test_roundtrip_within_ttl() {
        let (_dir, cache) = test_cache(3600);
        cache.put("https://voz.vn/t/abc.123/", "<html>hi</html>").unwrap();
        let got = cache.get("https://voz.vn/t/abc.123/").unwrap();
        assert_eq!(got.as_deref(), Some("<html>hi</html>"));
    }

    #[test]
    fn test_miss_for_unknown_url() {
        let (_dir, cache) = test_cache(3600);
        assert!(cache.get("https://voz.vn/t/unknown.1/").unwrap().is_none());
    }

    #[test]
    fn test_expired_entry_is_removed() {
        let (_dir, cache) = test_cache(60);
        let url = "https://voz.vn/t/abc.123/";
        cache.put(url, "old").unwrap();
        backdate_entry(&cache, url, 120.0);

        assert!(cache.get(url).unwrap().is_none());
        // Lazy expiry deletes the file at read time
        assert!(!cache.contains(url));
    }

    #[test]
    fn test_ttl_zero_never_expires() {
        let (_dir, cache) = test_cache(0);
        let url = "https://voz.vn/t/abc.123/";
        cache.put(url, "forever").unwrap();
        backdate_entry(&cache, url, 10.0 * 365.0 * 86400.0);

        assert_eq!(cache.get(url).unwrap().as_deref(), Some("forever"));
    }

    #[test]
    fn test_corrupted_entry_is_read_error_not_miss() {
        let (_dir, cache) = test_cache(3600);
        let url = "https://voz.vn/t/abc.123/";
        cache.put(url, "ok").unwrap();
        fs::write(cache.entry_path(url), "{ not valid json").unwrap();

        let result = cache.get(url);
        assert!(matches!(result, Err(CrawlError::CacheRead { .. })));
    }

    #[test]
    fn test_disabled_cache_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let cache_dir = dir.path().join("never_created");
        let cache = PageCache::new(&CacheConfig {
            dir: cache_dir.display().to_string(),
            ttl: 3600,
            enabled: false,
        })
        .unwrap();

        cache.put("https://voz.vn/t/abc.123/", "ignored").unwrap();
        assert!(cache.get("https://voz.vn/t/abc.123/").unwrap().is_none());
        assert!(!cache_dir.exists());
    }

    #[test]
    fn test_invalidate_reports_existence() {
        let (_dir, cache) = test_cache(3600);
        let url = "https://voz.vn/t/abc.123/";
        cache.put(url, "x").unwrap();

        assert!(cache.invalidate(url));
        assert!(!cache.invalidate(url));
        assert!(cache.get(url).unwrap().is_none());
    }

    #[test]
    fn test_clear_counts_entries() {
        let (_dir, cache) = test_cache(3600);
        cache.put("https://voz.vn/t/a.1/", "a").unwrap();
        cache.put("https://voz.vn/t/b.2/", "b").unwrap();
        cache.put("https://voz.vn/t/c.3/", "c").unwrap();

        assert_eq!(cache.clear(), 3);
        assert_eq!(cache.clear(), 0);
    }

    #[test]
    fn test_clear_on_missing_root_is_zero() {
        let cache = PageCache {
            dir: PathBuf::from("/nonexistent/vozgraph_cache"),
            ttl: 3600,
            enabled: true,
        };
        assert_eq!(cache.clear(), 0);
    }

    #[test]
    fn test_fingerprint_is_stable_and_fixed_width() {
        let (_dir, cache) = test_cache(3600);
        let a = cache.entry_path("https://voz.vn/t/abc.123/");
        let b = cache.entry_path("https://voz.vn/t/abc.123/");
        let c = cache.entry_path("https://voz.vn/t/other.456/");

        assert_eq!(a, b);
        assert_ne!(a, c);
        let name = a.file_name().unwrap().to_str().unwrap();
        assert_eq!(name.len(), 16 + ".json".len());
    }
}
