//! File-based cache of fetched card pages, with TTL.
//!
//! Caching the raw markup rather than the parsed record means a parser fix
//! can be re-run against pages already on disk without another fetch.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use anyhow::Result;

/// Cached page with fetch timestamp
#[derive(Serialize, Deserialize)]
struct CacheEntry {
    html: String,
    fetched_at: DateTime<Utc>,
}

/// File-based page cache keyed by cert number
pub struct PageCache {
    base_dir: PathBuf,
    ttl: Duration,
}

impl PageCache {
    /// Create a new cache rooted at `base_dir`, entries valid for `ttl_hours`
    pub fn new(base_dir: PathBuf, ttl_hours: i64) -> Self {
        Self {
            base_dir,
            ttl: Duration::hours(ttl_hours),
        }
    }

    fn entry_path(&self, cert_number: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", cert_number))
    }

    /// Get cached markup if present and not expired
    pub fn get(&self, cert_number: &str) -> Option<String> {
        let path = self.entry_path(cert_number);

        if !path.exists() {
            return None;
        }

        let content = std::fs::read_to_string(&path).ok()?;
        let entry: CacheEntry = serde_json::from_str(&content).ok()?;

        // Check if expired
        let elapsed = Utc::now() - entry.fetched_at;
        if elapsed > self.ttl {
            let _ = std::fs::remove_file(&path);
            return None;
        }

        Some(entry.html)
    }

    /// Store markup for a cert number
    pub fn set(&self, cert_number: &str, html: &str) -> Result<()> {
        std::fs::create_dir_all(&self.base_dir)?;

        let entry = CacheEntry {
            html: html.to_string(),
            fetched_at: Utc::now(),
        };

        let path = self.entry_path(cert_number);
        let content = serde_json::to_string(&entry)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Drop every cached page
    #[allow(dead_code)]
    pub fn clear(&self) -> Result<()> {
        if self.base_dir.exists() {
            std::fs::remove_dir_all(&self.base_dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let cache = PageCache::new(dir.path().to_path_buf(), 24);

        assert_eq!(cache.get("V1"), None);
        cache.set("V1", "<html>card</html>").unwrap();
        assert_eq!(cache.get("V1").as_deref(), Some("<html>card</html>"));
    }

    #[test]
    fn test_expired_entry_is_dropped() {
        let dir = TempDir::new().unwrap();
        // Negative TTL: everything written is already stale.
        let cache = PageCache::new(dir.path().to_path_buf(), -1);

        cache.set("V1", "<html></html>").unwrap();
        assert_eq!(cache.get("V1"), None);
        assert!(!dir.path().join("V1.json").exists());
    }

    #[test]
    fn test_clear() {
        let dir = TempDir::new().unwrap();
        let cache = PageCache::new(dir.path().to_path_buf(), 24);

        cache.set("V1", "a").unwrap();
        cache.clear().unwrap();
        assert_eq!(cache.get("V1"), None);
    }
}
