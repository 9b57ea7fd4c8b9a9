//! Per-scraper persistent set of already-scraped URLs (`url -> ISO
//! timestamp`). Consulted before yielding any URL; entries are only
//! recorded after a successful article parse, guaranteeing at-least-once
//! semantics if the scraper crashes mid-run.

use crate::core::atomic_json;
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

pub struct UrlCache {
    path: PathBuf,
    map: Mutex<HashMap<String, String>>,
}

impl UrlCache {
    pub fn load(path: PathBuf) -> Self {
        let map = atomic_json::load_or_default(&path, HashMap::new);
        UrlCache {
            path,
            map: Mutex::new(map),
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.map.lock().unwrap().contains_key(url)
    }

    pub fn record(&self, url: &str) {
        self.map
            .lock()
            .unwrap()
            .insert(url.to_string(), Utc::now().to_rfc3339());
    }

    /// Snapshots the map under the lock, then writes it out atomically.
    /// Called on natural completion and on cooperative shutdown.
    pub fn flush(&self) {
        let snapshot = self.map.lock().unwrap().clone();
        if let Err(e) = atomic_json::save(&self.path, &snapshot) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to flush url cache");
        }
    }

    pub fn len(&self) -> usize {
        self.map.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tempdir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "blaulicht-pipeline-urlcache-test-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn new_urls_are_absent_until_recorded() {
        let path = tempdir().join("scraped_urls_test.json");
        let cache = UrlCache::load(path.clone());
        assert!(!cache.contains("https://example.com/a"));
        cache.record("https://example.com/a");
        assert!(cache.contains("https://example.com/a"));
        cache.flush();

        let reloaded = UrlCache::load(path);
        assert!(reloaded.contains("https://example.com/a"));
    }
}
