//! On-disk enrichment cache: URL+body hash → cached enrichment(s). Same
//! atomic-write discipline as every other cache in this crate. Keyed so
//! that a second run over the same inputs performs zero LLM calls.

use crate::core::{atomic_json, sha256_hex_truncated};
use crate::enrich::types::{CachedEnrichment, Enrichment};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

pub struct EnrichmentCache {
    path: PathBuf,
    map: Mutex<HashMap<String, CachedEnrichment>>,
}

/// Cache key is the truncated SHA-256 of `"{url}:{body}"`, identical on
/// every platform.
pub fn cache_key(url: &str, body: &str) -> String {
    sha256_hex_truncated(&format!("{url}:{body}"), 16)
}

impl EnrichmentCache {
    pub fn load(path: PathBuf) -> Self {
        let map = atomic_json::load_or_default(&path, HashMap::new);
        EnrichmentCache { path, map: Mutex::new(map) }
    }

    pub fn get(&self, key: &str) -> Option<CachedEnrichment> {
        self.map.lock().unwrap().get(key).cloned()
    }

    pub fn insert_incidents(&self, key: String, incidents: Vec<Enrichment>) {
        self.map.lock().unwrap().insert(key, CachedEnrichment::Incidents(incidents));
    }

    pub fn insert_sentinel(&self, key: String, classification: String, reason: String) {
        self.map.lock().unwrap().insert(key, CachedEnrichment::Sentinel { classification, reason });
    }

    pub fn len(&self) -> usize {
        self.map.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn flush(&self) {
        let snapshot = self.map.lock().unwrap().clone();
        if let Err(e) = atomic_json::save(&self.path, &snapshot) {
            warn!(path = %self.path.display(), error = %e, "failed to flush enrichment cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_stable_for_same_url_and_body() {
        let a = cache_key("https://x/1", "body text");
        let b = cache_key("https://x/1", "body text");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn cache_key_differs_for_different_bodies() {
        assert_ne!(cache_key("https://x/1", "a"), cache_key("https://x/1", "b"));
    }

    #[test]
    fn round_trips_a_sentinel_through_flush_and_reload() {
        let dir = std::env::temp_dir().join(format!("enrich_cache_test_{}", std::process::id()));
        let path = dir.join("enrichment_cache.json");
        let cache = EnrichmentCache::load(path.clone());
        cache.insert_sentinel("k1".to_string(), "junk".to_string(), "Verkehrshinweis".to_string());
        cache.flush();

        let reloaded = EnrichmentCache::load(path);
        match reloaded.get("k1") {
            Some(CachedEnrichment::Sentinel { classification, .. }) => assert_eq!(classification, "junk"),
            other => panic!("unexpected: {other:?}"),
        }
        std::fs::remove_dir_all(dir).ok();
    }
}
