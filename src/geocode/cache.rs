//! Address → coordinates cache. A positive entry caches `(lat, lon,
//! precision)`; a negative entry is an empty-object sentinel so repeated
//! failed lookups never re-query the provider.

use crate::core::atomic_json;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CachedGeocode {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub precision: Option<String>,
}

impl CachedGeocode {
    pub fn is_hit(&self) -> bool {
        self.lat.is_some() && self.lon.is_some()
    }
}

pub struct GeocodeCache {
    path: PathBuf,
    map: Mutex<HashMap<String, CachedGeocode>>,
}

impl GeocodeCache {
    pub fn load(path: PathBuf) -> Self {
        let map = atomic_json::load_or_default(&path, HashMap::new);
        GeocodeCache { path, map: Mutex::new(map) }
    }

    pub fn get(&self, address: &str) -> Option<CachedGeocode> {
        self.map.lock().unwrap().get(address).cloned()
    }

    pub fn insert(&self, address: String, value: CachedGeocode) {
        self.map.lock().unwrap().insert(address, value);
    }

    pub fn flush(&self) {
        let snapshot = self.map.lock().unwrap().clone();
        if let Err(e) = atomic_json::save(&self.path, &snapshot) {
            warn!(path = %self.path.display(), error = %e, "failed to flush geocode cache");
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

    #[test]
    fn negative_sentinel_is_not_a_hit() {
        let sentinel = CachedGeocode::default();
        assert!(!sentinel.is_hit());
    }

    #[test]
    fn round_trips_through_flush_and_reload() {
        let dir = std::env::temp_dir().join(format!("geocode_cache_test_{}", std::process::id()));
        let path = dir.join("geocode_cache.json");
        let cache = GeocodeCache::load(path.clone());
        cache.insert(
            "Hauptstraße 12, Frankfurt am Main, hessen, Germany".to_string(),
            CachedGeocode { lat: Some(50.11), lon: Some(8.68), precision: Some("rooftop".to_string()) },
        );
        cache.flush();

        let reloaded = GeocodeCache::load(path);
        let hit = reloaded.get("Hauptstraße 12, Frankfurt am Main, hessen, Germany").unwrap();
        assert!(hit.is_hit());
        std::fs::remove_dir_all(dir).ok();
    }
}
