//! Pipeline configuration: JSON file → environment variable → built-in
//! default, in that order of precedence, for every knob. Mirrors the
//! resolver pattern the teacher uses for its deep-research config (optional
//! fields on a deserialized struct, each resolved independently).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// All 16 German Bundesländer, in the fixed canonical order.
pub const BUNDESLAENDER: &[&str] = &[
    "baden-wuerttemberg",
    "bayern",
    "berlin",
    "brandenburg",
    "bremen",
    "hamburg",
    "hessen",
    "mecklenburg-vorpommern",
    "niedersachsen",
    "nordrhein-westfalen",
    "rheinland-pfalz",
    "saarland",
    "sachsen",
    "sachsen-anhalt",
    "schleswig-holstein",
    "thueringen",
];

/// States scraped via their own dedicated portal instead of presseportal.de.
/// Hamburg is deliberately excluded: polizei.hamburg embeds a presseportal.de
/// iframe, so it is scraped through presseportal like the other ten states.
pub const DEDICATED_SCRAPER_STATES: &[&str] =
    &["berlin", "brandenburg", "bayern", "sachsen-anhalt", "sachsen"];

pub fn presseportal_states() -> Vec<&'static str> {
    BUNDESLAENDER
        .iter()
        .copied()
        .filter(|s| !DEDICATED_SCRAPER_STATES.contains(s))
        .collect()
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    data_dir: Option<String>,
    cache_dir: Option<String>,
    llm_base_url: Option<String>,
    llm_api_key: Option<String>,
    llm_model: Option<String>,
    llm_batch_size: Option<usize>,
    llm_concurrency: Option<usize>,
    geocoder_base_url: Option<String>,
    geocoder_api_key: Option<String>,
    store_url: Option<String>,
    store_api_key: Option<String>,
    pipeline_run: Option<String>,
    scraper_concurrency: Option<usize>,
    max_retries: Option<u32>,
    live_poll_interval_minutes: Option<u64>,
    live_max_articles_per_source: Option<usize>,
}

/// Resolved pipeline configuration. Every field has a sensible default, so
/// the pipeline runs with no config file and no environment variables set
/// (against the built-in defaults below), degrading gracefully exactly as
/// the teacher's `load_shadow_config` does for a missing file.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub llm_base_url: String,
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub llm_batch_size: usize,
    pub llm_concurrency: usize,
    pub geocoder_base_url: String,
    pub geocoder_api_key: Option<String>,
    pub store_url: Option<String>,
    pub store_api_key: Option<String>,
    pub pipeline_run: String,
    pub scraper_concurrency: usize,
    pub max_retries: u32,
    pub live_poll_interval_minutes: u64,
    pub live_max_articles_per_source: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            data_dir: PathBuf::from("data/pipeline"),
            cache_dir: PathBuf::from(".cache"),
            llm_base_url: "https://api.openai.com/v1".to_string(),
            llm_api_key: None,
            llm_model: "gpt-4o-mini".to_string(),
            llm_batch_size: 8,
            llm_concurrency: 30,
            geocoder_base_url: "https://maps.googleapis.com/maps/api/geocode/json".to_string(),
            geocoder_api_key: None,
            store_url: None,
            store_api_key: None,
            pipeline_run: "default".to_string(),
            scraper_concurrency: 16,
            max_retries: 5,
            live_poll_interval_minutes: 15,
            live_max_articles_per_source: 50,
        }
    }
}

impl PipelineConfig {
    /// Search `./blaulicht-pipeline.json`, then `BLAULICHT_CONFIG` env path.
    /// A missing file is silent; a parse error warns and falls back to
    /// defaults, same policy as the teacher's config loader.
    pub fn load() -> Self {
        let raw = find_config_file()
            .and_then(|path| match std::fs::read_to_string(&path) {
                Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                    Ok(raw) => Some(raw),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to parse pipeline config, using defaults");
                        None
                    }
                },
                Err(_) => None,
            })
            .unwrap_or_default();

        let defaults = PipelineConfig::default();
        PipelineConfig {
            data_dir: resolve_path(raw.data_dir, "BLAULICHT_DATA_DIR", defaults.data_dir),
            cache_dir: resolve_path(raw.cache_dir, "BLAULICHT_CACHE_DIR", defaults.cache_dir),
            llm_base_url: resolve_string(raw.llm_base_url, "LLM_BASE_URL", defaults.llm_base_url),
            llm_api_key: raw
                .llm_api_key
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok()),
            llm_model: resolve_string(raw.llm_model, "LLM_MODEL", defaults.llm_model),
            llm_batch_size: resolve_num(raw.llm_batch_size, "LLM_BATCH_SIZE", defaults.llm_batch_size),
            llm_concurrency: resolve_num(
                raw.llm_concurrency,
                "LLM_CONCURRENCY",
                defaults.llm_concurrency,
            ),
            geocoder_base_url: resolve_string(
                raw.geocoder_base_url,
                "GEOCODER_BASE_URL",
                defaults.geocoder_base_url,
            ),
            geocoder_api_key: raw
                .geocoder_api_key
                .or_else(|| std::env::var("GEOCODER_API_KEY").ok())
                .or_else(|| std::env::var("HERE_API_KEY").ok()),
            store_url: raw
                .store_url
                .or_else(|| std::env::var("STORE_URL").ok())
                .or_else(|| std::env::var("NEXT_PUBLIC_SUPABASE_URL").ok()),
            store_api_key: raw
                .store_api_key
                .or_else(|| std::env::var("STORE_API_KEY").ok())
                .or_else(|| std::env::var("SUPABASE_SERVICE_ROLE_KEY").ok()),
            pipeline_run: resolve_string(
                raw.pipeline_run,
                "PIPELINE_RUN",
                defaults.pipeline_run,
            ),
            scraper_concurrency: resolve_num(
                raw.scraper_concurrency,
                "SCRAPER_CONCURRENCY",
                defaults.scraper_concurrency,
            ),
            max_retries: resolve_num(raw.max_retries, "MAX_RETRIES", defaults.max_retries),
            live_poll_interval_minutes: resolve_num(
                raw.live_poll_interval_minutes,
                "LIVE_POLL_INTERVAL_MINUTES",
                defaults.live_poll_interval_minutes,
            ),
            live_max_articles_per_source: resolve_num(
                raw.live_max_articles_per_source,
                "LIVE_MAX_ARTICLES_PER_SOURCE",
                defaults.live_max_articles_per_source,
            ),
        }
    }

    pub fn enrichment_cache_path(&self) -> PathBuf {
        self.cache_dir.join("enrichment_cache.json")
    }

    pub fn geocode_cache_path(&self) -> PathBuf {
        self.cache_dir.join("geocode_cache.json")
    }

    pub fn scraped_urls_path(&self, source: &str) -> PathBuf {
        self.cache_dir.join(format!("scraped_urls_{source}.json"))
    }

    pub fn poll_state_path(&self) -> PathBuf {
        self.cache_dir.join("poll_state.json")
    }

    pub fn push_queue_path(&self) -> PathBuf {
        self.cache_dir.join("push_queue.json")
    }

    pub fn token_usage_log_path(&self) -> PathBuf {
        self.cache_dir.join("token_usage.jsonl")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.data_dir.join("manifest.json")
    }

    pub fn live_lock_path(&self) -> PathBuf {
        self.cache_dir.join("live.lock")
    }
}

fn find_config_file() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("BLAULICHT_CONFIG") {
        let path = PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
    }
    let candidate = Path::new("./blaulicht-pipeline.json");
    if candidate.exists() {
        return Some(candidate.to_path_buf());
    }
    // Stable default path when neither the env var nor a local file is set.
    if let Some(config_dir) = dirs::config_dir() {
        let candidate = config_dir.join("blaulicht-pipeline").join("config.json");
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}

fn resolve_string(json_val: Option<String>, env_key: &str, default: String) -> String {
    json_val
        .or_else(|| std::env::var(env_key).ok())
        .unwrap_or(default)
}

fn resolve_path(json_val: Option<String>, env_key: &str, default: PathBuf) -> PathBuf {
    json_val
        .map(PathBuf::from)
        .or_else(|| std::env::var(env_key).ok().map(PathBuf::from))
        .unwrap_or(default)
}

fn resolve_num<T: std::str::FromStr + Copy>(json_val: Option<T>, env_key: &str, default: T) -> T {
    json_val
        .or_else(|| std::env::var(env_key).ok().and_then(|v| v.parse().ok()))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedicated_states_are_exactly_five() {
        assert_eq!(DEDICATED_SCRAPER_STATES.len(), 5);
        assert!(!DEDICATED_SCRAPER_STATES.contains(&"hamburg"));
    }

    #[test]
    fn presseportal_states_cover_the_remaining_eleven() {
        assert_eq!(presseportal_states().len(), 11);
        assert!(presseportal_states().contains(&"hamburg"));
    }

    #[test]
    fn defaults_are_usable_with_no_env_or_file() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.llm_batch_size, 8);
        assert_eq!(cfg.live_max_articles_per_source, 50);
    }
}
