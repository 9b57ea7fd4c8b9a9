//! LLM-driven classification and extraction (C3): takes grouped, junk-
//! filtered articles and produces either a removal reason or a full
//! structured incident per article, geocoding each incident's location
//! along the way. Grounded in `async_enricher.py`/`fast_enricher.py`.

pub mod cache;
pub mod engine;
pub mod prompt;
pub mod types;
pub mod usage_log;

pub use cache::{cache_key, EnrichmentCache};
pub use engine::{EnrichEngine, EnrichEngineConfig, EnrichOutcome, Stats, StatsSnapshot};
pub use prompt::{build_batch_prompt, extract_json_array};
pub use types::{
    CachedEnrichment, CrimeClassification, Enrichment, IncidentDetails, IncidentTime, Location,
    RawLlmResult, TimePrecision,
};
pub use usage_log::{UsageEntry, UsageLog};
