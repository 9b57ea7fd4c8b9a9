//! Async batched LLM enrichment engine (C3) — the heart of the pipeline.
//! Ported from `async_enricher.py::AsyncFastEnricher`: semaphore-bounded
//! concurrent batches, a two-level cache (sentinel vs. full extraction),
//! exponential backoff with jitter on rate limits/timeouts up to
//! `max_retries` attempts (matching `_call_llm`'s
//! `for attempt in range(ASYNC_MAX_RETRIES)`), and periodic progress
//! reporting.

use crate::core::error::{PipelineError, Result};
use crate::core::ShutdownToken;
use crate::enrich::cache::{cache_key, EnrichmentCache};
use crate::enrich::prompt::{build_batch_prompt, extract_json_array};
use crate::enrich::types::{CachedEnrichment, Enrichment, RawLlmResult};
use crate::enrich::usage_log::{UsageEntry, UsageLog};
use crate::geocode::client::{GeocodeRequest, Geocoder};
use crate::scrape::Article;
use backoff::ExponentialBackoffBuilder;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Tracks enrichment progress and throughput, mirroring `Stats` in the
/// original async enricher.
#[derive(Debug, Default)]
pub struct Stats {
    pub total: AtomicU64,
    pub cached: AtomicU64,
    pub cached_removed: AtomicU64,
    pub processed: AtomicU64,
    pub enriched: AtomicU64,
    pub removed: AtomicU64,
    pub errors: AtomicU64,
    pub retries: AtomicU64,
    pub llm_calls: AtomicU64,
    pub prompt_tokens: AtomicU64,
    pub completion_tokens: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub struct StatsSnapshot {
    pub total: u64,
    pub cached: u64,
    pub cached_removed: u64,
    pub processed: u64,
    pub enriched: u64,
    pub removed: u64,
    pub errors: u64,
    pub retries: u64,
    pub llm_calls: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl Stats {
    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total: self.total.load(Ordering::Relaxed),
            cached: self.cached.load(Ordering::Relaxed),
            cached_removed: self.cached_removed.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            enriched: self.enriched.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            llm_calls: self.llm_calls.load(Ordering::Relaxed),
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    pub fn articles_per_min(&self, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs < 1.0 {
            0.0
        } else {
            (self.processed as f64 * 60.0) / secs
        }
    }

    pub fn eta_minutes(&self, elapsed: Duration) -> f64 {
        let remaining = self.total.saturating_sub(self.cached + self.cached_removed + self.processed) as f64;
        let rate = self.articles_per_min(elapsed);
        if rate < 1.0 {
            f64::INFINITY
        } else {
            remaining / rate
        }
    }

    /// Rough average cost estimate; exact pricing depends on the provider.
    pub fn estimated_cost_usd(&self) -> f64 {
        (self.prompt_tokens as f64 * 0.27 + self.completion_tokens as f64 * 1.10) / 1_000_000.0
    }

    pub fn progress_line(&self, elapsed: Duration) -> String {
        let remaining = self.total.saturating_sub(self.cached + self.cached_removed + self.processed);
        let eta = self.eta_minutes(elapsed);
        let eta_str = if eta < 1000.0 { format!("{eta:.1}min") } else { "?".to_string() };
        format!(
            "[{}/{} uncached] {:.0} art/min | ETA {} | ${:.3} | {} retries, {} errors",
            self.processed,
            remaining + self.processed,
            self.articles_per_min(elapsed),
            eta_str,
            self.estimated_cost_usd(),
            self.retries,
            self.errors
        )
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageOut,
}

#[derive(Debug, Deserialize)]
struct ChatMessageOut {
    content: String,
}

#[derive(Debug, Deserialize, Clone, Copy)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

/// Result of enriching one batch: per-article grouped raw results, to be
/// resolved into enrichments and sentinels by the caller under the cache
/// lock (mirrors the original's `_process_single_batch`).
type BatchOutcome = HashMap<usize, Vec<RawLlmResult>>;

pub struct EnrichEngineConfig {
    pub llm_base_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub batch_size: usize,
    pub concurrency: usize,
    pub max_output_tokens: u32,
    pub max_retries: u32,
    pub cache_save_interval: usize,
}

pub struct EnrichEngine {
    http: reqwest::Client,
    config: EnrichEngineConfig,
    semaphore: Arc<Semaphore>,
    cache: Arc<EnrichmentCache>,
    usage_log: UsageLog,
    geocoder: Arc<dyn Geocoder>,
    stats: Stats,
}

pub struct EnrichOutcome {
    pub enriched: Vec<Article>,
    pub removed: Vec<(Article, String)>,
    pub stats: StatsSnapshot,
}

impl EnrichEngine {
    pub fn new(
        config: EnrichEngineConfig,
        cache: Arc<EnrichmentCache>,
        usage_log: UsageLog,
        geocoder: Arc<dyn Geocoder>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| PipelineError::PermanentRemote(e.to_string()))?;
        let semaphore = Arc::new(Semaphore::new(config.concurrency));
        Ok(EnrichEngine { http, config, semaphore, cache, usage_log, geocoder, stats: Stats::default() })
    }

    /// Enriches every article, resolving cache hits in-process and
    /// dispatching uncached batches concurrently under the semaphore.
    /// Honors `shutdown`: no new batches start once requested; in-flight
    /// batches run to completion.
    pub async fn enrich_all(&self, articles: Vec<Article>, shutdown: &ShutdownToken) -> EnrichOutcome {
        self.stats.total.store(articles.len() as u64, Ordering::Relaxed);

        let mut enriched: Vec<Article> = Vec::new();
        let mut removed: Vec<(Article, String)> = Vec::new();
        let mut uncached: Vec<Article> = Vec::new();

        for article in articles {
            let key = cache_key(&article.url, &article.body);
            match self.cache.get(&key) {
                Some(CachedEnrichment::Sentinel { classification, reason }) => {
                    removed.push((article, format!("llm:{classification}:{reason}")));
                    self.stats.cached_removed.fetch_add(1, Ordering::Relaxed);
                }
                Some(CachedEnrichment::Incidents(incidents)) => {
                    for incident in incidents {
                        if let Some(art) = materialize(&article, &incident) {
                            enriched.push(art);
                        }
                    }
                    self.stats.cached.fetch_add(1, Ordering::Relaxed);
                }
                None => uncached.push(article),
            }
        }

        info!(
            cached = self.stats.cached.load(Ordering::Relaxed),
            cached_removed = self.stats.cached_removed.load(Ordering::Relaxed),
            uncached = uncached.len(),
            "enrichment cache resolved"
        );

        if uncached.is_empty() {
            return EnrichOutcome { enriched, removed, stats: self.stats.snapshot() };
        }

        let batches: Vec<Vec<Article>> =
            uncached.chunks(self.config.batch_size).map(|c| c.to_vec()).collect();

        let start = Instant::now();
        let mut last_report = Instant::now();
        let mut tasks = FuturesUnordered::new();

        for batch in batches {
            if shutdown.is_requested() {
                break;
            }
            tasks.push(self.process_batch(batch));
        }

        let mut save_counter = 0usize;
        while let Some(outcome) = tasks.next().await {
            let (batch_enriched, batch_removed, batch_len) = outcome;
            enriched.extend(batch_enriched);
            removed.extend(batch_removed);
            save_counter += batch_len;

            if save_counter >= self.config.cache_save_interval {
                save_counter = 0;
                self.cache.flush();
            }

            if last_report.elapsed() >= Duration::from_secs(5) {
                info!("{}", self.stats.snapshot().progress_line(start.elapsed()));
                last_report = Instant::now();
            }
        }

        self.cache.flush();
        info!("{}", self.stats.snapshot().progress_line(start.elapsed()));

        EnrichOutcome { enriched, removed, stats: self.stats.snapshot() }
    }

    async fn process_batch(&self, batch: Vec<Article>) -> (Vec<Article>, Vec<(Article, String)>, usize) {
        let batch_len = batch.len();
        let llm_results = self.call_llm_batch(&batch).await;
        let grouped = group_by_article_index(llm_results, batch.len());

        let mut enriched = Vec::new();
        let mut removed = Vec::new();

        for (idx, article) in batch.into_iter().enumerate() {
            let key = cache_key(&article.url, &article.body);
            let Some(results) = grouped.get(&idx) else {
                continue;
            };
            if results.is_empty() {
                continue;
            }

            let first = &results[0];
            let is_removable = matches!(first.classification.as_str(), "junk" | "feuerwehr")
                || (first.classification == "update" && first.location.is_none() && first.crime.is_none());

            if is_removable {
                let reason = first.reason.clone().unwrap_or_default();
                self.cache.insert_sentinel(key, first.classification.clone(), reason.clone());
                removed.push((article, format!("llm:{}:{reason}", first.classification)));
                self.stats.removed.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            let mut incidents = Vec::new();
            for raw in results {
                match self.to_incident_with_geocode(raw).await {
                    Ok(incident) => incidents.push(incident),
                    Err(e) => warn!(url = %article.url, error = %e, "geocoding failed for incident"),
                }
            }
            if incidents.is_empty() {
                continue;
            }

            self.cache.insert_incidents(key, incidents.clone());
            for incident in &incidents {
                if let Some(art) = materialize(&article, incident) {
                    enriched.push(art);
                }
            }
            self.stats.enriched.fetch_add(incidents.len() as u64, Ordering::Relaxed);
        }

        self.stats.processed.fetch_add(batch_len as u64, Ordering::Relaxed);
        (enriched, removed, batch_len)
    }

    async fn to_incident_with_geocode(&self, raw: &RawLlmResult) -> Result<Enrichment> {
        let location = raw.location.clone().unwrap_or_default();
        let incident_time = raw.incident_time.clone().unwrap_or(crate::enrich::types::IncidentTime {
            date: None,
            time: None,
            precision: crate::enrich::types::TimePrecision::Unknown,
        });
        let crime = raw.crime.clone().unwrap_or(crate::enrich::types::CrimeClassification {
            pks_code: None,
            pks_category: None,
            sub_type: None,
            confidence: 0.0,
        });
        let details = raw.details.clone().unwrap_or_default();

        let geo = self
            .geocoder
            .geocode(GeocodeRequest {
                street: location.street.clone(),
                house_number: location.house_number.clone(),
                district: location.district.clone(),
                city: location.city.clone(),
                state: String::new(),
                location_hint: location.location_hint.clone(),
                cross_street: location.cross_street.clone(),
            })
            .await?;

        let mut located = location;
        located.lat = geo.lat;
        located.lon = geo.lon;
        located.precision = geo.precision.as_str().to_string();

        Ok(Enrichment::Incident {
            clean_title: raw.clean_title.clone(),
            location: located,
            incident_time,
            crime,
            details,
            is_update: raw.is_update,
            update_type: raw.update_type.clone(),
        })
    }

    async fn call_llm_batch(&self, batch: &[Article]) -> Vec<RawLlmResult> {
        let _permit = match self.semaphore.clone().acquire_owned().await {
            Ok(p) => p,
            Err(_) => return Vec::new(),
        };

        let prompt = build_batch_prompt(batch);
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(500))
            .with_max_interval(Duration::from_secs(60))
            .with_max_elapsed_time(Some(Duration::from_secs(300)))
            .build();

        let retries = &self.stats.retries;
        let start = Instant::now();
        let max_retries = self.config.max_retries;
        let attempt = std::sync::atomic::AtomicU32::new(0);

        let result = backoff::future::retry(backoff, || {
            let prompt = prompt.clone();
            let this_attempt = attempt.fetch_add(1, Ordering::Relaxed);
            async move {
                let request = ChatRequest {
                    model: &self.config.llm_model,
                    messages: vec![ChatMessage { role: "user", content: &prompt }],
                    temperature: 0.1,
                    max_tokens: self.config.max_output_tokens,
                };

                let response = self
                    .http
                    .post(format!("{}/chat/completions", self.config.llm_base_url))
                    .bearer_auth(&self.config.llm_api_key)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| {
                        if (e.is_timeout() || e.is_connect()) && this_attempt < max_retries {
                            retries.fetch_add(1, Ordering::Relaxed);
                            backoff::Error::transient(PipelineError::Transient(e.to_string()))
                        } else {
                            backoff::Error::permanent(PipelineError::PermanentRemote(e.to_string()))
                        }
                    })?;

                let status = response.status();
                if (status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error())
                    && this_attempt < max_retries
                {
                    retries.fetch_add(1, Ordering::Relaxed);
                    return Err(backoff::Error::transient(PipelineError::Transient(format!(
                        "llm endpoint returned {status}"
                    ))));
                }
                if !status.is_success() {
                    return Err(backoff::Error::permanent(PipelineError::PermanentRemote(format!(
                        "llm endpoint returned {status}"
                    ))));
                }

                let latency_ms = start.elapsed().as_millis() as u64;
                let body: ChatResponse = response
                    .json()
                    .await
                    .map_err(|e| backoff::Error::permanent(PipelineError::Parse(e.to_string())))?;
                Ok((body, latency_ms))
            }
        })
        .await;

        let (body, latency_ms) = match result {
            Ok(v) => v,
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "llm batch failed after retries");
                return Vec::new();
            }
        };

        self.stats.llm_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(usage) = body.usage {
            self.stats.prompt_tokens.fetch_add(usage.prompt_tokens, Ordering::Relaxed);
            self.stats.completion_tokens.fetch_add(usage.completion_tokens, Ordering::Relaxed);
            self.usage_log.append(&UsageEntry {
                timestamp: chrono::Utc::now().timestamp(),
                model: self.config.llm_model.clone(),
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
                batch_size: batch.len(),
                latency_ms,
            });
        }

        let Some(choice) = body.choices.into_iter().next() else {
            return Vec::new();
        };
        let Some(array_text) = extract_json_array(&choice.message.content) else {
            return Vec::new();
        };
        serde_json::from_str(&array_text).unwrap_or_default()
    }
}

fn group_by_article_index(results: Vec<RawLlmResult>, batch_len: usize) -> BatchOutcome {
    let mut grouped: BatchOutcome = HashMap::new();
    for result in results {
        if result.article_index >= 0 && (result.article_index as usize) < batch_len {
            grouped.entry(result.article_index as usize).or_default().push(result);
        }
    }
    grouped
}

/// Merges one enrichment's LLM-derived fields into the source article's
/// hints so downstream transform can read them without a second type.
fn materialize(article: &Article, incident: &Enrichment) -> Option<Article> {
    let Enrichment::Incident { .. } = incident else { return None };
    let mut art = article.clone();
    let mut hints = art.hints.clone();
    hints.insert("enrichment".to_string(), serde_json::to_value(incident).ok()?);
    art.hints = hints;
    Some(art)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_snapshot_computes_eta_as_infinite_with_no_throughput() {
        let stats = Stats::default();
        stats.total.store(100, Ordering::Relaxed);
        let snap = stats.snapshot();
        assert!(snap.eta_minutes(Duration::from_secs(1)).is_infinite());
    }

    #[test]
    fn group_by_article_index_drops_out_of_range_indices() {
        let results = vec![
            RawLlmResult {
                article_index: 0,
                classification: "junk".to_string(),
                reason: Some("x".to_string()),
                update_type: None,
                is_update: false,
                clean_title: None,
                location: None,
                incident_time: None,
                crime: None,
                details: None,
            },
            RawLlmResult {
                article_index: 99,
                classification: "junk".to_string(),
                reason: None,
                update_type: None,
                is_update: false,
                clean_title: None,
                location: None,
                incident_time: None,
                crime: None,
                details: None,
            },
        ];
        let grouped = group_by_article_index(results, 2);
        assert_eq!(grouped.len(), 1);
        assert!(grouped.contains_key(&0));
    }
}
