//! Runs the full scrape → filter → enrich → transform → push pipeline over
//! one chunk at a time, in either of two scheduling strategies (C8).
//! Ported from `orchestrator.py` (sequential, one chunk at a time with a
//! backoff-ladder retry) and `parallel_orchestrator.py` (phased worker
//! pools, each phase draining all chunks before the next starts).

pub mod parallel;
pub mod sequential;

pub use parallel::run_parallel;
pub use sequential::run_sequential;

use crate::core::config::{DEDICATED_SCRAPER_STATES, BUNDESLAENDER};
use crate::core::error::Result;
use crate::core::{PipelineConfig, ShutdownToken};
use crate::enrich::{EnrichEngine, EnrichEngineConfig, EnrichmentCache, UsageLog};
use crate::filter::{embed_group_hints, filter_articles};
use crate::geocode::client::{GeocodeClient, Geocoder};
use crate::geocode::GeocodeCache;
use crate::manifest::Manifest;
use crate::scrape::{
    bayern, berlin, brandenburg, presseportal, sachsen, sachsen_anhalt, Article, Fetcher,
    ListingParser, ArticleParser, ScrapeMeta, ScraperFramework, ScrapeWindow, UrlCache,
};
use crate::sink::{PushQueue, Sink};
use crate::transform::{dedupe_by_id, transform_article, Record};
use std::sync::Arc;
use tracing::info;

/// Every long-lived component an orchestrator run needs, built once from
/// config and shared across chunks.
pub struct PipelineContext {
    pub config: PipelineConfig,
    pub fetcher: Fetcher,
    pub enrich_engine: Arc<EnrichEngine>,
    pub enrichment_cache: Arc<EnrichmentCache>,
    pub geocode_cache: Arc<GeocodeCache>,
    pub sink: Sink,
    pub push_queue: PushQueue,
}

impl PipelineContext {
    pub fn build(config: PipelineConfig) -> Result<Self> {
        let fetcher = Fetcher::new(config.scraper_concurrency, config.max_retries)
            .map_err(|e| crate::core::error::PipelineError::PermanentRemote(e.to_string()))?;

        let geocode_cache = Arc::new(GeocodeCache::load(config.geocode_cache_path()));
        let geocoder: Arc<dyn Geocoder> = Arc::new(GeocodeClient::new(
            config.geocoder_base_url.clone(),
            config.geocoder_api_key.clone().unwrap_or_default(),
            geocode_cache.clone(),
        )?);

        let enrichment_cache = Arc::new(EnrichmentCache::load(config.enrichment_cache_path()));
        let usage_log = UsageLog::new(config.token_usage_log_path());
        let enrich_engine = Arc::new(EnrichEngine::new(
            EnrichEngineConfig {
                llm_base_url: config.llm_base_url.clone(),
                llm_api_key: config.llm_api_key.clone().unwrap_or_default(),
                llm_model: config.llm_model.clone(),
                batch_size: config.llm_batch_size,
                concurrency: config.llm_concurrency,
                max_output_tokens: 4096,
                max_retries: config.max_retries,
                cache_save_interval: 50,
            },
            enrichment_cache.clone(),
            usage_log,
            geocoder,
        )?);

        let sink = Sink::new(
            config.store_url.clone().unwrap_or_default(),
            config.store_api_key.clone(),
        );
        let push_queue = PushQueue::new(config.push_queue_path());

        Ok(PipelineContext { config, fetcher, enrich_engine, enrichment_cache, geocode_cache, sink, push_queue })
    }

    pub fn manifest_path(&self) -> std::path::PathBuf {
        self.config.manifest_path()
    }
}

/// Scrapes one Bundesland's sources for `window`, dispatching to the
/// dedicated-portal scraper if one exists and falling back to the
/// presseportal.de parser otherwise.
pub async fn scrape_state(
    state: &str,
    config: &PipelineConfig,
    fetcher: Fetcher,
    window: ScrapeWindow,
    shutdown: &ShutdownToken,
) -> (Vec<Article>, ScrapeMeta) {
    let url_cache = UrlCache::load(config.scraped_urls_path(state));

    if DEDICATED_SCRAPER_STATES.contains(&state) {
        match state {
            "berlin" => {
                run_framework(berlin::BerlinListingParser, berlin::BerlinArticleParser, state, fetcher, url_cache, window, shutdown).await
            }
            "brandenburg" => {
                run_framework(brandenburg::BrandenburgListingParser, brandenburg::BrandenburgArticleParser, state, fetcher, url_cache, window, shutdown).await
            }
            "bayern" => {
                run_framework(bayern::BayernListingParser, bayern::BayernArticleParser, state, fetcher, url_cache, window, shutdown).await
            }
            "sachsen-anhalt" => {
                run_framework(sachsen_anhalt::SachsenAnhaltListingParser, sachsen_anhalt::SachsenAnhaltArticleParser, state, fetcher, url_cache, window, shutdown).await
            }
            "sachsen" => {
                run_framework(sachsen::SachsenListingParser, sachsen::SachsenArticleParser, state, fetcher, url_cache, window, shutdown).await
            }
            other => {
                tracing::warn!(state = other, "unknown dedicated state, skipping");
                (Vec::new(), ScrapeMeta { source: other.to_string(), stop_reason: "unknown_state".to_string(), ..Default::default() })
            }
        }
    } else {
        run_framework(
            presseportal::PresseportalListingParser { state_slug: state.to_string() },
            presseportal::PresseportalArticleParser,
            state,
            fetcher,
            url_cache,
            window,
            shutdown,
        )
        .await
    }
}

async fn run_framework<L: ListingParser, A: ArticleParser>(
    listing: L,
    article: A,
    state: &str,
    fetcher: Fetcher,
    url_cache: UrlCache,
    window: ScrapeWindow,
    shutdown: &ShutdownToken,
) -> (Vec<Article>, ScrapeMeta) {
    let mut framework = ScraperFramework {
        source: state.to_string(),
        state: state.to_string(),
        listing,
        article,
        fetcher,
        url_cache,
        max_empty_pages: 3,
    };
    framework.run(window, shutdown).await
}

#[derive(Debug, Default)]
pub struct ChunkRunOutcome {
    pub scraped: usize,
    pub filtered_junk: usize,
    pub enriched: usize,
    pub pushed: usize,
    pub queued: usize,
}

/// Runs every stage over one chunk's window: scrape all 16 states, filter,
/// enrich, transform, and push. Shared by both schedulers; the sequential
/// one awaits this directly, the parallel one runs it per-chunk inside a
/// bounded worker pool.
pub async fn run_chunk(ctx: &PipelineContext, window: ScrapeWindow, shutdown: &ShutdownToken) -> Result<ChunkRunOutcome> {
    let mut all_articles = Vec::new();
    for state in BUNDESLAENDER {
        if shutdown.is_requested() {
            break;
        }
        let (articles, meta) = scrape_state(state, &ctx.config, ctx.fetcher.clone(), window, shutdown).await;
        info!(state, found = meta.articles_found, pages = meta.pages_fetched, stop = meta.stop_reason, "state scraped");
        all_articles.extend(articles);
    }
    let scraped = all_articles.len();

    let filter_result = filter_articles(all_articles);
    let filtered_junk = filter_result.removed.len();
    let articles = embed_group_hints(filter_result.kept);

    let outcome = ctx.enrich_engine.enrich_all(articles, shutdown).await;
    let enriched_count = outcome.enriched.len();

    let records: Vec<Record> = outcome
        .enriched
        .iter()
        .filter_map(|a| transform_article(a, &ctx.config.pipeline_run))
        .collect();
    let records = dedupe_by_id(records);

    let push_outcome = ctx.sink.push_all(records, &ctx.push_queue).await?;

    Ok(ChunkRunOutcome {
        scraped,
        filtered_junk,
        enriched: enriched_count,
        pushed: push_outcome.pushed,
        queued: push_outcome.queued,
    })
}

fn parse_window(start_date: &str, end_date: &str) -> ScrapeWindow {
    let start = chrono::NaiveDate::parse_from_str(start_date, "%Y-%m-%d")
        .unwrap_or_else(|_| chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    let end = chrono::NaiveDate::parse_from_str(end_date, "%Y-%m-%d")
        .unwrap_or_else(|_| chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    ScrapeWindow { start, end }
}

pub(crate) fn window_for_chunk(manifest: &Manifest, chunk_id: &str) -> Option<ScrapeWindow> {
    manifest.chunks.get(chunk_id).map(|c| parse_window(&c.start_date, &c.end_date))
}
