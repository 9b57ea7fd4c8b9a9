//! Live polling loop (C9): repeatedly scrapes a short recent window from
//! every source, enriches and pushes whatever is new, and backs off
//! sources that keep failing. Ported from `live_pipeline.py::LivePipeline`.

pub mod lock;
pub mod poll_state;

pub use lock::LiveLock;
pub use poll_state::PollState;

use crate::core::config::BUNDESLAENDER;
use crate::core::error::Result;
use crate::core::ShutdownToken;
use crate::filter::{embed_group_hints, filter_articles};
use crate::orchestrator::{scrape_state, PipelineContext};
use crate::scrape::ScrapeWindow;
use crate::transform::{dedupe_by_id, transform_article};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CycleMetrics {
    pub started_at: String,
    pub duration_seconds: f64,
    pub sources_polled: usize,
    pub sources_backed_off: usize,
    pub total_scraped: usize,
    pub total_enriched: usize,
    pub total_pushed: usize,
    pub total_errors: usize,
}

/// Runs one poll cycle over every source, sequentially ("to be polite to
/// the portals" per the original's comment — all 16 are cheap enough to
/// poll one after another within the interval budget). `source` restricts
/// the cycle to a single Bundesland (`live --source`); `dry_run` scrapes
/// and enriches normally but never calls through to the sink.
pub async fn run_cycle(
    ctx: &PipelineContext,
    poll_state: &Arc<PollState>,
    source: Option<&str>,
    dry_run: bool,
    shutdown: &ShutdownToken,
) -> Result<CycleMetrics> {
    let started = std::time::Instant::now();
    let started_at = chrono::Utc::now().to_rfc3339();

    let drain = ctx.sink.drain_queue(&ctx.push_queue).await.unwrap_or_default();
    if drain.pushed > 0 || drain.queued > 0 {
        info!(pushed = drain.pushed, queued = drain.queued, "drained queued push batches");
    }

    let today = chrono::Utc::now().date_naive();
    let yesterday = today.pred_opt().unwrap_or(today);
    let window = ScrapeWindow { start: yesterday, end: today };

    let mut metrics = CycleMetrics { started_at, ..Default::default() };

    for state in BUNDESLAENDER {
        if shutdown.is_requested() {
            break;
        }
        if let Some(only) = source {
            if *state != only {
                continue;
            }
        }
        if poll_state.should_backoff(state, 3) {
            metrics.sources_backed_off += 1;
            info!(
                state,
                backoff_multiplier = poll_state.backoff_multiplier(state),
                "skipping source, still backed off"
            );
            continue;
        }

        match process_source(ctx, state, window, ctx.config.live_max_articles_per_source, dry_run, shutdown).await {
            Ok(outcome) => {
                poll_state.record_success(state, outcome.scraped);
                metrics.sources_polled += 1;
                metrics.total_scraped += outcome.scraped;
                metrics.total_enriched += outcome.enriched;
                metrics.total_pushed += outcome.pushed;
            }
            Err(e) => {
                warn!(state, error = %e, "live poll of source failed");
                poll_state.record_failure(state, &e.to_string());
                metrics.total_errors += 1;
            }
        }
    }

    metrics.duration_seconds = started.elapsed().as_secs_f64();
    Ok(metrics)
}

struct SourceOutcome {
    scraped: usize,
    enriched: usize,
    pushed: usize,
}

async fn process_source(
    ctx: &PipelineContext,
    state: &str,
    window: ScrapeWindow,
    max_articles: usize,
    dry_run: bool,
    shutdown: &ShutdownToken,
) -> Result<SourceOutcome> {
    let (mut articles, _meta) = scrape_state(state, &ctx.config, ctx.fetcher.clone(), window, shutdown).await;
    articles.truncate(max_articles);
    let scraped = articles.len();
    if articles.is_empty() {
        return Ok(SourceOutcome { scraped: 0, enriched: 0, pushed: 0 });
    }

    let filter_result = filter_articles(articles);
    let articles = embed_group_hints(filter_result.kept);
    let outcome = ctx.enrich_engine.enrich_all(articles, shutdown).await;

    let records: Vec<_> = outcome
        .enriched
        .iter()
        .filter_map(|a| transform_article(a, &ctx.config.pipeline_run))
        .collect();
    let records = dedupe_by_id(records);
    let enriched = records.len();

    if dry_run {
        info!(state, enriched, "dry-run: skipping push");
        return Ok(SourceOutcome { scraped, enriched, pushed: 0 });
    }

    let push_outcome = ctx.sink.push_all(records, &ctx.push_queue).await?;
    Ok(SourceOutcome { scraped, enriched, pushed: push_outcome.pushed })
}

/// Runs exactly one poll cycle then returns, for `live --mode once`.
pub async fn run_once(
    ctx: &PipelineContext,
    source: Option<&str>,
    dry_run: bool,
    shutdown: &ShutdownToken,
) -> Result<CycleMetrics> {
    let poll_state = Arc::new(PollState::load(ctx.config.poll_state_path()));
    let metrics = run_cycle(ctx, &poll_state, source, dry_run, shutdown).await?;
    info!(?metrics, "live cycle complete");
    Ok(metrics)
}

/// Runs poll cycles forever, spaced `live_poll_interval_minutes` apart,
/// until shutdown is requested. A source's own backoff multiplier is only
/// logged when a cycle skips it (`run_cycle`) — it does not scale the
/// sleep between cycles. Holds the single-instance lock for its whole
/// lifetime.
pub async fn run_daemon(
    ctx: &PipelineContext,
    source: Option<&str>,
    dry_run: bool,
    shutdown: &ShutdownToken,
) -> Result<()> {
    let _lock = LiveLock::acquire(ctx.config.live_lock_path())
        .map_err(|e| crate::core::error::PipelineError::Concurrency(e.to_string()))?;
    let poll_state = Arc::new(PollState::load(ctx.config.poll_state_path()));

    loop {
        if shutdown.is_requested() {
            break;
        }
        let metrics = run_cycle(ctx, &poll_state, source, dry_run, shutdown).await?;
        info!(?metrics, "live cycle complete");

        let interval = std::time::Duration::from_secs(ctx.config.live_poll_interval_minutes * 60);
        tokio::select! {
            _ = tokio::time::sleep(interval) => {},
            _ = wait_for_shutdown(shutdown) => break,
        }
    }
    Ok(())
}

async fn wait_for_shutdown(shutdown: &ShutdownToken) {
    while !shutdown.is_requested() {
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    }
}

/// Human-readable status for `live --mode status`: whether the daemon
/// appears to be running (lock file present with a live PID) plus the
/// per-source poll summary.
pub fn status_report(ctx: &PipelineContext) -> String {
    let lock_path = ctx.config.live_lock_path();
    let running = lock::read_lock_pid(&lock_path)
        .map(|pid| format!("running (pid {pid})"))
        .unwrap_or_else(|| "not running".to_string());
    let poll_state = PollState::load(ctx.config.poll_state_path());
    format!("Live daemon: {running}\n\n{}", poll_state.summary())
}
