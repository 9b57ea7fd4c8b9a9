//! Phased worker-pool scheduler. Ported from
//! `parallel_orchestrator.py::run_parallel_pipeline`: scrape every pending
//! chunk under one concurrency cap, then filter, then enrich under a
//! second (lower) cap, each phase draining all chunks before the next
//! starts — trading chunk-level pipelining for much higher throughput per
//! phase than the sequential scheduler.

use super::{scrape_state, window_for_chunk, PipelineContext};
use crate::core::config::BUNDESLAENDER;
use crate::core::error::Result;
use crate::core::ShutdownToken;
use crate::filter::{embed_group_hints, filter_articles};
use crate::manifest::Manifest;
use crate::scrape::{Article, ScrapeWindow};
use crate::transform::{dedupe_by_id, transform_article};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use tracing::info;

/// Matches `parallel_orchestrator.py::MAX_PARALLEL_SCRAPERS`.
const MAX_PARALLEL_SCRAPERS: usize = 8;
/// Matches `parallel_orchestrator.py::MAX_PARALLEL_ENRICHERS`. Kept lower
/// than the scraper cap because each enrichment batch already holds its
/// own internal concurrency (`llm_concurrency`), and the external LLM
/// endpoint is the real bottleneck.
const MAX_PARALLEL_ENRICHERS: usize = 4;

/// Runs every pending chunk in the manifest through three phased pools.
/// Unlike [`super::sequential::run_sequential`], this drains the *entire*
/// pending set in each phase before advancing, so a slow single chunk
/// never stalls the others behind it.
pub async fn run_parallel(ctx: &PipelineContext, shutdown: &ShutdownToken) -> Result<()> {
    let manifest_path = ctx.manifest_path();
    let mut manifest = Manifest::load_or_create(&manifest_path, "2023-01-01", "2026-01-01")?;
    manifest.reset_in_progress();
    manifest.save(&manifest_path)?;

    let pending: Vec<String> = manifest
        .chunks
        .iter()
        .filter(|(_, c)| c.status == crate::manifest::ChunkStatus::Pending)
        .map(|(id, _)| id.clone())
        .collect();
    let windows: HashMap<String, ScrapeWindow> = pending
        .iter()
        .filter_map(|id| window_for_chunk(&manifest, id).map(|w| (id.clone(), w)))
        .collect();

    for chunk_id in &pending {
        manifest.mark_in_progress(chunk_id);
    }
    manifest.save(&manifest_path)?;

    info!(chunks = pending.len(), "scrape phase starting");
    let scraped: HashMap<String, Vec<Article>> = stream::iter(pending.iter().cloned())
        .map(|chunk_id| {
            let ctx = ctx;
            let window = windows.get(&chunk_id).copied();
            async move {
                let mut articles = Vec::new();
                if let Some(window) = window {
                    for state in BUNDESLAENDER {
                        if shutdown.is_requested() {
                            break;
                        }
                        let (found, _meta) =
                            scrape_state(state, &ctx.config, ctx.fetcher.clone(), window, shutdown).await;
                        articles.extend(found);
                    }
                }
                (chunk_id, articles)
            }
        })
        .buffer_unordered(MAX_PARALLEL_SCRAPERS)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect();

    info!("filter phase starting");
    let mut filtered: HashMap<String, Vec<Article>> = HashMap::new();
    let mut scraped_counts: HashMap<String, usize> = HashMap::new();
    for (chunk_id, articles) in scraped {
        scraped_counts.insert(chunk_id.clone(), articles.len());
        let result = filter_articles(articles);
        filtered.insert(chunk_id, embed_group_hints(result.kept));
    }

    info!(chunks = filtered.len(), "enrich phase starting");
    let enriched: Vec<(String, usize, usize, usize)> = stream::iter(filtered.into_iter())
        .map(|(chunk_id, articles)| {
            let ctx = ctx;
            async move {
                let outcome = ctx.enrich_engine.enrich_all(articles, shutdown).await;
                let records: Vec<_> = outcome
                    .enriched
                    .iter()
                    .filter_map(|a| transform_article(a, &ctx.config.pipeline_run))
                    .collect();
                let records = dedupe_by_id(records);
                let enriched_count = records.len();
                let push_outcome = ctx.sink.push_all(records, &ctx.push_queue).await;
                let (pushed, queued) = match push_outcome {
                    Ok(o) => (o.pushed, o.queued),
                    Err(_) => (0, 0),
                };
                (chunk_id, enriched_count, pushed, queued)
            }
        })
        .buffer_unordered(MAX_PARALLEL_ENRICHERS)
        .collect()
        .await;

    for (chunk_id, enriched_count, pushed, _queued) in enriched {
        let scraped_count = scraped_counts.get(&chunk_id).copied().unwrap_or(0);
        manifest.mark_completed(&chunk_id, scraped_count, enriched_count);
        info!(chunk_id, scraped = scraped_count, enriched = enriched_count, pushed, "chunk completed");
    }
    manifest.save(&manifest_path)?;

    info!("{}", manifest.progress_summary());
    Ok(())
}
