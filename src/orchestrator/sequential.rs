//! One-chunk-at-a-time scheduler. Ported from `orchestrator.py::run_pipeline`:
//! process the next pending chunk, retry transient failures against a fixed
//! backoff ladder, then pace to the next chunk.

use super::{run_chunk, window_for_chunk, PipelineContext};
use crate::core::error::Result;
use crate::core::ShutdownToken;
use crate::manifest::Manifest;
use std::time::Duration;
use tracing::{error, info, warn};

/// Matches `orchestrator.py::MAX_RETRIES` / `RETRY_DELAYS_SECONDS`: three
/// attempts, waiting 60s, then 300s, then 900s between them.
const MAX_RETRIES: u32 = 3;
const RETRY_DELAYS_SECONDS: [u64; 3] = [60, 300, 900];

/// Pacing delay between successfully completed chunks, to avoid hammering
/// the 16 state portals back-to-back.
const DELAY_BETWEEN_CHUNKS_SECONDS: u64 = 5;

/// Runs the full manifest to completion, one chunk at a time. Any chunk
/// left `in_progress` from a prior crashed run is reset to `pending` first.
pub async fn run_sequential(ctx: &PipelineContext, shutdown: &ShutdownToken) -> Result<()> {
    let manifest_path = ctx.manifest_path();
    let mut manifest = Manifest::load_or_create(&manifest_path, "2023-01-01", "2026-01-01")?;
    let reset = manifest.reset_in_progress();
    if reset > 0 {
        info!(reset, "reset in-progress chunks left over from a prior run");
        manifest.save(&manifest_path)?;
    }

    loop {
        if shutdown.is_requested() {
            info!("shutdown requested, stopping before next chunk");
            break;
        }
        let Some(chunk_id) = manifest.next_pending().map(str::to_string) else {
            info!("{}", manifest.progress_summary());
            break;
        };

        process_chunk_with_retries(ctx, &mut manifest, &manifest_path, &chunk_id, shutdown).await?;
        tokio::time::sleep(Duration::from_secs(DELAY_BETWEEN_CHUNKS_SECONDS)).await;
    }

    Ok(())
}

/// Retries one chunk against the fixed backoff ladder, persisting manifest
/// state at every transition so a crash mid-retry resumes cleanly.
async fn process_chunk_with_retries(
    ctx: &PipelineContext,
    manifest: &mut Manifest,
    manifest_path: &std::path::Path,
    chunk_id: &str,
    shutdown: &ShutdownToken,
) -> Result<()> {
    let Some(window) = window_for_chunk(manifest, chunk_id) else {
        warn!(chunk_id, "chunk has no parseable window, skipping");
        return Ok(());
    };

    for attempt in 0..MAX_RETRIES {
        manifest.mark_in_progress(chunk_id);
        manifest.save(manifest_path)?;

        match run_chunk(ctx, window, shutdown).await {
            Ok(outcome) => {
                manifest.mark_completed(chunk_id, outcome.scraped, outcome.enriched);
                manifest.save(manifest_path)?;
                info!(chunk_id, scraped = outcome.scraped, enriched = outcome.enriched, pushed = outcome.pushed, "chunk completed");
                return Ok(());
            }
            Err(e) => {
                error!(chunk_id, attempt, error = %e, "chunk attempt failed");
                manifest.mark_failed(chunk_id, &e.to_string());
                manifest.save(manifest_path)?;

                if shutdown.is_requested() || attempt + 1 == MAX_RETRIES {
                    break;
                }
                let delay = RETRY_DELAYS_SECONDS[attempt as usize];
                info!(chunk_id, delay, "backing off before retrying chunk");
                tokio::time::sleep(Duration::from_secs(delay)).await;
            }
        }
    }

    Ok(())
}

/// Resets every `failed` chunk back to `pending` so the next `run_sequential`
/// call retries them, matching `orchestrator.py::retry_failed_chunks`.
pub fn retry_failed_chunks(manifest: &mut Manifest, manifest_path: &std::path::Path) -> Result<usize> {
    let count = manifest.reset_failed();
    manifest.save(manifest_path)?;
    Ok(count)
}
