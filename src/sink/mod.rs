//! Persisting `Record`s to the external store (C6): batched upsert over
//! HTTP, with a durable on-disk queue for batches the store rejected or
//! that failed outright. Grounded in `push_to_supabase.py`'s batch upsert
//! and `live_pipeline.py`'s `_save_push_queue`/`_drain_push_queue`.

pub mod push_queue;

pub use push_queue::PushQueue;

use crate::core::error::{classify_http_status, PipelineError, Result};
use crate::transform::Record;
use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use std::time::Duration;
use tracing::{info, warn};

/// A REST-ish upsert endpoint speaking the Supabase/PostgREST convention:
/// `POST {store_url}/{table}` with `Prefer: resolution=merge-duplicates`
/// upserts by primary key, matching `push_to_supabase.py`'s
/// `supabase.table("crime_records").upsert(batch).execute()`.
pub struct Sink {
    http: reqwest::Client,
    store_url: String,
    store_api_key: Option<String>,
    table: String,
    batch_size: usize,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SinkOutcome {
    pub pushed: usize,
    pub queued: usize,
}

impl Sink {
    pub fn new(store_url: String, store_api_key: Option<String>) -> Self {
        Sink {
            http: reqwest::Client::new(),
            store_url,
            store_api_key,
            table: "crime_records".to_string(),
            batch_size: 500,
        }
    }

    /// Pushes every record in `batch_size`-sized chunks. A chunk that fails
    /// after retries is appended to `queue` rather than aborting the whole
    /// push, mirroring the original's "queue on failure, drain next cycle"
    /// policy so one bad batch never blocks the rest.
    pub async fn push_all(&self, records: Vec<Record>, queue: &PushQueue) -> Result<SinkOutcome> {
        let mut outcome = SinkOutcome::default();
        for chunk in records.chunks(self.batch_size) {
            match self.push_batch(chunk).await {
                Ok(()) => outcome.pushed += chunk.len(),
                Err(e) => {
                    warn!(error = %e, size = chunk.len(), "batch push failed, queuing for retry");
                    queue.enqueue(chunk.to_vec())?;
                    outcome.queued += chunk.len();
                }
            }
        }
        Ok(outcome)
    }

    /// Drains everything already sitting in `queue` before pushing new
    /// records, so a prior cycle's failed batches never get starved by a
    /// steady stream of fresh work (`live_pipeline.py::_drain_push_queue`
    /// runs first, unconditionally, at the top of every cycle).
    pub async fn drain_queue(&self, queue: &PushQueue) -> Result<SinkOutcome> {
        let pending = queue.take_all()?;
        if pending.is_empty() {
            return Ok(SinkOutcome::default());
        }
        info!(batches = pending.len(), "draining queued push batches");
        let mut outcome = SinkOutcome::default();
        for batch in pending {
            match self.push_batch(&batch).await {
                Ok(()) => outcome.pushed += batch.len(),
                Err(e) => {
                    warn!(error = %e, size = batch.len(), "re-queued batch failed again");
                    let size = batch.len();
                    queue.enqueue(batch)?;
                    outcome.queued += size;
                }
            }
        }
        Ok(outcome)
    }

    async fn push_batch(&self, batch: &[Record]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(500))
            .with_max_interval(Duration::from_secs(30))
            .with_max_elapsed_time(Some(Duration::from_secs(120)))
            .build();

        retry(backoff, || async {
            let url = format!("{}/{}", self.store_url.trim_end_matches('/'), self.table);
            let mut req = self
                .http
                .post(&url)
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(batch);
            if let Some(key) = &self.store_api_key {
                req = req.bearer_auth(key).header("apikey", key);
            }
            let response = req.send().await.map_err(|e| backoff::Error::transient(PipelineError::Transient(e.to_string())))?;
            if response.status().is_success() {
                return Ok(());
            }
            let status = response.status();
            let err = classify_http_status(status);
            if err.is_transient() {
                Err(backoff::Error::transient(err))
            } else {
                Err(backoff::Error::permanent(err))
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_uses_crime_records_table_by_default() {
        let sink = Sink::new("https://example.supabase.co".to_string(), None);
        assert_eq!(sink.table, "crime_records");
        assert_eq!(sink.batch_size, 500);
    }
}
