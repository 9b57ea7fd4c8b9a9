//! HTTP fetcher shared by every scraper: a global semaphore bounds
//! concurrent requests, and a retry ladder distinguishes transient
//! (429/5xx/timeout/connection) from permanent (other 4xx) failures,
//! mirroring the teacher's `backoff::future::retry` usage in
//! `tools/scrape.rs`. Retries are count-bounded at `max_retries` attempts
//! (matching `scrape_blaulicht_async.py`'s `for attempt in
//! range(MAX_RETRIES)`), with the backoff policy's own elapsed-time cap as
//! a secondary ceiling.

use crate::core::error::{classify_http_status, PipelineError};
use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    semaphore: Arc<Semaphore>,
    max_retries: u32,
    max_backoff: Duration,
    successes: Arc<std::sync::atomic::AtomicU64>,
    errors: Arc<std::sync::atomic::AtomicU64>,
    retries: Arc<std::sync::atomic::AtomicU64>,
}

impl Fetcher {
    pub fn new(concurrency: usize, max_retries: u32) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("blaulicht-pipeline/0.1")
            .build()?;
        Ok(Fetcher {
            client,
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            max_retries,
            max_backoff: Duration::from_secs(30),
            successes: Arc::new(std::sync::atomic::AtomicU64::new(0)),
            errors: Arc::new(std::sync::atomic::AtomicU64::new(0)),
            retries: Arc::new(std::sync::atomic::AtomicU64::new(0)),
        })
    }

    /// Fetches `url`'s body text. Returns `Ok(None)` for a 404 (no retry,
    /// not an error — the page simply doesn't exist). Retries 429/5xx/
    /// network errors with exponential backoff and jitter, up to
    /// `max_retries` attempts; any other 4xx is a permanent error, not
    /// retried.
    pub async fn fetch(&self, url: &str) -> crate::core::error::Result<Option<String>> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| PipelineError::Concurrency(e.to_string()))?;

        let client = self.client.clone();
        let url_owned = url.to_string();
        let retries_counter = self.retries.clone();
        let max_retries = self.max_retries;
        let attempt = Arc::new(std::sync::atomic::AtomicU32::new(0));

        let backoff_policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(500))
            .with_max_interval(self.max_backoff)
            .with_max_elapsed_time(Some(Duration::from_secs(120)))
            .build();

        let result = retry(backoff_policy, || {
            let client = client.clone();
            let url = url_owned.clone();
            let retries_counter = retries_counter.clone();
            let attempt = attempt.clone();
            async move {
                let this_attempt = attempt.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

                match client.get(&url).send().await {
                    Ok(resp) if resp.status() == reqwest::StatusCode::NOT_FOUND => Ok(None),
                    Ok(resp) if resp.status().is_success() => {
                        let text = resp.text().await.map_err(|e| {
                            backoff::Error::transient(PipelineError::Transient(e.to_string()))
                        })?;
                        Ok(Some(text))
                    }
                    Ok(resp) => {
                        let err = classify_http_status(resp.status());
                        if err.is_transient() && this_attempt < max_retries {
                            retries_counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                            Err(backoff::Error::transient(err))
                        } else {
                            Err(backoff::Error::permanent(err))
                        }
                    }
                    Err(e) if (e.is_timeout() || e.is_connect()) && this_attempt < max_retries => {
                        retries_counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        Err(backoff::Error::transient(PipelineError::Transient(e.to_string())))
                    }
                    Err(e) => Err(backoff::Error::permanent(PipelineError::PermanentRemote(
                        e.to_string(),
                    ))),
                }
            }
        })
        .await;

        match result {
            Ok(body) => {
                self.successes.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                Ok(body)
            }
            Err(e) => {
                self.errors.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                Err(e)
            }
        }
    }

    pub fn stats(&self) -> FetcherStats {
        FetcherStats {
            successes: self.successes.load(std::sync::atomic::Ordering::Relaxed),
            errors: self.errors.load(std::sync::atomic::Ordering::Relaxed),
            retries: self.retries.load(std::sync::atomic::Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FetcherStats {
    pub successes: u64,
    pub errors: u64,
    pub retries: u64,
}
