//! Append-only JSONL token-usage log, written fire-and-forget after every
//! successful LLM call. Never rewritten in place.

use crate::core::atomic_json;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize)]
pub struct UsageEntry {
    pub timestamp: i64,
    pub model: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub batch_size: usize,
    pub latency_ms: u64,
}

pub struct UsageLog {
    path: PathBuf,
}

impl UsageLog {
    pub fn new(path: PathBuf) -> Self {
        UsageLog { path }
    }

    /// Best-effort append; failures are logged but never propagated, since
    /// the usage log is diagnostic, not load-bearing.
    pub fn append(&self, entry: &UsageEntry) {
        atomic_json::append_jsonl(&self.path, entry);
    }
}
