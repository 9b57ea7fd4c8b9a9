//! Chunk manifest (C7): tracks which year-month slice of history has been
//! scraped, filtered, enriched and pushed. Ported from `chunk_manager.py`,
//! replacing its dict-of-dicts with typed structs and an enum status.

pub mod chunk;

pub use chunk::{Chunk, ChunkStatus};

use crate::core::atomic_json;
use crate::core::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestStatistics {
    pub total_chunks: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub failed: usize,
    pub pending: usize,
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub start_date: String,
    pub end_date: String,
    pub created_at: String,
    /// Year-month (`"2024-03"`) -> chunk, kept ordered so iteration is
    /// deterministic across runs regardless of insertion order.
    pub chunks: BTreeMap<String, Chunk>,
    pub statistics: ManifestStatistics,
}

impl Manifest {
    /// Builds one chunk per calendar month in `[start_date, end_date)`,
    /// covering all Bundesländer, all starting `Pending`.
    pub fn create(start_date: &str, end_date: &str) -> Self {
        let start = chrono::NaiveDate::parse_from_str(start_date, "%Y-%m-%d")
            .unwrap_or_else(|_| chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let end = chrono::NaiveDate::parse_from_str(end_date, "%Y-%m-%d")
            .unwrap_or_else(|_| chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());

        let mut chunks = BTreeMap::new();
        let mut current = start;
        while current < end {
            let year_month = current.format("%Y-%m").to_string();
            let next_month = add_month(current);
            let chunk_end = if next_month > end { end } else { next_month };
            chunks.insert(
                year_month.clone(),
                Chunk {
                    year_month: year_month.clone(),
                    start_date: current.format("%Y-%m-%d").to_string(),
                    end_date: chunk_end.format("%Y-%m-%d").to_string(),
                    status: ChunkStatus::Pending,
                    bundeslaender_completed: Vec::new(),
                    articles_count: None,
                    enriched_count: None,
                    error: None,
                    started_at: None,
                    completed_at: None,
                    retries: 0,
                },
            );
            current = chunk_end;
        }

        let total = chunks.len();
        Manifest {
            start_date: start_date.to_string(),
            end_date: end_date.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            chunks,
            statistics: ManifestStatistics {
                total_chunks: total,
                completed: 0,
                in_progress: 0,
                failed: 0,
                pending: total,
                last_updated: None,
            },
        }
    }

    pub fn load(path: &Path) -> Option<Self> {
        let contents = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&contents).ok()
    }

    /// Loads the manifest at `path`, or creates and persists a fresh one
    /// covering `[start_date, end_date)` if none exists yet.
    pub fn load_or_create(path: &Path, start_date: &str, end_date: &str) -> Result<Self> {
        if let Some(existing) = Self::load(path) {
            return Ok(existing);
        }
        let manifest = Self::create(start_date, end_date);
        manifest.save(path)?;
        Ok(manifest)
    }

    /// Recomputes `statistics` from the current chunk statuses and saves
    /// atomically, matching `chunk_manager.py::save_manifest`'s behavior of
    /// deriving statistics as part of every save rather than trusting a
    /// caller to keep them in sync.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut stats = ManifestStatistics {
            total_chunks: self.chunks.len(),
            completed: 0,
            in_progress: 0,
            failed: 0,
            pending: 0,
            last_updated: Some(chrono::Utc::now().to_rfc3339()),
        };
        for chunk in self.chunks.values() {
            match chunk.status {
                ChunkStatus::Completed => stats.completed += 1,
                ChunkStatus::InProgress => stats.in_progress += 1,
                ChunkStatus::Failed => stats.failed += 1,
                ChunkStatus::Pending => stats.pending += 1,
            }
        }
        let mut snapshot = self.clone();
        snapshot.statistics = stats;
        atomic_json::save(path, &snapshot)
    }

    /// Returns the first chunk still `Pending`, in year-month order.
    pub fn next_pending(&self) -> Option<&str> {
        self.chunks
            .iter()
            .find(|(_, c)| c.status == ChunkStatus::Pending)
            .map(|(id, _)| id.as_str())
    }

    pub fn failed_chunk_ids(&self) -> Vec<String> {
        self.chunks
            .iter()
            .filter(|(_, c)| c.status == ChunkStatus::Failed)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn mark_in_progress(&mut self, chunk_id: &str) {
        if let Some(chunk) = self.chunks.get_mut(chunk_id) {
            chunk.status = ChunkStatus::InProgress;
            chunk.started_at = Some(chrono::Utc::now().to_rfc3339());
            chunk.error = None;
        }
    }

    pub fn mark_completed(&mut self, chunk_id: &str, articles_count: usize, enriched_count: usize) {
        if let Some(chunk) = self.chunks.get_mut(chunk_id) {
            chunk.status = ChunkStatus::Completed;
            chunk.completed_at = Some(chrono::Utc::now().to_rfc3339());
            chunk.error = None;
            chunk.articles_count = Some(articles_count);
            chunk.enriched_count = Some(enriched_count);
        }
    }

    pub fn mark_failed(&mut self, chunk_id: &str, error: &str) {
        if let Some(chunk) = self.chunks.get_mut(chunk_id) {
            chunk.status = ChunkStatus::Failed;
            chunk.error = Some(error.to_string());
            chunk.retries += 1;
        }
    }

    /// Resets any `InProgress` chunk back to `Pending`, for recovery after
    /// a crash mid-chunk. Returns how many were reset.
    pub fn reset_in_progress(&mut self) -> usize {
        let mut count = 0;
        for chunk in self.chunks.values_mut() {
            if chunk.status == ChunkStatus::InProgress {
                chunk.status = ChunkStatus::Pending;
                chunk.started_at = None;
                count += 1;
            }
        }
        count
    }

    pub fn reset_failed(&mut self) -> usize {
        let mut count = 0;
        for chunk in self.chunks.values_mut() {
            if chunk.status == ChunkStatus::Failed {
                chunk.status = ChunkStatus::Pending;
                chunk.error = None;
                count += 1;
            }
        }
        count
    }

    pub fn progress_summary(&self) -> String {
        let s = &self.statistics;
        let pct = if s.total_chunks > 0 { s.completed as f64 / s.total_chunks as f64 * 100.0 } else { 0.0 };
        let total_articles: usize = self
            .chunks
            .values()
            .filter(|c| c.status == ChunkStatus::Completed)
            .filter_map(|c| c.articles_count)
            .sum();

        let mut lines = vec![
            format!("Pipeline Progress: {}/{} chunks ({pct:.1}%)", s.completed, s.total_chunks),
            format!("  - Completed: {}", s.completed),
            format!("  - In Progress: {}", s.in_progress),
            format!("  - Failed: {}", s.failed),
            format!("  - Pending: {}", s.pending),
            format!("  - Total Articles: {total_articles}"),
        ];
        if s.failed > 0 {
            lines.push("\nFailed chunks:".to_string());
            for (id, chunk) in &self.chunks {
                if chunk.status == ChunkStatus::Failed {
                    lines.push(format!("  - {id}: {}", chunk.error.as_deref().unwrap_or("unknown error")));
                }
            }
        }
        lines.join("\n")
    }
}

fn add_month(date: chrono::NaiveDate) -> chrono::NaiveDate {
    let (year, month) = (date.year(), date.month());
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    chrono::NaiveDate::from_ymd_opt(next_year, next_month, 1).unwrap_or(date)
}

use chrono::Datelike;

pub const DEFAULT_MANIFEST_PATH: &str = "data/pipeline/manifest.json";

pub fn default_manifest_path() -> PathBuf {
    PathBuf::from(DEFAULT_MANIFEST_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_generates_one_chunk_per_month() {
        let manifest = Manifest::create("2024-01-01", "2024-04-01");
        assert_eq!(manifest.chunks.len(), 3);
        assert!(manifest.chunks.contains_key("2024-01"));
        assert!(manifest.chunks.contains_key("2024-03"));
    }

    #[test]
    fn next_pending_returns_first_in_order() {
        let mut manifest = Manifest::create("2024-01-01", "2024-03-01");
        manifest.mark_completed("2024-01", 10, 5);
        assert_eq!(manifest.next_pending(), Some("2024-02"));
    }

    #[test]
    fn reset_in_progress_returns_chunks_to_pending() {
        let mut manifest = Manifest::create("2024-01-01", "2024-02-01");
        manifest.mark_in_progress("2024-01");
        assert_eq!(manifest.reset_in_progress(), 1);
        assert_eq!(manifest.chunks["2024-01"].status, ChunkStatus::Pending);
    }

    #[test]
    fn failed_then_reset_failed_clears_error() {
        let mut manifest = Manifest::create("2024-01-01", "2024-02-01");
        manifest.mark_failed("2024-01", "boom");
        assert_eq!(manifest.failed_chunk_ids(), vec!["2024-01".to_string()]);
        assert_eq!(manifest.reset_failed(), 1);
        assert!(manifest.chunks["2024-01"].error.is_none());
    }
}
