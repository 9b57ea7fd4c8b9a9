//! Durable on-disk queue of push batches that failed to reach the store.
//! Ported from `live_pipeline.py`'s `PUSH_QUEUE_FILE` convention: a single
//! JSON file holding a list of batches, persisted atomically so a crash
//! between enqueue and drain never loses a batch silently.

use crate::core::atomic_json;
use crate::core::error::Result;
use crate::transform::Record;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct QueueFile {
    batches: Vec<Vec<Record>>,
}

/// Thread-safe handle to the queue file. Every mutating call reads, edits,
/// and atomically rewrites the whole file; batch counts are small enough
/// (tens, not thousands) that this is simpler than a journal.
pub struct PushQueue {
    path: PathBuf,
    guard: Mutex<()>,
}

impl PushQueue {
    pub fn new(path: PathBuf) -> Self {
        PushQueue { path, guard: Mutex::new(()) }
    }

    pub fn enqueue(&self, batch: Vec<Record>) -> Result<()> {
        let _lock = self.guard.lock().unwrap();
        let mut file: QueueFile = atomic_json::load_or_default(&self.path, QueueFile::default);
        file.batches.push(batch);
        atomic_json::save(&self.path, &file)
    }

    /// Removes and returns every queued batch, leaving the file empty.
    pub fn take_all(&self) -> Result<Vec<Vec<Record>>> {
        let _lock = self.guard.lock().unwrap();
        let file: QueueFile = atomic_json::load_or_default(&self.path, QueueFile::default);
        if !file.batches.is_empty() {
            atomic_json::save(&self.path, &QueueFile::default())?;
        }
        Ok(file.batches)
    }

    pub fn len(&self) -> usize {
        let _lock = self.guard.lock().unwrap();
        let file: QueueFile = atomic_json::load_or_default(&self.path, QueueFile::default);
        file.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Record;

    fn sample_record(id: &str) -> Record {
        Record {
            id: id.to_string(),
            title: "t".to_string(),
            clean_title: None,
            summary: None,
            body: "b".to_string(),
            published_at: "2026-01-01T00:00:00".to_string(),
            source_url: "https://x/1".to_string(),
            source_agency: None,
            location_text: None,
            latitude: None,
            longitude: None,
            precision: "none".to_string(),
            categories: vec!["other".to_string()],
            weapon_type: None,
            confidence: 0.0,
            incident_date: None,
            incident_time: None,
            incident_time_precision: None,
            incident_end_date: None,
            incident_end_time: None,
            crime_sub_type: None,
            crime_confidence: None,
            drug_type: None,
            victim_count: None,
            suspect_count: None,
            victim_age: None,
            suspect_age: None,
            victim_gender: None,
            suspect_gender: None,
            victim_herkunft: None,
            suspect_herkunft: None,
            severity: None,
            motive: None,
            damage_amount_eur: None,
            damage_estimate: None,
            incident_group_id: None,
            group_role: None,
            pipeline_run: "default".to_string(),
            classification: "crime".to_string(),
        }
    }

    fn tempdir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("blaulicht-push-queue-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn enqueue_then_take_all_round_trips_and_clears() {
        let path = tempdir().join("queue.json");
        let _ = std::fs::remove_file(&path);
        let queue = PushQueue::new(path);
        queue.enqueue(vec![sample_record("a")]).unwrap();
        assert_eq!(queue.len(), 1);
        let taken = queue.take_all().unwrap();
        assert_eq!(taken.len(), 1);
        assert!(queue.is_empty());
    }
}
