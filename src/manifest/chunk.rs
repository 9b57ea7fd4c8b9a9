use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// One month-wide unit of work, covering every Bundesland. Mirrors
/// `chunk_manager.py`'s per-chunk dict, minus the `raw_file`/`enriched_file`
/// path fields — this pipeline keeps scraped/enriched articles in memory
/// for the duration of one chunk rather than staging them to disk between
/// stages (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub year_month: String,
    pub start_date: String,
    pub end_date: String,
    pub status: ChunkStatus,
    pub bundeslaender_completed: Vec<String>,
    pub articles_count: Option<usize>,
    pub enriched_count: Option<usize>,
    pub error: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub retries: u32,
}
