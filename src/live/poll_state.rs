//! Per-source poll metadata for the live loop: last success, consecutive
//! failure count, and the backoff multiplier derived from it. Ported from
//! `poll_state.py::PollState`, local-storage half only — the dual Supabase
//! sync is dropped here since the sink (C6) already persists every
//! successfully-pushed record to the same store; mirroring poll state
//! there too would just be a second write path for the same fact.

use crate::core::atomic_json;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceState {
    pub last_success_at: Option<String>,
    pub last_articles_count: usize,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

impl Default for SourceState {
    fn default() -> Self {
        SourceState { last_success_at: None, last_articles_count: 0, consecutive_failures: 0, last_error: None }
    }
}

pub struct PollState {
    path: PathBuf,
    state: Mutex<HashMap<String, SourceState>>,
}

impl PollState {
    pub fn load(path: PathBuf) -> Self {
        let state = atomic_json::load_or_default(&path, HashMap::new);
        PollState { path, state: Mutex::new(state) }
    }

    pub fn get(&self, source: &str) -> SourceState {
        self.state.lock().unwrap().get(source).cloned().unwrap_or_default()
    }

    pub fn record_success(&self, source: &str, articles_count: usize) {
        let mut state = self.state.lock().unwrap();
        state.insert(
            source.to_string(),
            SourceState {
                last_success_at: Some(chrono::Utc::now().to_rfc3339()),
                last_articles_count: articles_count,
                consecutive_failures: 0,
                last_error: None,
            },
        );
        self.save_locked(&state);
    }

    pub fn record_failure(&self, source: &str, error: &str) {
        let mut state = self.state.lock().unwrap();
        let mut entry = state.get(source).cloned().unwrap_or_default();
        entry.consecutive_failures += 1;
        entry.last_error = Some(error.chars().take(500).collect());
        state.insert(source.to_string(), entry);
        self.save_locked(&state);
    }

    /// Matches `poll_state.py::should_backoff`'s default threshold.
    pub fn should_backoff(&self, source: &str, max_failures: u32) -> bool {
        self.get(source).consecutive_failures >= max_failures
    }

    /// Three consecutive failures doubles the poll interval, six
    /// quadruples it, matching `poll_state.py::backoff_multiplier`.
    pub fn backoff_multiplier(&self, source: &str) -> u32 {
        match self.get(source).consecutive_failures {
            f if f < 3 => 1,
            f if f < 6 => 2,
            _ => 4,
        }
    }

    pub fn summary(&self) -> String {
        let state = self.state.lock().unwrap();
        if state.is_empty() {
            return "No poll state recorded yet.".to_string();
        }
        let mut sources: Vec<&String> = state.keys().collect();
        sources.sort();
        let mut lines = vec!["Poll State:".to_string()];
        for source in sources {
            let info = &state[source];
            let status = if info.consecutive_failures == 0 {
                format!("OK ({} articles)", info.last_articles_count)
            } else {
                format!("FAILING x{}", info.consecutive_failures)
            };
            lines.push(format!(
                "  {source:<25} {status:<20} last: {}",
                info.last_success_at.as_deref().unwrap_or("never")
            ));
            if let Some(err) = &info.last_error {
                lines.push(format!("  {:25} error: {}", "", &err[..err.len().min(80)]));
            }
        }
        lines.join("\n")
    }

    fn save_locked(&self, state: &HashMap<String, SourceState>) {
        if let Err(e) = atomic_json::save(&self.path, state) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to save poll state");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tempdir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("blaulicht-poll-state-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn unseen_source_has_zero_failures_and_no_backoff() {
        let poll = PollState::load(tempdir().join("unseen.json"));
        assert!(!poll.should_backoff("berlin", 3));
        assert_eq!(poll.backoff_multiplier("berlin"), 1);
    }

    #[test]
    fn three_failures_doubles_backoff_six_quadruples() {
        let poll = PollState::load(tempdir().join("failures.json"));
        for _ in 0..3 {
            poll.record_failure("berlin", "timeout");
        }
        assert_eq!(poll.backoff_multiplier("berlin"), 2);
        assert!(poll.should_backoff("berlin", 3));
        for _ in 0..3 {
            poll.record_failure("berlin", "timeout");
        }
        assert_eq!(poll.backoff_multiplier("berlin"), 4);
    }

    #[test]
    fn success_resets_consecutive_failures() {
        let poll = PollState::load(tempdir().join("reset.json"));
        poll.record_failure("bayern", "boom");
        poll.record_success("bayern", 5);
        assert_eq!(poll.get("bayern").consecutive_failures, 0);
    }
}
