//! Atomic JSON file persistence shared by every cache (enrichment, geocode,
//! scraped URLs, poll state, push queue) and the chunk manifest.
//!
//! Writes go to a `.tmp` sibling in the same directory, then `rename` over
//! the target, so a reader never observes a partially-written file. Loads
//! tolerate a missing or corrupt file by falling back to a caller-supplied
//! default rather than failing the whole process.

use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use tracing::warn;

/// Serialize `value` to `path` atomically: write to `path.tmp`, fsync, then
/// rename over `path`. Creates the parent directory if needed.
pub fn save<T: Serialize>(path: &Path, value: &T) -> crate::core::error::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = tmp_sibling(path);
    let json = serde_json::to_string_pretty(value)?;
    {
        let mut file = std::fs::File::create(&tmp_path)?;
        use std::io::Write;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Load and parse `path`; on any I/O or parse failure, log a warning and
/// return `default()` instead of propagating the error. This matches the
/// "caches start empty rather than crash the pipeline" policy used by every
/// on-disk cache in this system.
pub fn load_or_default<T, F>(path: &Path, default: F) -> T
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(value) => value,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to parse cache file, starting fresh");
                default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read cache file, starting fresh");
            default()
        }
    }
}

fn tmp_sibling(path: &Path) -> std::path::PathBuf {
    let file_name = path
        .file_name()
        .map(|n| format!(".{}.tmp", n.to_string_lossy()))
        .unwrap_or_else(|| ".atomic.tmp".to_string());
    path.with_file_name(file_name)
}

/// Append one JSON-serialized line to a `.jsonl` file, creating it and its
/// parent directory if needed. Used for the append-only token-usage log.
/// Best-effort: failures are logged, never propagated, matching the
/// fire-and-forget policy for usage logging.
pub fn append_jsonl<T: Serialize>(path: &Path, value: &T) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!(path = %path.display(), error = %e, "failed to create usage log directory");
            return;
        }
    }
    let line = match serde_json::to_string(value) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to serialize usage log line");
            return;
        }
    };
    use std::io::Write;
    let result = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut f| writeln!(f, "{line}"));
    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "failed to append usage log line");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Sample {
        a: i32,
        b: String,
    }

    #[test]
    fn round_trips_through_atomic_save() {
        let dir = tempdir();
        let path = dir.join("sample.json");
        let value = Sample {
            a: 7,
            b: "hi".into(),
        };
        save(&path, &value).unwrap();
        let loaded: Sample = load_or_default(&path, || Sample {
            a: 0,
            b: String::new(),
        });
        assert_eq!(loaded, value);
        assert!(!tmp_sibling(&path).exists());
    }

    #[test]
    fn missing_file_falls_back_to_default() {
        let dir = tempdir();
        let path = dir.join("missing.json");
        let loaded: HashMap<String, i32> = load_or_default(&path, HashMap::new);
        assert!(loaded.is_empty());
    }

    #[test]
    fn corrupt_file_falls_back_to_default() {
        let dir = tempdir();
        let path = dir.join("corrupt.json");
        std::fs::write(&path, "not json").unwrap();
        let loaded: HashMap<String, i32> = load_or_default(&path, HashMap::new);
        assert!(loaded.is_empty());
    }

    fn tempdir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "blaulicht-pipeline-test-{}-{}",
            std::process::id(),
            std::thread::current().id().as_u64_hack()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    trait ThreadIdExt {
        fn as_u64_hack(&self) -> u64;
    }
    impl ThreadIdExt for std::thread::ThreadId {
        fn as_u64_hack(&self) -> u64 {
            use std::hash::{Hash, Hasher};
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            self.hash(&mut hasher);
            hasher.finish()
        }
    }
}
