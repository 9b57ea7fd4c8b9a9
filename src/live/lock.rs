//! Single-instance advisory file lock for the live loop. Ported from
//! `live_pipeline.py::acquire_lock`/`release_lock` (`fcntl.flock` plus a
//! PID written into the lock file); `fs2` provides the equivalent
//! cross-platform advisory lock here.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Holds the lock file open and advisory-locked for its lifetime; dropping
/// it releases the lock and leaves the file in place with the PID that
/// last held it, same as the original's cleanup-on-release behavior.
pub struct LiveLock {
    path: PathBuf,
    file: File,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("another instance is already running (lock held at {0})")]
    AlreadyLocked(PathBuf),
    #[error("failed to open lock file: {0}")]
    Io(#[from] std::io::Error),
}

impl LiveLock {
    /// Attempts to acquire the lock at `path` without blocking. Fails
    /// immediately if another process holds it, matching the original's
    /// `LOCK_EX | LOCK_NB` non-blocking acquisition.
    pub fn acquire(path: PathBuf) -> Result<Self, LockError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).read(true).write(true).open(&path)?;
        file.try_lock_exclusive().map_err(|_| LockError::AlreadyLocked(path.clone()))?;
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        file.sync_all()?;
        Ok(LiveLock { path, file })
    }
}

impl Drop for LiveLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Reads the PID recorded in an existing lock file, if any, for status
/// reporting (`live --mode status`).
pub fn read_lock_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquiring_twice_fails_while_first_guard_is_held() {
        let path = std::env::temp_dir().join(format!("blaulicht-live-lock-test-{}.lock", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let guard = LiveLock::acquire(path.clone()).unwrap();
        assert!(read_lock_pid(&path).is_some());
        assert!(matches!(LiveLock::acquire(path.clone()), Err(LockError::AlreadyLocked(_))));
        drop(guard);
        assert!(!path.exists());
    }
}
