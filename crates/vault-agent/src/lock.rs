//! Execution mutex
//!
//! A filesystem marker ensuring at most one task executes at a time,
//! across process restarts. The marker's content (the active task title)
//! is informational only; existence is the lock.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct TaskLock {
    path: PathBuf,
}

impl TaskLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a task is currently active.
    pub fn is_held(&self) -> bool {
        self.path.exists()
    }

    /// Title recorded in the marker, if held.
    pub fn holder(&self) -> Option<String> {
        std::fs::read_to_string(&self.path).ok()
    }

    /// Atomically create the marker. Fails if a task is already active.
    /// The returned guard removes the marker on every exit path,
    /// including unwinding.
    pub fn acquire(&self, title: &str) -> Result<LockGuard> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .with_context(|| format!("Failed to acquire task lock at {}", self.path.display()))?;

        file.write_all(title.as_bytes())
            .context("Failed to record task title in lock")?;

        debug!(path = %self.path.display(), task = title, "Task lock acquired");
        Ok(LockGuard {
            path: self.path.clone(),
        })
    }
}

#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Task lock released"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove task lock"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn lock_in(dir: &TempDir) -> TaskLock {
        TaskLock::new(dir.path().join("task.lock"))
    }

    #[test]
    fn test_acquire_and_release() {
        let dir = TempDir::new().unwrap();
        let lock = lock_in(&dir);

        assert!(!lock.is_held());
        let guard = lock.acquire("Check email").unwrap();
        assert!(lock.is_held());
        assert_eq!(lock.holder().unwrap(), "Check email");

        drop(guard);
        assert!(!lock.is_held());
    }

    #[test]
    fn test_second_acquire_fails_while_held() {
        let dir = TempDir::new().unwrap();
        let lock = lock_in(&dir);

        let _guard = lock.acquire("first").unwrap();
        assert!(lock.acquire("second").is_err());
    }

    #[test]
    fn test_released_on_panic() {
        let dir = TempDir::new().unwrap();
        let lock = lock_in(&dir);
        let path = lock.path().to_path_buf();

        let result = std::panic::catch_unwind(|| {
            let _guard = TaskLock::new(&path).acquire("doomed").unwrap();
            panic!("task blew up");
        });

        assert!(result.is_err());
        assert!(!lock.is_held());
    }

    #[test]
    fn test_reacquire_after_release() {
        let dir = TempDir::new().unwrap();
        let lock = lock_in(&dir);

        drop(lock.acquire("one").unwrap());
        let guard = lock.acquire("two").unwrap();
        assert_eq!(lock.holder().unwrap(), "two");
        drop(guard);
    }
}
