//! File-change watcher
//!
//! Scans the served root for web source files whose modification time is
//! newer than a stored checkpoint and raises a process-wide dirty flag.
//! The flag is read-and-clear with a single logical consumer: the
//! `/reload` endpoint.
//!
//! Polling runs on a background interval task, so detection resolution is
//! bounded by the interval rather than by request arrival.

use crate::server::ConnectionTracker;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Extensions the watcher considers source files.
const WATCHED_EXTENSIONS: [&str; 4] = ["html", "css", "js", "json"];

/// Watches the root directory for changed source files.
pub struct Watcher {
    root: PathBuf,
    /// Timestamp watched files are compared against
    checkpoint: Mutex<SystemTime>,
    /// Unconsumed change notification
    dirty: AtomicBool,
}

impl Watcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            checkpoint: Mutex::new(SystemTime::now()),
            dirty: AtomicBool::new(false),
        }
    }

    /// Scan for watched files newer than the checkpoint.
    ///
    /// Any newer file sets the dirty flag and advances the checkpoint to
    /// now. The checkpoint moves only when a change was observed, so a
    /// modification between scans is never missed. Returns whether this
    /// call observed a change.
    pub fn poll(&self) -> bool {
        let checkpoint = *self.checkpoint.lock();
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(root = %self.root.display(), %err, "watch scan failed");
                return false;
            }
        };

        let mut changed = false;
        for entry in entries.flatten() {
            let path = entry.path();
            if !is_watched(&path) {
                continue;
            }
            let meta = match entry.metadata() {
                Ok(meta) if meta.is_file() => meta,
                _ => continue,
            };
            if let Ok(modified) = meta.modified() {
                if modified > checkpoint {
                    info!(file = %path.display(), "file changed");
                    changed = true;
                }
            }
        }

        if changed {
            *self.checkpoint.lock() = SystemTime::now();
            self.dirty.store(true, Ordering::SeqCst);
        }
        changed
    }

    /// Read-and-clear the dirty flag. Valid for exactly one logical
    /// consumer.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::SeqCst)
    }

    /// Peek at the dirty flag without clearing it.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Spawn the background poll loop. The task stops once `tracker`
    /// starts shutting down, within one interval tick.
    pub fn spawn(
        self: Arc<Self>,
        interval: Duration,
        tracker: Arc<ConnectionTracker>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if tracker.is_shutting_down() {
                    break;
                }
                self.poll();
            }
        })
    }

    #[cfg(test)]
    pub(crate) fn rewind_checkpoint(&self, by: Duration) {
        let mut checkpoint = self.checkpoint.lock();
        *checkpoint = checkpoint
            .checked_sub(by)
            .unwrap_or(SystemTime::UNIX_EPOCH);
    }
}

fn is_watched(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| WATCHED_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_is_watched() {
        assert!(is_watched(Path::new("index.html")));
        assert!(is_watched(Path::new("style.css")));
        assert!(is_watched(Path::new("app.js")));
        assert!(is_watched(Path::new("data.json")));
        assert!(!is_watched(Path::new("notes.txt")));
        assert!(!is_watched(Path::new("Makefile")));
    }

    #[test]
    fn test_poll_detects_change_once() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = Watcher::new(dir.path());

        fs::write(dir.path().join("style.css"), "body {}").unwrap();
        watcher.rewind_checkpoint(Duration::from_secs(60));

        assert!(watcher.poll());
        assert!(watcher.is_dirty());

        // The checkpoint advanced, so an unchanged tree is clean
        assert!(!watcher.poll());
    }

    #[test]
    fn test_poll_ignores_unwatched_files() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = Watcher::new(dir.path());

        fs::write(dir.path().join("notes.txt"), "scratch").unwrap();
        watcher.rewind_checkpoint(Duration::from_secs(60));

        assert!(!watcher.poll());
        assert!(!watcher.is_dirty());
    }

    #[test]
    fn test_take_dirty_clears() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = Watcher::new(dir.path());

        fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        watcher.rewind_checkpoint(Duration::from_secs(60));
        watcher.poll();

        assert!(watcher.take_dirty());
        assert!(!watcher.take_dirty());
    }

    #[test]
    fn test_clean_tree_stays_clean() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = Watcher::new(dir.path());

        assert!(!watcher.poll());
        assert!(!watcher.take_dirty());
    }
}
