// Change detection for route sources in debug mode

use crate::logging::{debug, warn};
use crate::Error;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Raises a dirty flag when any watched file changes.
///
/// The dispatcher polls the flag at the start of each request and rebuilds
/// its route table when it is set. Parent directories are watched rather
/// than the files themselves so that editors replacing a file by rename are
/// still noticed.
pub struct ReloadWatcher {
    dirty: Arc<AtomicBool>,
    watcher: Option<Mutex<RecommendedWatcher>>,
}

impl ReloadWatcher {
    /// A watcher with nothing to watch. Only [`mark_dirty`](Self::mark_dirty) sets the flag.
    pub fn new() -> Self {
        Self {
            dirty: Arc::new(AtomicBool::new(false)),
            watcher: None,
        }
    }

    /// Watch `paths` for modification, creation and removal.
    pub fn watch(paths: &[PathBuf]) -> Result<Self, Error> {
        let mut reload = Self::new();
        if paths.is_empty() {
            return Ok(reload);
        }

        let targets: Vec<PathBuf> = paths.iter().map(|p| absolute(p)).collect();
        let dirty = reload.dirty.clone();
        let watched = targets.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    let relevant = matches!(
                        event.kind,
                        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                    ) && event.paths.iter().any(|p| watched.iter().any(|w| w == p));
                    if relevant {
                        debug!(paths = ?event.paths, "Route source changed");
                        dirty.store(true, Ordering::Release);
                    }
                }
                Err(e) => warn!(error = %e, "File watcher error"),
            },
            Config::default(),
        )
        .map_err(|e| Error::Internal(format!("Failed to create watcher: {}", e)))?;

        for target in &targets {
            let dir = target.parent().unwrap_or(target.as_path());
            if dir.exists() {
                watcher
                    .watch(dir, RecursiveMode::NonRecursive)
                    .map_err(|e| Error::Internal(format!("Failed to watch path: {}", e)))?;
                debug!(path = %target.display(), "Watching route source");
            } else {
                warn!(path = %target.display(), "Route source directory not found");
            }
        }

        reload.watcher = Some(Mutex::new(watcher));
        Ok(reload)
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Clear the flag, returning whether it was set.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }
}

impl Default for ReloadWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReloadWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadWatcher")
            .field("dirty", &self.is_dirty())
            .field("watching", &self.is_watching())
            .finish()
    }
}

fn absolute(path: &Path) -> PathBuf {
    path.canonicalize()
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_flag() {
        let reload = ReloadWatcher::new();
        assert!(!reload.take_dirty());
        reload.mark_dirty();
        assert!(reload.is_dirty());
        assert!(reload.take_dirty());
        assert!(!reload.take_dirty());
    }

    #[test]
    fn test_watch_empty_list() {
        let reload = ReloadWatcher::watch(&[]).unwrap();
        assert!(!reload.is_watching());
    }

    #[tokio::test]
    async fn test_detects_file_change() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("routes.toml");
        std::fs::write(&file, "# v1").unwrap();

        let reload = ReloadWatcher::watch(&[file.clone()]).unwrap();
        assert!(reload.is_watching());

        std::fs::write(&file, "# v2").unwrap();
        for _ in 0..50 {
            if reload.is_dirty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        assert!(reload.take_dirty());
    }
}
