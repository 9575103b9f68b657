//! Hot reload of route modules on file changes.
//!
//! [`RouteWatcher`] watches the routes directory recursively and hands every
//! created or modified module file to [`RouteManager::reload_source`].
//! Repeated events for the same file within the debounce window are dropped.
//!
//! ```rust,ignore
//! let watcher = RouteWatcher::new("routes", vec![".js".to_string()])?;
//! tokio::spawn(watcher.run(Arc::clone(&manager)));
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use switchyard_core::HostServer;

use crate::error::ManagerError;
use crate::manager::{ManagerState, RouteManager};

/// Default window within which repeated events for one file are coalesced.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Decides which file system events trigger a reload.
#[derive(Debug, Clone)]
pub struct ChangeFilter {
    extensions: Vec<String>,
    debounce: Duration,
    last_seen: HashMap<PathBuf, Instant>,
}

impl ChangeFilter {
    /// A filter accepting files ending in one of `extensions`.
    #[must_use]
    pub fn new(extensions: Vec<String>, debounce: Duration) -> Self {
        Self {
            extensions,
            debounce,
            last_seen: HashMap::new(),
        }
    }

    /// Returns the changed file if `event` should trigger a reload at `now`.
    pub fn accept(&mut self, event: &Event, now: Instant) -> Option<PathBuf> {
        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
            return None;
        }

        let path = event.paths.iter().find(|path| self.matches_extension(path))?;

        let debounce = self.debounce;
        self.last_seen
            .retain(|_, seen| now.saturating_duration_since(*seen) < debounce);
        if self.last_seen.contains_key(path) {
            return None;
        }
        self.last_seen.insert(path.clone(), now);
        Some(path.clone())
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.extensions.iter().any(|ext| name.ends_with(ext.as_str())))
    }
}

/// Watches a routes directory and reloads changed modules.
pub struct RouteWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<Event>,
    filter: ChangeFilter,
}

impl std::fmt::Debug for RouteWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteWatcher")
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

impl RouteWatcher {
    /// Starts watching `directory` for files ending in one of `extensions`.
    ///
    /// # Errors
    ///
    /// Returns `ManagerError::Watch` when the directory cannot be watched.
    pub fn new(directory: impl AsRef<Path>, extensions: Vec<String>) -> Result<Self, ManagerError> {
        let directory = directory.as_ref();
        let (tx, rx) = mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    let _ = tx.blocking_send(event);
                }
                Err(e) => tracing::warn!(error = %e, "route watcher error"),
            }
        })
        .map_err(|e| ManagerError::Watch(e.to_string()))?;

        watcher
            .watch(directory, RecursiveMode::Recursive)
            .map_err(|e| ManagerError::Watch(format!("{}: {e}", directory.display())))?;

        tracing::info!(directory = %directory.display(), "watching routes directory");
        Ok(Self {
            _watcher: watcher,
            rx,
            filter: ChangeFilter::new(extensions, DEFAULT_DEBOUNCE),
        })
    }

    /// Sets the debounce window.
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.filter.debounce = debounce;
        self
    }

    /// Waits for the next accepted change. `None` once the watcher stops.
    pub async fn next_change(&mut self) -> Option<PathBuf> {
        while let Some(event) = self.rx.recv().await {
            if let Some(path) = self.filter.accept(&event, Instant::now()) {
                return Some(path);
            }
        }
        None
    }

    /// Reloads changed modules until the manager shuts down.
    pub async fn run<H: HostServer>(mut self, manager: Arc<RouteManager<H>>) {
        while let Some(path) = self.next_change().await {
            if manager.state() == ManagerState::ShutDown {
                break;
            }
            if manager.reload_source(&path).await {
                tracing::info!(source = %path.display(), "route module reloaded");
            }
        }
        tracing::debug!("route watcher stopped");
    }
}
