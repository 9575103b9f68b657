//! The module loader.
//!
//! [`ModuleLoader`] discovers candidate files, asks its [`ModuleProvider`]
//! for each file's exports and keeps the successful results keyed by route
//! path. A module that fails to load is recorded as a [`LoadError`] and never
//! aborts the rest of its batch.

use crate::discovery::{DiscoveryRules, ModuleCandidate};
use crate::error::LoaderResult;
use crate::provider::{ModuleExports, ModuleProvider, ModuleSource};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use switchyard_core::HandlerCollection;

/// Default time allowed for loading one module.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// A successfully loaded route module.
#[derive(Clone)]
pub struct LoadedModule {
    /// Module name, e.g. `auth`.
    pub name: String,
    /// File the module was loaded from.
    pub source_path: PathBuf,
    /// Mount path.
    pub route_path: String,
    /// API version, if loaded from a version subdirectory.
    pub version: Option<String>,
    /// The mountable collection.
    pub handler: Arc<dyn HandlerCollection>,
    /// Load time.
    pub loaded_at: DateTime<Utc>,
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("name", &self.name)
            .field("source_path", &self.source_path)
            .field("route_path", &self.route_path)
            .field("version", &self.version)
            .field("loaded_at", &self.loaded_at)
            .finish_non_exhaustive()
    }
}

/// A module that failed to load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadError {
    /// File that failed.
    pub source_path: PathBuf,
    /// What went wrong.
    pub message: String,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
}

/// Loader statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoaderStats {
    /// Modules currently loaded.
    pub total_loaded: usize,
    /// Load errors recorded since the last `clear`.
    pub total_errors: usize,
    /// Route paths of the loaded modules.
    pub loaded_paths: Vec<String>,
    /// The recorded errors.
    pub errors: Vec<LoadError>,
    /// Completion time of the most recent batch load.
    pub last_load: Option<DateTime<Utc>>,
}

/// Discovers and loads route modules.
pub struct ModuleLoader {
    root: PathBuf,
    rules: DiscoveryRules,
    provider: Arc<dyn ModuleProvider>,
    load_timeout: Duration,
    loaded: BTreeMap<String, LoadedModule>,
    candidates: HashMap<String, ModuleCandidate>,
    cache: HashMap<PathBuf, ModuleExports>,
    errors: Vec<LoadError>,
    last_load: Option<DateTime<Utc>>,
}

impl fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("root", &self.root)
            .field("load_timeout", &self.load_timeout)
            .field("loaded", &self.loaded.keys().collect::<Vec<_>>())
            .field("errors", &self.errors.len())
            .finish_non_exhaustive()
    }
}

impl ModuleLoader {
    /// Creates a loader for the routes directory `root`.
    pub fn new(
        root: impl Into<PathBuf>,
        rules: DiscoveryRules,
        provider: Arc<dyn ModuleProvider>,
    ) -> Self {
        Self {
            root: root.into(),
            rules,
            provider,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            loaded: BTreeMap::new(),
            candidates: HashMap::new(),
            cache: HashMap::new(),
            errors: Vec::new(),
            last_load: None,
        }
    }

    /// Sets the per-module load timeout.
    #[must_use]
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// The routes directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The discovery rules.
    #[must_use]
    pub fn rules(&self) -> &DiscoveryRules {
        &self.rules
    }

    /// Lists candidates in `directory`, or in the routes directory when `None`.
    ///
    /// # Errors
    ///
    /// Fails when the directory is missing or unreadable.
    pub async fn discover(&self, directory: Option<&Path>) -> LoaderResult<Vec<ModuleCandidate>> {
        self.rules
            .discover(directory.unwrap_or(&self.root), None)
            .await
    }

    /// Lists candidates in the `<root>/<version>` subdirectory.
    ///
    /// # Errors
    ///
    /// Fails when the version directory is missing or unreadable.
    pub async fn discover_versioned(&self, version: &str) -> LoaderResult<Vec<ModuleCandidate>> {
        self.rules
            .discover(&self.root.join(version), Some(version))
            .await
    }

    /// Loads every candidate in `directory` (the routes directory when `None`)
    /// and returns the ones that succeeded, keyed by route path.
    ///
    /// # Errors
    ///
    /// Fails only when discovery itself fails; per-module failures are
    /// recorded in [`errors`](Self::errors).
    pub async fn load_all(
        &mut self,
        directory: Option<&Path>,
    ) -> LoaderResult<BTreeMap<String, LoadedModule>> {
        let candidates = self.discover(directory).await?;
        Ok(self.load_batch(candidates).await)
    }

    /// Loads the modules of one API version.
    ///
    /// A missing version directory yields an empty map and a warning.
    ///
    /// # Errors
    ///
    /// Fails when the version directory exists but cannot be listed.
    pub async fn load_versioned(
        &mut self,
        version: &str,
    ) -> LoaderResult<BTreeMap<String, LoadedModule>> {
        let directory = self.root.join(version);
        if !tokio::fs::metadata(&directory)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            tracing::warn!(
                version = %version,
                directory = %directory.display(),
                "version directory not found"
            );
            return Ok(BTreeMap::new());
        }

        let candidates = self.discover_versioned(version).await?;
        Ok(self.load_batch(candidates).await)
    }

    async fn load_batch(&mut self, candidates: Vec<ModuleCandidate>) -> BTreeMap<String, LoadedModule> {
        let mut batch = BTreeMap::new();
        for candidate in candidates {
            if let Some(module) = self.load_one(&candidate).await {
                batch.insert(module.route_path.clone(), module);
            }
        }

        self.last_load = Some(Utc::now());
        tracing::info!(
            loaded = batch.len(),
            errors = self.errors.len(),
            "route modules loaded"
        );
        batch
    }

    /// Loads one module.
    ///
    /// Returns `None` and records a [`LoadError`] when the file cannot be read,
    /// the provider fails, no collection is exported, or the load times out.
    /// A successful load replaces any module previously loaded at the same path.
    pub async fn load_one(&mut self, candidate: &ModuleCandidate) -> Option<LoadedModule> {
        self.candidates
            .insert(candidate.route_path.clone(), candidate.clone());
        let exports = match self.cache.get(&candidate.source_path) {
            Some(cached) => Ok(cached.clone()),
            None => self.import(candidate).await,
        };

        let collection = exports.and_then(|exports| {
            let collection = exports.collection().ok_or_else(|| {
                "module exports no handler collection (expected a default or `router` export)"
                    .to_string()
            });
            self.cache.insert(candidate.source_path.clone(), exports);
            collection
        });

        match collection {
            Ok(handler) => {
                let module = LoadedModule {
                    name: candidate.name.clone(),
                    source_path: candidate.source_path.clone(),
                    route_path: candidate.route_path.clone(),
                    version: candidate.version.clone(),
                    handler,
                    loaded_at: Utc::now(),
                };
                self.loaded
                    .insert(module.route_path.clone(), module.clone());
                switchyard_telemetry::record_module_load(true);
                tracing::debug!(
                    module = %module.name,
                    route = %module.route_path,
                    "module loaded"
                );
                Some(module)
            }
            Err(message) => {
                switchyard_telemetry::record_module_load(false);
                tracing::warn!(
                    source = %candidate.source_path.display(),
                    error = %message,
                    "failed to load route module"
                );
                self.errors.push(LoadError {
                    source_path: candidate.source_path.clone(),
                    message,
                    timestamp: Utc::now(),
                });
                None
            }
        }
    }

    async fn import(&self, candidate: &ModuleCandidate) -> Result<ModuleExports, String> {
        let provider = Arc::clone(&self.provider);
        let path = candidate.source_path.clone();

        let attempt = async move {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| format!("failed to read module source: {e}"))?;
            let source = ModuleSource {
                candidate: candidate.clone(),
                contents,
            };
            provider.load(&source).await.map_err(|e| e.to_string())
        };

        match tokio::time::timeout(self.load_timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(format!(
                "module load timed out after {}ms",
                self.load_timeout.as_millis()
            )),
        }
    }

    /// Reloads the module mounted at `route_path`, bypassing the import cache.
    ///
    /// Returns `None` when no load was ever attempted for the path or the
    /// reload failed; in both cases no module remains loaded at that path.
    pub async fn reload(&mut self, route_path: &str) -> Option<LoadedModule> {
        let Some(candidate) = self.candidates.get(route_path).cloned() else {
            tracing::warn!(route = %route_path, "reload requested for unknown route");
            return None;
        };

        self.cache.remove(&candidate.source_path);
        self.loaded.remove(route_path);
        tracing::info!(route = %route_path, source = %candidate.source_path.display(), "reloading module");
        self.load_one(&candidate).await
    }

    /// Candidate last attempted at `route_path`, whether or not it loaded.
    #[must_use]
    pub fn candidate(&self, route_path: &str) -> Option<&ModuleCandidate> {
        self.candidates.get(route_path)
    }

    /// Route path of the module attempted from `source_path`.
    #[must_use]
    pub fn route_for_source(&self, source_path: &Path) -> Option<String> {
        self.candidates
            .values()
            .find(|c| c.source_path == source_path)
            .map(|c| c.route_path.clone())
    }

    /// Every candidate a load was attempted for, including failed ones.
    pub fn candidates(&self) -> impl Iterator<Item = &ModuleCandidate> {
        self.candidates.values()
    }

    /// A loaded module by route path.
    #[must_use]
    pub fn get(&self, route_path: &str) -> Option<&LoadedModule> {
        self.loaded.get(route_path)
    }

    /// All loaded modules.
    #[must_use]
    pub fn loaded(&self) -> &BTreeMap<String, LoadedModule> {
        &self.loaded
    }

    /// Recorded load errors, oldest first.
    #[must_use]
    pub fn errors(&self) -> &[LoadError] {
        &self.errors
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> LoaderStats {
        LoaderStats {
            total_loaded: self.loaded.len(),
            total_errors: self.errors.len(),
            loaded_paths: self.loaded.keys().cloned().collect(),
            errors: self.errors.clone(),
            last_load: self.last_load,
        }
    }

    /// Forgets loaded modules, candidates, cached imports and errors.
    pub fn clear(&mut self) {
        self.loaded.clear();
        self.candidates.clear();
        self.cache.clear();
        self.errors.clear();
        self.last_load = None;
    }
}
