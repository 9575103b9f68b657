//! Route lifecycle orchestration.
//!
//! [`RouteManager`] owns the loader, the registry and the middleware
//! catalogue for one host server. It turns loaded modules into mounted,
//! registered routes and keeps the three in step across reloads and shutdown.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use switchyard::{RouteManager, SwitchyardConfig};
//! use switchyard::server::App;
//!
//! let app = Arc::new(App::new());
//! let manager = Arc::new(RouteManager::new(Arc::clone(&app), SwitchyardConfig::default(), provider)?);
//! manager.initialize().await?;
//! app.set_observer(manager.access_recorder());
//! ```

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use switchyard_config::{RoutesConfig, SwitchyardConfig};
use switchyard_core::{AccessObserver, HandlerCollection, HostServer, Layered, Middleware};
use switchyard_loader::{
    DiscoveryRules, DiscoverySettings, LoadError, LoadedModule, LoaderStats, ModuleLoader,
    ModuleProvider,
};
use switchyard_middleware::{CatalogueStats, DefaultSettings, MiddlewareCatalogue};
use switchyard_registry::{
    AllMetrics, RegisterOptions, RegistryEntry, RegistryStats, RouteMetricsSnapshot, RouteRegistry,
};

use crate::error::ManagerError;

/// Lifecycle state of a [`RouteManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerState {
    /// Created, or a previous initialization failed.
    Uninitialized,
    /// `initialize` is running.
    Initializing,
    /// Routes are mounted and registered.
    Ready,
    /// Shut down. Terminal.
    ShutDown,
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::ShutDown => "shut_down",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct Lifecycle {
    state: ManagerState,
    initialized_at: Option<DateTime<Utc>>,
    initialization_time_ms: Option<u64>,
}

/// Options for [`RouteManager::register_custom`].
///
/// Catalogue middleware wraps the explicit `middleware`, so the effective
/// order is `catalogue` names first, then `middleware`, then the handler.
#[derive(Clone, Default)]
pub struct CustomRoute {
    /// Middleware instances, in order.
    pub middleware: Vec<Arc<dyn Middleware>>,
    /// Catalogue middleware names, in order. Unknown names are dropped.
    pub catalogue: Vec<String>,
    /// API version; mounts the route at `/api/<version><path>`.
    pub version: Option<String>,
    /// Validation schemas as `(method, schema)` pairs.
    pub validation: Vec<(String, serde_json::Value)>,
}

impl CustomRoute {
    /// A route mounted under `/api/<version>`.
    #[must_use]
    pub fn versioned(version: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            ..Self::default()
        }
    }

    /// Appends a middleware instance.
    #[must_use]
    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Appends a catalogue middleware name.
    #[must_use]
    pub fn with_catalogue(mut self, name: impl Into<String>) -> Self {
        self.catalogue.push(name.into());
        self
    }

    /// Attaches a validation schema for `method`.
    #[must_use]
    pub fn with_validation(mut self, method: impl Into<String>, schema: serde_json::Value) -> Self {
        self.validation.push((method.into(), schema));
        self
    }
}

impl fmt::Debug for CustomRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomRoute")
            .field(
                "middleware",
                &self.middleware.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .field("catalogue", &self.catalogue)
            .field("version", &self.version)
            .field(
                "validation",
                &self.validation.iter().map(|(m, _)| m).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Combined statistics.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerStats {
    /// Lifecycle state.
    pub state: ManagerState,
    /// Whether the manager is ready.
    pub initialized: bool,
    /// When initialization completed.
    pub initialized_at: Option<DateTime<Utc>>,
    /// Duration of the successful initialization.
    pub initialization_time_ms: Option<u64>,
    /// Deployment environment.
    pub environment: String,
    /// Registry statistics.
    pub registry: RegistryStats,
    /// Loader statistics.
    pub loader: LoaderStats,
    /// Middleware catalogue statistics.
    pub middleware: CatalogueStats,
}

/// Health view.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerStatus {
    /// Lifecycle state.
    pub state: ManagerState,
    /// Whether the manager is ready.
    pub initialized: bool,
    /// Duration of the successful initialization.
    pub initialization_time_ms: Option<u64>,
    /// Deployment environment.
    pub environment: String,
    /// Registered routes.
    pub routes: Vec<RegistryEntry>,
    /// Modules that failed to load.
    pub load_errors: Vec<LoadError>,
    /// Global middleware installed on the host, in order.
    pub global_middleware: Vec<String>,
}

/// Result of [`RouteManager::get_metrics`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricsView {
    /// Metrics of one path; `None` when the path is not tracked.
    Route(Option<RouteMetricsSnapshot>),
    /// The full overview.
    All(AllMetrics),
}

/// Orchestrates discovery, loading, mounting and registration of route modules.
pub struct RouteManager<H: HostServer> {
    host: Arc<H>,
    config: SwitchyardConfig,
    catalogue: Arc<MiddlewareCatalogue>,
    registry: Arc<RouteRegistry>,
    loader: tokio::sync::Mutex<ModuleLoader>,
    lifecycle: RwLock<Lifecycle>,
    transition: tokio::sync::Mutex<()>,
    globals_applied: AtomicBool,
}

impl<H: HostServer> fmt::Debug for RouteManager<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteManager")
            .field("state", &self.state())
            .field("registry", &self.registry)
            .field("catalogue", &self.catalogue)
            .finish_non_exhaustive()
    }
}

impl<H: HostServer> RouteManager<H> {
    /// Creates a manager for `host`.
    ///
    /// # Errors
    ///
    /// Returns `ManagerError::Discovery` when an exclude pattern does not compile.
    pub fn new(
        host: Arc<H>,
        config: SwitchyardConfig,
        provider: Arc<dyn ModuleProvider>,
    ) -> Result<Self, ManagerError> {
        let rules = DiscoveryRules::new(&discovery_settings(&config.routes))?;
        let loader = ModuleLoader::new(config.routes.directory.clone(), rules, provider)
            .with_load_timeout(Duration::from_millis(config.routes.load_timeout_ms));
        let catalogue = MiddlewareCatalogue::with_defaults(&default_settings(&config));

        Ok(Self {
            host,
            config,
            catalogue: Arc::new(catalogue),
            registry: Arc::new(RouteRegistry::new()),
            loader: tokio::sync::Mutex::new(loader),
            lifecycle: RwLock::new(Lifecycle {
                state: ManagerState::Uninitialized,
                initialized_at: None,
                initialization_time_ms: None,
            }),
            transition: tokio::sync::Mutex::new(()),
            globals_applied: AtomicBool::new(false),
        })
    }

    /// The host server.
    #[must_use]
    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// The configuration the manager was built with.
    #[must_use]
    pub fn config(&self) -> &SwitchyardConfig {
        &self.config
    }

    /// The middleware catalogue.
    #[must_use]
    pub fn catalogue(&self) -> &Arc<MiddlewareCatalogue> {
        &self.catalogue
    }

    /// The route registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<RouteRegistry> {
        &self.registry
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ManagerState {
        self.lifecycle.read().state
    }

    /// Whether the manager is ready.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state() == ManagerState::Ready
    }

    /// Installs global middleware and, with `auto_load`, loads and registers
    /// every module in the routes directory.
    ///
    /// Calling it again once ready logs a warning and succeeds. On failure the
    /// routes registered by this call are removed and the manager returns to
    /// [`ManagerState::Uninitialized`].
    ///
    /// # Errors
    ///
    /// - `ManagerError::ShutDown` after [`shutdown`](Self::shutdown)
    /// - `ManagerError::Discovery` when the routes directory cannot be listed
    /// - `ManagerError::Registration` when a loaded module cannot be registered
    pub async fn initialize(&self) -> Result<(), ManagerError> {
        let _transition = self.transition.lock().await;
        {
            let mut lifecycle = self.lifecycle.write();
            match lifecycle.state {
                ManagerState::Ready => {
                    tracing::warn!("route manager already initialized");
                    return Ok(());
                }
                ManagerState::ShutDown => return Err(ManagerError::ShutDown),
                ManagerState::Uninitialized | ManagerState::Initializing => {}
            }
            lifecycle.state = ManagerState::Initializing;
        }

        tracing::info!(
            directory = %self.config.routes.directory,
            environment = %self.config.server.environment,
            "initializing route manager"
        );
        let started = Instant::now();

        match self.run_initialization().await {
            Ok(count) => {
                let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                {
                    let mut lifecycle = self.lifecycle.write();
                    lifecycle.state = ManagerState::Ready;
                    lifecycle.initialized_at = Some(Utc::now());
                    lifecycle.initialization_time_ms = Some(elapsed);
                }
                tracing::info!(routes = count, duration_ms = elapsed, "route manager initialized");
                Ok(())
            }
            Err(e) => {
                self.lifecycle.write().state = ManagerState::Uninitialized;
                tracing::error!(error = %e, "route manager initialization failed");
                Err(e)
            }
        }
    }

    async fn run_initialization(&self) -> Result<usize, ManagerError> {
        let middleware = &self.config.middleware;
        if middleware.apply_global && !self.globals_applied.swap(true, Ordering::SeqCst) {
            let names: Option<Vec<&str>> = middleware
                .global
                .as_ref()
                .map(|names| names.iter().map(String::as_str).collect());
            self.catalogue.apply_global(self.host.as_ref(), names.as_deref());
        }
        for (version, names) in &middleware.versions {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            self.catalogue.apply_to_version(version, &names);
        }

        if !self.config.routes.auto_load {
            tracing::info!("route auto-load disabled");
            return Ok(0);
        }

        let modules = {
            let mut loader = self.loader.lock().await;
            loader.load_all(None).await?
        };

        let mut registered = Vec::with_capacity(modules.len());
        for (route_path, module) in &modules {
            if !self.register_loaded(route_path, module) {
                for (path, version) in registered {
                    self.detach(path, version);
                }
                return Err(ManagerError::registration(route_path.clone()));
            }
            registered.push((route_path.as_str(), module.version.as_deref()));
        }
        Ok(registered.len())
    }

    /// Mounts a loaded module on the host and registers it.
    ///
    /// Modules of a version with a catalogue binding are wrapped in that
    /// version's middleware.
    pub fn register_loaded(&self, route_path: &str, module: &LoadedModule) -> bool {
        let route_path = route_key(route_path);
        let names = module
            .version
            .as_deref()
            .and_then(|version| self.catalogue.version_binding(version))
            .unwrap_or_default();
        let stack: Vec<Arc<dyn Middleware>> = names
            .iter()
            .filter_map(|name| self.catalogue.get(name))
            .collect();

        let options = RegisterOptions {
            version: module.version.clone(),
            module_name: Some(module.name.clone()),
            middleware_names: names,
            has_validation: false,
        };
        self.attach(&route_path, wrap(Arc::clone(&module.handler), stack), options)
    }

    /// Registers a handler collection that did not come from the routes directory.
    ///
    /// With a version the collection is mounted at `/api/<version><path>`.
    pub fn register_custom(
        &self,
        path: &str,
        handler: Arc<dyn HandlerCollection>,
        route: CustomRoute,
    ) -> bool {
        let route_path = route_key(&match &route.version {
            Some(version) => format!("/api/{version}{path}"),
            None => path.to_string(),
        });

        let mut stack = if route.catalogue.is_empty() {
            Vec::new()
        } else {
            let names: Vec<&str> = route.catalogue.iter().map(String::as_str).collect();
            self.catalogue.apply_to_route(&route_path, &names)
        };
        stack.extend(route.middleware.iter().cloned());
        let middleware_names: Vec<String> = stack.iter().map(|m| m.name().to_string()).collect();

        let options = RegisterOptions {
            version: route.version.clone(),
            module_name: None,
            middleware_names,
            has_validation: !route.validation.is_empty(),
        };
        if !self.attach(&route_path, wrap(handler, stack), options) {
            return false;
        }

        for (method, schema) in &route.validation {
            if !self
                .registry
                .register_validation_schema(&route_path, method, schema.clone())
            {
                tracing::warn!(route = %route_path, method = %method, "ignored blank validation method");
            }
        }
        true
    }

    fn attach(&self, route_path: &str, handler: Arc<dyn HandlerCollection>, options: RegisterOptions) -> bool {
        if self.state() == ManagerState::ShutDown {
            tracing::warn!(route = %route_path, "route manager is shut down, registration refused");
            return false;
        }

        let version = options.version.clone();
        if !self.registry.register(route_path, Arc::clone(&handler), options) {
            switchyard_telemetry::record_registration(false);
            return false;
        }

        if let Err(e) = self.host.mount(route_path, handler) {
            self.registry.unregister(route_path, version.as_deref());
            switchyard_telemetry::record_registration(false);
            tracing::error!(route = %route_path, error = %e, "failed to mount route");
            return false;
        }

        switchyard_telemetry::record_registration(true);
        switchyard_telemetry::set_registered_routes(self.registry.route_count());
        tracing::info!(route = %route_path, version = ?version, "route registered");
        true
    }

    fn detach(&self, route_path: &str, version: Option<&str>) {
        self.registry.unregister(route_path, version);
        self.host.unmount(route_path);
        switchyard_telemetry::set_registered_routes(self.registry.route_count());
    }

    /// Loads and registers the modules in `<routes>/<version>`.
    ///
    /// Returns the registered route paths. A missing version directory yields
    /// an empty list; modules that fail to register are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns `ManagerError::Discovery` when the version directory exists but
    /// cannot be listed, and `ManagerError::ShutDown` after shutdown.
    pub async fn load_versioned(&self, version: &str) -> Result<Vec<String>, ManagerError> {
        if self.state() == ManagerState::ShutDown {
            return Err(ManagerError::ShutDown);
        }

        let modules = {
            let mut loader = self.loader.lock().await;
            loader.load_versioned(version).await?
        };

        let registered: Vec<String> = modules
            .iter()
            .filter(|(route_path, module)| self.register_loaded(route_path, module))
            .map(|(route_path, _)| route_path.clone())
            .collect();

        tracing::info!(
            version = %version,
            loaded = modules.len(),
            registered = registered.len(),
            "versioned routes loaded"
        );
        Ok(registered)
    }

    /// Re-reads the module mounted at `route_path` and registers it again.
    ///
    /// The route is removed before reloading. If the reload fails it stays
    /// absent and `false` is returned. Routes that did not come from the
    /// routes directory are left untouched and also yield `false`.
    pub async fn reload_route(&self, route_path: &str) -> bool {
        let route_path = route_key(route_path);
        let route_path = route_path.as_str();
        let mut loader = self.loader.lock().await;
        let Some(version) = loader.candidate(route_path).map(|c| c.version.clone()) else {
            tracing::warn!(route = %route_path, "reload requested for a route not loaded from the routes directory");
            return false;
        };
        self.detach(route_path, version.as_deref());

        let reloaded = loader.reload(route_path).await;
        drop(loader);

        match reloaded {
            Some(module) => self.register_loaded(route_path, &module),
            None => {
                tracing::warn!(route = %route_path, "route reload failed, route removed");
                false
            }
        }
    }

    /// Reloads the route whose module was loaded from `source_path`.
    ///
    /// Returns `false` when no loaded module came from that file.
    pub async fn reload_source(&self, source_path: &Path) -> bool {
        let Some(route_path) = self.route_for_source(source_path).await else {
            tracing::debug!(source = %source_path.display(), "changed file is not a loaded route module");
            return false;
        };
        self.reload_route(&route_path).await
    }

    async fn route_for_source(&self, source_path: &Path) -> Option<String> {
        let loader = self.loader.lock().await;
        if let Some(route_path) = loader.route_for_source(source_path) {
            return Some(route_path);
        }

        // Watcher events carry canonical paths; the loader keeps them as discovered.
        let wanted = tokio::fs::canonicalize(source_path).await.ok()?;
        for candidate in loader.candidates() {
            if let Ok(known) = tokio::fs::canonicalize(&candidate.source_path).await {
                if known == wanted {
                    return Some(candidate.route_path.clone());
                }
            }
        }
        None
    }

    /// Records one completed request. Ignored when metrics are disabled.
    pub fn record_access(&self, route_path: &str, duration_ms: f64, status_code: u16, is_error: bool) {
        if !self.config.metrics.enabled {
            return;
        }
        self.registry
            .record_access(route_path, duration_ms, status_code, is_error);
        switchyard_telemetry::record_route_access(route_path, status_code, duration_ms);
    }

    /// An observer that forwards completed requests to
    /// [`record_access`](Self::record_access).
    ///
    /// The observer holds a weak reference and goes quiet once the manager is dropped.
    pub fn access_recorder(self: &Arc<Self>) -> Arc<dyn AccessObserver> {
        Arc::new(AccessRecorder {
            manager: Arc::downgrade(self),
        })
    }

    /// Combined registry, loader and catalogue statistics.
    pub async fn get_stats(&self) -> ManagerStats {
        let loader = self.loader.lock().await.stats();
        let (state, initialized_at, initialization_time_ms) = {
            let lifecycle = self.lifecycle.read();
            (
                lifecycle.state,
                lifecycle.initialized_at,
                lifecycle.initialization_time_ms,
            )
        };

        ManagerStats {
            state,
            initialized: state == ManagerState::Ready,
            initialized_at,
            initialization_time_ms,
            environment: self.config.server.environment.clone(),
            registry: self.registry.stats(),
            loader,
            middleware: self.catalogue.stats(),
        }
    }

    /// Metrics of one path, or the full overview when `route_path` is `None`.
    #[must_use]
    pub fn get_metrics(&self, route_path: Option<&str>) -> MetricsView {
        match route_path {
            Some(path) => MetricsView::Route(self.registry.get_metrics(path)),
            None => MetricsView::All(self.registry.get_all_metrics()),
        }
    }

    /// Registered routes, load errors and lifecycle state.
    pub async fn get_status(&self) -> ManagerStatus {
        let load_errors = self.loader.lock().await.errors().to_vec();
        let (state, initialization_time_ms) = {
            let lifecycle = self.lifecycle.read();
            (lifecycle.state, lifecycle.initialization_time_ms)
        };

        ManagerStatus {
            state,
            initialized: state == ManagerState::Ready,
            initialization_time_ms,
            environment: self.config.server.environment.clone(),
            routes: self.registry.list_all(),
            load_errors,
            global_middleware: self.catalogue.stats().applied_globally,
        }
    }

    /// Unmounts every registered route and clears the registry and loader.
    ///
    /// Safe to call before `initialize` and more than once. The manager
    /// cannot be initialized afterwards.
    pub async fn shutdown(&self) {
        let _transition = self.transition.lock().await;

        let routes = self.registry.list_all();
        for entry in &routes {
            self.host.unmount(&entry.route_path);
        }
        self.registry.clear();
        self.loader.lock().await.clear();

        self.lifecycle.write().state = ManagerState::ShutDown;
        switchyard_telemetry::set_registered_routes(0);
        tracing::info!(routes = routes.len(), "route manager shut down");
    }
}

struct AccessRecorder<H: HostServer> {
    manager: Weak<RouteManager<H>>,
}

impl<H: HostServer> AccessObserver for AccessRecorder<H> {
    fn record(&self, route_path: &str, duration_ms: f64, status: u16, is_error: bool) {
        if let Some(manager) = self.manager.upgrade() {
            manager.record_access(route_path, duration_ms, status, is_error);
        }
    }
}

/// Registry and mount key for `path`: trailing slashes dropped, root kept.
fn route_key(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() && path.starts_with('/') {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn wrap(handler: Arc<dyn HandlerCollection>, stack: Vec<Arc<dyn Middleware>>) -> Arc<dyn HandlerCollection> {
    if stack.is_empty() {
        handler
    } else {
        Arc::new(Layered::new(handler, stack))
    }
}

fn discovery_settings(routes: &RoutesConfig) -> DiscoverySettings {
    let defaults = DiscoverySettings::default();
    DiscoverySettings {
        extensions: routes.file_extensions.clone(),
        exclude_patterns: routes
            .exclude_patterns
            .clone()
            .unwrap_or(defaults.exclude_patterns),
        strip_suffixes: routes
            .strip_suffixes
            .clone()
            .unwrap_or(defaults.strip_suffixes),
        path_overrides: routes
            .path_overrides
            .clone()
            .unwrap_or(defaults.path_overrides),
    }
}

fn default_settings(config: &SwitchyardConfig) -> DefaultSettings {
    let middleware = &config.middleware;
    DefaultSettings {
        environment: config.server.environment.clone(),
        cors_origins: middleware.cors.origins.clone(),
        compression_min_size: middleware.compression.min_size,
        rate_limit: middleware.rate_limit.limit,
        rate_limit_window: Duration::from_secs(middleware.rate_limit.window_secs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use switchyard_config::{MiddlewareConfig, RoutesConfig};
    use switchyard_core::{FnCollection, FnMiddleware, MountError, Request};
    use switchyard_loader::StaticProvider;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingHost {
        mounts: Mutex<BTreeMap<String, Arc<dyn HandlerCollection>>>,
        middleware: Mutex<Vec<&'static str>>,
    }

    impl RecordingHost {
        fn mounted(&self) -> Vec<String> {
            self.mounts.lock().keys().cloned().collect()
        }
    }

    impl HostServer for RecordingHost {
        fn mount(&self, path: &str, collection: Arc<dyn HandlerCollection>) -> Result<(), MountError> {
            if !path.starts_with('/') {
                return Err(MountError::InvalidPath(path.to_string()));
            }
            self.mounts.lock().insert(path.to_string(), collection);
            Ok(())
        }

        fn unmount(&self, path: &str) -> bool {
            self.mounts.lock().remove(path).is_some()
        }

        fn use_middleware(&self, middleware: Arc<dyn Middleware>) {
            self.middleware.lock().push(middleware.name());
        }
    }

    fn ok_collection() -> Arc<dyn HandlerCollection> {
        Arc::new(FnCollection::new(|_ctx, _req: Request| async {
            http::Response::new(http_body_util::Full::new(bytes::Bytes::from("ok")))
        }))
    }

    fn routes_dir(files: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for file in files {
            let path = dir.path().join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, "module.exports = router;").unwrap();
        }
        dir
    }

    fn config_for(dir: &Path) -> SwitchyardConfig {
        SwitchyardConfig {
            routes: RoutesConfig {
                directory: dir.display().to_string(),
                ..RoutesConfig::default()
            },
            ..SwitchyardConfig::default()
        }
    }

    fn provider(keys: &[&str]) -> Arc<StaticProvider> {
        let mut provider = StaticProvider::new();
        for key in keys {
            provider.register_collection(*key, ok_collection());
        }
        Arc::new(provider)
    }

    fn manager(dir: &Path, keys: &[&str]) -> (Arc<RecordingHost>, RouteManager<RecordingHost>) {
        let host = Arc::new(RecordingHost::default());
        let manager = RouteManager::new(Arc::clone(&host), config_for(dir), provider(keys)).unwrap();
        (host, manager)
    }

    #[tokio::test]
    async fn test_initialize_registers_discovered_modules() {
        let dir = routes_dir(&["auth-routes.js", "person.js", "index.js", "broken.js"]);
        let (host, manager) = manager(dir.path(), &["auth", "person"]);

        manager.initialize().await.unwrap();

        assert_eq!(manager.state(), ManagerState::Ready);
        assert_eq!(host.mounted(), vec!["/auth", "/persons"]);
        assert!(manager.registry().has("/auth", None));
        assert_eq!(manager.registry().get("/persons", None).unwrap().module_name, "person");

        let stats = manager.get_stats().await;
        assert!(stats.initialized);
        assert!(stats.initialization_time_ms.is_some());
        assert_eq!(stats.registry.registered, 2);
        assert_eq!(stats.loader.total_errors, 1);
        assert_eq!(stats.environment, "development");
    }

    #[tokio::test]
    async fn test_initialize_applies_global_middleware_once() {
        let dir = routes_dir(&[]);
        let (host, manager) = manager(dir.path(), &[]);

        manager.initialize().await.unwrap();
        manager.initialize().await.unwrap();

        assert_eq!(
            *host.middleware.lock(),
            vec!["security-headers", "cors", "compression", "access-log", "response-time"]
        );
    }

    #[tokio::test]
    async fn test_initialize_missing_directory_reverts_state() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let (_host, manager) = manager(&missing, &[]);

        let err = manager.initialize().await.unwrap_err();
        assert!(matches!(err, ManagerError::Discovery(_)));
        assert_eq!(manager.state(), ManagerState::Uninitialized);
        assert!(manager.get_stats().await.initialization_time_ms.is_none());
    }

    #[tokio::test]
    async fn test_initialize_without_auto_load() {
        let dir = routes_dir(&["auth.js"]);
        let host = Arc::new(RecordingHost::default());
        let mut config = config_for(dir.path());
        config.routes.auto_load = false;
        config.middleware = MiddlewareConfig {
            apply_global: false,
            ..MiddlewareConfig::default()
        };
        let manager = RouteManager::new(Arc::clone(&host), config, provider(&["auth"])).unwrap();

        manager.initialize().await.unwrap();
        assert!(manager.is_initialized());
        assert!(host.mounted().is_empty());
        assert!(host.middleware.lock().is_empty());
    }

    #[tokio::test]
    async fn test_initialize_after_shutdown_fails() {
        let dir = routes_dir(&["auth.js"]);
        let (host, manager) = manager(dir.path(), &["auth"]);

        manager.initialize().await.unwrap();
        manager.shutdown().await;

        assert_eq!(manager.state(), ManagerState::ShutDown);
        assert!(host.mounted().is_empty());
        assert_eq!(manager.registry().route_count(), 0);
        assert!(matches!(manager.initialize().await, Err(ManagerError::ShutDown)));
        assert!(!manager.register_custom("/late", ok_collection(), CustomRoute::default()));
    }

    #[tokio::test]
    async fn test_shutdown_before_initialize() {
        let dir = routes_dir(&[]);
        let (_host, manager) = manager(dir.path(), &[]);
        manager.shutdown().await;
        manager.shutdown().await;
        assert_eq!(manager.state(), ManagerState::ShutDown);
    }

    #[tokio::test]
    async fn test_register_custom_versioned_with_middleware() {
        let dir = routes_dir(&[]);
        let (host, manager) = manager(dir.path(), &[]);

        let audit: Arc<dyn Middleware> = Arc::new(FnMiddleware::new("audit", |ctx, req, next| {
            Box::pin(async move { next.run(ctx, req).await })
        }));
        let route = CustomRoute::versioned("v2")
            .with_catalogue("rate-limit")
            .with_catalogue("missing")
            .with_middleware(audit)
            .with_validation("POST", serde_json::json!({ "type": "object" }));

        assert!(manager.register_custom("/users", ok_collection(), route));
        assert_eq!(host.mounted(), vec!["/api/v2/users"]);

        let entry = manager.registry().get("/api/v2/users", Some("v2")).unwrap();
        assert_eq!(entry.middleware_names, vec!["rate-limit", "audit"]);
        assert!(entry.has_validation);
        assert!(manager
            .registry()
            .get_validation_schema("/api/v2/users", "post")
            .is_some());
        assert_eq!(
            manager.catalogue().route_binding("/api/v2/users"),
            Some(vec!["rate-limit".to_string()])
        );
    }

    #[tokio::test]
    async fn test_register_custom_rejects_invalid_path() {
        let dir = routes_dir(&[]);
        let (host, manager) = manager(dir.path(), &[]);

        assert!(!manager.register_custom("no-slash", ok_collection(), CustomRoute::default()));
        assert!(host.mounted().is_empty());
        assert_eq!(manager.registry().stats().errors, 1);
    }

    #[tokio::test]
    async fn test_load_versioned_with_version_middleware() {
        let dir = routes_dir(&["v1/auth.js", "v1/orders-routes.js"]);
        let host = Arc::new(RecordingHost::default());
        let mut config = config_for(dir.path());
        config.middleware.versions = BTreeMap::from([(
            "v1".to_string(),
            vec!["rate-limit".to_string()],
        )]);
        let manager = RouteManager::new(
            Arc::clone(&host),
            config,
            provider(&["v1/auth", "orders"]),
        )
        .unwrap();

        manager.initialize().await.unwrap();
        let registered = manager.load_versioned("v1").await.unwrap();

        assert_eq!(registered, vec!["/api/v1/auth", "/api/v1/orders"]);
        let entry = manager.registry().get("/api/v1/auth", Some("v1")).unwrap();
        assert_eq!(entry.middleware_names, vec!["rate-limit"]);
        assert_eq!(manager.registry().stats().versions, 1);
    }

    #[tokio::test]
    async fn test_load_versioned_missing_directory() {
        let dir = routes_dir(&[]);
        let (_host, manager) = manager(dir.path(), &[]);
        assert!(manager.load_versioned("v9").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reload_route_failure_leaves_route_absent() {
        let dir = routes_dir(&["auth.js"]);
        let (host, manager) = manager(dir.path(), &["auth"]);
        manager.initialize().await.unwrap();

        assert!(manager.reload_route("/auth").await);
        assert_eq!(host.mounted(), vec!["/auth"]);

        std::fs::remove_file(dir.path().join("auth.js")).unwrap();
        assert!(!manager.reload_route("/auth").await);
        assert!(host.mounted().is_empty());
        assert!(!manager.registry().has("/auth", None));
    }

    #[tokio::test]
    async fn test_initialize_twice_keeps_first_result() {
        let dir = routes_dir(&["auth-routes.js", "person.js"]);
        let (host, manager) = manager(dir.path(), &["auth", "person"]);

        manager.initialize().await.unwrap();
        let routes: Vec<String> = manager
            .registry()
            .list_all()
            .into_iter()
            .map(|e| e.route_path)
            .collect();
        let first = manager.get_stats().await;

        manager.initialize().await.unwrap();
        let second = manager.get_stats().await;

        let routes_after: Vec<String> = manager
            .registry()
            .list_all()
            .into_iter()
            .map(|e| e.route_path)
            .collect();
        assert_eq!(routes_after, routes);
        assert_eq!(host.mounted(), vec!["/auth", "/persons"]);
        assert_eq!(second.registry.registered, first.registry.registered);
        assert_eq!(second.registry.registered, 2);
        assert_eq!(second.initialization_time_ms, first.initialization_time_ms);
        assert_eq!(second.initialized_at, first.initialized_at);
    }

    #[tokio::test]
    async fn test_reload_route_ignores_custom_routes() {
        let dir = routes_dir(&[]);
        let (host, manager) = manager(dir.path(), &[]);
        manager.initialize().await.unwrap();

        assert!(manager.register_custom("/users", ok_collection(), CustomRoute::versioned("v2")));
        assert!(!manager.reload_route("/api/v2/users").await);

        assert_eq!(host.mounted(), vec!["/api/v2/users"]);
        assert!(manager.registry().has("/api/v2/users", Some("v2")));
    }

    #[tokio::test]
    async fn test_trailing_slash_uses_one_route_key() {
        let dir = routes_dir(&[]);
        let (host, manager) = manager(dir.path(), &[]);

        assert!(manager.register_custom("/people/", ok_collection(), CustomRoute::default()));
        assert_eq!(host.mounted(), vec!["/people"]);
        assert!(manager.registry().has("/people", None));
        assert!(!manager.registry().has("/people/", None));

        manager.record_access("/people", 3.0, 200, false);
        assert_eq!(manager.registry().get("/people", None).unwrap().access_count, 1);
        assert_eq!(manager.registry().get_metrics("/people").unwrap().count, 1);
        assert!(manager.registry().get_metrics("/people/").is_none());
        assert_eq!(manager.registry().get_all_metrics().routes.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_module_recovers_on_reload() {
        let dir = routes_dir(&["auth.js"]);
        let fixed = Arc::new(AtomicBool::new(false));
        let mut provider = StaticProvider::new();
        let flag = Arc::clone(&fixed);
        provider.register("auth", move |_| {
            if flag.load(Ordering::SeqCst) {
                Ok(switchyard_loader::ModuleExports::with_default(ok_collection()))
            } else {
                Err(switchyard_loader::ProviderError::Failed("syntax error".to_string()))
            }
        });
        let host = Arc::new(RecordingHost::default());
        let manager = RouteManager::new(Arc::clone(&host), config_for(dir.path()), Arc::new(provider)).unwrap();

        manager.initialize().await.unwrap();
        assert!(host.mounted().is_empty());

        fixed.store(true, Ordering::SeqCst);
        assert!(manager.reload_source(&dir.path().join("auth.js")).await);
        assert_eq!(host.mounted(), vec!["/auth"]);
        assert!(manager.registry().has("/auth", None));
    }

    #[tokio::test]
    async fn test_reload_source_resolves_route() {
        let dir = routes_dir(&["auth-routes.js"]);
        let (_host, manager) = manager(dir.path(), &["auth"]);
        manager.initialize().await.unwrap();

        assert!(manager.reload_source(&dir.path().join("auth-routes.js")).await);
        assert!(!manager.reload_source(&PathBuf::from("/elsewhere/other.js")).await);
    }

    #[tokio::test]
    async fn test_record_access_and_metrics_view() {
        let dir = routes_dir(&["auth.js"]);
        let (_host, manager) = manager(dir.path(), &["auth"]);
        manager.initialize().await.unwrap();

        manager.record_access("/auth", 20.0, 200, false);
        manager.record_access("/auth", 40.0, 500, true);

        match manager.get_metrics(Some("/auth")) {
            MetricsView::Route(Some(metrics)) => {
                assert_eq!(metrics.count, 2);
                assert_eq!(metrics.error_count, 1);
            }
            other => panic!("unexpected view: {other:?}"),
        }
        assert!(matches!(manager.get_metrics(Some("/none")), MetricsView::Route(None)));
        assert!(matches!(manager.get_metrics(None), MetricsView::All(_)));
    }

    #[tokio::test]
    async fn test_record_access_disabled() {
        let dir = routes_dir(&["auth.js"]);
        let host = Arc::new(RecordingHost::default());
        let mut config = config_for(dir.path());
        config.metrics.enabled = false;
        let manager = RouteManager::new(host, config, provider(&["auth"])).unwrap();
        manager.initialize().await.unwrap();

        manager.record_access("/auth", 20.0, 200, false);
        assert_eq!(manager.registry().get_metrics("/auth").unwrap().count, 0);
    }

    #[tokio::test]
    async fn test_access_recorder_forwards() {
        let dir = routes_dir(&["auth.js"]);
        let (_host, manager) = manager(dir.path(), &["auth"]);
        let manager = Arc::new(manager);
        manager.initialize().await.unwrap();

        let recorder = manager.access_recorder();
        recorder.record("/auth", 5.0, 201, false);
        assert_eq!(manager.registry().get_metrics("/auth").unwrap().count, 1);

        drop(manager);
        recorder.record("/auth", 5.0, 201, false);
    }

    #[tokio::test]
    async fn test_get_status() {
        let dir = routes_dir(&["auth.js", "broken.js"]);
        let (_host, manager) = manager(dir.path(), &["auth"]);
        manager.initialize().await.unwrap();

        let status = manager.get_status().await;
        assert_eq!(status.state, ManagerState::Ready);
        assert_eq!(status.routes.len(), 1);
        assert_eq!(status.load_errors.len(), 1);
        assert_eq!(status.global_middleware.len(), 5);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "ready");
    }

    #[test]
    fn test_invalid_exclude_pattern() {
        let host = Arc::new(RecordingHost::default());
        let mut config = SwitchyardConfig::default();
        config.routes.exclude_patterns = Some(vec!["(".to_string()]);
        let result = RouteManager::new(host, config, Arc::new(StaticProvider::new()));
        assert!(matches!(result, Err(ManagerError::Discovery(_))));
    }

    #[test]
    fn test_custom_route_debug() {
        let route = CustomRoute::versioned("v1").with_catalogue("cors");
        let debug = format!("{route:?}");
        assert!(debug.contains("v1"));
        assert!(debug.contains("cors"));
    }

    #[test]
    fn test_manager_is_send_sync() {
        fn check<T: Send + Sync>() {}
        check::<RouteManager<RecordingHost>>();
    }
}
