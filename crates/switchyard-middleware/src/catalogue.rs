//! Named middleware catalogue.
//!
//! The catalogue maps names to middleware instances, installs an ordered
//! subset globally on a [`HostServer`], and resolves per-route and
//! per-version bundles. Each successful lookup counts as one use.

use crate::stages::{
    AccessLogMiddleware, CompressionMiddleware, CorsMiddleware, RateLimitMiddleware,
    ResponseTimeMiddleware, SecurityHeadersMiddleware,
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use switchyard_core::{HostServer, Middleware};

/// Middleware installed by [`MiddlewareCatalogue::apply_global`] when no
/// names are given, in installation order.
pub const DEFAULT_GLOBAL_ORDER: [&str; 5] = [
    "security-headers",
    "cors",
    "compression",
    "access-log",
    "response-time",
];

/// A catalogue entry.
pub struct MiddlewareDescriptor {
    /// Unique name.
    pub name: String,
    /// The middleware itself.
    pub handler: Arc<dyn Middleware>,
    /// Free-form options recorded at registration.
    pub options: serde_json::Value,
    /// Registration time.
    pub registered_at: DateTime<Utc>,
    usage_count: AtomicU64,
}

impl MiddlewareDescriptor {
    /// Number of times this entry has been fetched.
    #[must_use]
    pub fn usage_count(&self) -> u64 {
        self.usage_count.load(Ordering::Relaxed)
    }

    fn touch(&self) -> Arc<dyn Middleware> {
        self.usage_count.fetch_add(1, Ordering::Relaxed);
        Arc::clone(&self.handler)
    }
}

impl std::fmt::Debug for MiddlewareDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareDescriptor")
            .field("name", &self.name)
            .field("handler", &self.handler.name())
            .field("options", &self.options)
            .field("registered_at", &self.registered_at)
            .field("usage_count", &self.usage_count())
            .finish()
    }
}

/// Settings for the default middleware set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultSettings {
    /// Deployment environment; controls the content security policy.
    pub environment: String,
    /// Allowed CORS origins. Empty reflects any origin.
    pub cors_origins: Vec<String>,
    /// Minimum body size for compression, in bytes.
    pub compression_min_size: usize,
    /// Requests per rate-limit window.
    pub rate_limit: u64,
    /// Rate-limit window length.
    pub rate_limit_window: Duration,
}

impl Default for DefaultSettings {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            cors_origins: Vec::new(),
            compression_min_size: crate::stages::compression::DEFAULT_MIN_SIZE,
            rate_limit: crate::stages::rate_limit::DEFAULT_LIMIT,
            rate_limit_window: crate::stages::rate_limit::DEFAULT_WINDOW,
        }
    }
}

/// Point-in-time catalogue statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogueStats {
    /// Registered entries.
    pub total: usize,
    /// Names installed globally, in order.
    pub applied_globally: Vec<String>,
    /// Routes with a remembered binding.
    pub route_bindings: usize,
    /// Versions with a remembered binding.
    pub version_bindings: usize,
    /// Fetch count per entry.
    pub usage: BTreeMap<String, u64>,
}

#[derive(Default)]
struct CatalogueState {
    entries: IndexMap<String, MiddlewareDescriptor>,
    applied_globally: Vec<String>,
    route_bindings: HashMap<String, Vec<String>>,
    version_bindings: HashMap<String, Vec<String>>,
}

/// Thread-safe name-to-middleware catalogue.
#[derive(Default)]
pub struct MiddlewareCatalogue {
    state: RwLock<CatalogueState>,
}

impl std::fmt::Debug for MiddlewareCatalogue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("MiddlewareCatalogue")
            .field("entries", &state.entries.keys().collect::<Vec<_>>())
            .field("applied_globally", &state.applied_globally)
            .finish()
    }
}

impl MiddlewareCatalogue {
    /// Creates an empty catalogue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalogue holding the six default middleware.
    #[must_use]
    pub fn with_defaults(settings: &DefaultSettings) -> Self {
        let catalogue = Self::new();

        let cors = settings
            .cors_origins
            .iter()
            .fold(CorsMiddleware::builder(), |b, origin| b.allow_origin(origin.clone()))
            .build();
        let compression = CompressionMiddleware::builder()
            .min_size(settings.compression_min_size)
            .build();
        let rate_limit = RateLimitMiddleware::builder()
            .limit(settings.rate_limit)
            .window(settings.rate_limit_window)
            .build();

        let defaults: [(&str, Arc<dyn Middleware>, serde_json::Value); 6] = [
            (
                "security-headers",
                Arc::new(SecurityHeadersMiddleware::for_environment(&settings.environment)),
                serde_json::json!({ "environment": settings.environment }),
            ),
            (
                "cors",
                Arc::new(cors),
                serde_json::json!({ "origins": settings.cors_origins, "credentials": true }),
            ),
            (
                "compression",
                Arc::new(compression),
                serde_json::json!({ "min_size": settings.compression_min_size }),
            ),
            (
                "rate-limit",
                Arc::new(rate_limit),
                serde_json::json!({
                    "limit": settings.rate_limit,
                    "window_secs": settings.rate_limit_window.as_secs(),
                }),
            ),
            (
                "access-log",
                Arc::new(AccessLogMiddleware::new()),
                serde_json::Value::Null,
            ),
            (
                "response-time",
                Arc::new(ResponseTimeMiddleware::new()),
                serde_json::Value::Null,
            ),
        ];

        for (name, handler, options) in defaults {
            catalogue.register(name, handler, options);
        }
        catalogue
    }

    /// Registers `handler` under `name`, replacing any previous entry.
    ///
    /// Returns `false` for a blank name.
    pub fn register(
        &self,
        name: &str,
        handler: Arc<dyn Middleware>,
        options: serde_json::Value,
    ) -> bool {
        let name = name.trim();
        if name.is_empty() {
            tracing::warn!("rejected middleware registration with a blank name");
            return false;
        }

        let descriptor = MiddlewareDescriptor {
            name: name.to_string(),
            handler,
            options,
            registered_at: Utc::now(),
            usage_count: AtomicU64::new(0),
        };

        if self
            .state
            .write()
            .entries
            .insert(name.to_string(), descriptor)
            .is_some()
        {
            tracing::debug!(middleware = %name, "replaced middleware");
        } else {
            tracing::debug!(middleware = %name, "registered middleware");
        }
        true
    }

    /// Fetches a middleware, counting the use.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Middleware>> {
        self.state.read().entries.get(name).map(MiddlewareDescriptor::touch)
    }

    /// Returns whether `name` is registered. Does not count as a use.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.state.read().entries.contains_key(name)
    }

    /// Usage count of one entry.
    #[must_use]
    pub fn usage_count(&self, name: &str) -> Option<u64> {
        self.state
            .read()
            .entries
            .get(name)
            .map(MiddlewareDescriptor::usage_count)
    }

    /// Options recorded for one entry.
    #[must_use]
    pub fn options(&self, name: &str) -> Option<serde_json::Value> {
        self.state.read().entries.get(name).map(|d| d.options.clone())
    }

    /// Installs middleware on `host` in order and returns how many were installed.
    ///
    /// With `names == None` the [`DEFAULT_GLOBAL_ORDER`] is used. Unknown names
    /// are skipped with a warning.
    pub fn apply_global<H>(&self, host: &H, names: Option<&[&str]>) -> usize
    where
        H: HostServer + ?Sized,
    {
        let names = names.unwrap_or(&DEFAULT_GLOBAL_ORDER);
        let mut installed = 0;

        for name in names {
            let Some(handler) = self.get(name) else {
                tracing::warn!(middleware = %name, "global middleware not found, skipping");
                continue;
            };
            host.use_middleware(handler);
            self.state.write().applied_globally.push((*name).to_string());
            installed += 1;
        }

        tracing::info!(count = installed, "applied global middleware");
        installed
    }

    /// Resolves middleware for one route, dropping unknown names.
    ///
    /// The binding is remembered only when at least one name resolved.
    pub fn apply_to_route(&self, route_path: &str, names: &[&str]) -> Vec<Arc<dyn Middleware>> {
        let (resolved, found) = self.resolve(names);
        if !resolved.is_empty() {
            self.state
                .write()
                .route_bindings
                .insert(route_path.to_string(), found);
        }
        resolved
    }

    /// Resolves middleware for one API version, dropping unknown names.
    pub fn apply_to_version(&self, version: &str, names: &[&str]) -> Vec<Arc<dyn Middleware>> {
        let (resolved, found) = self.resolve(names);
        if !resolved.is_empty() {
            self.state
                .write()
                .version_bindings
                .insert(version.to_string(), found);
        }
        resolved
    }

    fn resolve(&self, names: &[&str]) -> (Vec<Arc<dyn Middleware>>, Vec<String>) {
        let mut resolved = Vec::with_capacity(names.len());
        let mut found = Vec::with_capacity(names.len());
        for name in names {
            if let Some(handler) = self.get(name) {
                resolved.push(handler);
                found.push((*name).to_string());
            } else {
                tracing::debug!(middleware = %name, "unknown middleware dropped");
            }
        }
        (resolved, found)
    }

    /// Names bound to a route by [`apply_to_route`](Self::apply_to_route).
    #[must_use]
    pub fn route_binding(&self, route_path: &str) -> Option<Vec<String>> {
        self.state.read().route_bindings.get(route_path).cloned()
    }

    /// Names bound to a version by [`apply_to_version`](Self::apply_to_version).
    #[must_use]
    pub fn version_binding(&self, version: &str) -> Option<Vec<String>> {
        self.state.read().version_bindings.get(version).cloned()
    }

    /// Registered names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.state.read().entries.keys().cloned().collect()
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> CatalogueStats {
        let state = self.state.read();
        CatalogueStats {
            total: state.entries.len(),
            applied_globally: state.applied_globally.clone(),
            route_bindings: state.route_bindings.len(),
            version_bindings: state.version_bindings.len(),
            usage: state
                .entries
                .iter()
                .map(|(name, d)| (name.clone(), d.usage_count()))
                .collect(),
        }
    }

    /// Removes one entry. Existing installations are unaffected.
    pub fn remove(&self, name: &str) -> bool {
        self.state.write().entries.shift_remove(name).is_some()
    }

    /// Removes every entry and binding.
    pub fn clear(&self) {
        *self.state.write() = CatalogueState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::{
        BoxFuture, HandlerCollection, MountError, Next, Request, RequestContext, Response,
    };

    #[derive(Default)]
    struct RecordingHost {
        installed: parking_lot::Mutex<Vec<&'static str>>,
    }

    impl HostServer for RecordingHost {
        fn mount(
            &self,
            _path: &str,
            _collection: Arc<dyn HandlerCollection>,
        ) -> Result<(), MountError> {
            Ok(())
        }

        fn unmount(&self, _path: &str) -> bool {
            false
        }

        fn use_middleware(&self, middleware: Arc<dyn Middleware>) {
            self.installed.lock().push(middleware.name());
        }
    }

    struct Named(&'static str);

    impl Middleware for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut RequestContext,
            request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, Response> {
            Box::pin(next.run(ctx, request))
        }
    }

    fn defaults() -> MiddlewareCatalogue {
        MiddlewareCatalogue::with_defaults(&DefaultSettings::default())
    }

    #[test]
    fn test_with_defaults_registers_six() {
        let catalogue = defaults();
        assert_eq!(
            catalogue.names(),
            vec![
                "security-headers",
                "cors",
                "compression",
                "rate-limit",
                "access-log",
                "response-time"
            ]
        );
        assert_eq!(
            catalogue.options("rate-limit").unwrap()["limit"],
            serde_json::json!(100)
        );
    }

    #[test]
    fn test_register_rejects_blank_name() {
        let catalogue = MiddlewareCatalogue::new();
        assert!(!catalogue.register("  ", Arc::new(Named("x")), serde_json::Value::Null));
        assert_eq!(catalogue.stats().total, 0);
    }

    #[test]
    fn test_register_overwrites() {
        let catalogue = MiddlewareCatalogue::new();
        assert!(catalogue.register("auth", Arc::new(Named("first")), serde_json::Value::Null));
        assert!(catalogue.register("auth", Arc::new(Named("second")), serde_json::Value::Null));

        assert_eq!(catalogue.stats().total, 1);
        assert_eq!(catalogue.get("auth").unwrap().name(), "second");
    }

    #[test]
    fn test_get_counts_usage() {
        let catalogue = defaults();
        assert_eq!(catalogue.usage_count("cors"), Some(0));

        let _ = catalogue.get("cors");
        let _ = catalogue.get("cors");
        assert!(catalogue.get("missing").is_none());
        assert!(catalogue.contains("cors"));

        assert_eq!(catalogue.usage_count("cors"), Some(2));
        assert_eq!(catalogue.stats().usage["cors"], 2);
    }

    #[test]
    fn test_apply_global_default_order() {
        let catalogue = defaults();
        let host = RecordingHost::default();

        let installed = catalogue.apply_global(&host, None);
        assert_eq!(installed, 5);
        assert_eq!(
            *host.installed.lock(),
            vec![
                "security-headers",
                "cors",
                "compression",
                "access-log",
                "response-time"
            ]
        );
        assert_eq!(catalogue.stats().applied_globally.len(), 5);
    }

    #[test]
    fn test_apply_global_named_subset_skips_missing() {
        let catalogue = defaults();
        let host = RecordingHost::default();

        let installed =
            catalogue.apply_global(&host, Some(&["response-time", "nope", "rate-limit"][..]));
        assert_eq!(installed, 2);
        assert_eq!(*host.installed.lock(), vec!["response-time", "rate-limit"]);
    }

    #[test]
    fn test_apply_to_route_drops_unknown_and_binds() {
        let catalogue = defaults();

        let resolved = catalogue.apply_to_route("/persons", &["cors", "ghost", "rate-limit"]);
        let names: Vec<_> = resolved.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["cors", "rate-limit"]);
        assert_eq!(
            catalogue.route_binding("/persons").unwrap(),
            vec!["cors", "rate-limit"]
        );

        assert!(catalogue.apply_to_route("/empty", &["ghost"]).is_empty());
        assert!(catalogue.route_binding("/empty").is_none());
        assert_eq!(catalogue.stats().route_bindings, 1);
    }

    #[test]
    fn test_apply_to_version() {
        let catalogue = defaults();
        let resolved = catalogue.apply_to_version("v1", &["rate-limit"]);
        assert_eq!(resolved.len(), 1);
        assert_eq!(catalogue.version_binding("v1").unwrap(), vec!["rate-limit"]);
        assert_eq!(catalogue.stats().version_bindings, 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let catalogue = defaults();
        assert!(catalogue.remove("cors"));
        assert!(!catalogue.remove("cors"));
        assert_eq!(catalogue.stats().total, 5);

        let _ = catalogue.apply_to_route("/persons", &["compression"]);
        catalogue.clear();
        let stats = catalogue.stats();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.route_bindings, 0);
        assert!(stats.applied_globally.is_empty());
    }

    #[test]
    fn test_security_headers_follow_environment() {
        let settings = DefaultSettings {
            environment: "production".to_string(),
            ..DefaultSettings::default()
        };
        let catalogue = MiddlewareCatalogue::with_defaults(&settings);
        assert_eq!(
            catalogue.options("security-headers").unwrap()["environment"],
            "production"
        );
    }
}
