//! The route registry.

use crate::entry::{RegisterOptions, RegistryEntry};
use crate::metrics::{RouteMetrics, RouteMetricsSnapshot};
use crate::snapshot::{AllMetrics, GlobalCounters, RegistryExport, RegistryStats, StackExport};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use switchyard_core::{HandlerCollection, Middleware};

type RouteKey = (String, Option<String>);

struct MiddlewareStack {
    handlers: Vec<Arc<dyn Middleware>>,
    usage_count: AtomicU64,
    registered_at: DateTime<Utc>,
}

#[derive(Default)]
struct RegistryState {
    routes: BTreeMap<String, RegistryEntry>,
    versions: BTreeMap<String, BTreeMap<String, RegistryEntry>>,
    handlers: HashMap<RouteKey, Arc<dyn HandlerCollection>>,
    stacks: BTreeMap<String, MiddlewareStack>,
    schemas: BTreeMap<String, serde_json::Value>,
    counters: GlobalCounters,
}

impl RegistryState {
    fn entry_mut(&mut self, route_path: &str) -> Option<&mut RegistryEntry> {
        if self.routes.contains_key(route_path) {
            return self.routes.get_mut(route_path);
        }
        self.versions
            .values_mut()
            .find_map(|routes| routes.get_mut(route_path))
    }
}

/// Authoritative map from `(route path, version)` to registration metadata,
/// plus live per-path traffic metrics.
///
/// Registration state sits behind one lock. Metrics live in a concurrent
/// map whose per-key locking serialises updates to a single route, so
/// concurrent [`record_access`](Self::record_access) calls never lose counts.
pub struct RouteRegistry {
    state: RwLock<RegistryState>,
    metrics: DashMap<String, RouteMetrics>,
    slow_requests: AtomicU64,
}

impl Default for RouteRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RouteRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteRegistry")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

fn is_valid_route_path(path: &str) -> bool {
    path.starts_with('/') && !path.chars().any(char::is_whitespace)
}

fn schema_key(route_key: &str, method: &str) -> String {
    format!("{}:{route_key}", method.to_ascii_uppercase())
}

impl RouteRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            metrics: DashMap::new(),
            slow_requests: AtomicU64::new(0),
        }
    }

    /// Registers a route, replacing any entry with the same path and version.
    ///
    /// Metrics for the path are created if absent. Returns `false` and counts
    /// an error when the path is not an absolute path or the version is blank.
    pub fn register(
        &self,
        route_path: &str,
        handler: Arc<dyn HandlerCollection>,
        options: RegisterOptions,
    ) -> bool {
        let version_ok = options
            .version
            .as_deref()
            .map_or(true, |v| !v.trim().is_empty());
        if !is_valid_route_path(route_path) || !version_ok {
            self.state.write().counters.errors += 1;
            tracing::warn!(
                route = %route_path,
                version = ?options.version,
                "rejected route registration"
            );
            return false;
        }

        let entry = RegistryEntry {
            route_path: route_path.to_string(),
            version: options.version.clone(),
            module_name: options
                .module_name
                .unwrap_or_else(|| route_path.to_string()),
            middleware_count: options.middleware_names.len(),
            middleware_names: options.middleware_names,
            has_validation: options.has_validation,
            registered_at: Utc::now(),
            last_accessed: None,
            access_count: 0,
        };

        {
            let mut state = self.state.write();
            let replaced = match &options.version {
                Some(version) => {
                    if !state.versions.contains_key(version) {
                        state.counters.versions += 1;
                    }
                    state
                        .versions
                        .entry(version.clone())
                        .or_default()
                        .insert(route_path.to_string(), entry)
                        .is_some()
                }
                None => state
                    .routes
                    .insert(route_path.to_string(), entry)
                    .is_some(),
            };
            if !replaced {
                state.counters.registered += 1;
            }
            state
                .handlers
                .insert((route_path.to_string(), options.version.clone()), handler);
        }

        self.metrics
            .entry(route_path.to_string())
            .or_insert_with(RouteMetrics::new);

        tracing::debug!(route = %route_path, version = ?options.version, "route registered");
        true
    }

    /// Looks up an entry.
    #[must_use]
    pub fn get(&self, route_path: &str, version: Option<&str>) -> Option<RegistryEntry> {
        let state = self.state.read();
        match version {
            Some(v) => state.versions.get(v)?.get(route_path).cloned(),
            None => state.routes.get(route_path).cloned(),
        }
    }

    /// Returns whether an entry exists.
    #[must_use]
    pub fn has(&self, route_path: &str, version: Option<&str>) -> bool {
        let state = self.state.read();
        match version {
            Some(v) => state
                .versions
                .get(v)
                .is_some_and(|routes| routes.contains_key(route_path)),
            None => state.routes.contains_key(route_path),
        }
    }

    /// The handler collection registered for an entry.
    #[must_use]
    pub fn handler(&self, route_path: &str, version: Option<&str>) -> Option<Arc<dyn HandlerCollection>> {
        self.state
            .read()
            .handlers
            .get(&(route_path.to_string(), version.map(String::from)))
            .cloned()
    }

    /// Removes an entry and the metrics for its path.
    ///
    /// Removing the last entry of a version removes the version.
    pub fn unregister(&self, route_path: &str, version: Option<&str>) -> bool {
        let removed = {
            let mut state = self.state.write();
            let removed = match version {
                Some(v) => {
                    let Some(routes) = state.versions.get_mut(v) else {
                        return false;
                    };
                    let removed = routes.remove(route_path).is_some();
                    if removed && routes.is_empty() {
                        state.versions.remove(v);
                        state.counters.versions = state.counters.versions.saturating_sub(1);
                    }
                    removed
                }
                None => state.routes.remove(route_path).is_some(),
            };
            if removed {
                state.counters.registered = state.counters.registered.saturating_sub(1);
                state
                    .handlers
                    .remove(&(route_path.to_string(), version.map(String::from)));
            }
            removed
        };

        if removed {
            self.metrics.remove(route_path);
            tracing::debug!(route = %route_path, version = ?version, "route unregistered");
        }
        removed
    }

    /// Every entry: unversioned first, then each version in order.
    #[must_use]
    pub fn list_all(&self) -> Vec<RegistryEntry> {
        let state = self.state.read();
        state
            .routes
            .values()
            .chain(state.versions.values().flat_map(BTreeMap::values))
            .cloned()
            .collect()
    }

    /// Number of entries, unversioned plus versioned.
    #[must_use]
    pub fn route_count(&self) -> usize {
        let state = self.state.read();
        state.routes.len() + state.versions.values().map(BTreeMap::len).sum::<usize>()
    }

    /// Registers a named, pre-composed middleware list.
    ///
    /// Returns `false` for a blank name.
    pub fn register_middleware_stack(&self, name: &str, handlers: Vec<Arc<dyn Middleware>>) -> bool {
        if name.trim().is_empty() {
            return false;
        }

        let mut state = self.state.write();
        let stack = MiddlewareStack {
            handlers,
            usage_count: AtomicU64::new(0),
            registered_at: Utc::now(),
        };
        if state.stacks.insert(name.to_string(), stack).is_none() {
            state.counters.middleware_stacks_registered += 1;
        }
        true
    }

    /// Fetches a middleware stack, counting the use.
    #[must_use]
    pub fn get_middleware_stack(&self, name: &str) -> Option<Vec<Arc<dyn Middleware>>> {
        let state = self.state.read();
        let stack = state.stacks.get(name)?;
        stack.usage_count.fetch_add(1, Ordering::Relaxed);
        Some(stack.handlers.clone())
    }

    /// Attaches a validation schema to `METHOD:route_key`.
    ///
    /// Returns `false` for a blank key or method.
    pub fn register_validation_schema(
        &self,
        route_key: &str,
        method: &str,
        schema: serde_json::Value,
    ) -> bool {
        if route_key.trim().is_empty() || method.trim().is_empty() {
            return false;
        }
        self.state
            .write()
            .schemas
            .insert(schema_key(route_key, method), schema);
        true
    }

    /// Looks up a validation schema. The method is case-insensitive.
    #[must_use]
    pub fn get_validation_schema(&self, route_key: &str, method: &str) -> Option<serde_json::Value> {
        self.state
            .read()
            .schemas
            .get(&schema_key(route_key, method))
            .cloned()
    }

    /// Records one completed request against `route_path`.
    ///
    /// Metrics are created on first use if the path has none.
    pub fn record_access(&self, route_path: &str, duration_ms: f64, status_code: u16, is_error: bool) {
        let now = Utc::now();
        let slow = self
            .metrics
            .entry(route_path.to_string())
            .or_insert_with(RouteMetrics::new)
            .record(duration_ms, status_code, is_error, now);

        if slow {
            self.slow_requests.fetch_add(1, Ordering::Relaxed);
        }

        if let Some(entry) = self.state.write().entry_mut(route_path) {
            entry.access_count += 1;
            entry.last_accessed = Some(now);
        }
    }

    /// Metrics for one path.
    #[must_use]
    pub fn get_metrics(&self, route_path: &str) -> Option<RouteMetricsSnapshot> {
        self.metrics.get(route_path).map(|m| m.snapshot())
    }

    fn counters(&self, state: &RegistryState) -> GlobalCounters {
        GlobalCounters {
            slow_request_count: self.slow_requests.load(Ordering::Relaxed),
            ..state.counters.clone()
        }
    }

    /// Metrics for every path plus registry-wide counters.
    #[must_use]
    pub fn get_all_metrics(&self) -> AllMetrics {
        let state = self.state.read();
        AllMetrics {
            global: self.counters(&state),
            routes: self
                .metrics
                .iter()
                .map(|m| (m.key().clone(), m.value().snapshot()))
                .collect(),
            middleware_stacks: state.stacks.keys().cloned().collect(),
            validation_schemas: state.schemas.len(),
            total_routes: state.routes.len()
                + state.versions.values().map(BTreeMap::len).sum::<usize>(),
        }
    }

    /// Registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let state = self.state.read();
        let counters = self.counters(&state);
        RegistryStats {
            registered: counters.registered,
            versions: counters.versions,
            middleware_stacks: counters.middleware_stacks_registered,
            validation_schemas: state.schemas.len(),
            metrics_tracked: self.metrics.len(),
            errors: counters.errors,
            slow_request_count: counters.slow_request_count,
        }
    }

    /// A deep, serializable copy of everything except handler collections.
    #[must_use]
    pub fn export(&self) -> RegistryExport {
        let state = self.state.read();
        RegistryExport {
            routes: state.routes.clone(),
            versions: state.versions.clone(),
            middleware_stacks: state
                .stacks
                .iter()
                .map(|(name, stack)| {
                    let export = StackExport {
                        handlers: stack.handlers.iter().map(|m| m.name().to_string()).collect(),
                        usage_count: stack.usage_count.load(Ordering::Relaxed),
                        registered_at: stack.registered_at,
                    };
                    (name.clone(), export)
                })
                .collect(),
            validation_schemas: state.schemas.clone(),
            metrics: self
                .metrics
                .iter()
                .map(|m| (m.key().clone(), m.value().clone()))
                .collect(),
            counters: self.counters(&state),
            exported_at: Utc::now(),
        }
    }

    /// Rebuilds a registry from an export.
    ///
    /// Handler collections are not restored; middleware stacks keep their
    /// names and usage counts but come back empty. Use
    /// [`restore_with`](Self::restore_with) to resolve stack members.
    #[must_use]
    pub fn restore(export: &RegistryExport) -> Self {
        Self::restore_with(export, |_| None)
    }

    /// Rebuilds a registry from an export, resolving stack members by name.
    ///
    /// Names the resolver does not know are dropped from their stack.
    #[must_use]
    pub fn restore_with<F>(export: &RegistryExport, resolve: F) -> Self
    where
        F: Fn(&str) -> Option<Arc<dyn Middleware>>,
    {
        let stacks = export
            .middleware_stacks
            .iter()
            .map(|(name, stack)| {
                let restored = MiddlewareStack {
                    handlers: stack.handlers.iter().filter_map(|h| resolve(h)).collect(),
                    usage_count: AtomicU64::new(stack.usage_count),
                    registered_at: stack.registered_at,
                };
                (name.clone(), restored)
            })
            .collect();

        let state = RegistryState {
            routes: export.routes.clone(),
            versions: export.versions.clone(),
            handlers: HashMap::new(),
            stacks,
            schemas: export.validation_schemas.clone(),
            counters: export.counters.clone(),
        };

        Self {
            state: RwLock::new(state),
            metrics: export
                .metrics
                .iter()
                .map(|(path, m)| (path.clone(), m.clone()))
                .collect(),
            slow_requests: AtomicU64::new(export.counters.slow_request_count),
        }
    }

    /// Removes everything and zeroes the counters.
    pub fn clear(&self) {
        *self.state.write() = RegistryState::default();
        self.metrics.clear();
        self.slow_requests.store(0, Ordering::Relaxed);
    }
}
