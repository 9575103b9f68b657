//! Serializable read surfaces: statistics, metrics overview and full export.

use crate::entry::RegistryEntry;
use crate::metrics::{RouteMetrics, RouteMetricsSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Registry-wide counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalCounters {
    /// Registered entries, unversioned and versioned.
    pub registered: u64,
    /// Versions with at least one entry.
    pub versions: u64,
    /// Named middleware stacks.
    pub middleware_stacks_registered: u64,
    /// Rejected registrations.
    pub errors: u64,
    /// Slow requests across all routes.
    pub slow_request_count: u64,
}

/// Registry statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Registered entries.
    pub registered: u64,
    /// Versions with at least one entry.
    pub versions: u64,
    /// Named middleware stacks.
    pub middleware_stacks: u64,
    /// Validation schemas.
    pub validation_schemas: usize,
    /// Paths with tracked metrics.
    pub metrics_tracked: usize,
    /// Rejected registrations.
    pub errors: u64,
    /// Slow requests across all routes.
    pub slow_request_count: u64,
}

/// Metrics overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllMetrics {
    /// Registry-wide counters.
    pub global: GlobalCounters,
    /// Metrics per route path.
    pub routes: BTreeMap<String, RouteMetricsSnapshot>,
    /// Names of the registered middleware stacks.
    pub middleware_stacks: Vec<String>,
    /// Validation schemas.
    pub validation_schemas: usize,
    /// Routes, unversioned plus versioned.
    pub total_routes: usize,
}

/// An exported middleware stack. Handlers are recorded by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackExport {
    /// Middleware names, in order.
    pub handlers: Vec<String>,
    /// Fetch count.
    pub usage_count: u64,
    /// Registration time.
    pub registered_at: DateTime<Utc>,
}

/// A deep, serializable copy of registry state.
///
/// Handler collections are not part of an export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryExport {
    /// Unversioned entries by path.
    pub routes: BTreeMap<String, RegistryEntry>,
    /// Versioned entries by version, then path.
    pub versions: BTreeMap<String, BTreeMap<String, RegistryEntry>>,
    /// Middleware stacks by name.
    pub middleware_stacks: BTreeMap<String, StackExport>,
    /// Validation schemas by `METHOD:route` key.
    pub validation_schemas: BTreeMap<String, serde_json::Value>,
    /// Metrics by path.
    pub metrics: BTreeMap<String, RouteMetrics>,
    /// Registry-wide counters.
    pub counters: GlobalCounters,
    /// Export time.
    pub exported_at: DateTime<Utc>,
}
