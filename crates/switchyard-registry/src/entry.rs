//! Registration metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for one registered route.
///
/// The pair `(route_path, version)` is unique within a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Mount path.
    pub route_path: String,
    /// API version, `None` for unversioned routes.
    pub version: Option<String>,
    /// Name of the module the route came from.
    pub module_name: String,
    /// Number of route-level middleware.
    pub middleware_count: usize,
    /// Names of the route-level middleware, in order.
    pub middleware_names: Vec<String>,
    /// Whether a validation schema is attached.
    pub has_validation: bool,
    /// Registration time.
    pub registered_at: DateTime<Utc>,
    /// Time of the most recent request.
    pub last_accessed: Option<DateTime<Utc>>,
    /// Requests observed since registration.
    pub access_count: u64,
}

/// Options for [`RouteRegistry::register`](crate::RouteRegistry::register).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterOptions {
    /// API version.
    pub version: Option<String>,
    /// Module name; defaults to the route path.
    pub module_name: Option<String>,
    /// Route-level middleware names.
    pub middleware_names: Vec<String>,
    /// Whether a validation schema is attached.
    pub has_validation: bool,
}

impl RegisterOptions {
    /// Options for a route of the given version.
    #[must_use]
    pub fn versioned(version: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            ..Self::default()
        }
    }

    /// Sets the module name.
    #[must_use]
    pub fn module(mut self, name: impl Into<String>) -> Self {
        self.module_name = Some(name.into());
        self
    }

    /// Sets the route-level middleware names.
    #[must_use]
    pub fn middleware<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.middleware_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Marks the route as validated.
    #[must_use]
    pub const fn with_validation(mut self, has_validation: bool) -> Self {
        self.has_validation = has_validation;
        self
    }
}
