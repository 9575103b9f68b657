//! # Switchyard Registry
//!
//! The authoritative record of what is mounted, keyed by `(route path, version)`,
//! together with live traffic metrics per route path.
//!
//! ```
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use http_body_util::Full;
//! use switchyard_core::{FnCollection, HandlerCollection};
//! use switchyard_registry::{RegisterOptions, RouteRegistry};
//!
//! let registry = RouteRegistry::new();
//! let handler: Arc<dyn HandlerCollection> = Arc::new(FnCollection::new(|_ctx, _req| async {
//!     http::Response::new(Full::new(Bytes::new()))
//! }));
//!
//! registry.register("/persons", handler, RegisterOptions::default().module("person"));
//! registry.record_access("/persons", 12.0, 200, false);
//!
//! assert_eq!(registry.get_metrics("/persons").unwrap().count, 1);
//! ```

#![doc(html_root_url = "https://docs.rs/switchyard-registry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod entry;
mod metrics;
mod registry;
mod snapshot;

pub use entry::{RegisterOptions, RegistryEntry};
pub use metrics::{RouteMetrics, RouteMetricsSnapshot, SLOW_REQUEST_THRESHOLD_MS};
pub use registry::RouteRegistry;
pub use snapshot::{AllMetrics, GlobalCounters, RegistryExport, RegistryStats, StackExport};
