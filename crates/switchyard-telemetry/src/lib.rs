//! Observability for Switchyard.
//!
//! - **Logging**: `tracing` events rendered as JSON or pretty text via `tracing-subscriber`
//! - **Metrics**: Prometheus-format counters and histograms via the `metrics` facade
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `switchyard_requests_total` | Counter | `route`, `status` | Completed requests per mounted route |
//! | `switchyard_request_duration_seconds` | Histogram | `route` | Request latency |
//! | `switchyard_slow_requests_total` | Counter | `route` | Requests slower than one second |
//! | `switchyard_module_loads_total` | Counter | `outcome` | Route module load attempts |
//! | `switchyard_route_registrations_total` | Counter | `outcome` | Route registration attempts |
//! | `switchyard_routes_registered` | Gauge | - | Currently registered routes |
//!
//! Recording functions are no-ops until a recorder is installed with
//! [`init_metrics`], so libraries can call them unconditionally.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::{
    init_metrics, record_module_load, record_registration, record_route_access, render_metrics,
    set_registered_routes, MetricsConfig, SLOW_REQUEST_THRESHOLD_MS,
};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
