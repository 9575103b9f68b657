//! Prometheus metrics for route traffic and route lifecycle.
//!
//! ```rust,ignore
//! use switchyard_telemetry::metrics::{init_metrics, record_route_access, MetricsConfig};
//!
//! init_metrics(&MetricsConfig::default())?;
//! record_route_access("/persons", 200, 12.5);
//! ```

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;

/// Requests above this duration are counted as slow.
pub const SLOW_REQUEST_THRESHOLD_MS: f64 = 1000.0;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics exporter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Whether to install a Prometheus recorder at all.
    pub enabled: bool,

    /// Address of a standalone scrape endpoint. When `None`, metrics are only
    /// available through [`render_metrics`].
    pub listen_addr: Option<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: None,
        }
    }
}

/// Installs the global Prometheus recorder.
///
/// With a `listen_addr` the exporter serves its own scrape endpoint and must
/// be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidAddress` for an unparsable listen address
/// and `TelemetryError::MetricsInit` if a recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    match &config.listen_addr {
        Some(addr) => {
            let addr: SocketAddr = addr
                .parse()
                .map_err(|e| TelemetryError::InvalidAddress(format!("{addr}: {e}")))?;
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()
                .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
        }
        None => {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
            let _ = METRICS_HANDLE.set(handle);
        }
    }

    register_metric_descriptions();
    Ok(())
}

/// Renders metrics in Prometheus text format.
///
/// Returns `None` unless [`init_metrics`] installed a recorder without a listen address.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(
        "switchyard_requests_total",
        "Total number of completed requests per mounted route"
    );
    describe_histogram!(
        "switchyard_request_duration_seconds",
        "Request duration in seconds per mounted route"
    );
    describe_counter!(
        "switchyard_slow_requests_total",
        "Requests that took longer than one second"
    );
    describe_counter!(
        "switchyard_module_loads_total",
        "Route module load attempts by outcome"
    );
    describe_counter!(
        "switchyard_route_registrations_total",
        "Route registration attempts by outcome"
    );
    describe_gauge!(
        "switchyard_routes_registered",
        "Number of currently registered routes"
    );
}

/// Records one completed request against a mounted route.
pub fn record_route_access(route: &str, status_code: u16, duration_ms: f64) {
    counter!(
        "switchyard_requests_total",
        "route" => route.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);

    histogram!(
        "switchyard_request_duration_seconds",
        "route" => route.to_string()
    )
    .record(duration_ms / 1000.0);

    if duration_ms > SLOW_REQUEST_THRESHOLD_MS {
        counter!("switchyard_slow_requests_total", "route" => route.to_string()).increment(1);
    }
}

/// Records the outcome of one module load attempt.
pub fn record_module_load(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("switchyard_module_loads_total", "outcome" => outcome).increment(1);
}

/// Records the outcome of one route registration attempt.
pub fn record_registration(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("switchyard_route_registrations_total", "outcome" => outcome).increment(1);
}

/// Publishes the current number of registered routes.
pub fn set_registered_routes(count: usize) {
    gauge!("switchyard_routes_registered").set(count as f64);
}
