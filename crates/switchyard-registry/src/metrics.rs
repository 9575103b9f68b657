//! Per-route traffic metrics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Requests strictly slower than this many milliseconds are slow.
pub const SLOW_REQUEST_THRESHOLD_MS: f64 = 1000.0;

/// Traffic counters for one route path.
///
/// `average_duration` is recomputed from the totals on every update, so it
/// is always exactly `total_duration / count`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteMetrics {
    /// Requests observed.
    pub count: u64,
    /// Sum of request durations, in milliseconds.
    pub total_duration: f64,
    /// Mean request duration, in milliseconds.
    pub average_duration: f64,
    /// Requests reported as errors.
    pub error_count: u64,
    /// Requests slower than [`SLOW_REQUEST_THRESHOLD_MS`].
    pub slow_request_count: u64,
    /// Occurrences per status code.
    pub status_codes: BTreeMap<u16, u64>,
    /// Time of the most recent request.
    pub last_accessed: Option<DateTime<Utc>>,
    /// When tracking started.
    pub created_at: DateTime<Utc>,
}

impl Default for RouteMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteMetrics {
    /// Zeroed metrics.
    #[must_use]
    pub fn new() -> Self {
        Self {
            count: 0,
            total_duration: 0.0,
            average_duration: 0.0,
            error_count: 0,
            slow_request_count: 0,
            status_codes: BTreeMap::new(),
            last_accessed: None,
            created_at: Utc::now(),
        }
    }

    /// Folds one completed request into the counters.
    ///
    /// Returns whether the request counted as slow.
    pub fn record(
        &mut self,
        duration_ms: f64,
        status_code: u16,
        is_error: bool,
        at: DateTime<Utc>,
    ) -> bool {
        self.count += 1;
        self.total_duration += duration_ms;
        self.average_duration = self.total_duration / self.count as f64;
        self.last_accessed = Some(at);

        if is_error {
            self.error_count += 1;
        }

        let slow = duration_ms > SLOW_REQUEST_THRESHOLD_MS;
        if slow {
            self.slow_request_count += 1;
        }

        *self.status_codes.entry(status_code).or_insert(0) += 1;
        slow
    }

    /// A snapshot with derived rates.
    #[must_use]
    pub fn snapshot(&self) -> RouteMetricsSnapshot {
        RouteMetricsSnapshot {
            count: self.count,
            total_duration: self.total_duration,
            average_duration: self.average_duration,
            error_count: self.error_count,
            slow_request_count: self.slow_request_count,
            error_rate: percentage(self.error_count, self.count),
            slow_request_rate: percentage(self.slow_request_count, self.count),
            status_codes: self.status_codes.clone(),
            last_accessed: self.last_accessed,
            created_at: self.created_at,
        }
    }
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Read-only view of [`RouteMetrics`] with derived rates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteMetricsSnapshot {
    /// Requests observed.
    pub count: u64,
    /// Sum of request durations, in milliseconds.
    pub total_duration: f64,
    /// Mean request duration, in milliseconds.
    pub average_duration: f64,
    /// Requests reported as errors.
    pub error_count: u64,
    /// Slow requests.
    pub slow_request_count: u64,
    /// `error_count / count` as a percentage; 0 without traffic.
    pub error_rate: f64,
    /// `slow_request_count / count` as a percentage; 0 without traffic.
    pub slow_request_rate: f64,
    /// Occurrences per status code.
    pub status_codes: BTreeMap<u16, u64>,
    /// Time of the most recent request.
    pub last_accessed: Option<DateTime<Utc>>,
    /// When tracking started.
    pub created_at: DateTime<Utc>,
}
