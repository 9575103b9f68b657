//! Configuration section types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use switchyard_telemetry::{LogConfig, MetricsConfig};

/// HTTP server section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address (e.g. "0.0.0.0:8080").
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Deployment environment. `development`, `local` and `test` relax the
    /// content security policy.
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Request timeout in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            environment: default_environment(),
            request_timeout_ms: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_request_timeout() -> u64 {
    30_000
}

fn default_shutdown_timeout() -> u64 {
    30
}

/// Route discovery and loading section.
///
/// `exclude_patterns`, `strip_suffixes` and `path_overrides` fall back to the
/// loader's built-in rules when unset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RoutesConfig {
    /// Routes root directory.
    #[serde(default = "default_routes_directory")]
    pub directory: String,

    /// Accepted file extensions, including the leading dot.
    #[serde(default = "default_file_extensions")]
    pub file_extensions: Vec<String>,

    /// File-name regexes to skip.
    #[serde(default)]
    pub exclude_patterns: Option<Vec<String>>,

    /// Suffixes stripped from file stems.
    #[serde(default)]
    pub strip_suffixes: Option<Vec<String>>,

    /// Module name to mount path overrides.
    #[serde(default)]
    pub path_overrides: Option<BTreeMap<String, String>>,

    /// Load and register the routes root during initialization.
    #[serde(default = "default_true")]
    pub auto_load: bool,

    /// Upper bound for loading a single module, in milliseconds.
    #[serde(default = "default_load_timeout")]
    pub load_timeout_ms: u64,

    /// Reload modules when their source files change.
    #[serde(default)]
    pub watch: bool,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            directory: default_routes_directory(),
            file_extensions: default_file_extensions(),
            exclude_patterns: None,
            strip_suffixes: None,
            path_overrides: None,
            auto_load: true,
            load_timeout_ms: default_load_timeout(),
            watch: false,
        }
    }
}

fn default_routes_directory() -> String {
    "routes".to_string()
}

fn default_file_extensions() -> Vec<String> {
    vec![".js".to_string()]
}

fn default_load_timeout() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

/// CORS settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins. Empty reflects the request origin.
    #[serde(default)]
    pub origins: Vec<String>,
}

/// Compression settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CompressionConfig {
    /// Smallest body, in bytes, worth compressing.
    #[serde(default = "default_min_size")]
    pub min_size: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            min_size: default_min_size(),
        }
    }
}

fn default_min_size() -> usize {
    1024
}

/// Rate-limit settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Requests per window and client.
    #[serde(default = "default_limit")]
    pub limit: u64,

    /// Window length in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            window_secs: default_window_secs(),
        }
    }
}

fn default_limit() -> u64 {
    100
}

fn default_window_secs() -> u64 {
    900
}

/// Middleware section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MiddlewareConfig {
    /// Install global middleware during initialization.
    #[serde(default = "default_true")]
    pub apply_global: bool,

    /// Global middleware names, in order. Unset uses the default order.
    #[serde(default)]
    pub global: Option<Vec<String>>,

    /// CORS settings.
    #[serde(default)]
    pub cors: CorsConfig,

    /// Compression settings.
    #[serde(default)]
    pub compression: CompressionConfig,

    /// Rate-limit settings.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Middleware names wrapped around every module of an API version.
    #[serde(default)]
    pub versions: BTreeMap<String, Vec<String>>,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            apply_global: true,
            global: None,
            cors: CorsConfig::default(),
            compression: CompressionConfig::default(),
            rate_limit: RateLimitConfig::default(),
            versions: BTreeMap::new(),
        }
    }
}

/// Metrics section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Record per-route traffic.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Standalone Prometheus scrape address.
    #[serde(default)]
    pub prometheus_addr: Option<String>,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            prometheus_addr: None,
        }
    }
}

impl MetricsSection {
    /// Exporter settings for `switchyard_telemetry::init_metrics`.
    #[must_use]
    pub fn to_metrics_config(&self) -> MetricsConfig {
        MetricsConfig {
            enabled: self.enabled,
            listen_addr: self.prometheus_addr.clone(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

/// Logging section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `switchyard=debug,hyper=warn`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    /// Subscriber settings for `switchyard_telemetry::init_logging`.
    #[must_use]
    pub fn to_log_config(&self) -> LogConfig {
        let base = match self.format {
            LogFormat::Json => LogConfig::production(),
            LogFormat::Pretty => LogConfig::development(),
        };
        LogConfig {
            level: self.level.clone(),
            ..base
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_defaults() {
        let routes = RoutesConfig::default();
        assert_eq!(routes.directory, "routes");
        assert_eq!(routes.file_extensions, vec![".js"]);
        assert!(routes.exclude_patterns.is_none());
        assert!(routes.auto_load);
        assert!(!routes.watch);
    }

    #[test]
    fn test_middleware_defaults() {
        let middleware = MiddlewareConfig::default();
        assert!(middleware.apply_global);
        assert_eq!(middleware.compression.min_size, 1024);
        assert_eq!(middleware.rate_limit.limit, 100);
        assert_eq!(middleware.rate_limit.window_secs, 900);
    }

    #[test]
    fn test_version_middleware_parsing() {
        let middleware: MiddlewareConfig =
            toml::from_str("[versions]\nv1 = [\"rate-limit\", \"cors\"]").unwrap();
        assert_eq!(middleware.versions["v1"], vec!["rate-limit", "cors"]);
        assert!(middleware.global.is_none());
    }

    #[test]
    fn test_log_config_conversion() {
        let logging = LoggingConfig {
            level: "warn".to_string(),
            format: LogFormat::Pretty,
        };
        let config = logging.to_log_config();
        assert_eq!(config.level, "warn");
        assert!(!config.json_format);
    }

    #[test]
    fn test_metrics_config_conversion() {
        let section = MetricsSection {
            enabled: true,
            prometheus_addr: Some("127.0.0.1:9090".to_string()),
        };
        let config = section.to_metrics_config();
        assert!(config.enabled);
        assert_eq!(config.listen_addr.as_deref(), Some("127.0.0.1:9090"));
    }

    #[test]
    fn test_log_format_serde() {
        let logging: LoggingConfig = toml::from_str("format = \"pretty\"").unwrap();
        assert_eq!(logging.format, LogFormat::Pretty);
        assert_eq!(logging.level, "info");
    }
}
