//! Top-level configuration.
//!
//! This module provides the [`SwitchyardConfig`] struct and its builder.

use crate::schema::{
    LogFormat, LoggingConfig, MetricsSection, MiddlewareConfig, RoutesConfig, ServerConfig,
};
use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Complete Switchyard configuration.
///
/// # Example
///
/// ```
/// use switchyard_config::SwitchyardConfig;
///
/// let config = SwitchyardConfig::default();
/// assert_eq!(config.routes.directory, "routes");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SwitchyardConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Route discovery and loading.
    #[serde(default)]
    pub routes: RoutesConfig,

    /// Middleware catalogue defaults.
    #[serde(default)]
    pub middleware: MiddlewareConfig,

    /// Traffic metrics.
    #[serde(default)]
    pub metrics: MetricsSection,

    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SwitchyardConfig {
    /// Create a builder.
    #[must_use]
    pub fn builder() -> SwitchyardConfigBuilder {
        SwitchyardConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - An address does not parse as a socket address
    /// - An exclude pattern is not a valid regular expression
    /// - A file extension lacks its leading dot
    /// - A limit, window or timeout is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_addr("server.http_addr", &self.server.http_addr)?;

        if self.server.request_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "server.request_timeout_ms",
                "must be greater than zero",
            ));
        }

        if self.routes.directory.trim().is_empty() {
            return Err(ConfigError::invalid_value("routes.directory", "must not be empty"));
        }

        if let Some(ext) = self
            .routes
            .file_extensions
            .iter()
            .find(|ext| !ext.starts_with('.') || ext.len() < 2)
        {
            return Err(ConfigError::invalid_value(
                "routes.file_extensions",
                format!("expected a leading dot: {ext}"),
            ));
        }

        for pattern in self.routes.exclude_patterns.iter().flatten() {
            regex::Regex::new(pattern)
                .map_err(|e| ConfigError::invalid_value("routes.exclude_patterns", e.to_string()))?;
        }

        for (name, path) in self.routes.path_overrides.iter().flatten() {
            if !path.starts_with('/') {
                return Err(ConfigError::invalid_value(
                    "routes.path_overrides",
                    format!("mount path for {name} must start with '/': {path}"),
                ));
            }
        }

        if self.routes.load_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "routes.load_timeout_ms",
                "must be greater than zero",
            ));
        }

        if self.middleware.rate_limit.limit == 0 {
            return Err(ConfigError::invalid_value(
                "middleware.rate_limit.limit",
                "must be greater than zero",
            ));
        }

        if self.middleware.rate_limit.window_secs == 0 {
            return Err(ConfigError::invalid_value(
                "middleware.rate_limit.window_secs",
                "must be greater than zero",
            ));
        }

        if let Some(addr) = &self.metrics.prometheus_addr {
            parse_addr("metrics.prometheus_addr", addr)?;
        }

        Ok(())
    }

    /// Development preset: pretty debug logs, relaxed security headers.
    ///
    /// ```
    /// use switchyard_config::SwitchyardConfig;
    ///
    /// let config = SwitchyardConfig::development();
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.server.environment = "development".to_string();
        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config.routes.watch = true;
        config
    }

    /// Production preset: JSON info logs, strict security headers.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.server.environment = "production".to_string();
        config.logging.level = "info".to_string();
        config.logging.format = LogFormat::Json;
        config.routes.watch = false;
        config
    }
}

fn parse_addr(field: &str, addr: &str) -> Result<SocketAddr, ConfigError> {
    addr.parse::<SocketAddr>()
        .map_err(|_| ConfigError::invalid_value(field, format!("invalid socket address: {addr}")))
}

/// Builder for [`SwitchyardConfig`].
#[derive(Debug, Default)]
pub struct SwitchyardConfigBuilder {
    config: SwitchyardConfig,
}

impl SwitchyardConfigBuilder {
    /// Create a builder seeded with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server section.
    #[must_use]
    pub fn server(mut self, server: ServerConfig) -> Self {
        self.config.server = server;
        self
    }

    /// Set the routes section.
    #[must_use]
    pub fn routes(mut self, routes: RoutesConfig) -> Self {
        self.config.routes = routes;
        self
    }

    /// Set the middleware section.
    #[must_use]
    pub fn middleware(mut self, middleware: MiddlewareConfig) -> Self {
        self.config.middleware = middleware;
        self
    }

    /// Set the metrics section.
    #[must_use]
    pub fn metrics(mut self, metrics: MetricsSection) -> Self {
        self.config.metrics = metrics;
        self
    }

    /// Set the logging section.
    #[must_use]
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.config.logging = logging;
        self
    }

    /// Set the routes root directory.
    #[must_use]
    pub fn routes_directory(mut self, directory: impl Into<String>) -> Self {
        self.config.routes.directory = directory.into();
        self
    }

    /// Set the deployment environment.
    #[must_use]
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.config.server.environment = environment.into();
        self
    }

    /// Build without validation.
    #[must_use]
    pub fn build(self) -> SwitchyardConfig {
        self.config
    }

    /// Build and validate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if validation fails.
    pub fn build_validated(self) -> Result<SwitchyardConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
