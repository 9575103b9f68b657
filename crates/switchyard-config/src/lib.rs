//! Typed configuration for Switchyard.
//!
//! - TOML and JSON configuration files
//! - Environment variable overrides (`SWITCHYARD__SECTION__KEY`)
//! - Strict parsing that rejects unknown fields
//! - Validation of addresses, regexes and limits before anything starts
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8080"
//! environment = "production"
//!
//! [routes]
//! directory = "routes"
//! file_extensions = [".js"]
//! auto_load = true
//!
//! [routes.path_overrides]
//! person = "/persons"
//!
//! [middleware]
//! apply_global = true
//! global = ["security-headers", "cors", "compression", "access-log", "response-time"]
//!
//! [middleware.rate_limit]
//! limit = 100
//! window_secs = 900
//!
//! [middleware.versions]
//! v1 = ["rate-limit"]
//!
//! [metrics]
//! enabled = true
//! prometheus_addr = "0.0.0.0:9090"
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

#![doc(html_root_url = "https://docs.rs/switchyard-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{SwitchyardConfig, SwitchyardConfigBuilder};
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{
    CompressionConfig, CorsConfig, LogFormat, LoggingConfig, MetricsSection, MiddlewareConfig,
    RateLimitConfig, RoutesConfig, ServerConfig,
};
