//! # Switchyard
//!
//! **Route module discovery, registration and traffic metrics for HTTP servers**
//!
//! Switchyard scans a routes directory, loads every eligible module into a
//! mountable handler collection, mounts it on a host server and keeps a
//! registry of what is mounted together with per-route traffic metrics.
//!
//! - **Discovery** - naming conventions, exclusion patterns and `/api/<version>` subdirectories
//! - **Middleware catalogue** - named CORS, compression, rate-limit, security-header,
//!   access-log and response-time middleware, applied globally, per route or per version
//! - **Registry** - route metadata, middleware stacks, validation schemas and metrics
//! - **Hot reload** - reload a single route, by hand or on file change, without a restart
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use switchyard::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new()
//!         .with_dotenv()
//!         .with_optional_file("switchyard.toml")?
//!         .load()?;
//!     switchyard::init_telemetry(&config)?;
//!
//!     let mut provider = StaticProvider::new();
//!     provider.register_collection("auth", auth_routes());
//!
//!     switchyard::serve(config, Arc::new(provider)).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Request Flow
//!
//! ```text
//! Request → global middleware → mount table → version/route middleware → module
//!                                                                          ↓
//! RouteRegistry ← AccessObserver ← App ←──────────────────────────────────┘
//! ```

#![doc(html_root_url = "https://docs.rs/switchyard/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod bootstrap;
mod error;
mod manager;
pub mod watcher;

pub use bootstrap::{build, init_telemetry, serve, serve_with_shutdown, server_settings};
pub use error::ManagerError;
pub use manager::{
    CustomRoute, ManagerState, ManagerStats, ManagerStatus, MetricsView, RouteManager,
};
pub use watcher::RouteWatcher;

// Re-export core types
pub use switchyard_core as core;

// Re-export middleware types
pub use switchyard_middleware as middleware;

// Re-export loader types
pub use switchyard_loader as loader;

// Re-export registry types
pub use switchyard_registry as registry;

// Re-export configuration types
pub use switchyard_config as config;

// Re-export telemetry
pub use switchyard_telemetry as telemetry;

// Re-export the HTTP server
pub use switchyard_server as server;

pub use switchyard_config::SwitchyardConfig;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use switchyard::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{CustomRoute, ManagerError, ManagerState, MetricsView, RouteManager};

    pub use switchyard_core::{
        AccessObserver, FnCollection, FnMiddleware, HandlerCollection, HostServer, Layered,
        Middleware, Next, Request, RequestContext, Response, ResponseExt,
    };

    pub use switchyard_config::{ConfigLoader, SwitchyardConfig};

    pub use switchyard_loader::{ModuleExports, ModuleProvider, ModuleSource, StaticProvider};

    pub use switchyard_middleware::MiddlewareCatalogue;

    pub use switchyard_registry::{RegisterOptions, RouteRegistry};

    pub use switchyard_server::{App, Server, ShutdownSignal};
}
