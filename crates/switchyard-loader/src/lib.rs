//! # Switchyard Loader
//!
//! Discovers route module files on disk and loads them into mountable
//! handler collections.
//!
//! - [`DiscoveryRules`] decides which files are route modules and derives
//!   their names and mount paths.
//! - [`ModuleProvider`] resolves a file to the collections it exports;
//!   [`StaticProvider`] is a constructor table.
//! - [`ModuleLoader`] ties the two together, keeps an import cache, and
//!   records per-module failures without aborting a batch.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use switchyard_loader::{DiscoveryRules, ModuleLoader, StaticProvider};
//!
//! let mut provider = StaticProvider::new();
//! provider.register_collection("auth", auth_routes());
//!
//! let mut loader = ModuleLoader::new("routes", DiscoveryRules::default(), Arc::new(provider));
//! let modules = loader.load_all(None).await?;
//! ```

#![doc(html_root_url = "https://docs.rs/switchyard-loader/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod discovery;
pub mod error;
pub mod loader;
pub mod provider;

pub use discovery::{DiscoveryRules, DiscoverySettings, ModuleCandidate};
pub use error::{LoaderError, LoaderResult, ProviderError};
pub use loader::{LoadError, LoadedModule, LoaderStats, ModuleLoader, DEFAULT_LOAD_TIMEOUT};
pub use provider::{ModuleExports, ModuleProvider, ModuleSource, StaticProvider};
