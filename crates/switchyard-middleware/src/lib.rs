//! Named middleware catalogue for Switchyard.
//!
//! [`MiddlewareCatalogue`] keeps middleware by name, installs an ordered set
//! globally on a host server, and resolves per-route and per-version bundles.
//! The [`stages`] module provides the default set.
//!
//! ```rust,ignore
//! use switchyard_middleware::{DefaultSettings, MiddlewareCatalogue};
//!
//! let catalogue = MiddlewareCatalogue::with_defaults(&DefaultSettings::default());
//! catalogue.apply_global(&app, None);
//! let limits = catalogue.apply_to_route("/persons", &["rate-limit"]);
//! ```

#![doc(html_root_url = "https://docs.rs/switchyard-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod catalogue;
pub mod stages;

pub use catalogue::{
    CatalogueStats, DefaultSettings, MiddlewareCatalogue, MiddlewareDescriptor,
    DEFAULT_GLOBAL_ORDER,
};
