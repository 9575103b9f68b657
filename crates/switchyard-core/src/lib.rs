//! # Switchyard Core
//!
//! Shared contracts for the Switchyard route subsystem.
//!
//! Every other Switchyard crate speaks in terms of the types defined here:
//!
//! - [`HandlerCollection`] - an opaque, mountable unit that answers requests for one path prefix
//! - [`Middleware`] and [`Next`] - composable request-processing units
//! - [`Layered`] - a handler collection wrapped in an ordered middleware list
//! - [`HostServer`] - the "mount" and "use" primitives of the web server routes are attached to
//! - [`AccessObserver`] - the completion callback the serving layer reports traffic through
//! - [`RequestContext`] - per-request state carried through middleware and handlers
//!
//! ## Example
//!
//! ```
//! use switchyard_core::{FnCollection, HandlerCollection, Request, Response};
//! use bytes::Bytes;
//! use http_body_util::Full;
//!
//! let collection = FnCollection::new(|_ctx, _req: Request| async {
//!     http::Response::new(Full::new(Bytes::from("pong")))
//! });
//! let _: &dyn HandlerCollection = &collection;
//! ```

#![doc(html_root_url = "https://docs.rs/switchyard-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod error;
mod handler;
mod host;
mod middleware;
mod types;

pub use context::{RequestContext, RequestId};
pub use error::MountError;
pub use handler::{FnCollection, HandlerCollection, Layered};
pub use host::{AccessObserver, HostServer};
pub use middleware::{BoxFuture, FnMiddleware, Middleware, Next};
pub use types::{Request, Response, ResponseExt};
