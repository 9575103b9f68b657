//! # Switchyard Server
//!
//! The web server Switchyard attaches route modules to.
//!
//! - [`App`] - an in-process [`HostServer`](switchyard_core::HostServer): mount table,
//!   global middleware chain and per-request access reporting
//! - [`Server`] - a hyper HTTP/1.1 listener serving an `App`, with request
//!   timeouts and graceful shutdown

#![doc(html_root_url = "https://docs.rs/switchyard-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod app;
mod error;
mod server;
mod shutdown;

pub use app::App;
pub use error::ServerError;
pub use server::{Server, ServerSettings};
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownSignal};
