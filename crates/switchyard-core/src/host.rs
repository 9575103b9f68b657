//! Host server binding.

use crate::error::MountError;
use crate::handler::HandlerCollection;
use crate::middleware::Middleware;
use std::sync::Arc;

/// The web server that route modules are attached to.
///
/// Implementations must be safe to call from any task: route registration,
/// hot reload and request serving run concurrently.
pub trait HostServer: Send + Sync + 'static {
    /// Mounts `collection` at `path`, replacing any collection already mounted there.
    fn mount(&self, path: &str, collection: Arc<dyn HandlerCollection>) -> Result<(), MountError>;

    /// Removes the collection mounted at exactly `path`. Returns `false` if none was.
    fn unmount(&self, path: &str) -> bool;

    /// Appends `middleware` to the global chain that runs before every mount.
    fn use_middleware(&self, middleware: Arc<dyn Middleware>);
}

/// Receives one notification per completed request against a mounted route.
pub trait AccessObserver: Send + Sync + 'static {
    /// Records a completed request.
    ///
    /// `route_path` is the mount path the request was dispatched to.
    fn record(&self, route_path: &str, duration_ms: f64, status: u16, is_error: bool);
}
