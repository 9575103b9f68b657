//! Per-request context.

use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, so request IDs sort by arrival in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State that flows with one request through middleware into a handler collection.
///
/// The host server fills in the client address before dispatch and the
/// mount path once a handler collection has been selected. Middleware can
/// stash arbitrary typed values in the extension map.
///
/// # Example
///
/// ```
/// use switchyard_core::RequestContext;
///
/// #[derive(Debug, PartialEq)]
/// struct Tenant(&'static str);
///
/// let mut ctx = RequestContext::new();
/// ctx.set_extension(Tenant("acme"));
/// assert_eq!(ctx.get_extension::<Tenant>(), Some(&Tenant("acme")));
/// ```
#[derive(Debug)]
pub struct RequestContext {
    request_id: RequestId,
    started_at: Instant,
    client_addr: Option<SocketAddr>,
    mount_path: Option<String>,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl RequestContext {
    /// Creates a context with a fresh request ID and the current instant as start time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: RequestId::new(),
            started_at: Instant::now(),
            client_addr: None,
            mount_path: None,
            extensions: HashMap::new(),
        }
    }

    /// Sets the remote socket address of the client.
    #[must_use]
    pub fn with_client_addr(mut self, addr: SocketAddr) -> Self {
        self.client_addr = Some(addr);
        self
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns when processing started.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the time elapsed since processing started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Returns the remote address of the client, if known.
    #[must_use]
    pub fn client_addr(&self) -> Option<SocketAddr> {
        self.client_addr
    }

    /// Returns the mount path of the handler collection serving this request.
    #[must_use]
    pub fn mount_path(&self) -> Option<&str> {
        self.mount_path.as_deref()
    }

    /// Records the mount path selected for this request.
    pub fn set_mount_path(&mut self, path: impl Into<String>) {
        self.mount_path = Some(path.into());
    }

    /// Stores a typed extension value, replacing any previous value of the same type.
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a typed extension value.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Removes and returns a typed extension value.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|b| *b)
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }

    #[test]
    fn test_client_addr_and_mount_path() {
        let addr: SocketAddr = "10.0.0.7:4711".parse().unwrap();
        let mut ctx = RequestContext::new().with_client_addr(addr);
        assert_eq!(ctx.client_addr(), Some(addr));
        assert!(ctx.mount_path().is_none());

        ctx.set_mount_path("/persons");
        assert_eq!(ctx.mount_path(), Some("/persons"));
    }

    #[test]
    fn test_extensions() {
        #[derive(Debug, PartialEq)]
        struct Marker(u32);

        let mut ctx = RequestContext::new();
        assert!(ctx.get_extension::<Marker>().is_none());

        ctx.set_extension(Marker(1));
        ctx.set_extension(Marker(2));
        assert_eq!(ctx.get_extension::<Marker>(), Some(&Marker(2)));

        assert_eq!(ctx.remove_extension::<Marker>(), Some(Marker(2)));
        assert!(ctx.get_extension::<Marker>().is_none());
    }
}
