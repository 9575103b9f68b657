//! Handler collections.
//!
//! A handler collection is the unit a route module exports and the host
//! mounts at a path prefix. Switchyard never looks inside one; it only
//! names, wraps, mounts and measures it.

use crate::context::RequestContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};
use std::future::Future;
use std::sync::Arc;

/// An opaque unit that handles every request under its mount path.
///
/// Request paths reaching a mounted collection are relative to the mount
/// point; the original prefix is available from
/// [`RequestContext::mount_path`].
pub trait HandlerCollection: Send + Sync + 'static {
    /// Handles one request.
    fn handle<'a>(&'a self, ctx: &'a mut RequestContext, request: Request)
        -> BoxFuture<'a, Response>;
}

/// A handler collection backed by an async closure.
pub struct FnCollection<F> {
    func: F,
}

impl<F, Fut> FnCollection<F>
where
    F: Fn(&mut RequestContext, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    /// Wraps the closure.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F, Fut> HandlerCollection for FnCollection<F>
where
    F: Fn(&mut RequestContext, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn handle<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
    ) -> BoxFuture<'a, Response> {
        Box::pin((self.func)(ctx, request))
    }
}

/// A handler collection wrapped in an ordered middleware list.
///
/// The first middleware in the list sees the request first.
///
/// ```
/// use std::sync::Arc;
/// use switchyard_core::{FnCollection, HandlerCollection, Layered};
/// use bytes::Bytes;
/// use http_body_util::Full;
///
/// let inner: Arc<dyn HandlerCollection> = Arc::new(FnCollection::new(|_ctx, _req| async {
///     http::Response::new(Full::new(Bytes::new()))
/// }));
/// let layered = Layered::new(inner, Vec::new());
/// assert_eq!(layered.middleware_count(), 0);
/// ```
pub struct Layered {
    inner: Arc<dyn HandlerCollection>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl Layered {
    /// Wraps `inner` with `middleware`, applied in list order.
    #[must_use]
    pub fn new(inner: Arc<dyn HandlerCollection>, middleware: Vec<Arc<dyn Middleware>>) -> Self {
        Self { inner, middleware }
    }

    /// Returns the number of wrapping middleware.
    #[must_use]
    pub fn middleware_count(&self) -> usize {
        self.middleware.len()
    }

    /// Returns the names of the wrapping middleware, outermost first.
    #[must_use]
    pub fn middleware_names(&self) -> Vec<&'static str> {
        self.middleware.iter().map(|m| m.name()).collect()
    }
}

impl HandlerCollection for Layered {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
    ) -> BoxFuture<'a, Response> {
        Box::pin(Next::new(&self.middleware, self.inner.as_ref()).run(ctx, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{HeaderValue, StatusCode};
    use http_body_util::{BodyExt, Full};

    struct Stamp(&'static str);

    impl Middleware for Stamp {
        fn name(&self) -> &'static str {
            self.0
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut RequestContext,
            request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, Response> {
            Box::pin(async move {
                let mut response = next.run(ctx, request).await;
                response
                    .headers_mut()
                    .append("x-stamp", HeaderValue::from_static(self.0));
                response
            })
        }
    }

    fn echo_path() -> Arc<dyn HandlerCollection> {
        Arc::new(FnCollection::new(|_ctx, req: Request| async move {
            http::Response::new(Full::new(Bytes::from(req.uri().path().to_string())))
        }))
    }

    #[tokio::test]
    async fn test_fn_collection_handles_request() {
        let collection = echo_path();
        let mut ctx = RequestContext::new();
        let request = http::Request::builder()
            .uri("/list")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let response = collection.handle(&mut ctx, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"/list");
    }

    #[tokio::test]
    async fn test_layered_applies_middleware_in_list_order() {
        let layered = Layered::new(
            echo_path(),
            vec![Arc::new(Stamp("outer")), Arc::new(Stamp("inner"))],
        );
        assert_eq!(layered.middleware_count(), 2);
        assert_eq!(layered.middleware_names(), vec!["outer", "inner"]);

        let mut ctx = RequestContext::new();
        let request = http::Request::builder()
            .uri("/")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = layered.handle(&mut ctx, request).await;

        // Post-processing unwinds inside-out, so the inner stamp lands first.
        let stamps: Vec<_> = response
            .headers()
            .get_all("x-stamp")
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(stamps, vec!["inner", "outer"]);
    }
}
