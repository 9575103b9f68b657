//! `X-Response-Time` header.

use http::HeaderValue;
use switchyard_core::{BoxFuture, Middleware, Next, Request, RequestContext, Response};
use tokio::time::Instant;

/// Response header carrying the handling time.
pub const RESPONSE_TIME_HEADER: &str = "x-response-time";

/// Adds `X-Response-Time: <ms>ms`, measured around the rest of the chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseTimeMiddleware;

impl ResponseTimeMiddleware {
    /// Creates the middleware.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Middleware for ResponseTimeMiddleware {
    fn name(&self) -> &'static str {
        "response-time"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let start = Instant::now();
            let mut response = next.run(ctx, request).await;
            let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

            if let Ok(value) = HeaderValue::from_str(&format!("{elapsed_ms:.3}ms")) {
                response.headers_mut().insert(RESPONSE_TIME_HEADER, value);
            }
            response
        })
    }
}
