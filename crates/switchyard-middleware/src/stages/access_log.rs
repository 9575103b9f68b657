//! Access logging.
//!
//! Emits one structured `tracing` event per completed request with method,
//! path, status, duration, user agent and client address. Responses with a
//! status of 400 or above are logged at `WARN`, everything else at `INFO`.

use http::header;
use switchyard_core::{BoxFuture, Middleware, Next, Request, RequestContext, Response};
use tokio::time::Instant;
use tracing::Level;

/// Access log middleware.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessLogMiddleware;

impl AccessLogMiddleware {
    /// Creates the middleware.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Log level used for a response with this status.
    #[must_use]
    pub const fn level_for(status: u16) -> Level {
        if status >= 400 {
            Level::WARN
        } else {
            Level::INFO
        }
    }
}

impl Middleware for AccessLogMiddleware {
    fn name(&self) -> &'static str {
        "access-log"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let start = Instant::now();
            let method = request.method().clone();
            let path = request.uri().path().to_string();
            let user_agent = request
                .headers()
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string();
            let client_addr = request
                .headers()
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(|v| v.trim().to_string())
                .or_else(|| ctx.client_addr().map(|addr| addr.ip().to_string()))
                .unwrap_or_else(|| "-".to_string());

            let response = next.run(ctx, request).await;

            let status = response.status().as_u16();
            let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
            let request_id = ctx.request_id().to_string();

            if Self::level_for(status) == Level::WARN {
                tracing::warn!(
                    request_id = %request_id,
                    method = %method,
                    path = %path,
                    status = status,
                    duration_ms = duration_ms,
                    user_agent = %user_agent,
                    client_addr = %client_addr,
                    "request completed"
                );
            } else {
                tracing::info!(
                    request_id = %request_id,
                    method = %method,
                    path = %path,
                    status = status,
                    duration_ms = duration_ms,
                    user_agent = %user_agent,
                    client_addr = %client_addr,
                    "request completed"
                );
            }

            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_support::{empty_request, fixed};
    use bytes::Bytes;
    use http::Method;
    use std::sync::Arc;

    #[test]
    fn test_level_for_status() {
        assert_eq!(AccessLogMiddleware::level_for(200), Level::INFO);
        assert_eq!(AccessLogMiddleware::level_for(304), Level::INFO);
        assert_eq!(AccessLogMiddleware::level_for(400), Level::WARN);
        assert_eq!(AccessLogMiddleware::level_for(503), Level::WARN);
    }

    #[tokio::test]
    async fn test_passes_response_through() {
        let endpoint = fixed(404, "text/plain", Bytes::from_static(b"missing"));
        let stack: Vec<Arc<dyn Middleware>> = vec![Arc::new(AccessLogMiddleware::new())];
        let mut ctx = RequestContext::new();

        let response = Next::new(&stack, endpoint.as_ref())
            .run(&mut ctx, empty_request(Method::GET, "/nowhere"))
            .await;
        assert_eq!(response.status(), 404);
    }
}
