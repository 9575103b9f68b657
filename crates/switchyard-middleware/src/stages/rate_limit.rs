//! Fixed-window rate limiting.
//!
//! Each client identity gets `limit` requests per `window`. The window starts
//! with the client's first request and resets once it has elapsed. Every
//! response carries the standard `RateLimit-*` headers; rejected requests get
//! `429 Too Many Requests` with a `{error, message}` body and `Retry-After`.
//! Legacy `X-RateLimit-*` headers are never sent.
//!
//! ```ignore
//! use switchyard_middleware::stages::RateLimitMiddleware;
//! use std::time::Duration;
//!
//! let limiter = RateLimitMiddleware::builder()
//!     .limit(100)
//!     .window(Duration::from_secs(15 * 60))
//!     .build();
//! ```

use http::{HeaderValue, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use switchyard_core::{
    BoxFuture, Middleware, Next, Request, RequestContext, Response, ResponseExt,
};
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Rate limit header names.
pub mod headers {
    /// Requests allowed per window.
    pub const LIMIT: &str = "ratelimit-limit";
    /// Requests left in the current window.
    pub const REMAINING: &str = "ratelimit-remaining";
    /// Seconds until the current window resets.
    pub const RESET: &str = "ratelimit-reset";
    /// Seconds to wait before retrying (429 only).
    pub const RETRY_AFTER: &str = "retry-after";
}

/// Default requests per window.
pub const DEFAULT_LIMIT: u64 = 100;

/// Default window length (15 minutes).
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);

const DEFAULT_MESSAGE: &str = "Too many requests from this client, please try again later.";

/// How the client identity is derived from a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum KeyExtractor {
    /// First `X-Forwarded-For` hop, then `X-Real-IP`, then the socket address.
    #[default]
    Ip,
    /// The value of a request header; requests without it are not limited.
    Header(String),
    /// One shared budget for every request.
    Global,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u64,
    started: Instant,
}

/// Windows per client. Expired windows are reset on their client's next
/// request and swept out at most once per window length.
#[derive(Debug, Default)]
struct WindowStore {
    windows: HashMap<String, Window>,
    last_sweep: Option<Instant>,
}

impl WindowStore {
    fn sweep(&mut self, now: Instant, window: Duration) {
        if self
            .last_sweep
            .is_some_and(|last| now.duration_since(last) < window)
        {
            return;
        }
        self.windows
            .retain(|_, w| now.duration_since(w.started) < window);
        self.last_sweep = Some(now);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Allowed { remaining: u64, reset_in: Duration },
    Limited { reset_in: Duration },
}

/// Rate limiting middleware.
#[derive(Debug, Clone)]
pub struct RateLimitMiddleware {
    limit: u64,
    window: Duration,
    key_extractor: KeyExtractor,
    message: String,
    store: Arc<Mutex<WindowStore>>,
}

impl Default for RateLimitMiddleware {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RateLimitMiddleware {
    /// Creates a limiter with 100 requests per 15 minutes per client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder.
    #[must_use]
    pub fn builder() -> RateLimitBuilder {
        RateLimitBuilder::default()
    }

    /// Requests allowed per window.
    #[must_use]
    pub const fn limit(&self) -> u64 {
        self.limit
    }

    /// Window length.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    fn extract_key(&self, request: &Request, ctx: &RequestContext) -> Option<String> {
        match &self.key_extractor {
            KeyExtractor::Ip => {
                let header = |name: &str| {
                    request
                        .headers()
                        .get(name)
                        .and_then(|v| v.to_str().ok())
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                };
                let key = header("x-forwarded-for")
                    .and_then(|xff| xff.split(',').next())
                    .map(|first| first.trim().to_string())
                    .or_else(|| header("x-real-ip").map(String::from))
                    .or_else(|| ctx.client_addr().map(|addr| addr.ip().to_string()))
                    .unwrap_or_else(|| "unknown".to_string());
                Some(key)
            }
            KeyExtractor::Header(name) => request
                .headers()
                .get(name.as_str())
                .and_then(|v| v.to_str().ok())
                .map(String::from),
            KeyExtractor::Global => Some("global".to_string()),
        }
    }

    async fn check(&self, key: &str) -> Decision {
        let now = Instant::now();
        let window = self.window;
        let mut store = self.store.lock().await;
        store.sweep(now, window);

        let entry = store.windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            started: now,
        });
        if now.duration_since(entry.started) >= window {
            *entry = Window {
                count: 0,
                started: now,
            };
        }
        let reset_in = window.saturating_sub(now.duration_since(entry.started));

        if entry.count >= self.limit {
            return Decision::Limited { reset_in };
        }
        entry.count += 1;
        Decision::Allowed {
            remaining: self.limit - entry.count,
            reset_in,
        }
    }

    fn apply_headers(&self, response: &mut Response, remaining: u64, reset_in: Duration) {
        let out = response.headers_mut();
        out.insert(headers::LIMIT, HeaderValue::from(self.limit));
        out.insert(headers::REMAINING, HeaderValue::from(remaining));
        out.insert(headers::RESET, HeaderValue::from(ceil_secs(reset_in)));
    }

    fn limited_response(&self, reset_in: Duration) -> Response {
        let mut response =
            Response::json_error(StatusCode::TOO_MANY_REQUESTS, "Too Many Requests", &self.message);
        self.apply_headers(&mut response, 0, reset_in);
        response
            .headers_mut()
            .insert(headers::RETRY_AFTER, HeaderValue::from(ceil_secs(reset_in).max(1)));
        response
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

impl Middleware for RateLimitMiddleware {
    fn name(&self) -> &'static str {
        "rate-limit"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let Some(key) = self.extract_key(&request, ctx) else {
                return next.run(ctx, request).await;
            };

            match self.check(&key).await {
                Decision::Allowed {
                    remaining,
                    reset_in,
                } => {
                    let mut response = next.run(ctx, request).await;
                    self.apply_headers(&mut response, remaining, reset_in);
                    response
                }
                Decision::Limited { reset_in } => {
                    tracing::warn!(
                        client = %key,
                        path = %request.uri().path(),
                        "rate limit exceeded"
                    );
                    self.limited_response(reset_in)
                }
            }
        })
    }
}

/// Builder for [`RateLimitMiddleware`].
#[derive(Debug, Clone)]
pub struct RateLimitBuilder {
    limit: u64,
    window: Duration,
    key_extractor: KeyExtractor,
    message: String,
}

impl Default for RateLimitBuilder {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            window: DEFAULT_WINDOW,
            key_extractor: KeyExtractor::Ip,
            message: DEFAULT_MESSAGE.to_string(),
        }
    }
}

impl RateLimitBuilder {
    /// Sets the requests allowed per window.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the window length.
    #[must_use]
    pub const fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Sets the window length in seconds.
    #[must_use]
    pub const fn window_secs(self, seconds: u64) -> Self {
        self.window(Duration::from_secs(seconds))
    }

    /// Keys clients by a request header.
    #[must_use]
    pub fn per_header(mut self, name: impl Into<String>) -> Self {
        self.key_extractor = KeyExtractor::Header(name.into());
        self
    }

    /// Uses one budget for all clients.
    #[must_use]
    pub fn global(mut self) -> Self {
        self.key_extractor = KeyExtractor::Global;
        self
    }

    /// Sets the message returned in 429 bodies.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Builds the middleware.
    #[must_use]
    pub fn build(self) -> RateLimitMiddleware {
        RateLimitMiddleware {
            limit: self.limit,
            window: self.window,
            key_extractor: self.key_extractor,
            message: self.message,
            store: Arc::new(Mutex::new(WindowStore::default())),
        }
    }
}
