//! Cross-origin resource sharing.
//!
//! The default policy is permissive: the request's `Origin` is reflected back,
//! credentials are allowed, and preflight requests are answered with
//! `204 No Content` without reaching the route.
//!
//! ```ignore
//! use switchyard_middleware::stages::CorsMiddleware;
//!
//! let cors = CorsMiddleware::builder()
//!     .allow_origin("https://app.example.com")
//!     .allow_credentials(false)
//!     .build();
//! ```

use bytes::Bytes;
use http::{HeaderValue, Method, StatusCode};
use http_body_util::Full;
use std::collections::HashSet;
use std::time::Duration;
use switchyard_core::{BoxFuture, Middleware, Next, Request, RequestContext, Response};

/// CORS header names.
pub mod headers {
    /// `Access-Control-Allow-Origin`.
    pub const ALLOW_ORIGIN: &str = "access-control-allow-origin";
    /// `Access-Control-Allow-Methods`.
    pub const ALLOW_METHODS: &str = "access-control-allow-methods";
    /// `Access-Control-Allow-Headers`.
    pub const ALLOW_HEADERS: &str = "access-control-allow-headers";
    /// `Access-Control-Allow-Credentials`.
    pub const ALLOW_CREDENTIALS: &str = "access-control-allow-credentials";
    /// `Access-Control-Max-Age`.
    pub const MAX_AGE: &str = "access-control-max-age";
    /// `Access-Control-Expose-Headers`.
    pub const EXPOSE_HEADERS: &str = "access-control-expose-headers";
    /// `Access-Control-Request-Method` (preflight).
    pub const REQUEST_METHOD: &str = "access-control-request-method";
    /// `Access-Control-Request-Headers` (preflight).
    pub const REQUEST_HEADERS: &str = "access-control-request-headers";
    /// `Origin`.
    pub const ORIGIN: &str = "origin";
    /// `Vary`.
    pub const VARY: &str = "vary";
}

/// Methods allowed by the default policy.
pub const DEFAULT_METHODS: [Method; 6] = [
    Method::GET,
    Method::HEAD,
    Method::PUT,
    Method::PATCH,
    Method::POST,
    Method::DELETE,
];

/// Which origins receive CORS headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginPolicy {
    /// Echo back whatever origin the request carries.
    Mirror,
    /// Only these exact origins.
    List(HashSet<String>),
}

impl OriginPolicy {
    fn allows(&self, origin: &str) -> bool {
        match self {
            Self::Mirror => true,
            Self::List(origins) => origins.contains(origin),
        }
    }
}

/// CORS middleware.
#[derive(Debug, Clone)]
pub struct CorsMiddleware {
    origins: OriginPolicy,
    methods: Vec<Method>,
    /// Empty means "reflect `Access-Control-Request-Headers`".
    allowed_headers: Vec<String>,
    expose_headers: Vec<String>,
    allow_credentials: bool,
    max_age: Option<Duration>,
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self::permissive()
    }
}

impl CorsMiddleware {
    /// Reflects any origin, allows credentials and the default method set.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            origins: OriginPolicy::Mirror,
            methods: DEFAULT_METHODS.to_vec(),
            allowed_headers: Vec::new(),
            expose_headers: Vec::new(),
            allow_credentials: true,
            max_age: None,
        }
    }

    /// Creates a builder starting from the permissive policy.
    #[must_use]
    pub fn builder() -> CorsBuilder {
        CorsBuilder {
            inner: Self::permissive(),
        }
    }

    /// Returns true for an `OPTIONS` request carrying both `Origin` and
    /// `Access-Control-Request-Method`.
    #[must_use]
    pub fn is_preflight(request: &Request) -> bool {
        request.method() == Method::OPTIONS
            && request.headers().contains_key(headers::ORIGIN)
            && request.headers().contains_key(headers::REQUEST_METHOD)
    }

    fn origin_of(request: &Request) -> Option<HeaderValue> {
        request.headers().get(headers::ORIGIN).cloned()
    }

    fn allowed_origin(&self, origin: &HeaderValue) -> bool {
        origin.to_str().is_ok_and(|o| self.origins.allows(o))
    }

    fn handle_preflight(&self, request: &Request) -> Response {
        let mut response = http::Response::new(Full::new(Bytes::new()));
        *response.status_mut() = StatusCode::NO_CONTENT;

        let Some(origin) = Self::origin_of(request) else {
            return response;
        };
        if !self.allowed_origin(&origin) {
            return response;
        }

        self.add_cors_headers(&mut response, origin);

        let methods = self
            .methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let allowed_headers = if self.allowed_headers.is_empty() {
            request.headers().get(headers::REQUEST_HEADERS).cloned()
        } else {
            HeaderValue::from_str(&self.allowed_headers.join(",")).ok()
        };

        let out = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&methods) {
            out.insert(headers::ALLOW_METHODS, value);
        }
        if let Some(value) = allowed_headers {
            out.insert(headers::ALLOW_HEADERS, value);
            out.append(
                headers::VARY,
                HeaderValue::from_static("Access-Control-Request-Headers"),
            );
        }
        if let Some(max_age) = self.max_age {
            out.insert(headers::MAX_AGE, HeaderValue::from(max_age.as_secs()));
        }
        out.insert(http::header::CONTENT_LENGTH, HeaderValue::from_static("0"));

        response
    }

    fn add_cors_headers(&self, response: &mut Response, origin: HeaderValue) {
        // Callers have already checked the origin against the policy.
        let out = response.headers_mut();
        out.insert(headers::ALLOW_ORIGIN, origin);
        out.append(headers::VARY, HeaderValue::from_static("Origin"));

        if self.allow_credentials {
            out.insert(headers::ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }
        if !self.expose_headers.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&self.expose_headers.join(",")) {
                out.insert(headers::EXPOSE_HEADERS, value);
            }
        }
    }
}

impl Middleware for CorsMiddleware {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            if Self::is_preflight(&request) {
                return self.handle_preflight(&request);
            }

            let origin = Self::origin_of(&request);
            let mut response = next.run(ctx, request).await;

            if let Some(origin) = origin.filter(|o| self.allowed_origin(o)) {
                self.add_cors_headers(&mut response, origin);
            }
            response
        })
    }
}

/// Builder for [`CorsMiddleware`].
#[derive(Debug, Clone)]
pub struct CorsBuilder {
    inner: CorsMiddleware,
}

impl CorsBuilder {
    /// Restricts CORS to the given origin. May be called repeatedly.
    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        match &mut self.inner.origins {
            OriginPolicy::List(origins) => {
                origins.insert(origin.into());
            }
            OriginPolicy::Mirror => {
                self.inner.origins = OriginPolicy::List(HashSet::from([origin.into()]));
            }
        }
        self
    }

    /// Replaces the allowed methods.
    #[must_use]
    pub fn allow_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.inner.methods = methods.into_iter().collect();
        self
    }

    /// Sets an explicit allowed-headers list instead of reflecting the request.
    #[must_use]
    pub fn allow_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.allowed_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the headers exposed to browser scripts.
    #[must_use]
    pub fn expose_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.expose_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    /// Sets whether `Access-Control-Allow-Credentials: true` is sent.
    #[must_use]
    pub const fn allow_credentials(mut self, allow: bool) -> Self {
        self.inner.allow_credentials = allow;
        self
    }

    /// Sets the preflight cache duration.
    #[must_use]
    pub const fn max_age(mut self, max_age: Duration) -> Self {
        self.inner.max_age = Some(max_age);
        self
    }

    /// Builds the middleware.
    #[must_use]
    pub fn build(self) -> CorsMiddleware {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_support::{empty_request, fixed};
    use std::sync::Arc;

    fn with_origin(method: Method, origin: &'static str) -> Request {
        let mut request = empty_request(method, "/persons");
        request
            .headers_mut()
            .insert(headers::ORIGIN, HeaderValue::from_static(origin));
        request
    }

    fn preflight(origin: &'static str, requested_headers: Option<&'static str>) -> Request {
        let mut request = with_origin(Method::OPTIONS, origin);
        request
            .headers_mut()
            .insert(headers::REQUEST_METHOD, HeaderValue::from_static("PUT"));
        if let Some(h) = requested_headers {
            request
                .headers_mut()
                .insert(headers::REQUEST_HEADERS, HeaderValue::from_static(h));
        }
        request
    }

    async fn run(mw: CorsMiddleware, request: Request) -> Response {
        let endpoint = fixed(200, "application/json", Bytes::from_static(b"[]"));
        let stack: Vec<Arc<dyn Middleware>> = vec![Arc::new(mw)];
        let mut ctx = RequestContext::new();
        Next::new(&stack, endpoint.as_ref()).run(&mut ctx, request).await
    }

    #[test]
    fn test_is_preflight() {
        assert!(CorsMiddleware::is_preflight(&preflight("https://a.test", None)));
        assert!(!CorsMiddleware::is_preflight(&with_origin(
            Method::OPTIONS,
            "https://a.test"
        )));
        assert!(!CorsMiddleware::is_preflight(&with_origin(
            Method::GET,
            "https://a.test"
        )));
    }

    #[tokio::test]
    async fn test_permissive_reflects_origin() {
        let response = run(
            CorsMiddleware::permissive(),
            with_origin(Method::GET, "https://app.example.com"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(headers::ALLOW_ORIGIN).unwrap(),
            "https://app.example.com"
        );
        assert_eq!(
            response.headers().get(headers::ALLOW_CREDENTIALS).unwrap(),
            "true"
        );
        assert_eq!(response.headers().get(headers::VARY).unwrap(), "Origin");
    }

    #[tokio::test]
    async fn test_preflight_answered_without_route() {
        let response = run(
            CorsMiddleware::permissive(),
            preflight("https://app.example.com", Some("content-type,x-token")),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers().get(headers::ALLOW_METHODS).unwrap(),
            "GET,HEAD,PUT,PATCH,POST,DELETE"
        );
        assert_eq!(
            response.headers().get(headers::ALLOW_HEADERS).unwrap(),
            "content-type,x-token"
        );
        assert_eq!(
            response.headers().get(headers::ALLOW_ORIGIN).unwrap(),
            "https://app.example.com"
        );
    }

    #[tokio::test]
    async fn test_request_without_origin_untouched() {
        let response = run(
            CorsMiddleware::permissive(),
            empty_request(Method::GET, "/persons"),
        )
        .await;
        assert!(response.headers().get(headers::ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn test_origin_list_rejects_unknown() {
        let cors = CorsMiddleware::builder()
            .allow_origin("https://app.example.com")
            .build();

        let response = run(cors.clone(), with_origin(Method::GET, "https://evil.test")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(headers::ALLOW_ORIGIN).is_none());

        let response = run(cors, with_origin(Method::GET, "https://app.example.com")).await;
        assert!(response.headers().get(headers::ALLOW_ORIGIN).is_some());
    }

    #[tokio::test]
    async fn test_builder_max_age_and_expose() {
        let cors = CorsMiddleware::builder()
            .max_age(Duration::from_secs(600))
            .expose_headers(["x-response-time"])
            .allow_credentials(false)
            .build();

        let response = run(cors.clone(), preflight("https://a.test", None)).await;
        assert_eq!(response.headers().get(headers::MAX_AGE).unwrap(), "600");
        assert!(response.headers().get(headers::ALLOW_CREDENTIALS).is_none());

        let response = run(cors, with_origin(Method::GET, "https://a.test")).await;
        assert_eq!(
            response.headers().get(headers::EXPOSE_HEADERS).unwrap(),
            "x-response-time"
        );
    }
}
