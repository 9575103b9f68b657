//! Security response headers.
//!
//! Sets a conservative baseline of browser hardening headers on every
//! response. `Content-Security-Policy` is only sent outside local and
//! development environments, where it tends to break tooling.

use http::HeaderValue;
use switchyard_core::{BoxFuture, Middleware, Next, Request, RequestContext, Response};

/// Environment names in which the content security policy is left off.
pub const RELAXED_ENVIRONMENTS: [&str; 3] = ["development", "local", "test"];

/// Default content security policy.
pub const DEFAULT_CSP: &str = "default-src 'self';base-uri 'self';font-src 'self' https: data:;\
form-action 'self';frame-ancestors 'self';img-src 'self' data:;object-src 'none';\
script-src 'self';script-src-attr 'none';style-src 'self' https: 'unsafe-inline';\
upgrade-insecure-requests";

const BASELINE: [(&str, &str); 10] = [
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "no-referrer"),
    (
        "strict-transport-security",
        "max-age=15552000; includeSubDomains",
    ),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-permitted-cross-domain-policies", "none"),
];

/// Security headers middleware.
#[derive(Debug, Clone)]
pub struct SecurityHeadersMiddleware {
    content_security_policy: Option<HeaderValue>,
}

impl SecurityHeadersMiddleware {
    /// Creates the middleware for the named deployment environment.
    #[must_use]
    pub fn for_environment(environment: &str) -> Self {
        let relaxed = RELAXED_ENVIRONMENTS
            .iter()
            .any(|env| env.eq_ignore_ascii_case(environment.trim()));

        Self {
            content_security_policy: (!relaxed).then(|| HeaderValue::from_static(DEFAULT_CSP)),
        }
    }

    /// Returns whether `Content-Security-Policy` will be sent.
    #[must_use]
    pub const fn csp_enabled(&self) -> bool {
        self.content_security_policy.is_some()
    }
}

impl Middleware for SecurityHeadersMiddleware {
    fn name(&self) -> &'static str {
        "security-headers"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let mut response = next.run(ctx, request).await;
            let headers = response.headers_mut();

            for (name, value) in BASELINE {
                headers.insert(name, HeaderValue::from_static(value));
            }
            if let Some(csp) = &self.content_security_policy {
                headers.insert(http::header::CONTENT_SECURITY_POLICY, csp.clone());
            }
            headers.remove("x-powered-by");

            response
        })
    }
}
