//! Core middleware trait and chain continuation.
//!
//! Middleware wraps a [`HandlerCollection`]: it sees the request before the
//! collection does and the response after. A middleware either calls
//! [`Next::run`] exactly once or short-circuits with its own response.
//!
//! # Example
//!
//! ```
//! use switchyard_core::{BoxFuture, Middleware, Next, Request, RequestContext, Response};
//!
//! struct Tagging;
//!
//! impl Middleware for Tagging {
//!     fn name(&self) -> &'static str {
//!         "tagging"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut RequestContext,
//!         request: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, Response> {
//!         Box::pin(async move {
//!             let mut response = next.run(ctx, request).await;
//!             response
//!                 .headers_mut()
//!                 .insert("x-tagged", http::HeaderValue::from_static("1"));
//!             response
//!         })
//!     }
//! }
//! ```

use crate::context::RequestContext;
use crate::handler::HandlerCollection;
use crate::types::{Request, Response};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A named request-processing unit.
///
/// # Invariants
///
/// - `process` MUST call `next.run()` at most once
/// - Not calling `next.run()` short-circuits the remaining chain
pub trait Middleware: Send + Sync + 'static {
    /// Returns the name of this middleware, used in logs and introspection.
    fn name(&self) -> &'static str;

    /// Processes the request, optionally delegating to the rest of the chain.
    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response>;
}

/// Continuation for the remaining middleware and the final handler collection.
///
/// Consumed by [`Next::run`], so it can only be invoked once.
pub struct Next<'a> {
    stack: &'a [Arc<dyn Middleware>],
    endpoint: &'a dyn HandlerCollection,
}

impl<'a> Next<'a> {
    /// Creates a continuation that runs `stack` in order and then `endpoint`.
    #[must_use]
    pub fn new(stack: &'a [Arc<dyn Middleware>], endpoint: &'a dyn HandlerCollection) -> Self {
        Self { stack, endpoint }
    }

    /// Runs the next middleware, or the handler collection when the stack is exhausted.
    pub async fn run(self, ctx: &mut RequestContext, request: Request) -> Response {
        match self.stack.split_first() {
            Some((current, rest)) => {
                let next = Next {
                    stack: rest,
                    endpoint: self.endpoint,
                };
                current.process(ctx, request, next).await
            }
            None => self.endpoint.handle(ctx, request).await,
        }
    }

    /// Returns how many middleware remain before the handler collection.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.stack.len()
    }
}

/// A middleware built from an async closure.
///
/// ```
/// use switchyard_core::{FnMiddleware, Middleware};
///
/// let mw = FnMiddleware::new("passthrough", |ctx, req, next| Box::pin(async move {
///     next.run(ctx, req).await
/// }));
/// assert_eq!(mw.name(), "passthrough");
/// ```
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

impl<F> FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut RequestContext, Request, Next<'a>) -> BoxFuture<'a, Response>
        + Send
        + Sync
        + 'static,
{
    /// Creates a function-based middleware.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut RequestContext, Request, Next<'a>) -> BoxFuture<'a, Response>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        (self.func)(ctx, request, next)
    }
}
