//! In-process host for route modules.
//!
//! [`App`] implements [`HostServer`]: handler collections are mounted at path
//! prefixes and global middleware runs before dispatch. Requests are routed
//! to the longest mount prefix that matches on a segment boundary, so
//! `/api/v1/auth` wins over `/api` for `/api/v1/auth/login`, and `/auth`
//! does not match `/authors`.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use http::uri::PathAndQuery;
use http::{StatusCode, Uri};
use parking_lot::RwLock;

use switchyard_core::{
    AccessObserver, BoxFuture, HandlerCollection, HostServer, Middleware, MountError, Next,
    Request, RequestContext, Response, ResponseExt,
};

type Mounts = BTreeMap<String, Arc<dyn HandlerCollection>>;

/// Mount table used as the innermost handler of the global chain.
#[derive(Default)]
struct MountTable {
    mounts: RwLock<Mounts>,
}

impl MountTable {
    fn resolve(&self, path: &str) -> Option<(String, Arc<dyn HandlerCollection>)> {
        self.mounts
            .read()
            .iter()
            .filter(|(mount, _)| matches_prefix(mount, path))
            .max_by_key(|(mount, _)| mount.len())
            .map(|(mount, collection)| (mount.clone(), Arc::clone(collection)))
    }
}

impl HandlerCollection for MountTable {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        mut request: Request,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let path = request.uri().path().to_string();
            let Some((mount, collection)) = self.resolve(&path) else {
                return Response::json_error(
                    StatusCode::NOT_FOUND,
                    "Not Found",
                    &format!("No route mounted for {path}"),
                );
            };

            if let Some(uri) = relative_uri(request.uri(), &mount) {
                *request.uri_mut() = uri;
            }
            ctx.set_mount_path(mount);
            collection.handle(ctx, request).await
        })
    }
}

fn matches_prefix(mount: &str, path: &str) -> bool {
    mount == "/"
        || path == mount
        || path
            .strip_prefix(mount)
            .is_some_and(|rest| rest.starts_with('/'))
}

// Strips the mount prefix from the path, keeping the query.
fn relative_uri(uri: &Uri, mount: &str) -> Option<Uri> {
    if mount == "/" {
        return None;
    }
    let rest = uri.path().strip_prefix(mount)?;
    let rest = if rest.is_empty() { "/" } else { rest };
    let path_and_query = match uri.query() {
        Some(query) => format!("{rest}?{query}"),
        None => rest.to_string(),
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).ok()?);
    Uri::from_parts(parts).ok()
}

fn normalize_mount(path: &str) -> Result<String, MountError> {
    if !path.starts_with('/') || path.contains(char::is_whitespace) {
        return Err(MountError::InvalidPath(path.to_string()));
    }
    let trimmed = path.trim_end_matches('/');
    Ok(if trimmed.is_empty() { "/".to_string() } else { trimmed.to_string() })
}

/// An in-process [`HostServer`].
///
/// ```
/// use std::sync::Arc;
/// use bytes::Bytes;
/// use http_body_util::Full;
/// use switchyard_core::{FnCollection, HostServer};
/// use switchyard_server::App;
///
/// # tokio_test::block_on(async {
/// let app = App::new();
/// app.mount("/persons", Arc::new(FnCollection::new(|_ctx, req: switchyard_core::Request| async move {
///     http::Response::new(Full::new(Bytes::from(req.uri().path().to_string())))
/// }))).unwrap();
///
/// let request = http::Request::builder()
///     .uri("/persons/42")
///     .body(Full::new(Bytes::new()))
///     .unwrap();
/// let response = app.handle(request, None).await;
/// assert_eq!(response.status(), 200);
/// # });
/// ```
#[derive(Default)]
pub struct App {
    table: MountTable,
    global: RwLock<Vec<Arc<dyn Middleware>>>,
    observer: RwLock<Option<Arc<dyn AccessObserver>>>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("mounts", &self.mounted_paths())
            .field("global_middleware", &self.middleware_names())
            .finish_non_exhaustive()
    }
}

impl App {
    /// Creates an empty app.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports every request that reached a mount to `observer`.
    pub fn set_observer(&self, observer: Arc<dyn AccessObserver>) {
        *self.observer.write() = Some(observer);
    }

    /// Mounted paths, sorted.
    #[must_use]
    pub fn mounted_paths(&self) -> Vec<String> {
        self.table.mounts.read().keys().cloned().collect()
    }

    /// Whether something is mounted at exactly `path`.
    #[must_use]
    pub fn is_mounted(&self, path: &str) -> bool {
        normalize_mount(path).is_ok_and(|p| self.table.mounts.read().contains_key(&p))
    }

    /// Names of the global middleware, in execution order.
    #[must_use]
    pub fn middleware_names(&self) -> Vec<&'static str> {
        self.global.read().iter().map(|m| m.name()).collect()
    }

    /// Runs one request through the global chain and the mount table.
    pub async fn handle(&self, request: Request, client_addr: Option<SocketAddr>) -> Response {
        let mut ctx = RequestContext::new();
        if let Some(addr) = client_addr {
            ctx = ctx.with_client_addr(addr);
        }

        let global = self.global.read().clone();
        let response = Next::new(&global, &self.table).run(&mut ctx, request).await;

        let observer = self.observer.read().clone();
        if let (Some(observer), Some(mount)) = (observer, ctx.mount_path()) {
            let status = response.status().as_u16();
            let duration_ms = ctx.elapsed().as_secs_f64() * 1000.0;
            observer.record(mount, duration_ms, status, status >= 500);
        }

        response
    }
}

impl HostServer for App {
    fn mount(&self, path: &str, collection: Arc<dyn HandlerCollection>) -> Result<(), MountError> {
        let path = normalize_mount(path)?;
        if self.table.mounts.write().insert(path.clone(), collection).is_some() {
            tracing::debug!(mount = %path, "replaced mounted collection");
        }
        Ok(())
    }

    fn unmount(&self, path: &str) -> bool {
        normalize_mount(path).is_ok_and(|p| self.table.mounts.write().remove(&p).is_some())
    }

    fn use_middleware(&self, middleware: Arc<dyn Middleware>) {
        self.global.write().push(middleware);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::{BodyExt, Full};
    use parking_lot::Mutex;
    use switchyard_core::{FnCollection, FnMiddleware};

    fn echo(tag: &'static str) -> Arc<dyn HandlerCollection> {
        Arc::new(FnCollection::new(move |ctx: &mut RequestContext, req: Request| {
            let body = format!(
                "{tag} {} {}",
                ctx.mount_path().unwrap_or("-"),
                req.uri().path_and_query().map_or("", PathAndQuery::as_str)
            );
            async move { http::Response::new(Full::new(Bytes::from(body))) }
        }))
    }

    fn failing() -> Arc<dyn HandlerCollection> {
        Arc::new(FnCollection::new(|_ctx, _req| async {
            Response::error(StatusCode::INTERNAL_SERVER_ERROR, "boom")
        }))
    }

    fn get(uri: &str) -> Request {
        http::Request::builder()
            .uri(uri)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    async fn body(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(String, u16, bool)>>);

    impl AccessObserver for Recorder {
        fn record(&self, route_path: &str, _duration_ms: f64, status: u16, is_error: bool) {
            self.0.lock().push((route_path.to_string(), status, is_error));
        }
    }

    #[test]
    fn test_prefix_matching() {
        assert!(matches_prefix("/auth", "/auth"));
        assert!(matches_prefix("/auth", "/auth/login"));
        assert!(!matches_prefix("/auth", "/authors"));
        assert!(matches_prefix("/", "/anything"));
    }

    #[test]
    fn test_mount_rejects_relative_path() {
        let app = App::new();
        assert_eq!(
            app.mount("persons", echo("p")),
            Err(MountError::InvalidPath("persons".to_string()))
        );
        assert!(app.mounted_paths().is_empty());
    }

    #[test]
    fn test_mount_normalizes_trailing_slash() {
        let app = App::new();
        app.mount("/persons/", echo("p")).unwrap();
        assert!(app.is_mounted("/persons"));
        assert!(app.unmount("/persons"));
        assert!(!app.unmount("/persons"));
    }

    #[tokio::test]
    async fn test_longest_prefix_wins_and_path_is_relative() {
        let app = App::new();
        app.mount("/api", echo("api")).unwrap();
        app.mount("/api/v1/auth", echo("auth")).unwrap();

        let response = app.handle(get("/api/v1/auth/login?next=1"), None).await;
        assert_eq!(body(response).await, "auth /api/v1/auth /login?next=1");

        let response = app.handle(get("/api/other"), None).await;
        assert_eq!(body(response).await, "api /api /other");

        let response = app.handle(get("/api"), None).await;
        assert_eq!(body(response).await, "api /api /");
    }

    #[tokio::test]
    async fn test_unmatched_path_is_json_404() {
        let app = App::new();
        app.mount("/auth", echo("auth")).unwrap();

        let response = app.handle(get("/authors"), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json: serde_json::Value = serde_json::from_str(&body(response).await).unwrap();
        assert_eq!(json["error"], "Not Found");
    }

    #[tokio::test]
    async fn test_global_middleware_runs_in_order() {
        let app = App::new();
        app.mount("/auth", echo("auth")).unwrap();
        for name in ["first", "second"] {
            app.use_middleware(Arc::new(FnMiddleware::new(name, move |ctx, req, next| {
                Box::pin(async move {
                    let mut response = next.run(ctx, req).await;
                    response
                        .headers_mut()
                        .append("x-chain", http::HeaderValue::from_static(name));
                    response
                })
            })));
        }
        assert_eq!(app.middleware_names(), vec!["first", "second"]);

        let response = app.handle(get("/missing"), None).await;
        let chain: Vec<_> = response
            .headers()
            .get_all("x-chain")
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(chain, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_observer_sees_mounted_requests_only() {
        let app = App::new();
        let recorder = Arc::new(Recorder::default());
        app.set_observer(recorder.clone());
        app.mount("/persons", echo("p")).unwrap();
        app.mount("/broken", failing()).unwrap();

        app.handle(get("/persons/1"), None).await;
        app.handle(get("/broken"), None).await;
        app.handle(get("/nowhere"), None).await;

        assert_eq!(
            *recorder.0.lock(),
            vec![
                ("/persons".to_string(), 200, false),
                ("/broken".to_string(), 500, true),
            ]
        );
    }

    #[tokio::test]
    async fn test_remount_replaces_collection() {
        let app = App::new();
        app.mount("/auth", echo("old")).unwrap();
        app.mount("/auth", echo("new")).unwrap();

        let response = app.handle(get("/auth"), None).await;
        assert!(body(response).await.starts_with("new"));
        assert_eq!(app.mounted_paths(), vec!["/auth"]);
    }
}
