//! HTTP/1.1 listener serving an [`App`].
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use switchyard_server::{App, Server, ServerSettings};
//!
//! let app = Arc::new(App::new());
//! Server::new(app, ServerSettings::default()).run().await?;
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};

use switchyard_core::{Response, ResponseExt};

use crate::app::App;
use crate::error::ServerError;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Bind address.
    pub http_addr: String,
    /// Upper bound for reading the body and producing the response.
    pub request_timeout: Duration,
    /// How long to wait for open connections after shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8080".to_string(),
            request_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Serves an [`App`] over HTTP/1.1.
#[derive(Debug)]
pub struct Server {
    app: Arc<App>,
    settings: ServerSettings,
}

impl Server {
    /// Creates a server for `app`.
    #[must_use]
    pub fn new(app: Arc<App>, settings: ServerSettings) -> Self {
        Self { app, settings }
    }

    /// The served app.
    #[must_use]
    pub fn app(&self) -> &Arc<App> {
        &self.app
    }

    /// Listener settings.
    #[must_use]
    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    /// Runs until SIGTERM or SIGINT.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` if the address is invalid or cannot be bound.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Binds the configured address and serves until `shutdown` triggers.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` if the address is invalid or cannot be bound.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr: SocketAddr =
            self.settings
                .http_addr
                .parse()
                .map_err(|e: std::net::AddrParseError| ServerError::InvalidAddress {
                    addr: self.settings.http_addr.clone(),
                    reason: e.to_string(),
                })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        self.serve(listener, shutdown).await
    }

    /// Serves connections from an already bound listener until `shutdown` triggers.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Io` if the listener's address cannot be read.
    pub async fn serve(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "server listening");

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => {
                        let server = Arc::clone(&server);
                        let token = tracker.acquire();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(e) = server.handle_connection(stream, remote_addr, shutdown).await {
                                tracing::debug!(client = %remote_addr, error = %e, "connection error");
                            }
                            drop(token);
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "failed to accept connection"),
                },
                () = shutdown.recv() => {
                    tracing::info!("shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }

        tokio::select! {
            () = tracker.wait_for_idle() => tracing::info!("all connections closed"),
            () = tokio::time::sleep(server.settings.shutdown_timeout) => {
                tracing::warn!(
                    active = tracker.active_connections(),
                    "shutdown timeout reached with connections still open"
                );
            }
        }

        tracing::info!("server stopped");
        Ok(())
    }

    async fn handle_connection(
        self: &Arc<Self>,
        stream: TcpStream,
        remote_addr: SocketAddr,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let io = TokioIo::new(stream);
        let server = Arc::clone(self);
        let service = service_fn(move |request: http::Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { Ok::<_, Infallible>(server.handle_request(request, remote_addr).await) }
        });

        let connection = http1::Builder::new().serve_connection(io, service);
        tokio::select! {
            result = connection => result,
            () = shutdown.recv() => Ok(()),
        }
    }

    async fn handle_request(&self, request: http::Request<Incoming>, remote_addr: SocketAddr) -> Response {
        let timeout = self.settings.request_timeout;
        let (parts, body) = request.into_parts();

        let bytes = match tokio::time::timeout(timeout, body.collect()).await {
            Ok(Ok(collected)) => collected.to_bytes(),
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "failed to read request body");
                return Response::json_error(
                    StatusCode::BAD_REQUEST,
                    "Bad Request",
                    "Failed to read request body",
                );
            }
            Err(_) => {
                return Response::json_error(
                    StatusCode::REQUEST_TIMEOUT,
                    "Request Timeout",
                    "Request body was not received in time",
                );
            }
        };

        let request = http::Request::from_parts(parts, Full::new(bytes));
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        match tokio::time::timeout(timeout, self.app.handle(request, Some(remote_addr))).await {
            Ok(response) => response,
            Err(_) => {
                tracing::warn!(%method, %path, "request timed out");
                Response::json_error(
                    StatusCode::GATEWAY_TIMEOUT,
                    "Gateway Timeout",
                    "The request took too long to process",
                )
            }
        }
    }
}
