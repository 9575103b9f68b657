//! Wiring a configuration into a running server.

use std::sync::Arc;
use std::time::Duration;

use switchyard_config::{ServerConfig, SwitchyardConfig};
use switchyard_loader::ModuleProvider;
use switchyard_server::{App, Server, ServerSettings, ShutdownSignal};

use crate::error::ManagerError;
use crate::manager::RouteManager;
use crate::watcher::RouteWatcher;

/// Installs the log subscriber and the metrics recorder described by `config`.
///
/// # Errors
///
/// Returns `ManagerError::Telemetry` if either is already installed or the
/// settings are invalid.
pub fn init_telemetry(config: &SwitchyardConfig) -> Result<(), ManagerError> {
    switchyard_telemetry::init_logging(&config.logging.to_log_config())?;
    switchyard_telemetry::init_metrics(&config.metrics.to_metrics_config())?;
    Ok(())
}

/// Listener settings for a server section.
#[must_use]
pub fn server_settings(server: &ServerConfig) -> ServerSettings {
    ServerSettings {
        http_addr: server.http_addr.clone(),
        request_timeout: Duration::from_millis(server.request_timeout_ms),
        shutdown_timeout: Duration::from_secs(server.shutdown_timeout_secs),
    }
}

/// Validates `config`, builds an [`App`] and an initialized manager for it,
/// and connects the app's traffic reports to the manager.
///
/// # Errors
///
/// Fails on invalid configuration or when initialization fails.
pub async fn build(
    config: SwitchyardConfig,
    provider: Arc<dyn ModuleProvider>,
) -> Result<Arc<RouteManager<App>>, ManagerError> {
    config.validate()?;

    let app = Arc::new(App::new());
    let manager = Arc::new(RouteManager::new(Arc::clone(&app), config, provider)?);
    manager.initialize().await?;
    app.set_observer(manager.access_recorder());
    Ok(manager)
}

/// Serves the routes described by `config` until SIGTERM or SIGINT.
///
/// # Errors
///
/// See [`serve_with_shutdown`].
pub async fn serve(
    config: SwitchyardConfig,
    provider: Arc<dyn ModuleProvider>,
) -> Result<(), ManagerError> {
    serve_with_shutdown(config, provider, ShutdownSignal::with_os_signals()).await
}

/// Serves the routes described by `config` until `shutdown` triggers.
///
/// With `routes.watch` set, changed module files are reloaded while serving.
/// The manager is shut down once the server stops.
///
/// # Errors
///
/// Fails on invalid configuration, when initialization fails, when the routes
/// directory cannot be watched, or when the listener cannot be bound.
pub async fn serve_with_shutdown(
    config: SwitchyardConfig,
    provider: Arc<dyn ModuleProvider>,
    shutdown: ShutdownSignal,
) -> Result<(), ManagerError> {
    let settings = server_settings(&config.server);
    let manager = build(config, provider).await?;

    let watcher = if manager.config().routes.watch {
        let routes = &manager.config().routes;
        let watcher = RouteWatcher::new(&routes.directory, routes.file_extensions.clone())?;
        Some(tokio::spawn(watcher.run(Arc::clone(&manager))))
    } else {
        None
    };

    let result = Server::new(Arc::clone(manager.host()), settings)
        .run_with_shutdown(shutdown)
        .await;

    if let Some(handle) = watcher {
        handle.abort();
    }
    manager.shutdown().await;
    result.map_err(ManagerError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_loader::StaticProvider;

    #[test]
    fn test_server_settings_conversion() {
        let server = ServerConfig {
            http_addr: "127.0.0.1:9000".to_string(),
            request_timeout_ms: 1500,
            shutdown_timeout_secs: 5,
            ..ServerConfig::default()
        };
        let settings = server_settings(&server);
        assert_eq!(settings.http_addr, "127.0.0.1:9000");
        assert_eq!(settings.request_timeout, Duration::from_millis(1500));
        assert_eq!(settings.shutdown_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_config() {
        let mut config = SwitchyardConfig::default();
        config.server.http_addr = "nowhere".to_string();
        let result = build(config, Arc::new(StaticProvider::new())).await;
        assert!(matches!(result, Err(ManagerError::Config(_))));
    }
}
