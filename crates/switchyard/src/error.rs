//! Orchestrator error types.

use switchyard_config::ConfigError;
use switchyard_loader::LoaderError;
use switchyard_server::ServerError;
use switchyard_telemetry::TelemetryError;
use thiserror::Error;

/// Errors raised by [`RouteManager`](crate::RouteManager) and the bootstrap helpers.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// The manager was shut down and cannot be initialized again.
    #[error("route manager has been shut down")]
    ShutDown,

    /// Discovering or listing route modules failed.
    #[error("route discovery failed: {0}")]
    Discovery(#[from] LoaderError),

    /// A loaded module could not be mounted or registered.
    #[error("failed to register route '{route}'")]
    Registration {
        /// Mount path of the module.
        route: String,
    },

    /// Configuration was invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Logging or metrics could not be installed.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// The HTTP server failed.
    #[error(transparent)]
    Server(#[from] ServerError),

    /// The routes directory could not be watched.
    #[error("failed to watch routes directory: {0}")]
    Watch(String),
}

impl ManagerError {
    /// Creates a registration error.
    pub fn registration(route: impl Into<String>) -> Self {
        Self::Registration {
            route: route.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ManagerError::registration("/auth").to_string(),
            "failed to register route '/auth'"
        );
        assert!(ManagerError::ShutDown.to_string().contains("shut down"));

        let err: ManagerError = LoaderError::directory_not_found("/srv/routes").into();
        assert!(err.to_string().contains("/srv/routes"));
    }
}
