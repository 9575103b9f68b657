//! Loader error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a discovery or batch load.
///
/// Failures of individual modules are not errors at this level; they are
/// recorded as [`LoadError`](crate::LoadError)s and the batch continues.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The routes directory does not exist or is not a directory.
    #[error("routes directory not found: {path}")]
    DirectoryNotFound {
        /// Directory that was scanned.
        path: PathBuf,
    },

    /// The routes directory could not be listed.
    #[error("failed to read routes directory {path}: {source}")]
    DirectoryUnreadable {
        /// Directory that was scanned.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An exclude pattern is not a valid regular expression.
    #[error("invalid exclude pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Regex compilation error.
        #[source]
        source: regex::Error,
    },
}

impl LoaderError {
    /// Creates a directory-not-found error.
    pub fn directory_not_found(path: impl Into<PathBuf>) -> Self {
        Self::DirectoryNotFound { path: path.into() }
    }

    /// Creates a directory-unreadable error.
    pub fn directory_unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryUnreadable {
            path: path.into(),
            source,
        }
    }
}

/// Errors reported by a [`ModuleProvider`](crate::ModuleProvider).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// No constructor is registered for the module.
    #[error("no module registered under '{0}'")]
    NotRegistered(String),

    /// The module's constructor failed.
    #[error("module initialisation failed: {0}")]
    Failed(String),
}

/// Result alias for loader operations.
pub type LoaderResult<T> = Result<T, LoaderError>;
