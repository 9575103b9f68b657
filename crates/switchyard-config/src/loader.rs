//! Layered configuration loading.

use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::schema::LogFormat;
use crate::{ConfigError, SwitchyardConfig};

/// Loads a [`SwitchyardConfig`] from defaults, a file and the environment.
///
/// Later layers override earlier ones:
/// 1. Built-in defaults or a preset
/// 2. A TOML or JSON file
/// 3. `PREFIX__SECTION__KEY` environment variables
///
/// ```no_run
/// use switchyard_config::ConfigLoader;
///
/// # fn main() -> Result<(), switchyard_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_optional_file("switchyard.toml")?
///     .with_dotenv()
///     .with_env_prefix("SWITCHYARD")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: SwitchyardConfig,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Create a loader seeded with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the development preset.
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = SwitchyardConfig::development();
        self
    }

    /// Start from the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = SwitchyardConfig::production();
        self
    }

    /// Load a `.toml` or `.json` file, replacing the current layer.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, unreadable, malformed,
    /// has an unknown extension or contains unknown fields.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        self.config = parse(&content, format)?;
        Ok(self)
    }

    /// Like [`with_file`](Self::with_file), but a missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists and cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration text in the given format (`toml` or `json`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for malformed content or an unknown format.
    ///
    /// ```
    /// use switchyard_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("[routes]\ndirectory = \"api\"", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    /// assert_eq!(config.routes.directory, "api");
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = parse(content, format)?;
        Ok(self)
    }

    /// Apply `PREFIX__SECTION__KEY` environment overrides on [`load`](Self::load).
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Populate the process environment from a `.env` file, if present.
    #[must_use]
    pub fn with_dotenv(self) -> Self {
        // A missing .env is the common case.
        let _ = dotenvy::dotenv();
        self
    }

    /// Apply environment overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an override does not parse or validation fails.
    pub fn load(mut self) -> Result<SwitchyardConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let vars: Vec<(String, String)> = env::vars()
                .filter(|(k, _)| k.starts_with(&prefix))
                .collect();
            for (key, value) in vars {
                self.apply_env_var(&key, &value, &prefix)?;
            }
        }

        self.config.validate()?;
        Ok(self.config)
    }

    /// Return the current layer without environment overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> SwitchyardConfig {
        self.config
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(path) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__")) else {
            return Ok(());
        };
        let parts: Vec<&str> = path.split("__").collect();
        let c = &mut self.config;

        match parts.as_slice() {
            ["SERVER", "HTTP_ADDR"] => c.server.http_addr = value.to_string(),
            ["SERVER", "ENVIRONMENT"] => c.server.environment = value.to_string(),
            ["SERVER", "REQUEST_TIMEOUT_MS"] => c.server.request_timeout_ms = number(key, value)?,
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
                c.server.shutdown_timeout_secs = number(key, value)?;
            }

            ["ROUTES", "DIRECTORY"] => c.routes.directory = value.to_string(),
            ["ROUTES", "FILE_EXTENSIONS"] => c.routes.file_extensions = list(value),
            ["ROUTES", "EXCLUDE_PATTERNS"] => c.routes.exclude_patterns = Some(list(value)),
            ["ROUTES", "STRIP_SUFFIXES"] => c.routes.strip_suffixes = Some(list(value)),
            ["ROUTES", "AUTO_LOAD"] => c.routes.auto_load = boolean(key, value)?,
            ["ROUTES", "LOAD_TIMEOUT_MS"] => c.routes.load_timeout_ms = number(key, value)?,
            ["ROUTES", "WATCH"] => c.routes.watch = boolean(key, value)?,

            ["MIDDLEWARE", "APPLY_GLOBAL"] => c.middleware.apply_global = boolean(key, value)?,
            ["MIDDLEWARE", "GLOBAL"] => c.middleware.global = Some(list(value)),
            ["MIDDLEWARE", "CORS", "ORIGINS"] => c.middleware.cors.origins = list(value),
            ["MIDDLEWARE", "COMPRESSION", "MIN_SIZE"] => {
                c.middleware.compression.min_size = number(key, value)?;
            }
            ["MIDDLEWARE", "RATE_LIMIT", "LIMIT"] => {
                c.middleware.rate_limit.limit = number(key, value)?;
            }
            ["MIDDLEWARE", "RATE_LIMIT", "WINDOW_SECS"] => {
                c.middleware.rate_limit.window_secs = number(key, value)?;
            }

            ["METRICS", "ENABLED"] => c.metrics.enabled = boolean(key, value)?,
            ["METRICS", "PROMETHEUS_ADDR"] => {
                c.metrics.prometheus_addr = (!value.is_empty()).then(|| value.to_string());
            }

            ["LOGGING", "LEVEL"] => c.logging.level = value.to_string(),
            ["LOGGING", "FORMAT"] => {
                c.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => return Err(ConfigError::env_parse_error(key, "expected 'json' or 'pretty'")),
                };
            }

            _ => {}
        }

        Ok(())
    }
}

fn parse(content: &str, format: &str) -> Result<SwitchyardConfig, ConfigError> {
    match format.to_lowercase().as_str() {
        "toml" => Ok(toml::from_str(content)?),
        "json" => Ok(serde_json::from_str(content)?),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

fn number<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))
}

fn boolean(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::env_parse_error(key, "expected boolean")),
    }
}

// Comma-separated, blanks dropped.
fn list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_loader_defaults() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config, SwitchyardConfig::default());
    }

    #[test]
    fn test_loader_presets() {
        let dev = ConfigLoader::new().with_development().load().unwrap();
        assert_eq!(dev.logging.level, "debug");

        let prod = ConfigLoader::new().with_production().load().unwrap();
        assert_eq!(prod.server.environment, "production");
    }

    #[test]
    fn test_loader_with_string_json() {
        let json = r#"{"routes": {"directory": "api", "auto_load": false}}"#;
        let config = ConfigLoader::new()
            .with_string(json, "json")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.routes.directory, "api");
        assert!(!config.routes.auto_load);
    }

    #[test]
    fn test_loader_unsupported_format() {
        let result = ConfigLoader::new().with_string("", "yaml");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(f)) if f == "yaml"));
    }

    #[test]
    fn test_loader_with_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[metrics]\nenabled = false").unwrap();

        let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_loader_with_file_not_found() {
        let result = ConfigLoader::new().with_file("/nonexistent/switchyard.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_loader_with_optional_file_not_found() {
        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/switchyard.toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.routes.directory, "routes");
    }

    #[test]
    fn test_loader_validates_on_load() {
        let toml = "[routes]\nexclude_patterns = [\"[\"]";
        let loader = ConfigLoader::new().with_string(toml, "toml").unwrap();
        assert!(loader.load().is_err());

        let loader = ConfigLoader::new().with_string(toml, "toml").unwrap();
        let unvalidated = loader.load_unvalidated();
        assert_eq!(unvalidated.routes.exclude_patterns, Some(vec!["[".to_string()]));
    }

    #[test]
    fn test_apply_env_var_sections() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("T__ROUTES__DIRECTORY", "/srv/routes", "T").unwrap();
        loader.apply_env_var("T__ROUTES__FILE_EXTENSIONS", ".js, .mjs", "T").unwrap();
        loader.apply_env_var("T__MIDDLEWARE__GLOBAL", "cors,access-log", "T").unwrap();
        loader.apply_env_var("T__MIDDLEWARE__RATE_LIMIT__LIMIT", "5", "T").unwrap();
        loader.apply_env_var("T__METRICS__ENABLED", "off", "T").unwrap();
        loader.apply_env_var("T__LOGGING__FORMAT", "pretty", "T").unwrap();

        let config = loader.load_unvalidated();
        assert_eq!(config.routes.directory, "/srv/routes");
        assert_eq!(config.routes.file_extensions, vec![".js", ".mjs"]);
        assert_eq!(
            config.middleware.global,
            Some(vec!["cors".to_string(), "access-log".to_string()])
        );
        assert_eq!(config.middleware.rate_limit.limit, 5);
        assert!(!config.metrics.enabled);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_apply_env_var_invalid_values() {
        let mut loader = ConfigLoader::new();
        assert!(loader
            .apply_env_var("T__ROUTES__LOAD_TIMEOUT_MS", "soon", "T")
            .is_err());
        assert!(loader.apply_env_var("T__ROUTES__AUTO_LOAD", "maybe", "T").is_err());
        assert!(loader.apply_env_var("T__LOGGING__FORMAT", "xml", "T").is_err());
    }

    #[test]
    fn test_apply_env_var_unknown_key_ignored() {
        let mut loader = ConfigLoader::new();
        assert!(loader.apply_env_var("T__NOPE__KEY", "1", "T").is_ok());
        assert!(loader.apply_env_var("TX", "1", "T").is_ok());
    }

    #[test]
    fn test_list_parsing() {
        assert_eq!(list(" a, ,b ,"), vec!["a", "b"]);
        assert!(list("").is_empty());
    }
}
