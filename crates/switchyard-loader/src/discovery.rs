//! Route file discovery and name/path derivation.
//!
//! A file in the routes directory is a candidate when its name ends with one
//! of the configured extensions and matches none of the exclude patterns.
//! Its module name is the file stem with known suffixes stripped, and its
//! mount path comes from an override table or from the name itself.
//!
//! | File                        | Name             | Path (unversioned) | Path (`v1`)             |
//! |-----------------------------|------------------|--------------------|-------------------------|
//! | `auth-routes.js`            | `auth`           | `/auth`            | `/api/v1/auth`          |
//! | `person-routes.js`          | `person`         | `/persons`         | `/api/v1/persons`       |
//! | `public-courses-routes.js`  | `public-courses` | `/public`          | `/api/v1/public`        |
//! | `course_sessions.js`        | `course_sessions`| `/course-sessions` | `/api/v1/course-sessions` |

use crate::error::{LoaderError, LoaderResult};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default exclude patterns, matched against the bare file name.
pub const DEFAULT_EXCLUDE_PATTERNS: [&str; 8] = [
    r"\.(bak|backup|orig|old)$",
    r"~$",
    r"\.(test|spec)\.",
    r"^index\.",
    r"^config\.",
    r"^middleware\.",
    r"^(utils|helpers)\.",
    r"^\.",
];

/// Default suffixes stripped from module names.
pub const DEFAULT_STRIP_SUFFIXES: [&str; 2] = ["-routes", "-advanced"];

/// Uncompiled discovery settings, as they appear in configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoverySettings {
    /// Accepted file extensions, including the leading dot.
    pub extensions: Vec<String>,
    /// Regular expressions; a matching file name is skipped.
    pub exclude_patterns: Vec<String>,
    /// Suffixes stripped from the file stem, repeatedly.
    pub strip_suffixes: Vec<String>,
    /// Module name to mount path overrides.
    pub path_overrides: BTreeMap<String, String>,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            extensions: vec![".js".to_string()],
            exclude_patterns: DEFAULT_EXCLUDE_PATTERNS.iter().map(|p| (*p).to_string()).collect(),
            strip_suffixes: DEFAULT_STRIP_SUFFIXES.iter().map(|s| (*s).to_string()).collect(),
            path_overrides: BTreeMap::from([
                ("person".to_string(), "/persons".to_string()),
                ("public-courses".to_string(), "/public".to_string()),
            ]),
        }
    }
}

/// Compiled discovery rules.
#[derive(Debug, Clone)]
pub struct DiscoveryRules {
    extensions: Vec<String>,
    excludes: Vec<Regex>,
    strip_suffixes: Vec<String>,
    path_overrides: BTreeMap<String, String>,
}

/// A file selected for loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleCandidate {
    /// Bare file name, e.g. `auth-routes.js`.
    pub file_name: String,
    /// Full path to the file.
    pub source_path: PathBuf,
    /// Derived module name, e.g. `auth`.
    pub name: String,
    /// Derived mount path, e.g. `/auth` or `/api/v1/auth`.
    pub route_path: String,
    /// API version for files found in a version subdirectory.
    pub version: Option<String>,
}

impl DiscoveryRules {
    /// Compiles settings into rules.
    ///
    /// # Errors
    ///
    /// Returns `LoaderError::InvalidPattern` for a malformed exclude pattern.
    pub fn new(settings: &DiscoverySettings) -> LoaderResult<Self> {
        let excludes = settings
            .exclude_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| LoaderError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            extensions: settings.extensions.clone(),
            excludes,
            strip_suffixes: settings.strip_suffixes.clone(),
            path_overrides: settings.path_overrides.clone(),
        })
    }

    /// Adds or replaces a path override.
    pub fn add_path_override(&mut self, name: impl Into<String>, path: impl Into<String>) {
        self.path_overrides.insert(name.into(), path.into());
    }

    /// Returns whether a file name is eligible for loading.
    #[must_use]
    pub fn is_candidate(&self, file_name: &str) -> bool {
        self.matching_extension(file_name).is_some()
            && !self.excludes.iter().any(|re| re.is_match(file_name))
    }

    fn matching_extension(&self, file_name: &str) -> Option<&str> {
        self.extensions
            .iter()
            .map(String::as_str)
            .find(|ext| file_name.len() > ext.len() && file_name.ends_with(ext))
    }

    /// Derives the module name: extension removed, then known suffixes
    /// stripped until none applies.
    #[must_use]
    pub fn derive_name(&self, file_name: &str) -> String {
        let mut name = match self.matching_extension(file_name) {
            Some(ext) => &file_name[..file_name.len() - ext.len()],
            None => file_name.rsplit_once('.').map_or(file_name, |(stem, _)| stem),
        };

        while let Some(stripped) = self
            .strip_suffixes
            .iter()
            .find_map(|suffix| name.strip_suffix(suffix.as_str()))
            .filter(|s| !s.is_empty())
        {
            name = stripped;
        }
        name.to_string()
    }

    /// Derives the mount path for a module name.
    ///
    /// Versioned paths are `/api/<version><path>`.
    #[must_use]
    pub fn derive_path(&self, name: &str, version: Option<&str>) -> String {
        let path = self
            .path_overrides
            .get(name)
            .cloned()
            .unwrap_or_else(|| format!("/{}", name.replace('_', "-")));

        match version {
            Some(version) => format!("/api/{version}{path}"),
            None => path,
        }
    }

    /// Builds the candidate for a file, or `None` when it is not eligible.
    #[must_use]
    pub fn candidate(&self, source_path: &Path, version: Option<&str>) -> Option<ModuleCandidate> {
        let file_name = source_path.file_name()?.to_str()?;
        if !self.is_candidate(file_name) {
            return None;
        }

        let name = self.derive_name(file_name);
        let route_path = self.derive_path(&name, version);
        Some(ModuleCandidate {
            file_name: file_name.to_string(),
            source_path: source_path.to_path_buf(),
            name,
            route_path,
            version: version.map(String::from),
        })
    }

    /// Lists the candidates directly inside `directory`, sorted by file name.
    ///
    /// Subdirectories are not entered.
    ///
    /// # Errors
    ///
    /// Returns `LoaderError::DirectoryNotFound` when `directory` is missing
    /// and `LoaderError::DirectoryUnreadable` when it cannot be listed.
    pub async fn discover(
        &self,
        directory: &Path,
        version: Option<&str>,
    ) -> LoaderResult<Vec<ModuleCandidate>> {
        match tokio::fs::metadata(directory).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(LoaderError::directory_not_found(directory)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LoaderError::directory_not_found(directory));
            }
            Err(e) => return Err(LoaderError::directory_unreadable(directory, e)),
        }

        let mut entries = tokio::fs::read_dir(directory)
            .await
            .map_err(|e| LoaderError::directory_unreadable(directory, e))?;

        let mut candidates = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| LoaderError::directory_unreadable(directory, e))?
        {
            let path = entry.path();
            let is_file = tokio::fs::metadata(&path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }
            match self.candidate(&path, version) {
                Some(candidate) => candidates.push(candidate),
                None => tracing::trace!(file = %path.display(), "skipping non-route file"),
            }
        }

        candidates.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        tracing::debug!(
            directory = %directory.display(),
            count = candidates.len(),
            "discovered route modules"
        );
        Ok(candidates)
    }
}

impl Default for DiscoveryRules {
    fn default() -> Self {
        let settings = DiscoverySettings::default();
        Self {
            extensions: settings.extensions,
            excludes: DEFAULT_EXCLUDE_PATTERNS
                .iter()
                .filter_map(|p| Regex::new(p).ok())
                .collect(),
            strip_suffixes: settings.strip_suffixes,
            path_overrides: settings.path_overrides,
        }
    }
}
