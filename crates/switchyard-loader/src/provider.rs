//! Module providers.
//!
//! A [`ModuleProvider`] turns a discovered source file into the handler
//! collections it exports. The loader owns discovery, caching and error
//! bookkeeping; the provider only answers "what does this file export?".
//!
//! [`StaticProvider`] is the stock provider: a table of constructors keyed
//! by module name, optionally qualified by version (`v1/auth`).

use crate::discovery::ModuleCandidate;
use crate::error::ProviderError;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use switchyard_core::{BoxFuture, HandlerCollection};

/// Named export checked when a module has no default export.
pub const ROUTER_EXPORT: &str = "router";

/// A candidate file together with its contents.
#[derive(Debug, Clone)]
pub struct ModuleSource {
    /// The discovered file.
    pub candidate: ModuleCandidate,
    /// File contents as read from disk.
    pub contents: String,
}

/// The collections a module exports.
#[derive(Clone, Default)]
pub struct ModuleExports {
    /// The default export.
    pub default: Option<Arc<dyn HandlerCollection>>,
    /// Named exports.
    pub named: HashMap<String, Arc<dyn HandlerCollection>>,
}

impl ModuleExports {
    /// Exports with only a default collection.
    #[must_use]
    pub fn with_default(collection: Arc<dyn HandlerCollection>) -> Self {
        Self {
            default: Some(collection),
            named: HashMap::new(),
        }
    }

    /// Adds a named export.
    #[must_use]
    pub fn with_named(mut self, name: impl Into<String>, collection: Arc<dyn HandlerCollection>) -> Self {
        self.named.insert(name.into(), collection);
        self
    }

    /// The mountable collection: the default export, else the `router` export.
    #[must_use]
    pub fn collection(&self) -> Option<Arc<dyn HandlerCollection>> {
        self.default
            .clone()
            .or_else(|| self.named.get(ROUTER_EXPORT).cloned())
    }
}

impl fmt::Debug for ModuleExports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut named: Vec<_> = self.named.keys().collect();
        named.sort();
        f.debug_struct("ModuleExports")
            .field("default", &self.default.is_some())
            .field("named", &named)
            .finish()
    }
}

/// Resolves a module source to its exports.
pub trait ModuleProvider: Send + Sync + 'static {
    /// Loads one module.
    fn load<'a>(
        &'a self,
        source: &'a ModuleSource,
    ) -> BoxFuture<'a, Result<ModuleExports, ProviderError>>;
}

type Constructor = Arc<dyn Fn(&ModuleSource) -> Result<ModuleExports, ProviderError> + Send + Sync>;

/// A provider backed by a table of constructors.
///
/// Lookup tries `"<version>/<name>"` first for versioned modules, then the
/// bare name.
///
/// ```rust,ignore
/// let mut provider = StaticProvider::new();
/// provider.register_collection("auth", auth_routes());
/// provider.register("v1/auth", |_source| Ok(ModuleExports::with_default(auth_v1())));
/// ```
#[derive(Default, Clone)]
pub struct StaticProvider {
    constructors: HashMap<String, Constructor>,
}

impl StaticProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor under `key`.
    pub fn register<F>(&mut self, key: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(&ModuleSource) -> Result<ModuleExports, ProviderError> + Send + Sync + 'static,
    {
        self.constructors.insert(key.into(), Arc::new(constructor));
        self
    }

    /// Registers a fixed collection as the default export under `key`.
    pub fn register_collection(
        &mut self,
        key: impl Into<String>,
        collection: Arc<dyn HandlerCollection>,
    ) -> &mut Self {
        self.register(key, move |_| Ok(ModuleExports::with_default(Arc::clone(&collection))))
    }

    /// Returns whether any constructor would resolve this candidate.
    #[must_use]
    pub fn resolves(&self, candidate: &ModuleCandidate) -> bool {
        self.lookup(candidate).is_some()
    }

    fn lookup(&self, candidate: &ModuleCandidate) -> Option<&Constructor> {
        candidate
            .version
            .as_ref()
            .and_then(|v| self.constructors.get(&format!("{v}/{}", candidate.name)))
            .or_else(|| self.constructors.get(&candidate.name))
    }
}

impl fmt::Debug for StaticProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.constructors.keys().collect();
        keys.sort();
        f.debug_struct("StaticProvider").field("modules", &keys).finish()
    }
}

impl ModuleProvider for StaticProvider {
    fn load<'a>(
        &'a self,
        source: &'a ModuleSource,
    ) -> BoxFuture<'a, Result<ModuleExports, ProviderError>> {
        Box::pin(async move {
            let constructor = self
                .lookup(&source.candidate)
                .ok_or_else(|| ProviderError::NotRegistered(source.candidate.name.clone()))?;
            constructor(source)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::Full;
    use std::path::PathBuf;
    use switchyard_core::FnCollection;

    fn collection() -> Arc<dyn HandlerCollection> {
        Arc::new(FnCollection::new(|_ctx, _req| async {
            http::Response::new(Full::new(Bytes::new()))
        }))
    }

    fn source(name: &str, version: Option<&str>) -> ModuleSource {
        ModuleSource {
            candidate: ModuleCandidate {
                file_name: format!("{name}-routes.js"),
                source_path: PathBuf::from(format!("/routes/{name}-routes.js")),
                name: name.to_string(),
                route_path: format!("/{name}"),
                version: version.map(String::from),
            },
            contents: String::new(),
        }
    }

    #[test]
    fn test_collection_prefers_default_then_router() {
        assert!(ModuleExports::default().collection().is_none());
        assert!(ModuleExports::default()
            .with_named(ROUTER_EXPORT, collection())
            .collection()
            .is_some());
        assert!(ModuleExports::default()
            .with_named("other", collection())
            .collection()
            .is_none());
        assert!(ModuleExports::with_default(collection()).collection().is_some());
    }

    #[tokio::test]
    async fn test_static_provider_lookup_order() {
        let mut provider = StaticProvider::new();
        provider.register_collection("auth", collection());
        provider.register("v1/auth", |_| Err(ProviderError::Failed("v1 broken".to_string())));

        assert!(provider.load(&source("auth", None)).await.is_ok());
        assert_eq!(
            provider.load(&source("auth", Some("v1"))).await.unwrap_err(),
            ProviderError::Failed("v1 broken".to_string())
        );
        // No v2 entry: falls back to the bare name.
        assert!(provider.load(&source("auth", Some("v2"))).await.is_ok());
    }

    #[tokio::test]
    async fn test_static_provider_unknown_module() {
        let provider = StaticProvider::new();
        assert!(!provider.resolves(&source("ghost", None).candidate));
        assert_eq!(
            provider.load(&source("ghost", None)).await.unwrap_err(),
            ProviderError::NotRegistered("ghost".to_string())
        );
    }
}
