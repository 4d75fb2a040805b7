//! Module resolution for sandboxed scripts
//!
//! Scripts may import other sources by content id (`content:<id>`) or by
//! `http`/`https` url. Fetching is the host's job; the sandbox only sees
//! the [`ModuleLoader`] interface.

use std::collections::HashMap;
use thiserror::Error;

pub const CONTENT_SCHEME: &str = "content:";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModuleError {
    #[error("unsupported module specifier '{0}': only content ids and http(s) urls are allowed")]
    UnsupportedScheme(String),

    #[error("module not found: {0}")]
    NotFound(String),

    #[error("module loading is not available: {0}")]
    Unavailable(String),
}

/// Host-provided source loader
pub trait ModuleLoader: Send + Sync {
    /// Source text of a document stored under a content id
    fn load_content(&self, id: &str) -> Result<String, ModuleError>;

    /// Source text behind an `http`/`https` url
    fn load_module(&self, url: &str) -> Result<String, ModuleError>;
}

/// Loader for hosts that expose no modules
#[derive(Clone, Copy, Debug, Default)]
pub struct NoModules;

impl ModuleLoader for NoModules {
    fn load_content(&self, id: &str) -> Result<String, ModuleError> {
        Err(ModuleError::Unavailable(id.to_string()))
    }

    fn load_module(&self, url: &str) -> Result<String, ModuleError> {
        Err(ModuleError::Unavailable(url.to_string()))
    }
}

/// In-memory loader keyed by content id or url
#[derive(Clone, Debug, Default)]
pub struct StaticModules {
    sources: HashMap<String, String>,
}

impl StaticModules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, key: impl Into<String>, source: impl Into<String>) -> Self {
        self.sources.insert(key.into(), source.into());
        self
    }

    fn lookup(&self, key: &str) -> Result<String, ModuleError> {
        self.sources
            .get(key)
            .cloned()
            .ok_or_else(|| ModuleError::NotFound(key.to_string()))
    }
}

impl ModuleLoader for StaticModules {
    fn load_content(&self, id: &str) -> Result<String, ModuleError> {
        self.lookup(id)
    }

    fn load_module(&self, url: &str) -> Result<String, ModuleError> {
        self.lookup(url)
    }
}

/// True for `http://` and `https://` urls
pub fn is_remote(specifier: &str) -> bool {
    specifier.starts_with("https://") || specifier.starts_with("http://")
}

/// Dispatch a specifier to the matching loader method
pub fn resolve(loader: &dyn ModuleLoader, specifier: &str) -> Result<String, ModuleError> {
    if let Some(id) = specifier.strip_prefix(CONTENT_SCHEME) {
        return loader.load_content(id);
    }
    if is_remote(specifier) {
        return loader.load_module(specifier);
    }
    Err(ModuleError::UnsupportedScheme(specifier.to_string()))
}
