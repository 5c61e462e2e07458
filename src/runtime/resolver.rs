//! Module resolution: cache, then virtual files, then network or dynamic import.
//!
//! Each [`Source`] answers [`Lookup::Found`] or [`Lookup::NotFound`]; the
//! resolver walks them in order and stops at the first hit.

use crate::core::module::{Module, ModuleCache};
use crate::core::vfs::VirtualFs;
use crate::error::{BootError, ContextExt, Result};
use crate::host::{Document, DynamicImport, Fetch};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Cache key of the rendering engine's own module.
pub const ENGINE_SPECIFIER: &str = "vue";

const FILE_EXTENSIONS: &[&str] = &[
    "vue", "js", "mjs", "cjs", "ts", "jsx", "tsx", "css", "less", "scss", "sass", "json", "html",
    "pug",
];

/// Outcome of a resolution.
#[derive(Clone)]
pub enum Resolved {
    Module(Module),
    /// Source text, still to be compiled.
    Source(String),
}

impl Resolved {
    pub fn into_module(self) -> Option<Module> {
        match self {
            Resolved::Module(m) => Some(m),
            Resolved::Source(_) => None,
        }
    }

    pub fn into_source(self) -> Option<String> {
        match self {
            Resolved::Source(s) => Some(s),
            Resolved::Module(_) => None,
        }
    }
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Module(m) => f.debug_tuple("Module").field(m).finish(),
            Resolved::Source(s) => f.debug_tuple("Source").field(&s.len()).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

/// Relative or absolute paths, URLs, and names carrying a known file extension.
pub fn is_file_like(specifier: &str) -> bool {
    if specifier.starts_with('/')
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || crate::host::is_url(specifier)
    {
        return true;
    }
    let last = specifier.rsplit('/').next().unwrap_or(specifier);
    match last.rsplit_once('.') {
        Some((stem, ext)) => !stem.is_empty() && FILE_EXTENSIONS.contains(&ext),
        None => false,
    }
}

/// One tier of the resolution cascade.
#[async_trait]
pub trait Source: Send + Sync {
    fn name(&self) -> &'static str;
    fn can_handle(&self, specifier: &str) -> bool;
    async fn resolve(&self, specifier: &str, resolver: &ModuleResolver) -> Result<Lookup<Resolved>>;
}

pub struct CacheSource;

#[async_trait]
impl Source for CacheSource {
    fn name(&self) -> &'static str {
        "cache"
    }

    fn can_handle(&self, _specifier: &str) -> bool {
        true
    }

    async fn resolve(&self, specifier: &str, resolver: &ModuleResolver) -> Result<Lookup<Resolved>> {
        Ok(match resolver.cache().get(specifier) {
            Some(module) => Lookup::Found(Resolved::Module(module)),
            None => Lookup::NotFound,
        })
    }
}

pub struct VirtualSource;

#[async_trait]
impl Source for VirtualSource {
    fn name(&self) -> &'static str {
        "vfs"
    }

    fn can_handle(&self, specifier: &str) -> bool {
        is_file_like(specifier)
    }

    async fn resolve(&self, specifier: &str, resolver: &ModuleResolver) -> Result<Lookup<Resolved>> {
        Ok(match resolver.vfs().get(specifier) {
            Some(text) => Lookup::Found(Resolved::Source(text)),
            None => Lookup::NotFound,
        })
    }
}

/// Fetches the path as a URL. A non-success status is an error, not a miss.
pub struct NetworkSource;

#[async_trait]
impl Source for NetworkSource {
    fn name(&self) -> &'static str {
        "network"
    }

    fn can_handle(&self, specifier: &str) -> bool {
        is_file_like(specifier)
    }

    async fn resolve(&self, specifier: &str, resolver: &ModuleResolver) -> Result<Lookup<Resolved>> {
        debug!(path = specifier, "fetching file missing from vfs");
        let response = resolver.fetcher().fetch(specifier).await?;
        if !response.is_ok() {
            return Err(BootError::ResourceUnavailable {
                path: specifier.to_string(),
                status: response.status_detail(),
            });
        }
        Ok(Lookup::Found(Resolved::Source(response.body)))
    }
}

pub struct ImportSource;

#[async_trait]
impl Source for ImportSource {
    fn name(&self) -> &'static str {
        "import"
    }

    fn can_handle(&self, specifier: &str) -> bool {
        !is_file_like(specifier)
    }

    async fn resolve(&self, specifier: &str, resolver: &ModuleResolver) -> Result<Lookup<Resolved>> {
        let module = resolver.import_module(specifier).await?;
        Ok(Lookup::Found(Resolved::Module(module)))
    }
}

/// Owns the module cache and the virtual file system for the process lifetime.
pub struct ModuleResolver {
    cache: ModuleCache,
    vfs: VirtualFs,
    fetch: Arc<dyn Fetch>,
    importer: Arc<dyn DynamicImport>,
    document: Arc<dyn Document>,
    sources: Vec<Box<dyn Source>>,
    inflight: Mutex<HashMap<String, Arc<OnceCell<Module>>>>,
}

impl ModuleResolver {
    pub fn new(
        fetch: Arc<dyn Fetch>,
        importer: Arc<dyn DynamicImport>,
        document: Arc<dyn Document>,
    ) -> Self {
        Self {
            cache: ModuleCache::new(),
            vfs: VirtualFs::new(),
            fetch,
            importer,
            document,
            sources: vec![
                Box::new(CacheSource),
                Box::new(VirtualSource),
                Box::new(NetworkSource),
                Box::new(ImportSource),
            ],
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Replaces the resolution cascade.
    pub fn with_sources(mut self, sources: Vec<Box<dyn Source>>) -> Self {
        self.sources = sources;
        self
    }

    pub fn cache(&self) -> &ModuleCache {
        &self.cache
    }

    pub fn vfs(&self) -> &VirtualFs {
        &self.vfs
    }

    pub fn fetcher(&self) -> &dyn Fetch {
        self.fetch.as_ref()
    }

    pub fn importer(&self) -> &dyn DynamicImport {
        self.importer.as_ref()
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Pre-seeds the cache. Returns the module that ends up cached.
    pub fn seed(&self, specifier: &str, module: Module) -> Module {
        let kept = self.cache.insert_if_absent(specifier, module.clone());
        if !kept.ptr_eq(&module) {
            tracing::warn!(specifier, "module already cached, seed ignored");
        }
        kept
    }

    /// Walks the cascade; the first source that finds `specifier` wins.
    pub async fn resolve(&self, specifier: &str) -> Result<Resolved> {
        for source in self.sources.iter().filter(|s| s.can_handle(specifier)) {
            if let Lookup::Found(resolved) = source.resolve(specifier, self).await? {
                debug!(specifier, source = source.name(), "resolved");
                return Ok(resolved);
            }
        }
        Err(BootError::Import {
            specifier: specifier.to_string(),
            reason: "no source could resolve it".to_string(),
        })
    }

    /// Source text for a logical path: the virtual file system first, then the network.
    pub async fn get_file(&self, path: &str) -> Result<String> {
        if let Some(text) = self.vfs.get(path) {
            return Ok(text);
        }
        match NetworkSource.resolve(path, self).await? {
            Lookup::Found(Resolved::Source(text)) => Ok(text),
            _ => Err(BootError::ResourceUnavailable {
                path: path.to_string(),
                status: "no source text".to_string(),
            }),
        }
    }

    /// Returns the cached module or loads it exactly once through dynamic
    /// import, even under concurrent callers.
    pub async fn import_module(&self, specifier: &str) -> Result<Module> {
        if let Some(module) = self.cache.get(specifier) {
            return Ok(module);
        }

        let cell = self
            .inflight
            .lock()
            .entry(specifier.to_string())
            .or_default()
            .clone();

        let module = cell
            .get_or_try_init(|| async {
                debug!(specifier, "dynamic import");
                let module = self.importer.import(specifier).await.with_specifier(specifier)?;
                Ok::<_, BootError>(self.cache.insert_if_absent(specifier, module))
            })
            .await?;

        Ok(module.clone())
    }

    /// Injects a compiler-emitted style into the document.
    pub fn add_style(&self, css: &str) {
        self.document.inject_style(css);
    }

    /// A global published by a loaded script.
    pub fn global(&self, name: &str) -> Option<Module> {
        self.document.global(name)
    }
}
