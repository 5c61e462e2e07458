//! Lazy, per-path cached component loading

use crate::core::module::Module;
use crate::error::{ContextExt, Result};
use crate::host::Compiler;
use crate::runtime::resolver::ModuleResolver;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

struct HandleInner {
    path: String,
    resolver: Arc<ModuleResolver>,
    compiler: Arc<dyn Compiler>,
    compiled: OnceCell<Module>,
}

/// Placeholder for a component that is compiled on first [`AsyncComponent::load`].
#[derive(Clone)]
pub struct AsyncComponent {
    inner: Arc<HandleInner>,
}

impl AsyncComponent {
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.compiled.initialized()
    }

    pub fn ptr_eq(&self, other: &AsyncComponent) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Compiles the component the first time; later calls return the same module.
    pub async fn load(&self) -> Result<Module> {
        let inner = &self.inner;
        let module = inner
            .compiled
            .get_or_try_init(|| async {
                debug!(path = %inner.path, "compiling component");
                let source = inner.resolver.get_file(&inner.path).await?;
                inner
                    .compiler
                    .compile(&inner.path, source, &inner.resolver)
                    .await
                    .with_path(&inner.path)
            })
            .await?;
        Ok(module.clone())
    }
}

impl fmt::Debug for AsyncComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncComponent")
            .field("path", &self.inner.path)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// Hands out one [`AsyncComponent`] per logical path.
pub struct ComponentLoader {
    resolver: Arc<ModuleResolver>,
    compiler: Arc<dyn Compiler>,
    handles: Mutex<HashMap<String, AsyncComponent>>,
}

impl ComponentLoader {
    pub fn new(resolver: Arc<ModuleResolver>, compiler: Arc<dyn Compiler>) -> Self {
        Self {
            resolver,
            compiler,
            handles: Mutex::new(HashMap::new()),
        }
    }

    pub fn load_component(&self, path: &str) -> AsyncComponent {
        self.handles
            .lock()
            .entry(path.to_string())
            .or_insert_with(|| AsyncComponent {
                inner: Arc::new(HandleInner {
                    path: path.to_string(),
                    resolver: Arc::clone(&self.resolver),
                    compiler: Arc::clone(&self.compiler),
                    compiled: OnceCell::new(),
                }),
            })
            .clone()
    }

    /// Eagerly compiles `path`.
    pub async fn load_module(&self, path: &str) -> Result<Module> {
        self.load_component(path).load().await
    }

    pub fn loaded_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .handles
            .lock()
            .values()
            .filter(|h| h.is_loaded())
            .map(|h| h.path().to_string())
            .collect();
        paths.sort();
        paths
    }

    pub fn resolver(&self) -> &Arc<ModuleResolver> {
        &self.resolver
    }
}

/// How a route obtains its component.
#[derive(Debug, Clone)]
pub enum RouteComponent {
    Eager(Module),
    Lazy(AsyncComponent),
}

#[derive(Debug, Clone)]
pub struct Route {
    pub path: String,
    pub name: Option<String>,
    pub component: RouteComponent,
}

impl Route {
    /// Resolves the route's component, compiling a lazy page on first use.
    pub async fn component(&self) -> Result<Module> {
        match &self.component {
            RouteComponent::Eager(module) => Ok(module.clone()),
            RouteComponent::Lazy(handle) => handle.load().await,
        }
    }

    pub fn is_loaded(&self) -> bool {
        match &self.component {
            RouteComponent::Eager(_) => true,
            RouteComponent::Lazy(handle) => handle.is_loaded(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BootError;
    use crate::host::memory::{CompiledComponent, MemoryDocument, MemoryFetch, MemoryImporter, PassthroughCompiler};

    fn loader() -> (ComponentLoader, PassthroughCompiler) {
        let resolver = Arc::new(ModuleResolver::new(
            Arc::new(MemoryFetch::new()),
            Arc::new(MemoryImporter::new()),
            Arc::new(MemoryDocument::new()),
        ));
        resolver.vfs().put("/components/card.vue", "<div>card</div>");
        let compiler = PassthroughCompiler::new();
        (ComponentLoader::new(resolver, Arc::new(compiler.clone())), compiler)
    }

    #[tokio::test]
    async fn test_handle_is_lazy() {
        let (loader, compiler) = loader();

        let handle = loader.load_component("/components/card.vue");
        assert!(!handle.is_loaded());
        assert_eq!(compiler.compile_count("/components/card.vue"), 0);

        let module = handle.load().await.unwrap();
        let compiled = module.downcast_ref::<CompiledComponent>().unwrap();
        assert_eq!(compiled.source, "<div>card</div>");
        assert!(handle.is_loaded());
    }

    #[tokio::test]
    async fn test_same_path_same_handle() {
        let (loader, compiler) = loader();

        let a = loader.load_component("/components/card.vue");
        let b = loader.load_component("/components/card.vue");
        assert!(a.ptr_eq(&b));

        let m1 = a.load().await.unwrap();
        let m2 = loader.load_module("/components/card.vue").await.unwrap();
        assert!(m1.ptr_eq(&m2));
        assert_eq!(compiler.compile_count("/components/card.vue"), 1);
        assert_eq!(loader.loaded_paths(), vec!["/components/card.vue".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_file_rejects() {
        let (loader, _) = loader();
        let err = loader.load_module("/components/ghost.vue").await.unwrap_err();
        assert!(matches!(err, BootError::ResourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_route_component_lazy() {
        let (loader, _) = loader();
        let route = Route {
            path: "/card".to_string(),
            name: None,
            component: RouteComponent::Lazy(loader.load_component("/components/card.vue")),
        };
        assert!(!route.is_loaded());
        route.component().await.unwrap();
        assert!(route.is_loaded());
    }
}
