//! In-memory host: a scriptable document, network, module loader, compiler
//! and rendering engine. Clones share state, so a test can keep a clone to
//! inspect what the bootstrap did.

use crate::core::module::Module;
use crate::core::vfs::EmbeddedTemplate;
use crate::error::{BootError, Result};
use crate::host::{App, Compiler, Document, DynamicImport, Engine, Fetch, FetchResponse, Router, ScriptLoad};
use crate::runtime::component_loader::{AsyncComponent, Route};
use crate::runtime::resolver::ModuleResolver;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptBehavior {
    Loads,
    Delayed(Duration),
    /// The load event never fires.
    Stalls,
}

#[derive(Default)]
struct DocumentState {
    templates: RwLock<Vec<EmbeddedTemplate>>,
    import_maps: RwLock<Vec<String>>,
    /// Style nodes in document order.
    styles: RwLock<Vec<String>>,
    behaviors: RwLock<HashMap<String, ScriptBehavior>>,
    script_globals: RwLock<HashMap<String, (String, Module)>>,
    appended: RwLock<Vec<String>>,
    loaded: RwLock<Vec<String>>,
    globals: RwLock<HashMap<String, Module>>,
}

impl DocumentState {
    fn finish_script(&self, url: &str) {
        self.loaded.write().push(url.to_string());
        if let Some((name, module)) = self.script_globals.read().get(url).cloned() {
            self.globals.write().insert(name, module);
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryDocument {
    state: Arc<DocumentState>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(self, template: EmbeddedTemplate) -> Self {
        self.state.templates.write().push(template);
        self
    }

    pub fn with_import_map(self, text: impl Into<String>) -> Self {
        self.state.import_maps.write().push(text.into());
        self
    }

    /// A style node that exists before the bootstrap runs.
    pub fn with_existing_style(self, css: impl Into<String>) -> Self {
        self.state.styles.write().push(css.into());
        self
    }

    pub fn with_script(self, url: impl Into<String>, behavior: ScriptBehavior) -> Self {
        self.state.behaviors.write().insert(url.into(), behavior);
        self
    }

    /// Once `url` loads, `name` is defined as a global.
    pub fn with_script_global(self, url: impl Into<String>, name: impl Into<String>, module: Module) -> Self {
        self.state
            .script_globals
            .write()
            .insert(url.into(), (name.into(), module));
        self
    }

    pub fn with_global(self, name: impl Into<String>, module: Module) -> Self {
        self.state.globals.write().insert(name.into(), module);
        self
    }

    /// Style texts in document order.
    pub fn styles(&self) -> Vec<String> {
        self.state.styles.read().clone()
    }

    pub fn appended_scripts(&self) -> Vec<String> {
        self.state.appended.read().clone()
    }

    pub fn loaded_scripts(&self) -> Vec<String> {
        self.state.loaded.read().clone()
    }
}

impl Document for MemoryDocument {
    fn templates(&self) -> Vec<EmbeddedTemplate> {
        self.state.templates.read().clone()
    }

    fn import_maps(&self) -> Vec<String> {
        self.state.import_maps.read().clone()
    }

    fn inject_style(&self, css: &str) {
        self.state.styles.write().insert(0, css.to_string());
    }

    fn append_script(&self, url: &str) -> ScriptLoad {
        self.state.appended.write().push(url.to_string());
        let behavior = self
            .state
            .behaviors
            .read()
            .get(url)
            .copied()
            .unwrap_or(ScriptBehavior::Loads);
        let state = Arc::clone(&self.state);
        let url = url.to_string();

        Box::pin(async move {
            match behavior {
                ScriptBehavior::Loads => {}
                ScriptBehavior::Delayed(delay) => tokio::time::sleep(delay).await,
                ScriptBehavior::Stalls => futures::future::pending::<()>().await,
            }
            state.finish_script(&url);
        })
    }

    fn global(&self, name: &str) -> Option<Module> {
        self.state.globals.read().get(name).cloned()
    }
}

#[derive(Clone, Default)]
pub struct MemoryFetch {
    responses: Arc<RwLock<HashMap<String, FetchResponse>>>,
    calls: Arc<RwLock<HashMap<String, usize>>>,
}

impl MemoryFetch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, url: impl Into<String>, response: FetchResponse) -> Self {
        self.responses.write().insert(url.into(), response);
        self
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.calls.read().get(url).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.calls.read().values().sum()
    }
}

#[async_trait]
impl Fetch for MemoryFetch {
    async fn fetch(&self, url: &str) -> Result<FetchResponse> {
        *self.calls.write().entry(url.to_string()).or_insert(0) += 1;
        Ok(self
            .responses
            .read()
            .get(url)
            .cloned()
            .unwrap_or_else(|| FetchResponse::status(404, "Not Found")))
    }
}

type ModuleFactory = Arc<dyn Fn() -> Module + Send + Sync>;

/// Each import runs the registered factory, so every load is a fresh instance.
#[derive(Clone, Default)]
pub struct MemoryImporter {
    factories: Arc<RwLock<HashMap<String, ModuleFactory>>>,
    delays: Arc<RwLock<HashMap<String, Duration>>>,
    calls: Arc<RwLock<HashMap<String, usize>>>,
}

impl MemoryImporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module<F>(self, specifier: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Module + Send + Sync + 'static,
    {
        self.factories.write().insert(specifier.into(), Arc::new(factory));
        self
    }

    pub fn with_delay(self, specifier: impl Into<String>, delay: Duration) -> Self {
        self.delays.write().insert(specifier.into(), delay);
        self
    }

    pub fn import_count(&self, specifier: &str) -> usize {
        self.calls.read().get(specifier).copied().unwrap_or(0)
    }

    pub fn total_imports(&self) -> usize {
        self.calls.read().values().sum()
    }
}

#[async_trait]
impl DynamicImport for MemoryImporter {
    async fn import(&self, specifier: &str) -> Result<Module> {
        *self.calls.write().entry(specifier.to_string()).or_insert(0) += 1;
        let delay = self.delays.read().get(specifier).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let factory = self.factories.read().get(specifier).cloned();
        match factory {
            Some(factory) => Ok(factory()),
            None => Err(BootError::Import {
                specifier: specifier.to_string(),
                reason: "module not found".to_string(),
            }),
        }
    }
}

/// Output of [`PassthroughCompiler`].
#[derive(Debug, Clone)]
pub struct CompiledComponent {
    pub path: String,
    pub source: String,
    pub imports: Vec<Module>,
}

/// Wraps source text as a component. Understands two line directives:
/// `@import <specifier>` resolves a module, `@style <css>` injects a style.
#[derive(Clone, Default)]
pub struct PassthroughCompiler {
    calls: Arc<RwLock<HashMap<String, usize>>>,
}

impl PassthroughCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile_count(&self, path: &str) -> usize {
        self.calls.read().get(path).copied().unwrap_or(0)
    }

    pub fn compiled_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.calls.read().keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl Compiler for PassthroughCompiler {
    async fn compile(&self, path: &str, source: String, resolver: &ModuleResolver) -> Result<Module> {
        *self.calls.write().entry(path.to_string()).or_insert(0) += 1;

        let mut imports = Vec::new();
        for line in source.lines().map(str::trim) {
            if let Some(specifier) = line.strip_prefix("@import ") {
                let module = resolver.resolve(specifier.trim()).await?.into_module().ok_or_else(|| {
                    BootError::Compile {
                        path: path.to_string(),
                        reason: format!("'{}' is not a module", specifier.trim()),
                    }
                })?;
                imports.push(module);
            } else if let Some(css) = line.strip_prefix("@style ") {
                resolver.add_style(css);
            }
        }

        Ok(Module::new(CompiledComponent {
            path: path.to_string(),
            source,
            imports,
        }))
    }
}

/// Value of the in-memory engine module.
#[derive(Debug)]
pub struct EngineModule {
    pub name: &'static str,
}

#[derive(Clone)]
pub struct MemoryEngine {
    module: Module,
    router_delay: Option<Duration>,
    apps_created: Arc<AtomicUsize>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self {
            module: Module::new(EngineModule { name: "vue" }),
            router_delay: None,
            apps_created: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_router_delay(mut self, delay: Duration) -> Self {
        self.router_delay = Some(delay);
        self
    }

    pub fn apps_created(&self) -> usize {
        self.apps_created.load(Ordering::SeqCst)
    }
}

impl Engine for MemoryEngine {
    fn module(&self) -> Module {
        self.module.clone()
    }

    fn create_app(&self, root: Module) -> Result<Arc<dyn App>> {
        self.apps_created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryApp::new(root)))
    }

    fn create_router(&self, routes: Vec<Route>) -> Result<Arc<dyn Router>> {
        Ok(Arc::new(MemoryRouter::new(routes, self.router_delay)))
    }
}

pub struct MemoryApp {
    root: Module,
    components: RwLock<Vec<(String, AsyncComponent)>>,
    router: RwLock<Option<Arc<dyn Router>>>,
    mounted: RwLock<Option<String>>,
    mounts: AtomicUsize,
}

impl MemoryApp {
    pub fn new(root: Module) -> Self {
        Self {
            root,
            components: RwLock::new(Vec::new()),
            router: RwLock::new(None),
            mounted: RwLock::new(None),
            mounts: AtomicUsize::new(0),
        }
    }

    pub fn root(&self) -> &Module {
        &self.root
    }

    pub fn component(&self, name: &str) -> Option<AsyncComponent> {
        self.components
            .read()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.clone())
    }

    pub fn component_names(&self) -> Vec<String> {
        self.components.read().iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn has_router(&self) -> bool {
        self.router.read().is_some()
    }

    pub fn mounted_at(&self) -> Option<String> {
        self.mounted.read().clone()
    }

    pub fn mount_count(&self) -> usize {
        self.mounts.load(Ordering::SeqCst)
    }
}

impl App for MemoryApp {
    fn register_component(&self, name: &str, component: AsyncComponent) -> Result<()> {
        let mut components = self.components.write();
        if let Some(existing) = components.iter_mut().find(|(n, _)| n == name) {
            warn!(component = name, "component registered twice, replacing");
            existing.1 = component;
        } else {
            components.push((name.to_string(), component));
        }
        Ok(())
    }

    fn use_router(&self, router: Arc<dyn Router>) -> Result<()> {
        *self.router.write() = Some(router);
        Ok(())
    }

    fn mount(&self, selector: &str) -> Result<()> {
        let mut mounted = self.mounted.write();
        if let Some(existing) = mounted.as_deref() {
            return Err(BootError::Mount(format!("already mounted at {}", existing)));
        }
        *mounted = Some(selector.to_string());
        self.mounts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MemoryRouter {
    routes: Vec<Route>,
    ready_delay: Option<Duration>,
    ready: AtomicBool,
}

impl MemoryRouter {
    pub fn new(routes: Vec<Route>, ready_delay: Option<Duration>) -> Self {
        Self {
            routes,
            ready_delay,
            ready: AtomicBool::new(false),
        }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn is_ready_now(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Resolves the component of the route matching `path` exactly.
    pub async fn navigate(&self, path: &str) -> Result<Module> {
        let route = self
            .routes
            .iter()
            .find(|r| r.path == path)
            .ok_or_else(|| BootError::Router(format!("no route matches {}", path)))?;
        route.component().await
    }
}

#[async_trait]
impl Router for MemoryRouter {
    async fn is_ready(&self) -> Result<()> {
        if let Some(delay) = self.ready_delay {
            tokio::time::sleep(delay).await;
        }
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
