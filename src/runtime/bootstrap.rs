//! Bootstrap pipeline: drives every phase from INIT to MOUNTED

use crate::core::declaration::{ComponentRegistration, Declaration, RouteTarget};
use crate::core::progress::{Phase, ProgressSink};
use crate::core::vfs::{self, TemplateEntry, TemplateKind, APP_PATH};
use crate::core::PluginContext;
use crate::error::{BootError, ContextExt, Result};
use crate::host::{App, Compiler, Document, DynamicImport, Engine, Fetch, ImportMap, Router};
use crate::runtime::component_loader::{ComponentLoader, Route, RouteComponent};
use crate::runtime::config::BootConfig;
use crate::runtime::dependency_loader::{DependencyLoader, LoadReport};
use crate::runtime::plugin_manager::PluginManager;
use crate::runtime::resolver::{ModuleResolver, ENGINE_SPECIFIER};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// CSS preprocessing helper pre-seeded when an import map declares it.
pub const LESS_SPECIFIER: &str = "less";

/// Deferred mount, handed to the ready hook. Mounts at most once.
#[derive(Clone)]
pub struct MountHandle {
    app: Arc<dyn App>,
    selector: String,
    mounted: Arc<AtomicBool>,
}

impl MountHandle {
    fn new(app: Arc<dyn App>, selector: String) -> Self {
        Self {
            app,
            selector,
            mounted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Mounts the application unless a previous call succeeded. A failed
    /// mount leaves the handle unmounted so it can be retried.
    pub fn mount(&self) -> Result<()> {
        if self
            .mounted
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(selector = %self.selector, "already mounted");
            return Ok(());
        }
        info!(selector = %self.selector, "mounting application");
        self.app.mount(&self.selector).map_err(|e| {
            self.mounted.store(false, Ordering::SeqCst);
            warn!(selector = %self.selector, error = %e, "mount failed");
            BootError::Mount(e.to_string())
        })
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }
}

pub struct BootstrapBuilder {
    config: Option<BootConfig>,
    document: Option<Arc<dyn Document>>,
    fetch: Option<Arc<dyn Fetch>>,
    importer: Option<Arc<dyn DynamicImport>>,
    compiler: Option<Arc<dyn Compiler>>,
    engine: Option<Arc<dyn Engine>>,
    progress: Vec<Arc<dyn ProgressSink>>,
}

impl BootstrapBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            document: None,
            fetch: None,
            importer: None,
            compiler: None,
            engine: None,
            progress: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: BootConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_document<D: Document + 'static>(mut self, document: D) -> Self {
        self.document = Some(Arc::new(document));
        self
    }

    pub fn with_fetch<F: Fetch + 'static>(mut self, fetch: F) -> Self {
        self.fetch = Some(Arc::new(fetch));
        self
    }

    pub fn with_importer<I: DynamicImport + 'static>(mut self, importer: I) -> Self {
        self.importer = Some(Arc::new(importer));
        self
    }

    pub fn with_compiler<C: Compiler + 'static>(mut self, compiler: C) -> Self {
        self.compiler = Some(Arc::new(compiler));
        self
    }

    pub fn with_engine<E: Engine + 'static>(mut self, engine: E) -> Self {
        self.engine = Some(Arc::new(engine));
        self
    }

    pub fn with_progress<S: ProgressSink + 'static>(mut self, sink: S) -> Self {
        self.progress.push(Arc::new(sink));
        self
    }

    /// Validates templates, import maps and plugin declarations. No async work
    /// happens here, so configuration errors surface before any load starts.
    pub fn build(self) -> Result<Bootstrap> {
        let config = self.config.unwrap_or_default();
        let document = require(self.document, "document")?;
        let fetch = require(self.fetch, "fetch")?;
        let importer = require(self.importer, "dynamic importer")?;
        let compiler = require(self.compiler, "compiler")?;
        let engine = require(self.engine, "engine")?;

        let templates = vfs::discover(&document.templates())?;
        let import_maps = document
            .import_maps()
            .iter()
            .map(|text| ImportMap::parse(text))
            .collect::<Result<Vec<_>>>()?;

        let imports = config.effective_imports();
        let plugins = PluginManager::new();
        for declaration in &imports {
            if let Declaration::Plugin(plugin) = declaration {
                plugins.add_plugin(Arc::clone(plugin))?;
            }
        }

        Ok(Bootstrap {
            config,
            imports,
            document,
            fetch,
            importer,
            compiler,
            engine,
            progress: self.progress,
            templates,
            import_maps,
            plugins,
        })
    }
}

impl Default for BootstrapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn require<T>(value: Option<T>, what: &str) -> Result<T> {
    value.ok_or_else(|| BootError::Configuration(format!("no {} configured", what)))
}

/// Everything the pipeline produced.
pub struct Booted {
    pub app: Arc<dyn App>,
    pub router: Arc<dyn Router>,
    pub resolver: Arc<ModuleResolver>,
    pub components: Arc<ComponentLoader>,
    pub mount: MountHandle,
    pub report: LoadReport,
}

pub struct Bootstrap {
    config: BootConfig,
    imports: Vec<Declaration>,
    document: Arc<dyn Document>,
    fetch: Arc<dyn Fetch>,
    importer: Arc<dyn DynamicImport>,
    compiler: Arc<dyn Compiler>,
    engine: Arc<dyn Engine>,
    progress: Vec<Arc<dyn ProgressSink>>,
    templates: Vec<TemplateEntry>,
    import_maps: Vec<ImportMap>,
    plugins: PluginManager,
}

impl Bootstrap {
    pub fn build() -> BootstrapBuilder {
        BootstrapBuilder::new()
    }

    pub fn config(&self) -> &BootConfig {
        &self.config
    }

    pub fn templates(&self) -> &[TemplateEntry] {
        &self.templates
    }

    pub fn plugin_manager(&self) -> &PluginManager {
        &self.plugins
    }

    fn enter(&self, phase: Phase) {
        debug!(phase = phase.name(), "entering phase");
        for sink in &self.progress {
            sink.record(phase);
        }
    }

    /// Runs every phase in order. Each phase settles before the next begins.
    /// MOUNTED is recorded only once the mount (or the ready hook) returns.
    pub async fn run(&self) -> Result<Booted> {
        self.enter(Phase::Init);
        let resolver = Arc::new(ModuleResolver::new(
            Arc::clone(&self.fetch),
            Arc::clone(&self.importer),
            Arc::clone(&self.document),
        ));
        let engine_module = resolver.seed(ENGINE_SPECIFIER, self.engine.module());

        if self.import_maps.iter().any(|m| m.declares(LESS_SPECIFIER)) {
            let less = self
                .importer
                .import_default(LESS_SPECIFIER)
                .await
                .with_specifier(LESS_SPECIFIER)?;
            resolver.seed(LESS_SPECIFIER, less);
        }

        let loader = DependencyLoader::new(Arc::clone(&self.document), Arc::clone(&resolver))
            .with_script_timeout(self.config.script_timeout);

        self.enter(Phase::StylesReady);
        loader.apply_styles(&self.imports);

        self.enter(Phase::ScriptsAndImportsReady);
        let report = loader
            .load_scripts_and_imports(&self.imports, &self.import_maps)
            .await?;

        self.enter(Phase::TemplatesDiscovered);
        let registrations = self.populate_vfs(&resolver);

        self.enter(Phase::RoutesConfigured);
        let components = Arc::new(ComponentLoader::new(
            Arc::clone(&resolver),
            Arc::clone(&self.compiler),
        ));
        let routes = self.routes(&components);
        let router = self.engine.create_router(routes)?;

        self.enter(Phase::AppComponentLoaded);
        let root = components.load_module(APP_PATH).await?;
        let app = self.engine.create_app(root)?;

        self.enter(Phase::PluginsActivated);
        let ctx = PluginContext::new(Arc::clone(&app), Arc::clone(&resolver), engine_module);
        self.plugins.activate_all(&ctx).await?;

        self.enter(Phase::GlobalComponentsRegistered);
        for registration in &registrations {
            debug!(name = %registration.name, file = %registration.file, "registering global component");
            app.register_component(&registration.name, components.load_component(&registration.file))?;
        }

        self.enter(Phase::RouterReady);
        app.use_router(Arc::clone(&router))?;
        router.is_ready().await?;

        let mount = MountHandle::new(Arc::clone(&app), self.config.mount_selector.clone());
        match &self.config.ready_hook {
            Some(hook) => {
                info!("handing mount to ready hook");
                hook(mount.clone());
            }
            None => mount.mount()?,
        }
        self.enter(Phase::Mounted);

        Ok(Booted {
            app,
            router,
            resolver,
            components,
            mount,
            report,
        })
    }

    /// Writes every template into the VFS and returns the global component
    /// registrations: configured ones first, then component templates.
    fn populate_vfs(&self, resolver: &ModuleResolver) -> Vec<ComponentRegistration> {
        let mut registrations = self.config.components.clone();
        for template in &self.templates {
            if resolver.vfs().contains(&template.path) {
                warn!(path = %template.path, "template path declared twice, last one wins");
            }
            resolver.vfs().put(template.path.clone(), template.source.clone());
            if template.kind == TemplateKind::Component {
                registrations.push(ComponentRegistration::new(
                    template.component_name(),
                    template.path.clone(),
                ));
            }
        }
        info!(
            files = resolver.vfs().len(),
            components = registrations.len(),
            "templates discovered"
        );
        registrations
    }

    fn routes(&self, components: &ComponentLoader) -> Vec<Route> {
        self.config
            .routes
            .iter()
            .map(|descriptor| Route {
                path: descriptor.path.clone(),
                name: descriptor.name.clone(),
                component: match &descriptor.target {
                    RouteTarget::Component(module) => RouteComponent::Eager(module.clone()),
                    RouteTarget::Page(page) => RouteComponent::Lazy(
                        components.load_component(&TemplateKind::Page.logical_path(page)),
                    ),
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::declaration::RouteDescriptor;
    use crate::core::module::Module;
    use crate::core::progress::ProgressLog;
    use crate::core::vfs::EmbeddedTemplate;
    use crate::host::memory::{
        MemoryApp, MemoryDocument, MemoryEngine, MemoryFetch, MemoryImporter, PassthroughCompiler,
    };
    use crate::runtime::component_loader::AsyncComponent;
    use crate::runtime::config::Mappings;
    use std::any::Any;
    use std::sync::atomic::AtomicUsize;

    /// Rejects its first `failures` mounts, then delegates to a [`MemoryApp`].
    struct FlakyApp {
        inner: MemoryApp,
        failures: AtomicUsize,
        attempts: AtomicUsize,
    }

    impl FlakyApp {
        fn new(root: Module, failures: usize) -> Self {
            Self {
                inner: MemoryApp::new(root),
                failures: AtomicUsize::new(failures),
                attempts: AtomicUsize::new(0),
            }
        }
    }

    impl App for FlakyApp {
        fn register_component(&self, name: &str, component: AsyncComponent) -> Result<()> {
            self.inner.register_component(name, component)
        }

        fn use_router(&self, router: Arc<dyn Router>) -> Result<()> {
            self.inner.use_router(router)
        }

        fn mount(&self, selector: &str) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(BootError::Mount(format!("{} not in document", selector)));
            }
            self.inner.mount(selector)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct FlakyEngine {
        inner: MemoryEngine,
        failures: usize,
    }

    impl Engine for FlakyEngine {
        fn module(&self) -> Module {
            self.inner.module()
        }

        fn create_app(&self, root: Module) -> Result<Arc<dyn App>> {
            Ok(Arc::new(FlakyApp::new(root, self.failures)))
        }

        fn create_router(&self, routes: Vec<Route>) -> Result<Arc<dyn Router>> {
            self.inner.create_router(routes)
        }
    }

    fn document() -> MemoryDocument {
        MemoryDocument::new()
            .with_template(EmbeddedTemplate::new("app", Some("App.vue"), "<router-view/>"))
            .with_template(EmbeddedTemplate::new("page", Some("home.vue"), "<h1>home</h1>"))
    }

    fn builder(document: MemoryDocument, config: BootConfig) -> BootstrapBuilder {
        Bootstrap::build()
            .with_config(config)
            .with_document(document)
            .with_fetch(MemoryFetch::new())
            .with_importer(MemoryImporter::new())
            .with_compiler(PassthroughCompiler::new())
            .with_engine(MemoryEngine::new())
    }

    #[test]
    fn test_missing_collaborator() {
        let err = Bootstrap::build().with_document(document()).build().err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_missing_template_id_fails_at_build() {
        let doc = document().with_template(EmbeddedTemplate::new("component", None, "<b/>"));
        let err = builder(doc, BootConfig::new()).build().err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_bad_import_map_fails_at_build() {
        let doc = document().with_import_map("{ not json");
        let err = builder(doc, BootConfig::new()).build().err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_duplicate_plugin_names_fail_at_build() {
        let config = BootConfig::new()
            .with_mappings(Mappings::none())
            .with_import(Declaration::plugin(crate::plugin_fn!("dup", |_ctx: PluginContext| async move {
                Ok::<(), BootError>(())
            })))
            .with_import(Declaration::plugin(crate::plugin_fn!("dup", |_ctx: PluginContext| async move {
                Ok::<(), BootError>(())
            })));
        let err = builder(document(), config).build().err().unwrap();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_run_reaches_mounted() {
        let log = ProgressLog::new();
        let config = BootConfig::new()
            .with_mappings(Mappings::none())
            .with_route(RouteDescriptor::page("/", "home.vue"));
        let boot = builder(document(), config)
            .with_progress(log.clone())
            .build()
            .unwrap();

        let booted = boot.run().await.unwrap();

        assert_eq!(log.phases(), Phase::ALL.to_vec());
        assert!(booted.mount.is_mounted());
        let app = booted.app.as_any().downcast_ref::<MemoryApp>().unwrap();
        assert_eq!(app.mounted_at().as_deref(), Some("#app"));
        assert!(booted.resolver.cache().contains(ENGINE_SPECIFIER));
    }

    #[tokio::test]
    async fn test_ready_hook_defers_mount() {
        let captured: Arc<parking_lot::Mutex<Option<MountHandle>>> = Arc::default();
        let slot = Arc::clone(&captured);
        let config = BootConfig::new()
            .with_mappings(Mappings::none())
            .with_ready_hook(move |mount| {
                *slot.lock() = Some(mount);
            });

        let booted = builder(document(), config).build().unwrap().run().await.unwrap();
        let app = booted.app.as_any().downcast_ref::<MemoryApp>().unwrap();
        assert!(app.mounted_at().is_none());

        let handle = captured.lock().take().unwrap();
        handle.mount().unwrap();
        handle.mount().unwrap();
        assert_eq!(app.mounted_at().as_deref(), Some("#app"));
        assert_eq!(app.mount_count(), 1);
    }

    #[tokio::test]
    async fn test_direct_route_component_is_eager() {
        let about = Module::new("about");
        let config = BootConfig::new()
            .with_mappings(Mappings::none())
            .with_route(RouteDescriptor::component("/about", about.clone()));
        let booted = builder(document(), config).build().unwrap().run().await.unwrap();

        let router = booted
            .router
            .as_any()
            .downcast_ref::<crate::host::memory::MemoryRouter>()
            .unwrap();
        let resolved = router.navigate("/about").await.unwrap();
        assert!(resolved.ptr_eq(&about));
    }

    #[test]
    fn test_failed_mount_can_be_retried() {
        let app = Arc::new(FlakyApp::new(Module::new("root"), 1));
        let handle = MountHandle::new(Arc::clone(&app) as Arc<dyn App>, "#app".to_string());

        assert!(handle.mount().is_err());
        assert!(!handle.is_mounted());
        assert!(app.inner.mounted_at().is_none());

        handle.mount().unwrap();
        assert!(handle.is_mounted());
        assert_eq!(app.inner.mounted_at().as_deref(), Some("#app"));

        handle.mount().unwrap();
        assert_eq!(app.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(app.inner.mount_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_mount_stops_before_mounted() {
        let log = ProgressLog::new();
        let boot = Bootstrap::build()
            .with_config(BootConfig::new().with_mappings(Mappings::none()))
            .with_document(document())
            .with_fetch(MemoryFetch::new())
            .with_importer(MemoryImporter::new())
            .with_compiler(PassthroughCompiler::new())
            .with_engine(FlakyEngine {
                inner: MemoryEngine::new(),
                failures: 1,
            })
            .with_progress(log.clone())
            .build()
            .unwrap();

        let err = boot.run().await.err().unwrap();

        assert!(matches!(err, BootError::Mount(_)));
        assert_eq!(log.last(), Some(Phase::RouterReady));
        assert!(!log.phases().contains(&Phase::Mounted));
    }
}
