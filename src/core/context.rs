//! Read-only bundle handed to plugins

use crate::core::module::Module;
use crate::host::App;
use crate::runtime::resolver::ModuleResolver;
use std::sync::Arc;

/// What a plugin sees: the application, the resolver configuration, and the
/// rendering engine. Cloning shares the same underlying objects.
#[derive(Clone)]
pub struct PluginContext {
    app: Arc<dyn App>,
    resolver: Arc<ModuleResolver>,
    engine: Module,
}

impl PluginContext {
    pub fn new(app: Arc<dyn App>, resolver: Arc<ModuleResolver>, engine: Module) -> Self {
        Self {
            app,
            resolver,
            engine,
        }
    }

    pub fn app(&self) -> &dyn App {
        self.app.as_ref()
    }

    pub fn app_handle(&self) -> Arc<dyn App> {
        Arc::clone(&self.app)
    }

    pub fn resolver(&self) -> &ModuleResolver {
        &self.resolver
    }

    pub fn engine(&self) -> &Module {
        &self.engine
    }

    /// True when both bundles point at the same app, resolver and engine.
    pub fn same_bundle(&self, other: &PluginContext) -> bool {
        Arc::ptr_eq(&self.app, &other.app)
            && Arc::ptr_eq(&self.resolver, &other.resolver)
            && self.engine.ptr_eq(&other.engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::{MemoryApp, MemoryDocument, MemoryFetch, MemoryImporter};

    fn resolver() -> Arc<ModuleResolver> {
        Arc::new(ModuleResolver::new(
            Arc::new(MemoryFetch::new()),
            Arc::new(MemoryImporter::new()),
            Arc::new(MemoryDocument::new()),
        ))
    }

    #[test]
    fn test_clones_share_bundle() {
        let app: Arc<dyn App> = Arc::new(MemoryApp::new(Module::new("root")));
        let ctx = PluginContext::new(app, resolver(), Module::new("engine"));
        let copy = ctx.clone();

        assert!(ctx.same_bundle(&copy));
        assert!(copy.app().as_any().downcast_ref::<MemoryApp>().is_some());
    }

    #[test]
    fn test_different_resolver_is_different_bundle() {
        let app: Arc<dyn App> = Arc::new(MemoryApp::new(Module::new("root")));
        let engine = Module::new("engine");
        let a = PluginContext::new(Arc::clone(&app), resolver(), engine.clone());
        let b = PluginContext::new(app, resolver(), engine);

        assert!(!a.same_bundle(&b));
    }
}
