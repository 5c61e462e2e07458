//! Plugin system

use async_trait::async_trait;
use crate::core::context::PluginContext;
use crate::error::{BootError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Declared,
    Activating,
    Active,
    Failed,
}

#[derive(Debug, Clone)]
pub struct PluginMetadata {
    pub name: String,
    pub description: String,
}

impl PluginMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }
}

/// Plugin trait
///
/// Activated once, after the root component and the application exist.
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata::new("anonymous")
    }

    async fn activate(&self, ctx: &PluginContext) -> Result<()>;

    fn name(&self) -> String {
        self.metadata().name
    }
}

/// Function plugin wrapper
pub struct FunctionPlugin<F> {
    metadata: PluginMetadata,
    func: F,
}

impl<F> FunctionPlugin<F> {
    pub fn new(metadata: PluginMetadata, func: F) -> Self {
        Self { metadata, func }
    }
}

#[async_trait]
impl<F, Fut> Plugin for FunctionPlugin<F>
where
    F: Fn(PluginContext) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<()>> + Send,
{
    fn metadata(&self) -> PluginMetadata {
        self.metadata.clone()
    }

    async fn activate(&self, ctx: &PluginContext) -> Result<()> {
        (self.func)(ctx.clone()).await
    }
}

#[macro_export]
macro_rules! plugin_fn {
    ($name:expr, $func:expr) => {{
        use $crate::core::plugin::{FunctionPlugin, PluginMetadata};
        FunctionPlugin::new(PluginMetadata::new($name), $func)
    }};
}

/// Registers a global published by a classic script as a cached module.
pub struct ScriptGlobalPlugin {
    specifier: String,
    global: String,
}

impl ScriptGlobalPlugin {
    pub fn new(specifier: impl Into<String>, global: impl Into<String>) -> Self {
        Self {
            specifier: specifier.into(),
            global: global.into(),
        }
    }
}

#[async_trait]
impl Plugin for ScriptGlobalPlugin {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata::new(format!("{}-global", self.specifier))
            .with_description(format!("exposes the '{}' script global as '{}'", self.global, self.specifier))
    }

    async fn activate(&self, ctx: &PluginContext) -> Result<()> {
        let module = ctx.resolver().global(&self.global).ok_or_else(|| BootError::Plugin {
            name: self.name(),
            reason: format!("script global '{}' is not defined", self.global),
        })?;
        ctx.resolver().seed(&self.specifier, module);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestPlugin;

    #[async_trait]
    impl Plugin for TestPlugin {
        fn metadata(&self) -> PluginMetadata {
            PluginMetadata::new("test").with_description("A test plugin")
        }

        async fn activate(&self, _ctx: &PluginContext) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_plugin_metadata_builder() {
        let meta = PluginMetadata::new("router").with_description("Routes pages");
        assert_eq!(meta.name, "router");
        assert_eq!(meta.description, "Routes pages");
        assert_eq!(TestPlugin.name(), "test");
    }

    #[test]
    fn test_plugin_fn_macro() {
        let plugin = plugin_fn!("noop", |_ctx: PluginContext| async move { Ok::<(), BootError>(()) });
        assert_eq!(plugin.name(), "noop");
    }

    #[test]
    fn test_script_global_plugin_name() {
        let plugin = ScriptGlobalPlugin::new("pug", "pug");
        assert_eq!(plugin.name(), "pug-global");
        assert!(plugin.metadata().description.contains("'pug'"));
    }
}
