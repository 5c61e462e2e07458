//! Plugin manager

use crate::core::{Plugin, PluginContext, PluginMetadata, PluginState};
use crate::error::{BootError, ContextExt, Result};
use futures::future::join_all;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

struct PluginEntry {
    plugin: Arc<dyn Plugin>,
    metadata: PluginMetadata,
    state: PluginState,
}

/// Declared plugins, kept in declaration order.
#[derive(Default)]
pub struct PluginManager {
    plugins: RwLock<Vec<PluginEntry>>,
    is_activated: RwLock<bool>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_plugin(&self, plugin: Arc<dyn Plugin>) -> Result<()> {
        let metadata = plugin.metadata();
        let mut plugins = self.plugins.write();

        if plugins.iter().any(|p| p.metadata.name == metadata.name) {
            return Err(BootError::Configuration(format!(
                "Plugin {} already declared",
                metadata.name
            )));
        }

        plugins.push(PluginEntry {
            plugin,
            metadata,
            state: PluginState::Declared,
        });
        Ok(())
    }

    /// Activates every plugin concurrently. Returns the first failure, in
    /// declaration order, once all activations have settled.
    pub async fn activate_all(&self, ctx: &PluginContext) -> Result<()> {
        {
            let mut activated = self.is_activated.write();
            if *activated {
                return Err(BootError::Configuration("Plugins already activated".to_string()));
            }
            *activated = true;
        }

        let plugins: Vec<(String, Arc<dyn Plugin>)> = {
            let mut entries = self.plugins.write();
            entries
                .iter_mut()
                .map(|entry| {
                    entry.state = PluginState::Activating;
                    (entry.metadata.name.clone(), Arc::clone(&entry.plugin))
                })
                .collect()
        };

        let results = join_all(plugins.iter().map(|(name, plugin)| {
            let ctx = ctx.clone();
            async move {
                debug!(plugin = %name, "activating plugin");
                plugin.activate(&ctx).await.with_plugin(name)
            }
        }))
        .await;

        let mut first_error = None;
        {
            let mut entries = self.plugins.write();
            for (entry, result) in entries.iter_mut().zip(results) {
                match result {
                    Ok(()) => entry.state = PluginState::Active,
                    Err(e) => {
                        warn!(plugin = %entry.metadata.name, error = %e, "plugin activation failed");
                        entry.state = PluginState::Failed;
                        first_error.get_or_insert(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn list_plugins(&self) -> Vec<(String, PluginState)> {
        self.plugins
            .read()
            .iter()
            .map(|p| (p.metadata.name.clone(), p.state))
            .collect()
    }

    pub fn get_plugin_metadata(&self, name: &str) -> Option<PluginMetadata> {
        self.plugins
            .read()
            .iter()
            .find(|p| p.metadata.name == name)
            .map(|p| p.metadata.clone())
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.read().iter().any(|p| p.metadata.name == name)
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.read().len()
    }

    pub fn is_activated(&self) -> bool {
        *self.is_activated.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Module;
    use crate::host::memory::{MemoryApp, MemoryDocument, MemoryFetch, MemoryImporter};
    use crate::host::App;
    use crate::runtime::resolver::ModuleResolver;
    use async_trait::async_trait;
    use std::time::Duration;

    struct TestPlugin(&'static str);

    #[async_trait]
    impl Plugin for TestPlugin {
        fn metadata(&self) -> PluginMetadata {
            PluginMetadata::new(self.0)
        }

        async fn activate(&self, _ctx: &PluginContext) -> Result<()> {
            Ok(())
        }
    }

    struct FailingPlugin;

    #[async_trait]
    impl Plugin for FailingPlugin {
        fn metadata(&self) -> PluginMetadata {
            PluginMetadata::new("failing")
        }

        async fn activate(&self, _ctx: &PluginContext) -> Result<()> {
            Err(BootError::Router("no history".to_string()))
        }
    }

    fn context() -> PluginContext {
        let app: Arc<dyn App> = Arc::new(MemoryApp::new(Module::new("root")));
        let resolver = Arc::new(ModuleResolver::new(
            Arc::new(MemoryFetch::new()),
            Arc::new(MemoryImporter::new()),
            Arc::new(MemoryDocument::new()),
        ));
        PluginContext::new(app, resolver, Module::new("engine"))
    }

    #[test]
    fn test_plugin_manager_creation() {
        let manager = PluginManager::new();
        assert_eq!(manager.plugin_count(), 0);
        assert!(!manager.is_activated());
    }

    #[test]
    fn test_duplicate_plugin() {
        let manager = PluginManager::new();
        manager.add_plugin(Arc::new(TestPlugin("test"))).unwrap();
        let result = manager.add_plugin(Arc::new(TestPlugin("test")));

        assert!(result.unwrap_err().is_configuration());
        assert_eq!(manager.plugin_count(), 1);
        assert!(manager.has_plugin("test"));
    }

    #[tokio::test]
    async fn test_activation_is_concurrent() {
        // Each activation waits for the other; sequential activation would never finish.
        let barrier = Arc::new(tokio::sync::Barrier::new(2));
        let manager = PluginManager::new();
        for name in ["left", "right"] {
            let barrier = Arc::clone(&barrier);
            manager
                .add_plugin(Arc::new(crate::plugin_fn!(name, move |_ctx: PluginContext| {
                    let barrier = Arc::clone(&barrier);
                    async move {
                        barrier.wait().await;
                        Ok::<(), BootError>(())
                    }
                })))
                .unwrap();
        }

        tokio::time::timeout(Duration::from_secs(5), manager.activate_all(&context()))
            .await
            .expect("activations did not overlap")
            .unwrap();

        assert!(manager
            .list_plugins()
            .iter()
            .all(|(_, state)| *state == PluginState::Active));
    }

    #[tokio::test]
    async fn test_failure_reported_after_all_settle() {
        let manager = PluginManager::new();
        manager.add_plugin(Arc::new(FailingPlugin)).unwrap();
        manager.add_plugin(Arc::new(TestPlugin("ok"))).unwrap();

        let err = manager.activate_all(&context()).await.unwrap_err();
        assert!(matches!(err, BootError::Plugin { ref name, .. } if name == "failing"));
        assert_eq!(
            manager.list_plugins(),
            vec![
                ("failing".to_string(), PluginState::Failed),
                ("ok".to_string(), PluginState::Active),
            ]
        );
    }

    #[tokio::test]
    async fn test_activate_twice() {
        let manager = PluginManager::new();
        let ctx = context();
        manager.activate_all(&ctx).await.unwrap();
        assert!(manager.activate_all(&ctx).await.is_err());
    }
}
