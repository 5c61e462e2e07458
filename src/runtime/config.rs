//! Bootstrap configuration

use crate::core::declaration::{ComponentRegistration, Declaration, RouteDescriptor};
use crate::core::plugin::ScriptGlobalPlugin;
use crate::error::Result;
use crate::runtime::bootstrap::MountHandle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_PUGJS_URL: &str = "https://pugjs.org/js/pug.js";
pub const DEFAULT_MOUNT_SELECTOR: &str = "#app";

/// Called at MOUNTED instead of mounting; the hook decides when to mount.
pub type ReadyHook = Arc<dyn Fn(MountHandle) + Send + Sync>;

/// URLs of well-known auxiliary libraries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mappings {
    /// Pug template helper, loaded as a classic script. `None` disables it.
    pub pugjs: Option<String>,
    #[serde(flatten)]
    pub other: BTreeMap<String, String>,
}

impl Default for Mappings {
    fn default() -> Self {
        Self {
            pugjs: Some(DEFAULT_PUGJS_URL.to_string()),
            other: BTreeMap::new(),
        }
    }
}

impl Mappings {
    pub fn none() -> Self {
        Self {
            pugjs: None,
            other: BTreeMap::new(),
        }
    }

    pub fn with_pugjs(mut self, url: impl Into<String>) -> Self {
        self.pugjs = Some(url.into());
        self
    }

    pub fn with_mapping(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.other.insert(name.into(), url.into());
        self
    }
}

/// Immutable bootstrap configuration.
#[derive(Clone)]
pub struct BootConfig {
    pub routes: Vec<RouteDescriptor>,
    pub components: Vec<ComponentRegistration>,
    pub imports: Vec<Declaration>,
    pub ready_hook: Option<ReadyHook>,
    pub mappings: Mappings,
    pub mount_selector: String,
    pub script_timeout: Option<Duration>,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            routes: Vec::new(),
            components: Vec::new(),
            imports: Vec::new(),
            ready_hook: None,
            mappings: Mappings::default(),
            mount_selector: DEFAULT_MOUNT_SELECTOR.to_string(),
            script_timeout: None,
        }
    }
}

impl fmt::Debug for BootConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootConfig")
            .field("routes", &self.routes)
            .field("components", &self.components)
            .field("imports", &self.imports)
            .field("ready_hook", &self.ready_hook.is_some())
            .field("mappings", &self.mappings)
            .field("mount_selector", &self.mount_selector)
            .field("script_timeout", &self.script_timeout)
            .finish()
    }
}

impl BootConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(mut self, route: RouteDescriptor) -> Self {
        self.routes.push(route);
        self
    }

    pub fn with_component(mut self, name: impl Into<String>, file: impl Into<String>) -> Self {
        self.components.push(ComponentRegistration::new(name, file));
        self
    }

    pub fn with_import(mut self, declaration: Declaration) -> Self {
        self.imports.push(declaration);
        self
    }

    pub fn with_imports<I>(mut self, declarations: I) -> Self
    where
        I: IntoIterator<Item = Declaration>,
    {
        self.imports.extend(declarations);
        self
    }

    pub fn with_ready_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(MountHandle) + Send + Sync + 'static,
    {
        self.ready_hook = Some(Arc::new(hook));
        self
    }

    pub fn with_mappings(mut self, mappings: Mappings) -> Self {
        self.mappings = mappings;
        self
    }

    pub fn with_mount_selector(mut self, selector: impl Into<String>) -> Self {
        self.mount_selector = selector.into();
        self
    }

    pub fn with_script_timeout(mut self, timeout: Duration) -> Self {
        self.script_timeout = Some(timeout);
        self
    }

    /// Declared imports plus the ones implied by the mappings table.
    pub fn effective_imports(&self) -> Vec<Declaration> {
        let mut imports = self.imports.clone();
        if let Some(url) = &self.mappings.pugjs {
            imports.push(Declaration::Script(url.clone()));
            imports.push(Declaration::plugin(ScriptGlobalPlugin::new("pug", "pug")));
        }
        imports
    }

    /// Loads the serializable part of the configuration. Plugins, direct
    /// route components and the ready hook are added with the builder methods.
    pub fn from_json(text: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(text)?;
        let mut config = BootConfig::new();

        for route in file.routes {
            let mut descriptor = RouteDescriptor::page(route.path, route.page);
            if let Some(name) = route.name {
                descriptor = descriptor.with_name(name);
            }
            config = config.with_route(descriptor);
        }
        for component in file.components {
            config = config.with_component(component.name, component.file);
        }
        config = config
            .with_imports(file.styles.into_iter().map(Declaration::Style))
            .with_imports(file.scripts.into_iter().map(Declaration::Script));
        if let Some(mappings) = file.mappings {
            config = config.with_mappings(mappings);
        }
        if let Some(mount) = file.mount {
            config = config.with_mount_selector(mount);
        }
        if let Some(ms) = file.script_timeout_ms {
            config = config.with_script_timeout(Duration::from_millis(ms));
        }
        Ok(config)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    routes: Vec<RouteEntry>,
    components: Vec<ComponentEntry>,
    styles: Vec<String>,
    scripts: Vec<String>,
    mappings: Option<Mappings>,
    mount: Option<String>,
    script_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RouteEntry {
    path: String,
    page: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ComponentEntry {
    name: String,
    file: String,
}
