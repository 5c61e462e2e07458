//! Host environment seams: the document, network, module loader, compiler and
//! rendering engine the bootstrap drives but does not implement.

pub mod memory;

use crate::core::module::Module;
use crate::core::vfs::EmbeddedTemplate;
use crate::error::Result;
use crate::runtime::component_loader::{AsyncComponent, Route};
use crate::runtime::resolver::ModuleResolver;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Deserialize;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Resolves when the script's load event fires. Never resolves for a script
/// that fails to load.
pub type ScriptLoad = BoxFuture<'static, ()>;

pub trait Document: Send + Sync {
    fn templates(&self) -> Vec<EmbeddedTemplate>;

    /// Raw text of every `<script type="importmap">`.
    fn import_maps(&self) -> Vec<String>;

    /// Adds a style node ahead of every style node already in the document,
    /// so earlier styles take precedence in the cascade.
    fn inject_style(&self, css: &str);

    fn append_script(&self, url: &str) -> ScriptLoad;

    /// A global published by a classic script.
    fn global(&self, name: &str) -> Option<Module>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl FetchResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            status_text: "OK".to_string(),
            body: body.into(),
        }
    }

    pub fn status(status: u16, status_text: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            body: String::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn status_detail(&self) -> String {
        format!("{} {}", self.status, self.status_text).trim().to_string()
    }
}

#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchResponse>;
}

#[async_trait]
pub trait DynamicImport: Send + Sync {
    /// Module namespace of `specifier`.
    async fn import(&self, specifier: &str) -> Result<Module>;

    /// Default export of `specifier`.
    async fn import_default(&self, specifier: &str) -> Result<Module> {
        self.import(specifier).await
    }
}

/// Single-file-component compiler. May resolve its own imports through the
/// resolver it is handed.
#[async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(&self, path: &str, source: String, resolver: &ModuleResolver) -> Result<Module>;
}

pub trait App: Send + Sync {
    fn register_component(&self, name: &str, component: AsyncComponent) -> Result<()>;
    fn use_router(&self, router: Arc<dyn Router>) -> Result<()>;
    fn mount(&self, selector: &str) -> Result<()>;
    fn as_any(&self) -> &dyn Any;
}

#[async_trait]
pub trait Router: Send + Sync {
    async fn is_ready(&self) -> Result<()>;
    fn as_any(&self) -> &dyn Any;
}

/// The rendering engine.
pub trait Engine: Send + Sync {
    /// The engine's own module. Every component must see this exact value.
    fn module(&self) -> Module;
    fn create_app(&self, root: Module) -> Result<Arc<dyn App>>;
    fn create_router(&self, routes: Vec<Route>) -> Result<Arc<dyn Router>>;
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ImportMap {
    #[serde(default)]
    pub imports: BTreeMap<String, String>,
}

impl ImportMap {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn declares(&self, specifier: &str) -> bool {
        self.imports.contains_key(specifier)
    }
}

/// Matches specifiers that are themselves URLs rather than bare names.
pub fn is_url(specifier: &str) -> bool {
    specifier.contains("http://") || specifier.contains("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import_map() {
        let map = ImportMap::parse(
            r#"{"imports": {"vue": "https://unpkg.com/vue@3/dist/vue.esm-browser.js", "less": "https://cdn.jsdelivr.net/npm/less"}}"#,
        )
        .unwrap();
        assert!(map.declares("vue"));
        assert!(map.declares("less"));
        assert!(!map.declares("pug"));
    }

    #[test]
    fn test_parse_import_map_without_imports() {
        let map = ImportMap::parse(r#"{"scopes": {}}"#).unwrap();
        assert!(map.imports.is_empty());
        assert!(ImportMap::parse("not json").is_err());
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://esm.sh/lodash"));
        assert!(is_url("http://localhost/x.js"));
        assert!(!is_url("lodash"));
    }

    #[test]
    fn test_fetch_response_status() {
        assert!(FetchResponse::ok("x").is_ok());
        let missing = FetchResponse::status(404, "Not Found");
        assert!(!missing.is_ok());
        assert_eq!(missing.status_detail(), "404 Not Found");
    }
}
