//! Virtual file system populated from templates embedded in the host document

use crate::error::{BootError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;

/// Logical path of the root application component.
pub const APP_PATH: &str = "/App.vue";

/// Kind of an embedded template, taken from its `type` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    Page,
    Component,
    View,
    App,
}

impl TemplateKind {
    pub fn parse(attr: &str) -> Option<Self> {
        match attr {
            "page" => Some(TemplateKind::Page),
            "component" => Some(TemplateKind::Component),
            "view" => Some(TemplateKind::View),
            "app" => Some(TemplateKind::App),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::Page => "page",
            TemplateKind::Component => "component",
            TemplateKind::View => "view",
            TemplateKind::App => "app",
        }
    }

    /// `/App.vue` for the app template, `/<type>s/<id>` for everything else.
    pub fn logical_path(&self, id: &str) -> String {
        match self {
            TemplateKind::App => APP_PATH.to_string(),
            kind => format!("/{}s/{}", kind.as_str(), id),
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hidden container element as the host document exposes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedTemplate {
    pub kind: String,
    pub id: Option<String>,
    pub content: String,
}

impl EmbeddedTemplate {
    pub fn new(kind: impl Into<String>, id: Option<&str>, content: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.map(str::to_string),
            content: content.into(),
        }
    }
}

/// A validated template with its derived logical path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateEntry {
    pub kind: TemplateKind,
    pub id: String,
    pub path: String,
    pub source: String,
}

impl TemplateEntry {
    /// Global component name: last path segment of the id without `.vue`.
    pub fn component_name(&self) -> String {
        let last = self.id.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(&self.id);
        last.replacen(".vue", "", 1)
    }
}

/// Validates every recognised template and derives its logical path.
///
/// Templates of unknown type are ignored. A recognised template without an id
/// fails the whole discovery.
pub fn discover(templates: &[EmbeddedTemplate]) -> Result<Vec<TemplateEntry>> {
    let mut entries = Vec::new();

    for template in templates {
        let Some(kind) = TemplateKind::parse(&template.kind) else {
            continue;
        };

        let id = match template.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                return Err(BootError::Configuration(format!(
                    "All page and component templates must have id attributes with a valid filename (found a '{}' template without one)",
                    kind
                )))
            }
        };

        entries.push(TemplateEntry {
            kind,
            path: kind.logical_path(&id),
            id,
            source: template.content.clone(),
        });
    }

    Ok(entries)
}

/// In-memory logical path -> source text store. Entries live until drop.
#[derive(Default)]
pub struct VirtualFs {
    files: RwLock<HashMap<String, String>>,
}

impl VirtualFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, path: impl Into<String>, text: impl Into<String>) {
        self.files.write().insert(path.into(), text.into());
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.files.read().get(path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.read().contains_key(path)
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.read().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}
