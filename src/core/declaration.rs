//! Dependency declarations, routes and component registrations

use crate::core::module::Module;
use crate::core::plugin::Plugin;
use std::fmt;
use std::sync::Arc;

/// One entry of the `imports` configuration list.
#[derive(Clone)]
pub enum Declaration {
    /// URL loaded as a classic script.
    Script(String),
    /// Literal CSS text.
    Style(String),
    Plugin(Arc<dyn Plugin>),
}

impl Declaration {
    pub fn script(url: impl Into<String>) -> Self {
        Declaration::Script(url.into())
    }

    pub fn style(css: impl Into<String>) -> Self {
        Declaration::Style(css.into())
    }

    pub fn plugin<P: Plugin>(plugin: P) -> Self {
        Declaration::Plugin(Arc::new(plugin))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Declaration::Script(_) => "script",
            Declaration::Style(_) => "style",
            Declaration::Plugin(_) => "plugin",
        }
    }
}

impl fmt::Debug for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Declaration::Script(url) => f.debug_tuple("Script").field(url).finish(),
            Declaration::Style(css) => f.debug_tuple("Style").field(css).finish(),
            Declaration::Plugin(p) => f.debug_tuple("Plugin").field(&p.name()).finish(),
        }
    }
}

/// Where a route gets its component from.
#[derive(Debug, Clone)]
pub enum RouteTarget {
    /// A component supplied directly.
    Component(Module),
    /// Page id, loaded lazily from `/pages/<id>`.
    Page(String),
}

#[derive(Debug, Clone)]
pub struct RouteDescriptor {
    pub path: String,
    pub name: Option<String>,
    pub target: RouteTarget,
}

impl RouteDescriptor {
    pub fn page(path: impl Into<String>, page: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: None,
            target: RouteTarget::Page(page.into()),
        }
    }

    pub fn component(path: impl Into<String>, component: Module) -> Self {
        Self {
            path: path.into(),
            name: None,
            target: RouteTarget::Component(component),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A globally available, lazily loaded component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRegistration {
    pub name: String,
    pub file: String,
}

impl ComponentRegistration {
    pub fn new(name: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_kinds() {
        assert_eq!(Declaration::script("https://cdn.example/a.js").kind(), "script");
        assert_eq!(Declaration::style("body{}").kind(), "style");
    }

    #[test]
    fn test_route_builders() {
        let route = RouteDescriptor::page("/", "home.vue").with_name("home");
        assert_eq!(route.name.as_deref(), Some("home"));
        assert!(matches!(route.target, RouteTarget::Page(ref p) if p == "home.vue"));

        let direct = RouteDescriptor::component("/about", Module::new("about"));
        assert!(matches!(direct.target, RouteTarget::Component(_)));
    }
}
