//! SFC Bootstrap - boots a single-page application from component templates
//! embedded in a host document.
//!
//! The host (document, network, module loader, compiler, rendering engine)
//! is reached through the traits in [`host`]; [`host::memory`] provides an
//! in-memory implementation.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod core;
pub mod error;
pub mod host;
pub mod runtime;

pub mod prelude {
    //! Commonly used types and traits

    pub use crate::core::{Declaration, Module, Phase, Plugin, PluginContext, RouteDescriptor};
    pub use crate::core::{EmbeddedTemplate, PluginMetadata, PluginState, ProgressLog, ProgressSink};
    pub use crate::error::{BootError, ContextExt, Result};
    pub use crate::host::{App, Compiler, Document, DynamicImport, Engine, Fetch, FetchResponse, Router};
    pub use crate::runtime::{BootConfig, Booted, Bootstrap, Mappings, ModuleResolver, MountHandle};
    pub use crate::plugin_fn;
    pub use async_trait::async_trait;
}

pub use error::{BootError, Result};
pub use runtime::{Bootstrap, BootConfig};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn build_info() -> String {
    format!("SFC Bootstrap {}", VERSION)
}

/// The pipeline awaits on timers and joins; it needs a Tokio runtime.
pub fn runtime_check() -> Result<()> {
    if tokio::runtime::Handle::try_current().is_err() {
        return Err(BootError::Configuration(
            "No Tokio runtime found. Use #[tokio::main]".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_build_info() {
        assert!(build_info().contains("SFC Bootstrap"));
    }

    #[test]
    fn test_runtime_check_outside_runtime() {
        assert!(runtime_check().unwrap_err().is_configuration());
    }

    #[tokio::test]
    async fn test_runtime_check_inside_runtime() {
        runtime_check().unwrap();
    }

    #[test]
    fn test_prelude_imports() {
        use prelude::*;

        let config = BootConfig::new().with_route(RouteDescriptor::page("/", "home.vue"));
        assert_eq!(config.routes.len(), 1);
        assert_eq!(Phase::Init.label(), "Initializing");
    }
}
