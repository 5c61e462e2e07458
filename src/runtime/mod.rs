//! Runtime module: resolution, loading, plugin activation and the bootstrap pipeline

pub mod bootstrap;
pub mod component_loader;
pub mod config;
pub mod dependency_loader;
pub mod plugin_manager;
pub mod resolver;

pub use bootstrap::{Booted, Bootstrap, BootstrapBuilder, MountHandle};
pub use component_loader::{AsyncComponent, ComponentLoader, Route, RouteComponent};
pub use config::{BootConfig, Mappings, ReadyHook};
pub use dependency_loader::{CompletionSignal, DependencyLoader, LoadReport};
pub use plugin_manager::PluginManager;
pub use resolver::{ModuleResolver, Resolved, Source};
