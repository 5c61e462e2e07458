//! Core module: modules, templates, declarations, plugins and progress

pub mod context;
pub mod declaration;
pub mod module;
pub mod plugin;
pub mod progress;
pub mod vfs;

pub use context::PluginContext;
pub use declaration::{ComponentRegistration, Declaration, RouteDescriptor, RouteTarget};
pub use module::{Module, ModuleCache};
pub use plugin::{FunctionPlugin, Plugin, PluginMetadata, PluginState, ScriptGlobalPlugin};
pub use progress::{Phase, ProgressEntry, ProgressLog, ProgressSink, TracingProgress};
pub use vfs::{EmbeddedTemplate, TemplateEntry, TemplateKind, VirtualFs, APP_PATH};
