//! Error handling system

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BootError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Resource unavailable: {path} ({status})")]
    ResourceUnavailable { path: String, status: String },

    #[error("Script stalled: {url}")]
    StalledDependency { url: String },

    #[error("Import of '{specifier}' failed: {reason}")]
    Import { specifier: String, reason: String },

    #[error("Compilation of {path} failed: {reason}")]
    Compile { path: String, reason: String },

    #[error("Plugin {name} failed: {reason}")]
    Plugin { name: String, reason: String },

    #[error("Router error: {0}")]
    Router(String),

    #[error("Mount failed: {0}")]
    Mount(String),

    #[error("Invalid configuration document: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, BootError>;

impl BootError {
    /// Configuration errors stop the bootstrap before any async phase starts.
    pub fn is_configuration(&self) -> bool {
        matches!(self, BootError::Configuration(_) | BootError::Json(_))
    }
}

pub trait ContextExt<T> {
    fn with_path(self, path: &str) -> Result<T>;
    fn with_plugin(self, plugin_name: &str) -> Result<T>;
    fn with_specifier(self, specifier: &str) -> Result<T>;
}

impl<T> ContextExt<T> for Result<T> {
    fn with_path(self, path: &str) -> Result<T> {
        self.map_err(|e| match e {
            e @ BootError::ResourceUnavailable { .. } => e,
            e @ BootError::Compile { .. } => e,
            other => BootError::Compile {
                path: path.to_string(),
                reason: other.to_string(),
            },
        })
    }

    fn with_plugin(self, plugin_name: &str) -> Result<T> {
        self.map_err(|e| match e {
            e @ BootError::Plugin { .. } => e,
            other => BootError::Plugin {
                name: plugin_name.to_string(),
                reason: other.to_string(),
            },
        })
    }

    fn with_specifier(self, specifier: &str) -> Result<T> {
        self.map_err(|e| match e {
            e @ BootError::Import { .. } => e,
            other => BootError::Import {
                specifier: specifier.to_string(),
                reason: other.to_string(),
            },
        })
    }
}

#[macro_export]
macro_rules! bail {
    ($msg:literal) => {
        return Err($crate::error::BootError::Configuration($msg.to_string()))
    };
    ($err:expr) => {
        return Err($crate::error::BootError::Configuration($err.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::error::BootError::Configuration(format!($fmt, $($arg)*)))
    };
}
