use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("Invalid namespace '{namespace}': {reason}")]
    InvalidNamespace { namespace: String, reason: String },

    #[error("Failed to load plugin '{import_path}': {source}")]
    Load {
        import_path: String,
        #[source]
        source: ImportError,
    },

    #[error("No plugin returned a non-null value for '{method}'")]
    NoResult { method: String },

    #[error("Plugin '{name}' is not callable")]
    NotCallable { name: String },

    #[error("Plugin '{plugin}' failed in '{method}': {message}")]
    Invocation {
        plugin: String,
        method: String,
        message: String,
    },
}

impl PluginError {
    pub fn invocation(
        plugin: impl Into<String>,
        method: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Invocation {
            plugin: plugin.into(),
            method: method.into(),
            message: message.into(),
        }
    }
}

/// Failure reported by an [`Importer`](super::Importer) for one candidate.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("no plugin registered under '{0}'")]
    NotFound(String),

    #[error("no unit or package for '{0}' on the search path")]
    NotOnSearchPath(String),

    #[error("'{0}' has no plugin definition")]
    Empty(String),

    #[error("invalid manifest at {path}: {reason}")]
    Manifest { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type PluginResult<T> = std::result::Result<T, PluginError>;
