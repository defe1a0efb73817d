//! # plugspace
//!
//! Namespace-based plugin discovery, ordering and invocation, with an
//! optional out-of-process proxy for running plugin code in a child.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use plugspace::{ManifestImporter, ModuleLoader, Namespace, SettingsLoader};
//!
//! fn main() -> Result<(), plugspace::Error> {
//!     let settings = SettingsLoader::new().env()?.build();
//!     let mut loader = ModuleLoader::new(settings.module_source(Arc::new(ManifestImporter)));
//!
//!     let plugins = loader.load(&Namespace::new("team.plugins")?)?;
//!     for result in plugins.call("describe", &[]) {
//!         println!("{}", result?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Process Proxy
//!
//! ```rust,no_run
//! use plugspace::PluginProxy;
//! use tokio::process::Command;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), plugspace::Error> {
//!     let mut proxy = PluginProxy::spawn(&mut Command::new("plugspace-proxy"))?;
//!     proxy.load("team.plugins.audio").await?;
//!     proxy
//!         .echo("hello".into(), Box::new(|value| println!("echoed {value}")))
//!         .await?;
//!
//!     tokio::time::sleep(std::time::Duration::from_millis(50)).await;
//!     proxy.handle_responses();
//!     proxy.close().await?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod plugins;
pub mod proxy;

// Re-exports for convenience
pub use config::{ConfigError, EnvOverrides, Settings, SettingsLoader};
pub use plugins::{
    ClassLoader, ClassSource, ImportError, ImportPolicy, Importer, LoadFailure, Loader,
    ManifestImporter, Module, ModuleLoader, ModuleSource, Namespace, Object, ObjectLoader,
    ObjectSource, Plugin, PluginClass, PluginDescriptor, PluginDiscovery, PluginError,
    PluginManager, PluginRef, PluginSource, SearchPath, StaticImporter, Value, unified_load,
};
pub use proxy::{PluginProxy, ProxyChild, ProxyError, ProxyState};

/// Error type for plugspace operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Discovery, loading or invocation failed.
    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    /// Proxy channel or child failure.
    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization or deserialization failed.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// File system operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Required environment variable missing or invalid.
    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),
}

/// Error category for unified error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid namespaces, settings or environment
    Configuration,
    /// A plugin could not be imported
    Load,
    /// No plugin answered a query
    NoResult,
    /// Caller mistakes: unknown proxy instruction, non-callable plugin
    Usage,
    /// A plugin failed while running
    Plugin,
    /// Internal errors (IO, JSON, closed channels, child exits)
    Internal,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::Env(_) => ErrorCategory::Configuration,
            Error::Plugin(err) => match err {
                PluginError::InvalidNamespace { .. } => ErrorCategory::Configuration,
                PluginError::Load { .. } => ErrorCategory::Load,
                PluginError::NoResult { .. } => ErrorCategory::NoResult,
                PluginError::NotCallable { .. } => ErrorCategory::Usage,
                PluginError::Invocation { .. } => ErrorCategory::Plugin,
            },
            Error::Proxy(ProxyError::UnknownInstruction { .. }) => ErrorCategory::Usage,
            Error::Proxy(_) | Error::Json(_) | Error::Io(_) => ErrorCategory::Internal,
        }
    }

    pub fn is_configuration_error(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    pub fn is_load_error(&self) -> bool {
        self.category() == ErrorCategory::Load
    }

    /// True for mistakes in the calling code rather than the environment.
    pub fn is_usage_error(&self) -> bool {
        self.category() == ErrorCategory::Usage
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::InvalidValue { key, message } => {
                Error::Config(format!("Invalid value for {}: {}", key, message))
            }
            config::ConfigError::Serialization(e) => Error::Json(e),
            config::ConfigError::Io(e) => Error::Io(e),
            config::ConfigError::Env(e) => Error::Env(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
