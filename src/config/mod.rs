//! Settings for discovery and loading.
//!
//! ```rust,no_run
//! use plugspace::config::SettingsLoader;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = SettingsLoader::new()
//!     .file("plugspace.json")?
//!     .env()?
//!     .build();
//! let discovery = settings.discovery();
//! # Ok(())
//! # }
//! ```

pub mod env;

pub use env::{EnvOverrides, IMPORT_POLICY_VAR, RECURSE_VAR};

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::plugins::{
    ImportPolicy, Importer, ModuleSource, PluginDiscovery, ScanSettings, SearchPath,
};

/// Errors that can occur while loading settings
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid value for {key}: {message}")]
    InvalidValue {
        /// The key with invalid value
        key: String,
        /// Error message
        message: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable error
    #[error("Environment error: {0}")]
    Env(#[from] std::env::VarError),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Ordered search roots. Empty means the default data directory root.
    pub search_path: SearchPath,
    pub scan: ScanSettings,
    pub recurse: bool,
    pub import_policy: ImportPolicy,
}

impl Settings {
    /// Search roots in effect, falling back to [`SearchPath::default_root`].
    pub fn effective_search_path(&self) -> SearchPath {
        if !self.search_path.is_empty() {
            return self.search_path.clone();
        }
        SearchPath::new(SearchPath::default_root())
    }

    pub fn discovery(&self) -> PluginDiscovery {
        PluginDiscovery::new(self.effective_search_path())
            .with_settings(self.scan.clone())
            .recurse(self.recurse)
    }

    pub fn module_source(&self, importer: Arc<dyn Importer>) -> ModuleSource {
        ModuleSource::new(self.discovery(), importer).with_policy(self.import_policy)
    }
}

/// Builds [`Settings`] from layered sources; later layers win.
#[derive(Debug, Default)]
pub struct SettingsLoader {
    settings: Settings,
}

impl SettingsLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current settings with a JSON settings file. A missing
    /// file leaves them unchanged.
    pub fn file(mut self, path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "settings file not found, skipping");
            return Ok(self);
        }
        let content = std::fs::read_to_string(path)?;
        self.settings = serde_json::from_str(&content)?;
        Ok(self)
    }

    /// Applies `PLUGSPACE_*` environment variables.
    pub fn env(self) -> ConfigResult<Self> {
        let overrides = EnvOverrides::from_env()?;
        Ok(self.overrides(overrides))
    }

    pub fn overrides(mut self, overrides: EnvOverrides) -> Self {
        overrides.apply(&mut self.settings);
        self
    }

    pub fn build(self) -> Settings {
        self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_settings_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.scan.unit_extension, "json");
        assert_eq!(settings.import_policy, ImportPolicy::Skip);
        assert!(!settings.recurse);
    }

    #[test]
    fn test_settings_parse() {
        let settings: Settings = serde_json::from_str(
            r#"{
                "searchPath": ["/a", "/b"],
                "scan": {"unitExtension": "plugin"},
                "recurse": true,
                "importPolicy": "fail"
            }"#,
        )
        .unwrap();
        assert_eq!(
            settings.search_path.roots(),
            [PathBuf::from("/a"), PathBuf::from("/b")]
        );
        assert_eq!(settings.scan.unit_extension, "plugin");
        assert_eq!(settings.scan.package_marker, "__init__.json");
        assert!(settings.discovery().is_recursive());
        assert_eq!(settings.import_policy, ImportPolicy::Fail);
    }

    #[test]
    fn test_effective_search_path() {
        let explicit = Settings {
            search_path: SearchPath::new(["/opt/plugins"]),
            ..Default::default()
        };
        assert_eq!(explicit.effective_search_path().roots().len(), 1);

        let fallback = Settings::default().effective_search_path();
        assert_eq!(
            fallback.roots().first(),
            SearchPath::default_root().as_ref()
        );
    }

    #[test]
    fn test_loader_layers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plugspace.json");
        std::fs::write(&path, r#"{"searchPath": ["/from/file"], "recurse": false}"#).unwrap();

        let overrides = EnvOverrides {
            recurse: Some(true),
            ..Default::default()
        };
        let settings = SettingsLoader::new()
            .file(&path)
            .unwrap()
            .overrides(overrides)
            .build();

        assert_eq!(settings.search_path.roots(), [PathBuf::from("/from/file")]);
        assert!(settings.recurse);
    }

    #[test]
    fn test_loader_missing_file() {
        let dir = tempdir().unwrap();
        let settings = SettingsLoader::new()
            .file(dir.path().join("absent.json"))
            .unwrap()
            .build();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_loader_invalid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{").unwrap();
        assert!(matches!(
            SettingsLoader::new().file(&path),
            Err(ConfigError::Serialization(_))
        ));
    }
}
