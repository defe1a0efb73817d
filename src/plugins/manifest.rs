use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ImportError;
use super::namespace::Namespace;
use super::object::Module;

/// Metadata a plugin may carry to steer loading.
///
/// Absence of a descriptor is equivalent to [`PluginDescriptor::default`]:
/// loaded, implies nothing, priority `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    #[serde(default = "default_load")]
    pub load: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imply: Vec<Namespace>,
    #[serde(default)]
    pub priority: f64,
}

fn default_load() -> bool {
    true
}

impl Default for PluginDescriptor {
    fn default() -> Self {
        Self {
            load: true,
            imply: Vec::new(),
            priority: 0.0,
        }
    }
}

impl PluginDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the plugin as excluded from every loader's output.
    pub fn disabled(mut self) -> Self {
        self.load = false;
        self
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    pub fn implying(mut self, namespace: Namespace) -> Self {
        self.imply.push(namespace);
        self
    }
}

/// On-disk form of a data-only plugin unit.
///
/// ```json
/// {
///   "plugin": {"priority": 5, "imply": ["team.extras"]},
///   "exports": {"greeting": "hello"},
///   "methods": {"version": "1.2.0"}
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<PluginDescriptor>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub exports: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub methods: serde_json::Map<String, serde_json::Value>,
}

impl PluginManifest {
    /// Reads a manifest file. A blank file yields `None`: the unit exists but
    /// carries nothing to load (a namespace-only package marker).
    pub fn load(path: &Path) -> Result<Option<Self>, ImportError> {
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| ImportError::Manifest {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    /// Builds a module whose exports are constants and whose methods answer
    /// with their configured value.
    pub fn into_module(self, name: impl Into<String>) -> Module {
        let mut module = Module::new(name);
        if let Some(descriptor) = self.plugin {
            module = module.with_descriptor(descriptor);
        }
        for (export, value) in self.exports {
            module = module.constant(export, value);
        }
        for (method, value) in self.methods {
            module = module.function(method, move |_| Ok(value.clone()));
        }
        module
    }
}
