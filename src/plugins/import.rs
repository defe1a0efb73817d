//! Import primitive: turning a discovered candidate into a loaded unit.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::discovery::PluginCandidate;
use super::error::ImportError;
use super::manifest::PluginManifest;
use super::object::PluginRef;

/// Loads the code unit behind a candidate.
///
/// `Ok(None)` means the candidate exists but has nothing to load, e.g. a
/// package whose marker carries no definition of its own.
pub trait Importer: Send + Sync {
    fn import(&self, candidate: &PluginCandidate) -> Result<Option<PluginRef>, ImportError>;
}

/// What a loader does when an import fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportPolicy {
    /// Leave the unit out, record the failure and continue.
    #[default]
    Skip,
    /// Abort the load on the first failure.
    Fail,
}

impl std::str::FromStr for ImportPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "fail" => Ok(Self::Fail),
            other => Err(format!("unknown import policy '{other}', expected 'skip' or 'fail'")),
        }
    }
}

type UnitConstructor = Arc<dyn Fn() -> Result<Option<PluginRef>, ImportError> + Send + Sync>;

/// In-memory registry of dotted import path to unit constructor.
///
/// Candidates are still found on disk by the scanner; the registry supplies
/// the code. Unregistered paths fail with [`ImportError::NotFound`].
#[derive(Clone, Default)]
pub struct StaticImporter {
    units: HashMap<String, UnitConstructor>,
}

impl StaticImporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a unit constructed on every import.
    pub fn register<F>(mut self, import_path: impl Into<String>, constructor: F) -> Self
    where
        F: Fn() -> PluginRef + Send + Sync + 'static,
    {
        let unit: UnitConstructor = Arc::new(move || Ok(Some(constructor())));
        self.units.insert(import_path.into(), unit);
        self
    }

    /// Registers a unit whose import fails with `reason`.
    pub fn register_failing(mut self, import_path: impl Into<String>, reason: impl Into<String>) -> Self {
        let import_path = import_path.into();
        let path = import_path.clone();
        let reason = reason.into();
        let unit: UnitConstructor = Arc::new(move || {
            Err(ImportError::Manifest {
                path: path.clone().into(),
                reason: reason.clone(),
            })
        });
        self.units.insert(import_path, unit);
        self
    }

    /// Registers a path that exists but loads nothing.
    pub fn register_empty(mut self, import_path: impl Into<String>) -> Self {
        let unit: UnitConstructor = Arc::new(|| Ok(None));
        self.units.insert(import_path.into(), unit);
        self
    }

    pub fn contains(&self, import_path: &str) -> bool {
        self.units.contains_key(import_path)
    }
}

impl Importer for StaticImporter {
    fn import(&self, candidate: &PluginCandidate) -> Result<Option<PluginRef>, ImportError> {
        let key = candidate.import_path.as_str();
        match self.units.get(key) {
            Some(constructor) => constructor(),
            None => Err(ImportError::NotFound(key.to_string())),
        }
    }
}

impl fmt::Debug for StaticImporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.units.keys().collect();
        keys.sort();
        f.debug_struct("StaticImporter").field("units", &keys).finish()
    }
}

/// Loads data-only units from JSON manifests (see [`PluginManifest`]).
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestImporter;

impl Importer for ManifestImporter {
    fn import(&self, candidate: &PluginCandidate) -> Result<Option<PluginRef>, ImportError> {
        let Some(manifest) = PluginManifest::load(&candidate.source)? else {
            return Ok(None);
        };
        let unit: PluginRef = Arc::new(manifest.into_module(candidate.import_path.as_str()));
        Ok(Some(unit))
    }
}
