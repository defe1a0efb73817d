//! Concrete plugin sources: imported modules, their exported objects, and
//! the class-like subset of those objects.

use std::fmt;
use std::sync::Arc;

use super::class::PluginClass;
use super::discovery::{PluginDiscovery, SearchPath};
use super::error::{PluginError, PluginResult};
use super::import::{ImportPolicy, Importer};
use super::loader::{Filled, Loader, PluginSource};
use super::manager::{LoadFailure, PluginManager};
use super::namespace::Namespace;

/// Scans a namespace and imports every candidate.
#[derive(Clone)]
pub struct ModuleSource {
    discovery: PluginDiscovery,
    importer: Arc<dyn Importer>,
    policy: ImportPolicy,
}

impl ModuleSource {
    pub fn new(discovery: PluginDiscovery, importer: Arc<dyn Importer>) -> Self {
        Self {
            discovery,
            importer,
            policy: ImportPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ImportPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn discovery(&self) -> &PluginDiscovery {
        &self.discovery
    }

    pub fn policy(&self) -> ImportPolicy {
        self.policy
    }
}

impl PluginSource for ModuleSource {
    type Query = ();

    fn fill(&self, namespace: &Namespace, _query: &()) -> PluginResult<Filled> {
        let mut filled = Filled::default();

        for candidate in self.discovery.scan(namespace) {
            match self.importer.import(&candidate) {
                Ok(Some(unit)) => filled.plugins.push(unit),
                Ok(None) => {
                    tracing::trace!(import_path = %candidate.import_path, "nothing to import");
                }
                Err(source) => match self.policy {
                    ImportPolicy::Skip => {
                        tracing::warn!(
                            import_path = %candidate.import_path,
                            error = %source,
                            "failed to import plugin, skipping"
                        );
                        filled.failures.push(LoadFailure {
                            import_path: candidate.import_path,
                            reason: source.to_string(),
                        });
                    }
                    ImportPolicy::Fail => {
                        return Err(PluginError::Load {
                            import_path: candidate.import_path.to_string(),
                            source,
                        });
                    }
                },
            }
        }

        tracing::debug!(
            namespace = %namespace,
            units = filled.plugins.len(),
            "namespace filled"
        );
        Ok(filled)
    }
}

impl fmt::Debug for ModuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleSource")
            .field("discovery", &self.discovery)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Public exports of the units a fresh module pipeline loads.
#[derive(Debug, Clone)]
pub struct ObjectSource {
    modules: ModuleSource,
}

impl ObjectSource {
    pub fn new(modules: ModuleSource) -> Self {
        Self { modules }
    }
}

impl PluginSource for ObjectSource {
    type Query = ();

    fn fill(&self, namespace: &Namespace, _query: &()) -> PluginResult<Filled> {
        let units = Loader::new(self.modules.clone()).load(namespace)?;

        let plugins = units
            .iter()
            .flat_map(|unit| unit.exports())
            .filter(|(name, _)| !name.starts_with('_'))
            .map(|(_, export)| export)
            .collect();

        Ok(Filled {
            plugins,
            failures: units.failures().to_vec(),
        })
    }
}

/// Class-like exports, optionally narrowed to strict subclasses of a base.
#[derive(Debug, Clone)]
pub struct ClassSource {
    objects: ObjectSource,
}

impl ClassSource {
    pub fn new(objects: ObjectSource) -> Self {
        Self { objects }
    }
}

impl From<ModuleSource> for ClassSource {
    fn from(modules: ModuleSource) -> Self {
        Self::new(ObjectSource::new(modules))
    }
}

impl PluginSource for ClassSource {
    type Query = Option<Arc<PluginClass>>;

    fn fill(&self, namespace: &Namespace, base: &Self::Query) -> PluginResult<Filled> {
        let mut filled = self.objects.fill(namespace, &())?;
        filled.plugins.retain(|plugin| match (plugin.as_class(), base) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(class), Some(base)) => {
                !std::ptr::eq(class, base.as_ref()) && class.is_subclass_of(base)
            }
        });
        Ok(filled)
    }
}

pub type ModuleLoader = Loader<ModuleSource>;
pub type ObjectLoader = Loader<ObjectSource>;
pub type ClassLoader = Loader<ClassSource>;

/// One-shot load: modules by default, strict subclasses of `subclasses`
/// when given.
pub fn unified_load(
    search_path: SearchPath,
    importer: Arc<dyn Importer>,
    namespace: &Namespace,
    subclasses: Option<Arc<PluginClass>>,
    recurse: bool,
) -> PluginResult<PluginManager> {
    let modules = ModuleSource::new(PluginDiscovery::new(search_path).recurse(recurse), importer);
    match subclasses {
        None => ModuleLoader::new(modules).load(namespace),
        Some(base) => ClassLoader::new(ClassSource::from(modules)).load_with(namespace, Some(base)),
    }
}
