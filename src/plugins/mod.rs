//! Namespace-based plugin discovery, loading and invocation.
//!
//! A namespace such as `team.plugins` maps to the directory `team/plugins`
//! under every root of a [`SearchPath`]. Units found there are imported,
//! filtered and ordered by their [`PluginDescriptor`], then handed out as a
//! [`PluginManager`].
//!
//! # Directory Structure
//!
//! ```text
//! <root>/
//! └── team/
//!     └── plugins/
//!         ├── audio.json          # single-file unit `team.plugins.audio`
//!         └── video/
//!             ├── __init__.json   # package marker, unit `team.plugins.video`
//!             └── codecs.json     # `team.plugins.video.codecs` (recursive scans)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use plugspace::plugins::{
//!     ManifestImporter, ModuleLoader, ModuleSource, Namespace, PluginDiscovery, SearchPath,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let discovery = PluginDiscovery::new(SearchPath::new(["/opt/plugins"])).recurse(true);
//! let mut loader = ModuleLoader::new(ModuleSource::new(discovery, Arc::new(ManifestImporter)));
//! let plugins = loader.load(&Namespace::new("team.plugins")?)?;
//! let version = plugins.first("version", &[])?;
//! println!("team.plugins version {version}");
//! # Ok(())
//! # }
//! ```

mod class;
mod discovery;
mod error;
mod import;
mod loader;
mod manager;
mod manifest;
mod namespace;
mod object;
mod sources;

pub use class::PluginClass;
pub use discovery::{
    CandidateKind, Candidates, PluginCandidate, PluginDiscovery, ScanSettings, SearchPath,
    DEFAULT_PACKAGE_MARKER, DEFAULT_UNIT_EXTENSION, SEARCH_PATH_VAR,
};
pub use error::{ImportError, PluginError, PluginResult};
pub use import::{ImportPolicy, Importer, ManifestImporter, StaticImporter};
pub use loader::{Expanded, Filled, Loader, Ordered, PluginSource};
pub use manager::{LoadFailure, PluginManager};
pub use manifest::{PluginDescriptor, PluginManifest};
pub use namespace::Namespace;
pub use object::{Constant, Factory, Function, MethodFn, Module, Object, Plugin, PluginRef, Value};
pub use sources::{
    ClassLoader, ClassSource, ModuleLoader, ModuleSource, ObjectLoader, ObjectSource, unified_load,
};
