//! Filesystem scanning of a namespace across ordered search roots.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::namespace::Namespace;

pub const DEFAULT_UNIT_EXTENSION: &str = "json";
pub const DEFAULT_PACKAGE_MARKER: &str = "__init__.json";
pub const SEARCH_PATH_VAR: &str = "PLUGSPACE_PATH";

/// Ordered list of base directories. The first root to yield a base name wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchPath(Vec<PathBuf>);

impl SearchPath {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self(roots.into_iter().map(Into::into).collect())
    }

    /// Parses a `PLUGSPACE_PATH` value in the platform path-list syntax.
    /// Empty entries are dropped; `None` when nothing remains.
    pub fn from_path_list(value: &OsStr) -> Option<Self> {
        let roots: Vec<PathBuf> = std::env::split_paths(value)
            .filter(|root| !root.as_os_str().is_empty())
            .collect();
        (!roots.is_empty()).then_some(Self(roots))
    }

    /// `<data dir>/plugspace`, e.g. `~/.local/share/plugspace` on Linux.
    pub fn default_root() -> Option<PathBuf> {
        directories::BaseDirs::new().map(|d| d.data_dir().join("plugspace"))
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<P: Into<PathBuf>> FromIterator<P> for SearchPath {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSettings {
    #[serde(default = "default_unit_extension")]
    pub unit_extension: String,
    #[serde(default = "default_package_marker")]
    pub package_marker: String,
}

fn default_unit_extension() -> String {
    DEFAULT_UNIT_EXTENSION.to_string()
}

fn default_package_marker() -> String {
    DEFAULT_PACKAGE_MARKER.to_string()
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            unit_extension: default_unit_extension(),
            package_marker: default_package_marker(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    /// A directory holding the package marker.
    Package,
    /// A single file with the unit extension.
    Module,
}

/// A discovered, not yet imported, plugin location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginCandidate {
    pub base_name: String,
    pub import_path: Namespace,
    pub kind: CandidateKind,
    /// The directory entry itself.
    pub location: PathBuf,
    /// The file holding the unit's definition: the unit file, or the
    /// package marker for packages.
    pub source: PathBuf,
}

impl PluginCandidate {
    /// A candidate known only by import path, for importers that do not
    /// read the filesystem.
    pub fn detached(import_path: Namespace) -> Self {
        Self {
            base_name: import_path.last_segment().to_string(),
            import_path,
            kind: CandidateKind::Module,
            location: PathBuf::new(),
            source: PathBuf::new(),
        }
    }

    pub fn is_package(&self) -> bool {
        self.kind == CandidateKind::Package
    }
}

#[derive(Debug, Clone, Default)]
pub struct PluginDiscovery {
    search_path: SearchPath,
    settings: ScanSettings,
    recurse: bool,
}

impl PluginDiscovery {
    pub fn new(search_path: SearchPath) -> Self {
        Self {
            search_path,
            settings: ScanSettings::default(),
            recurse: false,
        }
    }

    pub fn with_settings(mut self, settings: ScanSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn recurse(mut self, recurse: bool) -> Self {
        self.recurse = recurse;
        self
    }

    pub fn search_path(&self) -> &SearchPath {
        &self.search_path
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    pub fn is_recursive(&self) -> bool {
        self.recurse
    }

    /// Lazily enumerates candidates under `namespace`: root order, then
    /// directory order (sorted by file name) within a root.
    pub fn scan(&self, namespace: &Namespace) -> Candidates<'_> {
        Candidates {
            discovery: self,
            seen: HashSet::new(),
            stack: vec![Frame::new(namespace.clone())],
        }
    }

    /// Finds the candidate for one fully-qualified import path, e.g.
    /// `team.plugins.audio` or a top-level `audio`, without recursing.
    ///
    /// Roots are tried in order; within a root a package wins over a unit
    /// file of the same name, as in [`scan`](Self::scan).
    pub fn locate(&self, import_path: &Namespace) -> Option<PluginCandidate> {
        let base_name = import_path.last_segment();
        let relative = import_path.to_relative_path();
        let unit_file = format!("{base_name}.{}", self.settings.unit_extension);

        self.search_path.roots().iter().find_map(|root| {
            let location = root.join(&relative);
            let marker = location.join(&self.settings.package_marker);
            if marker.is_file() {
                return Some(PluginCandidate {
                    base_name: base_name.to_string(),
                    import_path: import_path.clone(),
                    kind: CandidateKind::Package,
                    location,
                    source: marker,
                });
            }

            let file = location.with_file_name(&unit_file);
            if unit_file == self.settings.package_marker || !file.is_file() {
                return None;
            }
            Some(PluginCandidate {
                base_name: base_name.to_string(),
                import_path: import_path.clone(),
                kind: CandidateKind::Module,
                location: file.clone(),
                source: file,
            })
        })
    }

    fn namespace_dir(root: &Path, namespace: &Namespace) -> PathBuf {
        root.join(namespace.to_relative_path())
    }

    fn list_dir(dir: &Path) -> Option<std::vec::IntoIter<PathBuf>> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::trace!(path = %dir.display(), error = %e, "namespace directory unavailable, skipping");
                return None;
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.path()),
                Err(e) => {
                    tracing::trace!(path = %dir.display(), error = %e, "unreadable directory entry");
                    None
                }
            })
            .collect();
        paths.sort();
        Some(paths.into_iter())
    }

    fn classify(&self, namespace: &Namespace, path: PathBuf) -> Entry {
        let Some(file_name) = path.file_name().and_then(OsStr::to_str).map(str::to_owned) else {
            return Entry::Skip;
        };

        if path.is_dir() {
            let marker = path.join(&self.settings.package_marker);
            if !marker.is_file() {
                tracing::trace!(path = %path.display(), "directory without package marker, skipping");
                return Entry::Skip;
            }
            let Ok(import_path) = namespace.child(&file_name) else {
                tracing::debug!(path = %path.display(), "package name is not a namespace segment, skipping");
                return Entry::Skip;
            };
            let candidate = PluginCandidate {
                base_name: file_name,
                import_path,
                kind: CandidateKind::Package,
                location: path,
                source: marker,
            };
            return if self.recurse {
                Entry::Descend(candidate)
            } else {
                Entry::Yield(candidate)
            };
        }

        if file_name == self.settings.package_marker {
            return Entry::Skip;
        }
        let ext = path.extension().and_then(OsStr::to_str);
        if ext != Some(self.settings.unit_extension.as_str()) {
            return Entry::Skip;
        }
        let Some(base_name) = path.file_stem().and_then(OsStr::to_str).map(str::to_owned) else {
            return Entry::Skip;
        };
        let Ok(import_path) = namespace.child(&base_name) else {
            tracing::debug!(path = %path.display(), "unit name is not a namespace segment, skipping");
            return Entry::Skip;
        };
        Entry::Yield(PluginCandidate {
            base_name,
            import_path,
            kind: CandidateKind::Module,
            location: path.clone(),
            source: path,
        })
    }
}

enum Entry {
    Skip,
    Yield(PluginCandidate),
    Descend(PluginCandidate),
}

struct Frame {
    namespace: Namespace,
    next_root: usize,
    entries: Option<std::vec::IntoIter<PathBuf>>,
    /// Package waiting for its nested namespace to be exhausted.
    pending: Option<PluginCandidate>,
}

impl Frame {
    fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            next_root: 0,
            entries: None,
            pending: None,
        }
    }
}

/// Iterator returned by [`PluginDiscovery::scan`].
pub struct Candidates<'a> {
    discovery: &'a PluginDiscovery,
    seen: HashSet<String>,
    stack: Vec<Frame>,
}

impl Candidates<'_> {
    fn accept(&mut self, candidate: PluginCandidate) -> Option<PluginCandidate> {
        if self.seen.insert(candidate.base_name.clone()) {
            tracing::trace!(import_path = %candidate.import_path, path = %candidate.location.display(), "discovered plugin candidate");
            Some(candidate)
        } else {
            tracing::trace!(base_name = %candidate.base_name, path = %candidate.location.display(), "shadowed by an earlier candidate");
            None
        }
    }
}

impl Iterator for Candidates<'_> {
    type Item = PluginCandidate;

    fn next(&mut self) -> Option<Self::Item> {
        let discovery = self.discovery;
        let roots = discovery.search_path.roots();

        loop {
            let frame = self.stack.last_mut()?;

            if let Some(path) = frame.entries.as_mut().and_then(Iterator::next) {
                match discovery.classify(&frame.namespace, path) {
                    Entry::Skip => {}
                    Entry::Yield(candidate) => {
                        if let Some(candidate) = self.accept(candidate) {
                            return Some(candidate);
                        }
                    }
                    Entry::Descend(candidate) => {
                        let nested = Frame::new(candidate.import_path.clone());
                        frame.pending = Some(candidate);
                        self.stack.push(nested);
                    }
                }
                continue;
            }

            if frame.next_root < roots.len() {
                let dir = PluginDiscovery::namespace_dir(&roots[frame.next_root], &frame.namespace);
                frame.next_root += 1;
                frame.entries = PluginDiscovery::list_dir(&dir);
                continue;
            }

            self.stack.pop();
            let pending = self.stack.last_mut().and_then(|parent| parent.pending.take());
            if let Some(candidate) = pending
                && let Some(candidate) = self.accept(candidate)
            {
                return Some(candidate);
            }
        }
    }
}
