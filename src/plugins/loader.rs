//! Loader pipeline: fill from a source, expand descriptors, order by priority.
//!
//! A [`Loader`] runs the pipeline once. Later calls return the cached result
//! whatever namespace or query they pass; build a new loader to rescan.

use super::error::PluginResult;
use super::manager::{LoadFailure, PluginManager};
use super::namespace::Namespace;
use super::object::PluginRef;

/// Produces the raw plugins of one namespace.
pub trait PluginSource {
    /// Extra input narrowing what the source yields, e.g. a base class.
    type Query;

    fn fill(&self, namespace: &Namespace, query: &Self::Query) -> PluginResult<Filled>;
}

/// Raw source output, in discovery order.
#[derive(Debug, Default)]
pub struct Filled {
    pub plugins: Vec<PluginRef>,
    pub failures: Vec<LoadFailure>,
}

impl Filled {
    pub fn new(plugins: Vec<PluginRef>) -> Self {
        Self {
            plugins,
            failures: Vec::new(),
        }
    }

    /// Drops excluded plugins and merges implied namespaces in place.
    pub fn expand<S: PluginSource>(
        self,
        source: &S,
        root: &Namespace,
        query: &S::Query,
    ) -> PluginResult<Expanded> {
        let mut expansion = Expansion {
            source,
            query,
            visiting: vec![root.clone()],
            plugins: Vec::with_capacity(self.plugins.len()),
            failures: self.failures,
        };
        expansion.run(self.plugins)?;
        Ok(Expanded {
            plugins: expansion.plugins,
            failures: expansion.failures,
        })
    }
}

struct Expansion<'a, S: PluginSource> {
    source: &'a S,
    query: &'a S::Query,
    visiting: Vec<Namespace>,
    plugins: Vec<PluginRef>,
    failures: Vec<LoadFailure>,
}

impl<S: PluginSource> Expansion<'_, S> {
    fn run(&mut self, plugins: Vec<PluginRef>) -> PluginResult<()> {
        for plugin in plugins {
            let descriptor = plugin.descriptor();
            if descriptor.load {
                self.plugins.push(plugin);
            } else {
                tracing::debug!(plugin = %plugin.name(), "plugin excluded by descriptor");
            }

            for implied in &descriptor.imply {
                if self.visiting.contains(implied) {
                    tracing::warn!(namespace = %implied, "implied namespace already being expanded, skipping");
                    continue;
                }

                tracing::debug!(namespace = %implied, "expanding implied namespace");
                let nested = self.source.fill(implied, self.query)?;
                self.failures.extend(nested.failures);

                self.visiting.push(implied.clone());
                let result = self.run(nested.plugins);
                self.visiting.pop();
                result?;
            }
        }
        Ok(())
    }
}

/// Plugins after exclusion and imply merging, not yet ordered.
#[derive(Debug, Default)]
pub struct Expanded {
    pub plugins: Vec<PluginRef>,
    pub failures: Vec<LoadFailure>,
}

impl Expanded {
    /// Stable sort by descending priority.
    pub fn order(self) -> Ordered {
        let mut keyed: Vec<(f64, PluginRef)> = self
            .plugins
            .into_iter()
            .map(|p| (p.descriptor().priority, p))
            .collect();
        keyed.sort_by(|(a, _), (b, _)| b.total_cmp(a));

        Ordered {
            plugins: keyed.into_iter().map(|(_, p)| p).collect(),
            failures: self.failures,
        }
    }
}

/// Final pipeline output.
#[derive(Debug, Default)]
pub struct Ordered {
    pub plugins: Vec<PluginRef>,
    pub failures: Vec<LoadFailure>,
}

impl Ordered {
    pub fn into_manager(self, namespace: Namespace) -> PluginManager {
        PluginManager::new(self.plugins)
            .with_failures(self.failures)
            .with_namespace(namespace)
    }
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Unfilled,
    Ordered(PluginManager),
}

/// Caching loader over a [`PluginSource`].
#[derive(Debug)]
pub struct Loader<S> {
    source: S,
    state: State,
}

impl<S: PluginSource> Loader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            state: State::Unfilled,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, State::Ordered(_))
    }

    /// Loads `namespace` with the default query.
    pub fn load(&mut self, namespace: &Namespace) -> PluginResult<PluginManager>
    where
        S::Query: Default,
    {
        self.load_with(namespace, S::Query::default())
    }

    pub fn load_with(&mut self, namespace: &Namespace, query: S::Query) -> PluginResult<PluginManager> {
        if let State::Ordered(manager) = &self.state {
            tracing::trace!(namespace = %namespace, "returning cached plugins");
            return Ok(manager.clone());
        }

        let manager = self
            .source
            .fill(namespace, &query)?
            .expand(&self.source, namespace, &query)?
            .order()
            .into_manager(namespace.clone());

        tracing::debug!(
            namespace = %namespace,
            plugins = manager.len(),
            failures = manager.failures().len(),
            "plugins loaded"
        );
        self.state = State::Ordered(manager.clone());
        Ok(manager)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::plugins::{Object, Plugin, PluginDescriptor};

    /// Namespace -> plugins table counting fills.
    #[derive(Default)]
    struct TableSource {
        table: HashMap<String, Vec<PluginRef>>,
        fills: RefCell<Vec<String>>,
    }

    impl TableSource {
        fn with(mut self, namespace: &str, plugins: Vec<PluginRef>) -> Self {
            self.table.insert(namespace.to_string(), plugins);
            self
        }
    }

    impl PluginSource for TableSource {
        type Query = ();

        fn fill(&self, namespace: &Namespace, _query: &()) -> PluginResult<Filled> {
            self.fills.borrow_mut().push(namespace.to_string());
            Ok(Filled::new(
                self.table.get(namespace.as_str()).cloned().unwrap_or_default(),
            ))
        }
    }

    fn ns(name: &str) -> Namespace {
        Namespace::new(name).unwrap()
    }

    fn plugin(name: &str, descriptor: PluginDescriptor) -> PluginRef {
        Arc::new(Object::new(name).with_descriptor(descriptor))
    }

    fn names(manager: &PluginManager) -> Vec<&str> {
        manager.iter().map(|p| p.name()).collect()
    }

    #[test]
    fn test_priority_ordering_is_stable() {
        let source = TableSource::default().with(
            "root",
            vec![
                plugin("A", PluginDescriptor::new()),
                plugin("C", PluginDescriptor::new()),
                plugin("B", PluginDescriptor::new().with_priority(5.0)),
            ],
        );
        let manager = Loader::new(source).load(&ns("root")).unwrap();
        assert_eq!(names(&manager), vec!["B", "A", "C"]);
        assert_eq!(manager.namespace().unwrap().as_str(), "root");
    }

    #[test]
    fn test_negative_priority_sorts_last() {
        let source = TableSource::default().with(
            "root",
            vec![
                plugin("low", PluginDescriptor::new().with_priority(-1.0)),
                plugin("plain", PluginDescriptor::new()),
            ],
        );
        let manager = Loader::new(source).load(&ns("root")).unwrap();
        assert_eq!(names(&manager), vec!["plain", "low"]);
    }

    #[test]
    fn test_imply_follows_host() {
        let source = TableSource::default()
            .with(
                "root",
                vec![
                    plugin("host", PluginDescriptor::new().implying(ns("extra"))),
                    plugin("after", PluginDescriptor::new()),
                ],
            )
            .with("extra", vec![plugin("implied", PluginDescriptor::new())]);

        let manager = Loader::new(source).load(&ns("root")).unwrap();
        assert_eq!(names(&manager), vec!["host", "implied", "after"]);
    }

    #[test]
    fn test_excluded_at_every_depth() {
        let source = TableSource::default()
            .with(
                "root",
                vec![
                    plugin("host", PluginDescriptor::new().implying(ns("extra"))),
                    plugin("off", PluginDescriptor::new().disabled()),
                ],
            )
            .with(
                "extra",
                vec![
                    plugin("nested_off", PluginDescriptor::new().disabled()),
                    plugin("nested_on", PluginDescriptor::new()),
                ],
            );

        let manager = Loader::new(source).load(&ns("root")).unwrap();
        assert_eq!(names(&manager), vec!["host", "nested_on"]);
    }

    #[test]
    fn test_dropped_plugin_still_implies() {
        let source = TableSource::default()
            .with(
                "root",
                vec![plugin(
                    "gate",
                    PluginDescriptor::new().disabled().implying(ns("extra")),
                )],
            )
            .with("extra", vec![plugin("implied", PluginDescriptor::new())]);

        let manager = Loader::new(source).load(&ns("root")).unwrap();
        assert_eq!(names(&manager), vec!["implied"]);
    }

    #[test]
    fn test_imply_cycle_is_skipped() {
        let source = TableSource::default()
            .with(
                "a",
                vec![plugin("one", PluginDescriptor::new().implying(ns("b")))],
            )
            .with(
                "b",
                vec![plugin("two", PluginDescriptor::new().implying(ns("a")))],
            );

        let manager = Loader::new(source).load(&ns("a")).unwrap();
        assert_eq!(names(&manager), vec!["one", "two"]);
    }

    #[test]
    fn test_load_is_cached() {
        let source = TableSource::default().with("root", vec![plugin("A", PluginDescriptor::new())]);
        let mut loader = Loader::new(source);
        assert!(!loader.is_loaded());

        let first = loader.load(&ns("root")).unwrap();
        let second = loader.load(&ns("elsewhere")).unwrap();
        assert!(loader.is_loaded());
        assert_eq!(names(&first), names(&second));
        assert_eq!(loader.source().fills.borrow().as_slice(), ["root"]);
    }

    #[test]
    fn test_failed_fill_leaves_loader_unfilled() {
        struct Failing;
        impl PluginSource for Failing {
            type Query = ();
            fn fill(&self, namespace: &Namespace, _query: &()) -> PluginResult<Filled> {
                Err(crate::plugins::PluginError::InvalidNamespace {
                    namespace: namespace.to_string(),
                    reason: "unavailable".into(),
                })
            }
        }

        let mut loader = Loader::new(Failing);
        assert!(loader.load(&ns("root")).is_err());
        assert!(!loader.is_loaded());
    }

    #[test]
    fn test_query_is_forwarded_to_implied_fills() {
        struct Prefixed;
        impl PluginSource for Prefixed {
            type Query = String;
            fn fill(&self, namespace: &Namespace, query: &String) -> PluginResult<Filled> {
                let name = format!("{query}{namespace}");
                let descriptor = if namespace.as_str() == "root" {
                    PluginDescriptor::new().implying(Namespace::new("extra").unwrap())
                } else {
                    PluginDescriptor::new()
                };
                Ok(Filled::new(vec![plugin(&name, descriptor)]))
            }
        }

        let manager = Loader::new(Prefixed)
            .load_with(&ns("root"), "q:".to_string())
            .unwrap();
        assert_eq!(names(&manager), vec!["q:root", "q:extra"]);
    }
}
