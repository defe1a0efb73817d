use std::fmt;
use std::ops::Index;

use serde::{Deserialize, Serialize};

use super::error::{PluginError, PluginResult};
use super::namespace::Namespace;
use super::object::{PluginRef, Value};

/// A candidate left out of a best-effort load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadFailure {
    pub import_path: Namespace,
    pub reason: String,
}

impl fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.import_path, self.reason)
    }
}

/// Ordered, fixed collection of loaded plugins.
#[derive(Clone, Default)]
pub struct PluginManager {
    plugins: Vec<PluginRef>,
    failures: Vec<LoadFailure>,
    namespace: Option<Namespace>,
}

impl PluginManager {
    pub fn new(plugins: Vec<PluginRef>) -> Self {
        Self {
            plugins,
            failures: Vec::new(),
            namespace: None,
        }
    }

    pub fn with_failures(mut self, failures: Vec<LoadFailure>) -> Self {
        self.failures = failures;
        self
    }

    pub fn with_namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = Some(namespace);
        self
    }

    /// Invokes `method` on every plugin implementing it, one plugin per
    /// `next()`. Plugins without the method are skipped.
    pub fn call<'a>(
        &'a self,
        method: &'a str,
        args: &'a [Value],
    ) -> impl Iterator<Item = PluginResult<Value>> + 'a {
        self.plugins
            .iter()
            .filter_map(move |plugin| plugin.invoke(method, args))
    }

    /// First non-null result of `method`. No plugin after the answering one
    /// is invoked.
    pub fn first(&self, method: &str, args: &[Value]) -> PluginResult<Value> {
        for result in self.call(method, args) {
            let value = result?;
            if !value.is_null() {
                return Ok(value);
            }
        }
        Err(PluginError::NoResult {
            method: method.to_string(),
        })
    }

    /// Threads a value through every plugin implementing `method`, each
    /// called with `[current, args...]`. Null results keep the current value.
    pub fn pipe(&self, method: &str, seed: Value, args: &[Value]) -> PluginResult<Value> {
        let mut call_args = Vec::with_capacity(args.len() + 1);
        call_args.push(seed);
        call_args.extend_from_slice(args);

        for plugin in &self.plugins {
            if let Some(result) = plugin.invoke(method, &call_args) {
                let value = result?;
                if !value.is_null() {
                    call_args[0] = value;
                }
            }
        }
        Ok(std::mem::take(&mut call_args[0]))
    }

    /// Calls every plugin as a factory and collects the products in order.
    pub fn produce(&self, args: &[Value]) -> PluginResult<PluginManager> {
        let products = self
            .plugins
            .iter()
            .map(|plugin| {
                let factory = plugin.as_factory().ok_or_else(|| PluginError::NotCallable {
                    name: plugin.name().to_string(),
                })?;
                factory.create(args)
            })
            .collect::<PluginResult<Vec<_>>>()?;

        Ok(Self {
            plugins: products,
            failures: Vec::new(),
            namespace: self.namespace.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PluginRef> {
        self.plugins.iter()
    }

    pub fn get(&self, index: usize) -> Option<&PluginRef> {
        self.plugins.get(index)
    }

    pub fn plugins(&self) -> &[PluginRef] {
        &self.plugins
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.iter().any(|p| p.name() == name)
    }

    pub fn failures(&self) -> &[LoadFailure] {
        &self.failures
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Namespace this collection was loaded from, if it came from a loader.
    pub fn namespace(&self) -> Option<&Namespace> {
        self.namespace.as_ref()
    }
}

impl Index<usize> for PluginManager {
    type Output = PluginRef;

    fn index(&self, index: usize) -> &Self::Output {
        &self.plugins[index]
    }
}

impl<'a> IntoIterator for &'a PluginManager {
    type Item = &'a PluginRef;
    type IntoIter = std::slice::Iter<'a, PluginRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.plugins.iter()
    }
}

impl fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManager")
            .field("namespace", &self.namespace)
            .field(
                "plugins",
                &self.plugins.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("failures", &self.failures.len())
            .finish()
    }
}
