use std::fmt;
use std::sync::Arc;

use super::error::PluginResult;
use super::manifest::PluginDescriptor;
use super::object::{Factory, Object, Plugin, PluginRef, Value};

type Constructor = Arc<dyn Fn(&[Value]) -> PluginResult<PluginRef> + Send + Sync>;

/// A class-like plugin: named, with base classes, callable to create
/// instances.
///
/// Identity is the allocation: two classes with the same name are distinct
/// unless they are the same `Arc`.
#[derive(Clone)]
pub struct PluginClass {
    name: String,
    bases: Vec<Arc<PluginClass>>,
    descriptor: Option<PluginDescriptor>,
    constructor: Constructor,
}

impl PluginClass {
    /// A class whose instances are empty [`Object`]s named after the class.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let instance_name = name.clone();
        let constructor: Constructor = Arc::new(move |_: &[Value]| -> PluginResult<PluginRef> {
            Ok(Arc::new(Object::new(instance_name.clone())))
        });
        Self {
            name,
            bases: Vec::new(),
            descriptor: None,
            constructor,
        }
    }

    pub fn with_base(mut self, base: Arc<PluginClass>) -> Self {
        self.bases.push(base);
        self
    }

    pub fn with_descriptor(mut self, descriptor: PluginDescriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    pub fn with_constructor<F>(mut self, constructor: F) -> Self
    where
        F: Fn(&[Value]) -> PluginResult<PluginRef> + Send + Sync + 'static,
    {
        self.constructor = Arc::new(constructor);
        self
    }

    pub fn bases(&self) -> &[Arc<PluginClass>] {
        &self.bases
    }

    /// True when `self` is `other` or inherits from it, directly or not.
    pub fn is_subclass_of(&self, other: &PluginClass) -> bool {
        std::ptr::eq(self, other) || self.bases.iter().any(|base| base.is_subclass_of(other))
    }

    pub fn instantiate(&self, args: &[Value]) -> PluginResult<PluginRef> {
        (self.constructor)(args)
    }
}

impl Plugin for PluginClass {
    fn name(&self) -> &str {
        &self.name
    }

    fn descriptor(&self) -> PluginDescriptor {
        self.descriptor.clone().unwrap_or_default()
    }

    fn as_factory(&self) -> Option<&dyn Factory> {
        Some(self)
    }

    fn as_class(&self) -> Option<&PluginClass> {
        Some(self)
    }
}

impl Factory for PluginClass {
    fn create(&self, args: &[Value]) -> PluginResult<PluginRef> {
        self.instantiate(args)
    }
}

impl fmt::Debug for PluginClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginClass")
            .field("name", &self.name)
            .field(
                "bases",
                &self.bases.iter().map(|b| b.name.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
