//! Plugin object model.
//!
//! Every artifact a loader hands out (a loaded unit, one of its exports, a
//! class, an instance produced by a class) is an `Arc<dyn Plugin>`. Operations
//! are capabilities: a plugin answers [`Plugin::invoke`] only for methods it
//! implements and returns `None` for everything else.

use std::fmt;
use std::sync::Arc;

use super::class::PluginClass;
use super::error::PluginResult;
use super::manifest::PluginDescriptor;

pub type Value = serde_json::Value;

pub type PluginRef = Arc<dyn Plugin>;

pub type MethodFn = Arc<dyn Fn(&[Value]) -> PluginResult<Value> + Send + Sync>;

pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor::default()
    }

    /// Members in enumeration order, private (`_`-prefixed) names included.
    fn exports(&self) -> Vec<(String, PluginRef)> {
        Vec::new()
    }

    /// Invokes `method` if this plugin implements it; `None` otherwise.
    fn invoke(&self, _method: &str, _args: &[Value]) -> Option<PluginResult<Value>> {
        None
    }

    fn as_factory(&self) -> Option<&dyn Factory> {
        None
    }

    fn as_class(&self) -> Option<&PluginClass> {
        None
    }
}

/// A plugin that can be called to create another plugin.
pub trait Factory: Send + Sync {
    fn create(&self, args: &[Value]) -> PluginResult<PluginRef>;
}

impl fmt::Debug for dyn Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Plugin").field(&self.name()).finish()
    }
}

#[derive(Clone, Default)]
struct MethodTable(Vec<(String, MethodFn)>);

impl MethodTable {
    fn insert(&mut self, name: String, method: MethodFn) {
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = method,
            None => self.0.push((name, method)),
        }
    }

    fn call(&self, name: &str, args: &[Value]) -> Option<PluginResult<Value>> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, method)| method(args))
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }
}

/// A loaded plugin unit: named members plus module-level functions.
#[derive(Clone)]
pub struct Module {
    name: String,
    descriptor: Option<PluginDescriptor>,
    exports: Vec<(String, PluginRef)>,
    methods: MethodTable,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descriptor: None,
            exports: Vec::new(),
            methods: MethodTable::default(),
        }
    }

    pub fn with_descriptor(mut self, descriptor: PluginDescriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    pub fn export(mut self, name: impl Into<String>, plugin: PluginRef) -> Self {
        let name = name.into();
        self.exports.retain(|(n, _)| *n != name);
        self.exports.push((name, plugin));
        self
    }

    pub fn constant(self, name: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        let constant = Constant::new(name.clone(), value);
        self.export(name, Arc::new(constant))
    }

    /// Adds a module-level function, callable through [`Plugin::invoke`] and
    /// also listed among the exports.
    pub fn function<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> PluginResult<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        let method: MethodFn = Arc::new(f);
        self.methods.insert(name.clone(), method.clone());
        self.export(name.clone(), Arc::new(Function::from_arc(name, method)))
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.names()
    }
}

impl Plugin for Module {
    fn name(&self) -> &str {
        &self.name
    }

    fn descriptor(&self) -> PluginDescriptor {
        self.descriptor.clone().unwrap_or_default()
    }

    fn exports(&self) -> Vec<(String, PluginRef)> {
        self.exports.clone()
    }

    fn invoke(&self, method: &str, args: &[Value]) -> Option<PluginResult<Value>> {
        self.methods.call(method, args)
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("descriptor", &self.descriptor)
            .field(
                "exports",
                &self.exports.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// A plain object with a method table, e.g. an instance created by a class.
#[derive(Clone)]
pub struct Object {
    name: String,
    descriptor: Option<PluginDescriptor>,
    methods: MethodTable,
}

impl Object {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descriptor: None,
            methods: MethodTable::default(),
        }
    }

    pub fn with_descriptor(mut self, descriptor: PluginDescriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    pub fn method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> PluginResult<Value> + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(f));
        self
    }
}

impl Plugin for Object {
    fn name(&self) -> &str {
        &self.name
    }

    fn descriptor(&self) -> PluginDescriptor {
        self.descriptor.clone().unwrap_or_default()
    }

    fn invoke(&self, method: &str, args: &[Value]) -> Option<PluginResult<Value>> {
        self.methods.call(method, args)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("name", &self.name)
            .field("methods", &self.methods.names().collect::<Vec<_>>())
            .finish()
    }
}

/// A callable export. Calling it produces a [`Constant`] holding the result.
#[derive(Clone)]
pub struct Function {
    name: String,
    f: MethodFn,
}

impl Function {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> PluginResult<Value> + Send + Sync + 'static,
    {
        Self::from_arc(name, Arc::new(f))
    }

    fn from_arc(name: impl Into<String>, f: MethodFn) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    pub fn call(&self, args: &[Value]) -> PluginResult<Value> {
        (self.f)(args)
    }
}

impl Plugin for Function {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_factory(&self) -> Option<&dyn Factory> {
        Some(self)
    }
}

impl Factory for Function {
    fn create(&self, args: &[Value]) -> PluginResult<PluginRef> {
        let value = self.call(args)?;
        Ok(Arc::new(Constant::new(self.name.clone(), value)))
    }
}

/// A named plain value.
#[derive(Debug, Clone)]
pub struct Constant {
    name: String,
    value: Value,
}

impl Constant {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl Plugin for Constant {
    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_module_functions_and_exports() {
        let module = Module::new("ns.math")
            .function("double", |args| {
                Ok(json!(args[0].as_i64().unwrap_or_default() * 2))
            })
            .constant("answer", json!(42));

        assert_eq!(module.invoke("double", &[json!(4)]).unwrap().unwrap(), json!(8));
        assert!(module.invoke("missing", &[]).is_none());

        let names: Vec<_> = module.exports().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["double", "answer"]);
        assert_eq!(module.method_names().collect::<Vec<_>>(), vec!["double"]);
    }

    #[test]
    fn test_module_export_replaces_same_name() {
        let module = Module::new("ns.unit")
            .constant("x", json!(1))
            .constant("x", json!(2));
        assert_eq!(module.exports().len(), 1);
    }

    #[test]
    fn test_object_methods() {
        let object = Object::new("greeter")
            .method("greet", |args| Ok(json!(format!("hi {}", args[0]))))
            .with_descriptor(PluginDescriptor::new().with_priority(1.0));

        assert_eq!(object.descriptor().priority, 1.0);
        assert!(object.invoke("greet", &[json!("bob")]).is_some());
        assert!(object.invoke("wave", &[]).is_none());
        assert!(object.as_factory().is_none());
    }

    #[test]
    fn test_function_is_factory() {
        let function = Function::new("make", |_| Ok(json!("made")));
        let product = function.as_factory().unwrap().create(&[]).unwrap();
        assert_eq!(product.name(), "make");
    }

    #[test]
    fn test_defaults() {
        let constant = Constant::new("c", json!(null));
        assert!(constant.descriptor().load);
        assert!(constant.exports().is_empty());
        assert!(constant.invoke("anything", &[]).is_none());
        assert!(constant.as_class().is_none());
        assert_eq!(constant.value(), &json!(null));
    }
}
