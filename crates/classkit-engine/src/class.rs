//! Class handles
//!
//! A [`Class`] is a cheap, shareable handle to one class: its name, parent,
//! own prototype and static members, and its [`ClassMeta`]. Subclasses are
//! created with [`Class::extend`]; declarations are layered with
//! [`Class::define`] and take effect when the class completes.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::builtins;
use crate::definition::Definition;
use crate::error::{MetaError, MetaResult};
use crate::function::{Method, StaticMethod};
use crate::meta::ClassMeta;
use crate::mixin::MixinComposer;
use crate::object::Instance;
use crate::options::EngineOptions;
use crate::processor::ProcessorSpec;
use crate::value::Value;

/// Process-unique class identifier
pub type ClassId = u64;

static NEXT_CLASS_ID: AtomicU64 = AtomicU64::new(1);

/// A prototype member and its writability
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub(crate) value: Value,
    pub(crate) writable: bool,
}

struct ClassInner {
    id: ClassId,
    name: String,
    parent: Option<Class>,
    options: Arc<EngineOptions>,
    prototype: RwLock<IndexMap<String, Slot>>,
    statics: RwLock<IndexMap<String, Value>>,
    meta: ClassMeta,
}

/// Shared handle to a class
#[derive(Clone)]
pub struct Class {
    inner: Arc<ClassInner>,
}

impl Class {
    fn create(name: &str, parent: Option<Class>, options: Arc<EngineOptions>) -> Self {
        Self {
            inner: Arc::new(ClassInner {
                id: NEXT_CLASS_ID.fetch_add(1, Ordering::Relaxed),
                name: name.to_string(),
                parent,
                options,
                prototype: RwLock::new(IndexMap::new()),
                statics: RwLock::new(IndexMap::new()),
                meta: ClassMeta::new(),
            }),
        }
    }

    /// Adopt a fresh root class with default options.
    ///
    /// A bare root has no processors; use [`Class::base`] for a root that
    /// carries the built-in ones.
    pub fn adopt(name: &str) -> Self {
        Self::adopt_with(name, EngineOptions::default())
    }

    /// Adopt a fresh root class
    pub fn adopt_with(name: &str, options: EngineOptions) -> Self {
        Self::create(name, None, Arc::new(options))
    }

    /// The shared `Base` root with the built-in processors
    pub fn base() -> Self {
        builtins::base()
    }

    /// An independent `Base` root carrying `options`
    pub fn base_with(options: EngineOptions) -> Self {
        builtins::build_base(options)
    }

    /// Create a subclass
    pub fn extend(&self, name: &str) -> Self {
        Self::create(name, Some(self.clone()), self.inner.options.clone())
    }

    /// Class id
    pub fn id(&self) -> ClassId {
        self.inner.id
    }

    /// Class name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Superclass, `None` for roots
    pub fn parent(&self) -> Option<&Class> {
        self.inner.parent.as_ref()
    }

    /// Options shared by the hierarchy
    pub fn options(&self) -> &EngineOptions {
        &self.inner.options
    }

    /// Class metadata
    pub fn meta(&self) -> &ClassMeta {
        &self.inner.meta
    }

    /// Root-first list of this class and its ancestors
    pub fn lineage(&self) -> Vec<Class> {
        let mut lineage = Vec::new();
        let mut current = Some(self);
        while let Some(class) = current {
            lineage.push(class.clone());
            current = class.parent();
        }
        lineage.reverse();
        lineage
    }

    /// Whether `self` is `other` or extends it
    pub fn is_subclass_of(&self, other: &Class) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class == other {
                return true;
            }
            current = class.parent();
        }
        false
    }

    /// Layer a declaration fragment onto the pending declaration
    pub fn define(&self, definition: Definition) -> MetaResult<()> {
        self.meta().define(self, definition)
    }

    /// Set the id this class is addressable by when mixed in
    pub fn set_mixin_id(&self, id: &str) {
        self.meta().set_mixin_id(Some(id.to_string()));
    }

    /// Run the processor pipeline if it has not run yet
    pub fn complete(&self) -> MetaResult<()> {
        self.meta().complete(self)
    }

    /// Completed processor order
    pub fn get_processors(&self) -> MetaResult<Vec<ProcessorSpec>> {
        self.complete()?;
        Ok(self.meta().processors())
    }

    // Prototype members

    /// Set a writable prototype member
    pub fn set_prototype(&self, name: &str, value: impl Into<Value>) -> &Self {
        self.set_property(name, value, true)
    }

    /// Set a prototype member with explicit writability
    pub fn set_property(&self, name: &str, value: impl Into<Value>, writable: bool) -> &Self {
        self.inner.prototype.write().insert(
            name.to_string(),
            Slot {
                value: value.into(),
                writable,
            },
        );
        self
    }

    /// Define a plain instance method
    pub fn define_method(
        &self,
        name: &str,
        func: impl Fn(&Instance, &[Value]) -> MetaResult<Value> + Send + Sync + 'static,
    ) -> &Self {
        self.set_prototype(name, Method::new(name, func))
    }

    /// Define a junction method
    pub fn define_junction(
        &self,
        name: &str,
        func: impl Fn(&Instance, &[Value]) -> MetaResult<Value> + Send + Sync + 'static,
    ) -> &Self {
        self.set_prototype(name, Method::junction(name, func))
    }

    /// Own prototype member
    pub fn own_prototype(&self, name: &str) -> Option<Value> {
        self.inner.prototype.read().get(name).map(|slot| slot.value.clone())
    }

    /// Whether the class itself declares `name` on its prototype
    pub fn has_own_prototype(&self, name: &str) -> bool {
        self.inner.prototype.read().contains_key(name)
    }

    /// Prototype member resolved through the class chain
    pub fn get_prototype(&self, name: &str) -> Option<Value> {
        self.lookup_slot(name).map(|(_, slot)| slot.value)
    }

    /// Names of own prototype members, in definition order
    pub fn prototype_names(&self) -> Vec<String> {
        self.inner.prototype.read().keys().cloned().collect()
    }

    pub(crate) fn lookup_slot(&self, name: &str) -> Option<(Class, Slot)> {
        let mut current = Some(self);
        while let Some(class) = current {
            if let Some(slot) = class.inner.prototype.read().get(name) {
                return Some((class.clone(), slot.clone()));
            }
            current = class.parent();
        }
        None
    }

    pub(crate) fn own_slots(&self) -> Vec<(String, Slot)> {
        self.inner
            .prototype
            .read()
            .iter()
            .map(|(name, slot)| (name.clone(), slot.clone()))
            .collect()
    }

    pub(crate) fn insert_slot(&self, name: &str, slot: Slot) {
        self.inner.prototype.write().insert(name.to_string(), slot);
    }

    /// Method declared directly on this class, junctions included
    pub(crate) fn own_method(&self, name: &str) -> Option<Method> {
        match self.inner.prototype.read().get(name) {
            Some(Slot {
                value: Value::Method(method),
                ..
            }) => Some(method.clone()),
            _ => None,
        }
    }

    // Static members

    /// Set a static member
    pub fn set_static(&self, name: &str, value: impl Into<Value>) -> &Self {
        self.inner.statics.write().insert(name.to_string(), value.into());
        self
    }

    /// Define a static method
    pub fn define_static(
        &self,
        name: &str,
        func: impl Fn(&Class, &[Value]) -> MetaResult<Value> + Send + Sync + 'static,
    ) -> &Self {
        self.set_static(name, StaticMethod::new(name, func))
    }

    /// Own static member
    pub fn own_static(&self, name: &str) -> Option<Value> {
        self.inner.statics.read().get(name).cloned()
    }

    /// Whether the class itself declares static `name`
    pub fn has_own_static(&self, name: &str) -> bool {
        self.inner.statics.read().contains_key(name)
    }

    /// Static member resolved through the class chain
    pub fn get_static(&self, name: &str) -> Option<Value> {
        let mut current = Some(self);
        while let Some(class) = current {
            if let Some(value) = class.own_static(name) {
                return Some(value);
            }
            current = class.parent();
        }
        None
    }

    /// Names of own static members, in definition order
    pub fn static_names(&self) -> Vec<String> {
        self.inner.statics.read().keys().cloned().collect()
    }

    pub(crate) fn own_statics(&self) -> Vec<(String, Value)> {
        self.inner
            .statics
            .read()
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Call static `name` with `this` bound to this class
    pub fn call_static(&self, name: &str, args: &[Value]) -> MetaResult<Value> {
        self.call_static_as(self, name, args)
    }

    /// Resolve static `name` starting at this class and call it with `this`
    /// bound to `this`.
    ///
    /// An overriding applier uses this on its parent to defer to the
    /// inherited implementation.
    pub fn call_static_as(&self, this: &Class, name: &str, args: &[Value]) -> MetaResult<Value> {
        match self.get_static(name) {
            Some(Value::Static(method)) => method.call(this, args),
            Some(other) => Err(MetaError::NotCallable {
                class: self.name().to_string(),
                name: name.to_string(),
                found: other.type_name(),
            }),
            None => Err(MetaError::MethodNotFound {
                class: self.name().to_string(),
                name: name.to_string(),
            }),
        }
    }

    // Mixins

    /// Apply mixin entries (a class, or a list of classes and `[id, class]`
    /// pairs) ahead of completion
    pub fn apply_mixins(&self, entries: impl Into<Value>) -> MetaResult<()> {
        MixinComposer::apply(self, &entries.into())
    }

    /// Mixins by id, inherited bindings included. A subclass binding
    /// shadows an ancestor's under the same id.
    pub fn mixins(&self) -> IndexMap<String, Class> {
        let mut mixins = IndexMap::new();
        for class in self.lineage() {
            mixins.extend(class.meta().mixins());
        }
        mixins
    }

    /// Mixin bound under `id` on this class or its nearest ancestor
    pub fn mixin(&self, id: &str) -> Option<Class> {
        let mut current = Some(self);
        while let Some(class) = current {
            if let Some(mixin) = class.meta().mixin(id) {
                return Some(mixin);
            }
            current = class.parent();
        }
        None
    }

    // Instances

    /// Create an instance, completing the class first if needed
    pub fn instantiate(&self, config: impl Into<Value>) -> MetaResult<Instance> {
        self.complete()?;
        self.meta().record_instance();
        Instance::construct(self.clone(), &config.into())
    }

    /// Create an instance without a config
    pub fn new_instance(&self) -> MetaResult<Instance> {
        self.instantiate(Value::Null)
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Class {}

impl Hash for Class {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish()
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let a = Class::adopt("A");
        let b = Class::adopt("A");
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert!(a.parent().is_none());
    }

    #[test]
    fn test_lineage() {
        let root = Class::adopt("Root");
        let mid = root.extend("Mid");
        let leaf = mid.extend("Leaf");

        let names: Vec<String> = leaf.lineage().iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, vec!["Root", "Mid", "Leaf"]);
        assert!(leaf.is_subclass_of(&root));
        assert!(!root.is_subclass_of(&leaf));
    }

    #[test]
    fn test_member_lookup_walks_parents() {
        let root = Class::adopt("Root");
        root.set_static("answer", 42).set_prototype("greeting", "hi");
        let leaf = root.extend("Leaf");

        assert_eq!(leaf.get_static("answer"), Some(Value::Int(42)));
        assert_eq!(leaf.own_static("answer"), None);
        assert_eq!(leaf.get_prototype("greeting"), Some(Value::from("hi")));
        assert!(!leaf.has_own_prototype("greeting"));

        leaf.set_static("answer", 7);
        assert_eq!(leaf.get_static("answer"), Some(Value::Int(7)));
        assert_eq!(root.get_static("answer"), Some(Value::Int(42)));
    }

    #[test]
    fn test_call_static_as_binds_this() {
        let root = Class::adopt("Root");
        root.define_static("whoami", |this, _| Ok(Value::from(this.name())));
        let leaf = root.extend("Leaf");

        assert_eq!(leaf.call_static("whoami", &[]).unwrap(), Value::from("Leaf"));
        assert_eq!(root.call_static_as(&leaf, "whoami", &[]).unwrap(), Value::from("Leaf"));
        assert!(matches!(
            leaf.call_static("missing", &[]),
            Err(MetaError::MethodNotFound { .. })
        ));

        root.set_static("data", 1);
        assert!(matches!(
            leaf.call_static("data", &[]),
            Err(MetaError::NotCallable { found: "int", .. })
        ));
    }

    #[test]
    fn test_extend_shares_options() {
        let options = EngineOptions {
            strict_appliers: false,
            ..EngineOptions::default()
        };
        let root = Class::adopt_with("Root", options.clone());
        assert_eq!(root.extend("Leaf").options(), &options);
    }
}
