//! Instances
//!
//! An [`Instance`] holds its own properties and a handle to its class. Reads
//! fall back to the class's prototype chain; writes land on the instance
//! unless the resolved prototype slot is read-only.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::chain::{ChainInvoker, CTOR, DTOR};
use crate::class::Class;
use crate::config;
use crate::error::{MetaError, MetaResult};
use crate::function::Method;
use crate::meta::ClassMeta;
use crate::value::Value;

/// Global counter for generating unique object IDs
static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Generate a new unique object ID
fn generate_object_id() -> u64 {
    NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Lifecycle flag names
pub mod flags {
    /// Always true on instances, read-only
    pub const IS_INSTANCE: &str = "isInstance";
    /// True while the initial config pass runs
    pub const CONFIGURING: &str = "configuring";
    /// True until the ctor chain has run
    pub const CONSTRUCTING: &str = "constructing";
    /// True once `destroy` has started
    pub const DESTROYING: &str = "destroying";
    /// True once the dtor chain has finished
    pub const DESTROYED: &str = "destroyed";
}

/// An object created from a completed class
pub struct Instance {
    object_id: u64,
    class: Class,
    props: RwLock<FxHashMap<String, Value>>,
    /// Lazy config values not yet read
    deferred: Mutex<FxHashMap<String, Value>>,
}

impl Instance {
    fn new(class: Class) -> Self {
        Self {
            object_id: generate_object_id(),
            class,
            props: RwLock::new(FxHashMap::default()),
            deferred: Mutex::new(FxHashMap::default()),
        }
    }

    /// Configure and run the ctor chain. `class` must be completed.
    pub(crate) fn construct(class: Class, config: &Value) -> MetaResult<Self> {
        let instance = Self::new(class);
        instance.set_flag(flags::CONSTRUCTING, true);

        let meta = instance.class.meta();
        if !config.is_null() || meta.has_configs() {
            instance.set_flag(flags::CONFIGURING, true);
            config::configure(&instance, Some(config))?;
            instance.set_flag(flags::CONFIGURING, false);
        }

        if meta.is_live(CTOR) {
            ChainInvoker::invoke(&instance, CTOR, &[], false)?;
        }

        instance.set_flag(flags::CONSTRUCTING, false);
        Ok(instance)
    }

    /// Unique object id
    pub fn object_id(&self) -> u64 {
        self.object_id
    }

    /// Class of the instance
    pub fn class(&self) -> &Class {
        &self.class
    }

    /// Metadata of the instance's class
    pub fn meta(&self) -> &ClassMeta {
        self.class.meta()
    }

    /// Read a property: own value, then pending lazy config, then prototype
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.props.read().get(name) {
            return Some(value.clone());
        }

        let deferred = self.deferred.lock().remove(name);
        if let Some(value) = deferred {
            self.props.write().insert(name.to_string(), value.clone());
            return Some(value);
        }

        self.class.get_prototype(name)
    }

    /// Whether the instance itself holds `name`
    pub fn has_own(&self, name: &str) -> bool {
        self.props.read().contains_key(name) || self.deferred.lock().contains_key(name)
    }

    /// Write an own property
    pub fn set(&self, name: &str, value: impl Into<Value>) -> MetaResult<()> {
        let value = value.into();

        if !self.props.read().contains_key(name) {
            if let Some((owner, slot)) = self.class.lookup_slot(name) {
                if !slot.writable {
                    return Err(MetaError::ReadOnlyProperty {
                        class: owner.name().to_string(),
                        name: name.to_string(),
                    });
                }
            }
        }

        self.deferred.lock().remove(name);
        self.props.write().insert(name.to_string(), value);
        Ok(())
    }

    pub(crate) fn defer(&self, name: &str, value: Value) {
        self.deferred.lock().insert(name.to_string(), value);
    }

    fn set_flag(&self, name: &str, value: bool) {
        self.props.write().insert(name.to_string(), Value::Bool(value));
    }

    fn flag(&self, name: &str) -> bool {
        self.get(name).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    /// Call method `name` bound to this instance
    pub fn call(&self, name: &str, args: &[Value]) -> MetaResult<Value> {
        match self.get(name) {
            Some(Value::Method(method)) => method.call(self, args),
            Some(other) => Err(MetaError::NotCallable {
                class: self.class.name().to_string(),
                name: name.to_string(),
                found: other.type_name(),
            }),
            None => Err(MetaError::MethodNotFound {
                class: self.class.name().to_string(),
                name: name.to_string(),
            }),
        }
    }

    /// Call every implementation of chain `name`, ancestors first
    pub fn call_chain(&self, name: &str, args: &[Value]) -> MetaResult<()> {
        ChainInvoker::invoke(self, name, args, false)
    }

    /// Call every implementation of chain `name`, most derived first
    pub fn call_chain_rev(&self, name: &str, args: &[Value]) -> MetaResult<()> {
        ChainInvoker::invoke(self, name, args, true)
    }

    /// Call the implementation of `name` inherited by `from`, i.e. the one
    /// found starting at `from`'s superclass
    pub fn call_super(&self, from: &Class, name: &str, args: &[Value]) -> MetaResult<Value> {
        match super_method(from, name) {
            Some(method) => method.call(self, args),
            None => Err(MetaError::MethodNotFound {
                class: from.parent().unwrap_or(from).name().to_string(),
                name: name.to_string(),
            }),
        }
    }

    /// Body of a junction method defined on `from`: call the superclass
    /// implementation, then each mixin's, and return the superclass result
    pub fn call_junction(&self, from: &Class, name: &str, args: &[Value]) -> MetaResult<Value> {
        let mut called: Vec<Method> = Vec::new();

        let result = match super_method(from, name) {
            Some(method) => {
                let result = method.call(self, args)?;
                called.push(method);
                result
            }
            None => Value::Null,
        };

        for record in from.meta().mixin_records() {
            let Some(Value::Method(method)) = record.source.get_prototype(name) else {
                continue;
            };
            if called.iter().any(|m| m.same(&method)) {
                continue;
            }
            method.call(self, args)?;
            called.push(method);
        }

        Ok(result)
    }

    /// Mixins of the instance's class by id, inherited bindings included
    pub fn mixins(&self) -> IndexMap<String, Class> {
        self.class.mixins()
    }

    /// Mixin bound under `id`
    pub fn mixin(&self, id: &str) -> Option<Class> {
        self.class.mixin(id)
    }

    /// Call mixin `id`'s implementation of `name` bound to this instance
    pub fn call_mixin(&self, id: &str, name: &str, args: &[Value]) -> MetaResult<Value> {
        let mixin = self.mixin(id).ok_or_else(|| MetaError::MethodNotFound {
            class: self.class.name().to_string(),
            name: format!("mixins.{}", id),
        })?;

        match mixin.get_prototype(name) {
            Some(Value::Method(method)) => method.call(self, args),
            Some(other) => Err(MetaError::NotCallable {
                class: mixin.name().to_string(),
                name: name.to_string(),
                found: other.type_name(),
            }),
            None => Err(MetaError::MethodNotFound {
                class: mixin.name().to_string(),
                name: name.to_string(),
            }),
        }
    }

    /// Apply `config` to the live instance, merging with current values
    pub fn reconfigure(&self, config: impl Into<Value>) -> MetaResult<()> {
        let config = config.into();
        self.set_flag(flags::CONFIGURING, true);
        let result = config::reconfigure(self, &config);
        self.set_flag(flags::CONFIGURING, false);
        result
    }

    /// Run the dtor chain, most derived first. Later calls do nothing.
    pub fn destroy(&self) -> MetaResult<()> {
        if self.flag(flags::DESTROYING) || self.flag(flags::DESTROYED) {
            return Ok(());
        }
        self.set_flag(flags::DESTROYING, true);

        if self.meta().is_live(DTOR) {
            ChainInvoker::invoke(self, DTOR, &[], true)?;
        }

        self.set_flag(flags::DESTROYED, true);
        Ok(())
    }

    /// Whether the prototype marks this object as an instance
    pub fn is_instance(&self) -> bool {
        self.flag(flags::IS_INSTANCE)
    }

    /// Whether the initial config pass is running
    pub fn is_configuring(&self) -> bool {
        self.flag(flags::CONFIGURING)
    }

    /// Whether construction is still in progress
    pub fn is_constructing(&self) -> bool {
        self.flag(flags::CONSTRUCTING)
    }

    /// Whether `destroy` has started
    pub fn is_destroying(&self) -> bool {
        self.flag(flags::DESTROYING)
    }

    /// Whether `destroy` has finished
    pub fn is_destroyed(&self) -> bool {
        self.flag(flags::DESTROYED)
    }
}

fn super_method(from: &Class, name: &str) -> Option<Method> {
    match from.parent()?.get_prototype(name) {
        Some(Value::Method(method)) => Some(method),
        _ => None,
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("object_id", &self.object_id)
            .field("class", &self.class.name())
            .finish()
    }
}
