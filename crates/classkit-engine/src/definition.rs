//! Class declaration fragments
//!
//! A [`Definition`] is the already-decoded options object handed to
//! `Class::define`. Keys are processor names; the engine recognises
//! `processors`, `chains`, `mixins`, `mixinId`, `properties`, `prototype`,
//! `static` and `config`, and any other key is routed to the custom processor
//! of the same name. Fragments can be layered: merging two definitions
//! combines maps key-wise and appends chain and mixin lists.

use indexmap::IndexMap;

use crate::class::Class;
use crate::error::{MetaError, MetaResult};
use crate::mixin::is_pair;
use crate::registry::ClassRegistry;
use crate::value::{Value, ValueMap};

/// Processor ordering declarations
pub const PROCESSORS: &str = "processors";
/// Chain names
pub const CHAINS: &str = "chains";
/// Mixin entries
pub const MIXINS: &str = "mixins";
/// Id under which the class is addressable when mixed in
pub const MIXIN_ID: &str = "mixinId";
/// Prototype property descriptors
pub const PROPERTIES: &str = "properties";
/// Prototype members
pub const PROTOTYPE: &str = "prototype";
/// Static members
pub const STATIC: &str = "static";
/// Configuration properties
pub const CONFIG: &str = "config";

/// A declaration fragment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Definition {
    entries: IndexMap<String, Value>,
}

impl Definition {
    /// Create an empty definition
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `key`, merging with anything already declared under it
    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.merge_entry(key.to_string(), value.into());
        self
    }

    /// Declare processors (a name, a list of names, or an ordering map)
    pub fn processors(self, declaration: impl Into<Value>) -> Self {
        self.set(PROCESSORS, declaration)
    }

    /// Declare chain names
    pub fn chains<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<Value> = names.into_iter().map(|s| Value::Str(s.into())).collect();
        self.set(CHAINS, Value::List(names))
    }

    /// Mix in `class` under its own declared id
    pub fn mixin(self, class: &Class) -> Self {
        self.set(MIXINS, Value::List(vec![Value::Class(class.clone())]))
    }

    /// Mix in `class` under `id`, overriding its declared id
    pub fn mixin_as(self, id: &str, class: &Class) -> Self {
        let pair = Value::List(vec![Value::from(id), Value::Class(class.clone())]);
        self.set(MIXINS, Value::List(vec![pair]))
    }

    /// Declare the id this class is addressable by when mixed in
    pub fn mixin_id(self, id: &str) -> Self {
        self.set(MIXIN_ID, id)
    }

    /// Declare a prototype property with an explicit writability
    pub fn property(self, name: &str, value: impl Into<Value>, writable: bool) -> Self {
        let descriptor = Value::map([("value", value.into()), ("writable", Value::Bool(writable))]);
        self.set(PROPERTIES, Value::map([(name, descriptor)]))
    }

    /// Declare a prototype member
    pub fn prototype(self, name: &str, value: impl Into<Value>) -> Self {
        self.set(PROTOTYPE, Value::map([(name, value.into())]))
    }

    /// Declare a static member
    pub fn statics(self, name: &str, value: impl Into<Value>) -> Self {
        self.set(STATIC, Value::map([(name, value.into())]))
    }

    /// Declare a configuration property (a plain default or a `ConfigSpec`)
    pub fn config(self, name: &str, spec: impl Into<Value>) -> Self {
        self.set(CONFIG, Value::map([(name, spec.into())]))
    }

    /// Raw declared value for `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Whether `key` is declared
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Declared keys in declaration order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Check if nothing is declared
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove and return the value declared under `key`
    pub fn take(&mut self, key: &str) -> Option<Value> {
        self.entries.shift_remove(key)
    }

    /// Layer `other` over this definition
    pub fn merge(&mut self, other: Definition) {
        for (key, value) in other.entries {
            self.merge_entry(key, value);
        }
    }

    fn merge_entry(&mut self, key: String, value: Value) {
        let value = match (self.entries.get_mut(&key), normalize(&key, value)) {
            (Some(Value::Map(existing)), Value::Map(incoming)) => {
                existing.extend(incoming);
                return;
            }
            (Some(Value::List(existing)), Value::List(incoming)) => {
                existing.extend(incoming);
                return;
            }
            (_, value) => value,
        };
        self.entries.insert(key, value);
    }

    /// Build a definition from a JSON object
    pub fn from_json(json: serde_json::Value) -> MetaResult<Self> {
        Self::from_json_with(json, &ClassRegistry::new())
    }

    /// Build a definition from a JSON object, resolving class names in
    /// `mixins` entries (`"Name"` or `["id", "Name"]`) through `registry`
    pub fn from_json_with(json: serde_json::Value, registry: &ClassRegistry) -> MetaResult<Self> {
        let Value::Map(entries) = Value::from(json) else {
            return Err(MetaError::InvalidDeclaration {
                class: "<json>".to_string(),
                key: String::new(),
                reason: "a definition must be a JSON object".to_string(),
            });
        };

        let mut definition = Definition::new();
        for (key, value) in entries {
            let value = if key == MIXINS {
                resolve_mixin_names(value, registry)?
            } else {
                value
            };
            definition.merge_entry(key, value);
        }
        Ok(definition)
    }
}

impl FromIterator<(String, Value)> for Definition {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        let mut definition = Definition::new();
        for (key, value) in iter {
            definition.merge_entry(key, value);
        }
        definition
    }
}

/// Bring list-or-scalar declarations into the shape merging expects
fn normalize(key: &str, value: Value) -> Value {
    match (key, value) {
        (PROCESSORS, Value::Str(name)) => Value::map([(name, Value::Null)]),
        (PROCESSORS, Value::List(names)) if names.iter().all(|n| n.as_str().is_some()) => {
            let map: ValueMap = names
                .into_iter()
                .filter_map(|n| match n {
                    Value::Str(s) => Some((s, Value::Null)),
                    _ => None,
                })
                .collect();
            Value::Map(map)
        }
        (CHAINS, Value::Str(name)) => Value::List(vec![Value::Str(name)]),
        (MIXINS, class @ Value::Class(_)) => Value::List(vec![class]),
        (MIXINS, Value::List(pair)) if is_pair(&pair) => Value::List(vec![Value::List(pair)]),
        (_, value) => value,
    }
}

fn resolve_mixin_names(value: Value, registry: &ClassRegistry) -> MetaResult<Value> {
    let lookup = |name: &str| {
        registry
            .get_class_by_name(name)
            .map(Value::Class)
            .ok_or_else(|| MetaError::InvalidDeclaration {
                class: "<json>".to_string(),
                key: MIXINS.to_string(),
                reason: format!("unknown mixin class \"{}\"", name),
            })
    };

    let entries = match value {
        Value::List(entries) => entries,
        single => vec![single],
    };

    entries
        .into_iter()
        .map(|entry| match entry {
            Value::Str(name) => lookup(&name),
            Value::List(pair) => match pair.as_slice() {
                [id @ Value::Str(_), Value::Str(name)] => {
                    Ok(Value::List(vec![id.clone(), lookup(name)?]))
                }
                _ => Ok(Value::List(pair)),
            },
            other => Ok(other),
        })
        .collect::<MetaResult<Vec<Value>>>()
        .map(Value::List)
}
