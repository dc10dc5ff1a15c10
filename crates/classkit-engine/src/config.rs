//! Per-instance configuration properties
//!
//! Classes declare configuration properties under `config`. At construction
//! the provided config map is folded over the declared defaults; lazy
//! properties are only materialised the first time they are read, and a merge
//! hook decides how an incoming value combines with the current one.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{MetaError, MetaResult};
use crate::object::Instance;
use crate::value::Value;

/// Merge hook: `(incoming, current) -> stored`
pub type MergeFn = Arc<dyn Fn(&Value, Option<&Value>) -> MetaResult<Value> + Send + Sync>;

/// A declared configuration property
#[derive(Clone)]
pub struct ConfigSpec {
    inner: Arc<ConfigInner>,
}

struct ConfigInner {
    default: Value,
    lazy: bool,
    merge: Option<MergeFn>,
}

impl ConfigSpec {
    /// Declare a property with a default value
    pub fn new(default: impl Into<Value>) -> Self {
        Self {
            inner: Arc::new(ConfigInner {
                default: default.into(),
                lazy: false,
                merge: None,
            }),
        }
    }

    /// Defer initialisation of the default until first read
    pub fn lazy(self) -> Self {
        self.rebuild(|inner| inner.lazy = true)
    }

    /// Combine incoming values with the current one through `merge`
    pub fn merge(
        self,
        merge: impl Fn(&Value, Option<&Value>) -> MetaResult<Value> + Send + Sync + 'static,
    ) -> Self {
        let merge: MergeFn = Arc::new(merge);
        self.rebuild(move |inner| inner.merge = Some(merge))
    }

    fn rebuild(self, edit: impl FnOnce(&mut ConfigInner)) -> Self {
        let mut inner = ConfigInner {
            default: self.inner.default.clone(),
            lazy: self.inner.lazy,
            merge: self.inner.merge.clone(),
        };
        edit(&mut inner);
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Declared default
    pub fn default_value(&self) -> &Value {
        &self.inner.default
    }

    /// Whether the property initialises lazily
    pub fn is_lazy(&self) -> bool {
        self.inner.lazy
    }

    /// Value to store when `incoming` is assigned over `current`
    pub fn resolve(&self, incoming: &Value, current: Option<&Value>) -> MetaResult<Value> {
        match &self.inner.merge {
            Some(merge) => merge(incoming, current),
            None => Ok(incoming.clone()),
        }
    }

    /// Identity comparison
    pub fn same(&self, other: &ConfigSpec) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ConfigSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigSpec")
            .field("default", &self.inner.default)
            .field("lazy", &self.inner.lazy)
            .field("merge", &self.inner.merge.is_some())
            .finish()
    }
}

impl From<Value> for ConfigSpec {
    fn from(value: Value) -> Self {
        match value {
            Value::Config(spec) => spec,
            other => ConfigSpec::new(other),
        }
    }
}

/// Declared configs of a class, in declaration order
pub type ConfigTable = IndexMap<String, ConfigSpec>;

/// Initial configuration pass, run once while an instance is constructed
pub(crate) fn configure(instance: &Instance, config: Option<&Value>) -> MetaResult<()> {
    let specs = instance.class().meta().configs();
    let provided = provided_map(instance, config)?;

    for (name, spec) in &specs {
        match provided.and_then(|p| p.get(name)) {
            Some(incoming) => {
                let value = spec.resolve(incoming, Some(spec.default_value()))?;
                instance.set(name, value)?;
            }
            None if spec.is_lazy() => instance.defer(name, spec.default_value().clone()),
            None => instance.set(name, spec.default_value().clone())?,
        }
    }

    if let Some(provided) = provided {
        for (name, value) in provided {
            if !specs.contains_key(name) {
                instance.set(name, value.clone())?;
            }
        }
    }

    Ok(())
}

/// Apply `config` to a live instance, merging with current values
pub(crate) fn reconfigure(instance: &Instance, config: &Value) -> MetaResult<()> {
    let specs = instance.class().meta().configs();
    let Some(provided) = provided_map(instance, Some(config))? else {
        return Ok(());
    };

    for (name, incoming) in provided {
        let value = match specs.get(name) {
            Some(spec) => {
                let current = instance.get(name);
                spec.resolve(incoming, current.as_ref())?
            }
            None => incoming.clone(),
        };
        instance.set(name, value)?;
    }

    Ok(())
}

fn provided_map<'a>(
    instance: &Instance,
    config: Option<&'a Value>,
) -> MetaResult<Option<&'a IndexMap<String, Value>>> {
    match config {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Map(map)) => Ok(Some(map)),
        Some(other) => Err(MetaError::TypeError(format!(
            "config for {} must be a map, got {}",
            instance.class().name(),
            other.type_name()
        ))),
    }
}
