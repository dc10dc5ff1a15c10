//! The `Base` root class and its built-in processors
//!
//! `Base` declares the `ctor`/`dtor` chains, the six built-in processors in
//! the order `properties → prototype → static → chains → mixins → config`,
//! and the instance lifecycle flags. Every applier is a static on `Base`, so
//! subclasses may override one and defer to it with `call_static_as`.

use once_cell::sync::Lazy;

use crate::chain::{CTOR, DTOR};
use crate::class::Class;
use crate::config::ConfigSpec;
use crate::definition::{Definition, CHAINS, CONFIG, MIXINS, PROPERTIES, PROTOTYPE, STATIC};
use crate::error::{MetaError, MetaResult};
use crate::mixin::MixinComposer;
use crate::object::flags;
use crate::options::EngineOptions;
use crate::value::{Value, ValueMap};

static BASE: Lazy<Class> = Lazy::new(|| build_base(EngineOptions::default()));

/// Name of the root class
pub const BASE_NAME: &str = "Base";

/// Static flag present on every class derived from `Base`
pub const IS_CLASS: &str = "isClass";

pub(crate) fn base() -> Class {
    BASE.clone()
}

pub(crate) fn build_base(options: EngineOptions) -> Class {
    let base = Class::adopt_with(BASE_NAME, options);

    base.set_static(IS_CLASS, true)
        .define_static("applyProperties", apply_properties)
        .define_static("applyPrototype", apply_prototype)
        .define_static("applyStatic", apply_static)
        .define_static("applyChains", apply_chains)
        .define_static("applyMixins", apply_mixins)
        .define_static("applyConfig", apply_config);

    base.meta().seed(
        Definition::new()
            .chains([CTOR, DTOR])
            .processors(Value::map([
                (PROPERTIES, Value::Null),
                (PROTOTYPE, Value::from(PROPERTIES)),
                (STATIC, Value::from(PROTOTYPE)),
                (CHAINS, Value::from(STATIC)),
                (MIXINS, Value::from(CHAINS)),
                (CONFIG, Value::from(MIXINS)),
            ]))
            .property(flags::IS_INSTANCE, true, false)
            .property(flags::CONFIGURING, false, true)
            .property(flags::CONSTRUCTING, true, true)
            .property(flags::DESTROYING, false, true)
            .property(flags::DESTROYED, false, true),
    );

    base
}

fn declared<'a>(this: &Class, key: &str, args: &'a [Value]) -> MetaResult<&'a ValueMap> {
    match args.first() {
        Some(Value::Map(map)) => Ok(map),
        other => Err(MetaError::InvalidDeclaration {
            class: this.name().to_string(),
            key: key.to_string(),
            reason: format!(
                "expected a map, got {}",
                other.map_or("nothing", Value::type_name)
            ),
        }),
    }
}

fn apply_properties(this: &Class, args: &[Value]) -> MetaResult<Value> {
    for (name, descriptor) in declared(this, PROPERTIES, args)? {
        let Value::Map(descriptor) = descriptor else {
            return Err(MetaError::InvalidDeclaration {
                class: this.name().to_string(),
                key: PROPERTIES.to_string(),
                reason: format!("descriptor for {} must be a map", name),
            });
        };
        let value = descriptor.get("value").cloned().unwrap_or_default();
        let writable = descriptor
            .get("writable")
            .map(Value::is_truthy)
            .unwrap_or(false);
        this.set_property(name, value, writable);
    }
    Ok(Value::Null)
}

fn apply_prototype(this: &Class, args: &[Value]) -> MetaResult<Value> {
    for (name, value) in declared(this, PROTOTYPE, args)? {
        this.set_prototype(name, value.clone());
    }
    Ok(Value::Null)
}

fn apply_static(this: &Class, args: &[Value]) -> MetaResult<Value> {
    for (name, value) in declared(this, STATIC, args)? {
        this.set_static(name, value.clone());
    }
    Ok(Value::Null)
}

fn apply_chains(this: &Class, args: &[Value]) -> MetaResult<Value> {
    match args.first() {
        Some(Value::Str(name)) => this.meta().register_chain(name),
        Some(Value::List(names)) => {
            for name in names {
                let Some(name) = name.as_str() else {
                    return Err(MetaError::InvalidDeclaration {
                        class: this.name().to_string(),
                        key: CHAINS.to_string(),
                        reason: format!("chain names must be strings, got {}", name.type_name()),
                    });
                };
                this.meta().register_chain(name);
            }
        }
        other => {
            return Err(MetaError::InvalidDeclaration {
                class: this.name().to_string(),
                key: CHAINS.to_string(),
                reason: format!(
                    "expected a name or list of names, got {}",
                    other.map_or("nothing", Value::type_name)
                ),
            })
        }
    }
    Ok(Value::Null)
}

fn apply_mixins(this: &Class, args: &[Value]) -> MetaResult<Value> {
    MixinComposer::apply(this, args.first().unwrap_or(&Value::Null))?;
    Ok(Value::Null)
}

fn apply_config(this: &Class, args: &[Value]) -> MetaResult<Value> {
    for (name, value) in declared(this, CONFIG, args)? {
        this.meta().register_config(name, ConfigSpec::from(value.clone()));
    }
    Ok(Value::Null)
}
