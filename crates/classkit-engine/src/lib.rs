//! Classkit class-composition engine
//!
//! Classes are declared at runtime and assembled by *processors*: named
//! units of class-definition behavior that run once, in dependency order,
//! when a class completes. On top of that the engine provides:
//! - **Chains**: lifecycle methods (`ctor`, `dtor`, or any declared name)
//!   where every class and mixin in the hierarchy contributes its own
//!   implementation (`chain` module)
//! - **Mixins**: member copying from independently defined classes without
//!   overriding the host (`mixin` module)
//! - **Config**: per-instance configuration properties with lazy and merge
//!   hints (`config` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use classkit_engine::{Class, Definition, Value};
//!
//! let logger = Class::base().extend("Logger");
//! logger.define(Definition::new().mixin_id("logger"))?;
//!
//! let widget = Class::base().extend("Widget");
//! widget.define(Definition::new().mixin(&logger).config("title", "untitled"))?;
//! widget.define_method("ctor", |this, _| {
//!     this.set("ready", true)?;
//!     Ok(Value::Null)
//! });
//!
//! let w = widget.instantiate(Value::map([("title", "Hello")]))?;
//! assert_eq!(w.get("title"), Some(Value::from("Hello")));
//! w.destroy()?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod builtins;
pub mod chain;
pub mod class;
pub mod config;
pub mod definition;
pub mod error;
pub mod function;
pub mod meta;
pub mod mixin;
pub mod object;
pub mod options;
pub mod processor;
pub mod registry;
pub mod value;

pub use chain::{ChainInvoker, ChainLink, ChainSpec};
pub use class::{Class, ClassId};
pub use config::{ConfigSpec, ConfigTable};
pub use definition::Definition;
pub use error::{MetaError, MetaResult};
pub use function::{Method, StaticMethod};
pub use meta::ClassMeta;
pub use mixin::{MixinComposer, MixinRecord};
pub use object::Instance;
pub use options::{EngineOptions, MixinIdPolicy};
pub use processor::{ProcessorRegistry, ProcessorSpec};
pub use registry::ClassRegistry;
pub use value::{Value, ValueMap};
