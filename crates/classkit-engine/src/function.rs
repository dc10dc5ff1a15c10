//! Callable class members
//!
//! Instance methods receive the instance they are bound to; static methods
//! receive the class they were invoked on (`this` for statics), which is how
//! an applier defined on a base class mutates whichever subclass is being
//! completed.

use std::fmt;
use std::sync::Arc;

use crate::class::Class;
use crate::error::MetaResult;
use crate::object::Instance;
use crate::value::Value;

/// Instance method handler
pub type MethodFn = Arc<dyn Fn(&Instance, &[Value]) -> MetaResult<Value> + Send + Sync>;

/// Static method handler
pub type StaticFn = Arc<dyn Fn(&Class, &[Value]) -> MetaResult<Value> + Send + Sync>;

/// An instance method.
///
/// Cloning shares the handler; two clones are the [`same`](Method::same)
/// method, which is how mixin copies stay identical to their source.
#[derive(Clone)]
pub struct Method {
    name: Arc<str>,
    func: MethodFn,
    junction: bool,
}

impl Method {
    /// Create a plain method
    pub fn new(
        name: &str,
        func: impl Fn(&Instance, &[Value]) -> MetaResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: Arc::from(name),
            func: Arc::new(func),
            junction: false,
        }
    }

    /// Create a junction method: it never joins a chain and is expected to
    /// call the implementations of its ancestors and mixins itself
    pub fn junction(
        name: &str,
        func: impl Fn(&Instance, &[Value]) -> MetaResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            junction: true,
            ..Self::new(name, func)
        }
    }

    /// Method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this method is a junction
    pub fn is_junction(&self) -> bool {
        self.junction
    }

    /// Invoke bound to `this`
    pub fn call(&self, this: &Instance, args: &[Value]) -> MetaResult<Value> {
        (self.func)(this, args)
    }

    /// Identity comparison
    pub fn same(&self, other: &Method) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("junction", &self.junction)
            .finish()
    }
}

/// A static (class-level) method
#[derive(Clone)]
pub struct StaticMethod {
    name: Arc<str>,
    func: StaticFn,
}

impl StaticMethod {
    /// Create a static method
    pub fn new(
        name: &str,
        func: impl Fn(&Class, &[Value]) -> MetaResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: Arc::from(name),
            func: Arc::new(func),
        }
    }

    /// Method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke with `this` bound to `class`
    pub fn call(&self, class: &Class, args: &[Value]) -> MetaResult<Value> {
        (self.func)(class, args)
    }

    /// Identity comparison
    pub fn same(&self, other: &StaticMethod) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for StaticMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticMethod")
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_is_same_method() {
        let m = Method::new("foo", |_, _| Ok(Value::Null));
        let copy = m.clone();
        assert!(m.same(&copy));

        let other = Method::new("foo", |_, _| Ok(Value::Null));
        assert!(!m.same(&other));
    }

    #[test]
    fn test_junction_flag() {
        assert!(!Method::new("foo", |_, _| Ok(Value::Null)).is_junction());
        assert!(Method::junction("foo", |_, _| Ok(Value::Null)).is_junction());
    }
}
