//! Shared fixtures for the integration tests
#![allow(dead_code)]

use std::sync::Arc;

use classkit_engine::{Class, Definition, Instance, MetaResult, Value};
use parking_lot::Mutex;

/// Ordered record of calls made by test methods
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock())
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

/// Append `suffix` to the instance's `str` property
pub fn append_str(this: &Instance, suffix: &str) -> MetaResult<()> {
    let current = this
        .get("str")
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    this.set("str", current + suffix)
}

pub fn str_of(instance: &Instance) -> String {
    instance
        .get("str")
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

/// Give `class` logging `ctor`, `dtor`, and (unless it is a junction class)
/// `foo` methods tagged with `tag`
pub fn lifecycle_methods(class: &Class, tag: &'static str, log: &Log) {
    let upper = tag.to_uppercase();

    let (l, u) = (log.clone(), upper.clone());
    class.define_method("ctor", move |this, _| {
        l.push(format!("{}.ctor", u));
        append_str(this, &u)?;
        Ok(Value::Null)
    });

    let (l, u) = (log.clone(), upper.clone());
    class.define_method("dtor", move |_, _| {
        l.push(format!("{}.dtor", u));
        Ok(Value::Null)
    });

    let (l, u) = (log.clone(), upper);
    class.define_method("foo", move |_, args| {
        let x = args.first().cloned().unwrap_or_default();
        l.push(format!("{}.foo={}", u, x));
        Ok(Value::from(format!("{}{}", tag, x)))
    });
}

/// `C extends Base`, mixin `M` (id `mixum`), and `D extends C` whose `foo`
/// is a junction
pub struct Fixture {
    pub log: Log,
    pub c: Class,
    pub m: Class,
    pub d: Class,
}

pub fn fixture() -> Fixture {
    let log = Log::default();

    let c = Class::base().extend("C");
    lifecycle_methods(&c, "c", &log);

    let m = Class::base().extend("M");
    m.define(Definition::new().mixin_id("mixum")).unwrap();
    lifecycle_methods(&m, "m", &log);

    let d = c.extend("D");
    lifecycle_methods(&d, "d", &log);
    let (l, from) = (log.clone(), d.clone());
    d.define_junction("foo", move |this, args| {
        let r = this.call_junction(&from, "foo", args)?;
        let x = args.first().cloned().unwrap_or_default();
        l.push(format!("D.foo={}", x));
        Ok(Value::from(format!("d{}", r)))
    });

    Fixture { log, c, m, d }
}
