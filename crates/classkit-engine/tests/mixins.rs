//! Mixin composition and its effect on chains

mod harness;

use classkit_engine::{
    Class, ClassRegistry, ConfigSpec, Definition, EngineOptions, MetaError, MixinIdPolicy, Value,
};
use harness::{fixture, str_of, Log};

#[test]
fn test_apply_mixins() {
    let f = fixture();
    f.d.apply_mixins(&f.m).unwrap();

    assert_eq!(f.d.mixins().get("mixum"), Some(&f.m));

    let instance = f.d.new_instance().unwrap();
    assert_eq!(str_of(&instance), "CMD");
    assert_eq!(f.log.take(), vec!["C.ctor", "M.ctor", "D.ctor"]);
    assert_eq!(instance.mixin("mixum"), Some(f.m.clone()));

    let res = instance.call("foo", &[Value::Int(42)]).unwrap();
    assert_eq!(res, Value::from("dc42"));
    assert_eq!(f.log.take(), vec!["C.foo=42", "M.foo=42", "D.foo=42"]);

    instance.destroy().unwrap();
    assert_eq!(f.log.take(), vec!["D.dtor", "M.dtor", "C.dtor"]);
}

#[test]
fn test_chain_methods_not_copied() {
    let f = fixture();
    let host = Class::base().extend("F");
    host.define(Definition::new().mixin(&f.m)).unwrap();

    let instance = host.new_instance().unwrap();
    assert!(!host.has_own_prototype("ctor"));
    assert!(!host.has_own_prototype("dtor"));
    assert_eq!(str_of(&instance), "M");
    assert_eq!(f.log.entries(), vec!["M.ctor"]);
    assert_eq!(instance.mixin("mixum"), Some(f.m.clone()));

    let live = host.meta().live_chains();
    assert_eq!(live.get("ctor"), Some(&true));
    assert_eq!(live.get("dtor"), Some(&true));
}

#[test]
fn test_call_mixin_directly() {
    let f = fixture();
    f.d.apply_mixins(&f.m).unwrap();
    let instance = f.d.new_instance().unwrap();
    f.log.take();

    let res = instance.call_mixin("mixum", "foo", &[Value::Int(7)]).unwrap();
    assert_eq!(res, Value::from("m7"));
    assert_eq!(f.log.entries(), vec!["M.foo=7"]);
    assert!(matches!(
        instance.call_mixin("nope", "foo", &[]),
        Err(MetaError::MethodNotFound { .. })
    ));
}

#[test]
fn test_reassign_mixin_id() {
    let m = Class::base().extend("M");
    m.define(Definition::new().mixin_id("moo")).unwrap();
    m.define_static("foo", |_, _| Ok(Value::Null));
    m.define_method("foo", |_, _| Ok(Value::Null));

    let d = Class::base().extend("D");
    d.define(Definition::new().mixin(&m)).unwrap();
    d.complete().unwrap();

    assert_eq!(d.own_static("foo"), m.own_static("foo"));
    assert_eq!(d.own_prototype("foo"), m.own_prototype("foo"));
    assert_eq!(d.mixin("moo"), Some(m.clone()));

    let e = Class::base().extend("E");
    e.define(Definition::new().mixin_as("goo", &m)).unwrap();
    e.complete().unwrap();

    assert_eq!(e.own_static("foo"), m.own_static("foo"));
    assert_eq!(e.own_prototype("foo"), m.own_prototype("foo"));
    assert!(e.mixin("moo").is_none());
    assert_eq!(e.mixin("goo"), Some(m));
}

#[test]
fn test_host_members_win() {
    let m = Class::base().extend("M");
    m.define(
        Definition::new()
            .prototype("color", "mixin")
            .statics("kind", "mixin"),
    )
    .unwrap();

    let host = Class::base().extend("Host");
    host.define(
        Definition::new()
            .prototype("color", "host")
            .statics("kind", "host")
            .mixin(&m),
    )
    .unwrap();
    host.complete().unwrap();

    assert_eq!(host.own_prototype("color"), Some(Value::from("host")));
    assert_eq!(host.own_static("kind"), Some(Value::from("host")));
}

#[test]
fn test_inherited_members_do_not_block_copy() {
    let parent = Class::base().extend("Parent");
    parent.set_prototype("greet", "parent");
    let m = Class::base().extend("M");
    m.set_prototype("greet", "mixin");

    let host = parent.extend("Host");
    host.apply_mixins(&m).unwrap();

    assert_eq!(host.get_prototype("greet"), Some(Value::from("mixin")));
}

#[test]
fn test_duplicate_mixin_id_rejected() {
    let a = Class::base().extend("A");
    let b = Class::base().extend("B");

    let host = Class::base().extend("Host");
    host.define(Definition::new().mixin_as("x", &a).mixin_as("x", &b))
        .unwrap();

    assert_eq!(
        host.complete(),
        Err(MetaError::DuplicateMixinId {
            host: "Host".to_string(),
            id: "x".to_string(),
            existing: "A".to_string(),
            incoming: "B".to_string(),
        })
    );
}

#[test]
fn test_duplicate_mixin_id_replaced() {
    let base = Class::base_with(EngineOptions {
        mixin_id_policy: MixinIdPolicy::Replace,
        ..EngineOptions::default()
    });
    let a = base.extend("A");
    let b = base.extend("B");

    let host = base.extend("Host");
    host.define(Definition::new().mixin_as("x", &a).mixin_as("x", &b))
        .unwrap();
    host.complete().unwrap();

    assert_eq!(host.mixin("x"), Some(b));
    assert_eq!(host.meta().mixin_records().len(), 2);
}

#[test]
fn test_reapply_same_mixin() {
    let f = fixture();
    let host = Class::base().extend("Host");
    host.define(Definition::new().mixin(&f.m).mixin(&f.m)).unwrap();
    host.apply_mixins(&f.m).unwrap();

    let instance = host.new_instance().unwrap();
    assert_eq!(f.log.entries(), vec!["M.ctor"]);
    assert_eq!(str_of(&instance), "M");
    assert_eq!(host.meta().mixin_records().len(), 1);
}

#[test]
fn test_apply_after_completion() {
    let m = Class::base().extend("M");
    let host = Class::base().extend("Host");
    host.complete().unwrap();

    assert_eq!(
        host.apply_mixins(&m),
        Err(MetaError::AlreadyCompleted("Host".to_string()))
    );
}

#[test]
fn test_mixin_configs_merged() {
    let m = Class::base().extend("Sized");
    m.define(
        Definition::new()
            .config("size", 3)
            .config("label", "m")
            .config("cache", ConfigSpec::new("warm").lazy()),
    )
    .unwrap();

    let host = Class::base().extend("Host");
    host.define(Definition::new().mixin(&m).config("label", "host"))
        .unwrap();

    let instance = host.new_instance().unwrap();
    assert_eq!(instance.get("size"), Some(Value::Int(3)));
    assert_eq!(instance.get("label"), Some(Value::from("host")));
    assert!(host.meta().configs()["cache"].is_lazy());
    assert_eq!(instance.get("cache"), Some(Value::from("warm")));
}

#[test]
fn test_mixin_chain_order_with_inheritance() {
    let f = fixture();
    let e = f.d.extend("E");
    let m2 = Class::base().extend("M2");
    harness::lifecycle_methods(&m2, "n", &f.log);
    e.define(Definition::new().mixin(&m2)).unwrap();
    f.d.apply_mixins(&f.m).unwrap();

    e.new_instance().unwrap();
    assert_eq!(f.log.entries(), vec!["C.ctor", "M.ctor", "D.ctor", "N.ctor"]);
}

#[test]
fn test_mixins_from_json() {
    let mut registry = ClassRegistry::new();
    let m = Class::base().extend("Helper");
    m.set_mixin_id("helper");
    registry.register_class(m.clone());

    let host = Class::base().extend("Host");
    let def =
        Definition::from_json_with(serde_json::json!({ "mixins": ["Helper"] }), &registry).unwrap();
    host.define(def).unwrap();
    host.complete().unwrap();

    assert_eq!(host.mixin("helper"), Some(m));
}

#[test]
fn test_bare_mixin_pair_declaration() {
    let f = fixture();
    f.d.define(
        Definition::new().set("mixins", Value::list([Value::from("customId"), Value::from(&f.m)])),
    )
    .unwrap();
    f.d.complete().unwrap();

    assert_eq!(f.d.mixin("customId"), Some(f.m.clone()));
    assert!(f.d.mixin("mixum").is_none());

    let instance = f.d.new_instance().unwrap();
    assert_eq!(str_of(&instance), "CMD");
}

#[test]
fn test_chain_declared_only_by_mixin() {
    let log = Log::default();
    let init = |class: &Class, log: &Log| {
        let (l, name) = (log.clone(), class.name().to_string());
        class.define_method("init", move |_, args| {
            l.push(format!("{}.init{:?}", name, args));
            Ok(Value::Null)
        });
    };

    let m = Class::base().extend("M");
    m.define(Definition::new().chains(["init"])).unwrap();
    init(&m, &log);

    let p = Class::base().extend("P");
    init(&p, &log);
    let h = p.extend("H");
    init(&h, &log);
    h.define(Definition::new().mixin(&m)).unwrap();

    let instance = h.new_instance().unwrap();
    assert_eq!(h.meta().live_chains().get("init"), Some(&true));
    assert!(!h.meta().mixin_records()[0].copied.contains("init"));

    instance.call_chain("init", &[Value::Int(1)]).unwrap();
    instance.call_chain_rev("init", &[Value::Int(2)]).unwrap();
    assert_eq!(
        log.entries(),
        vec!["P.init[1]", "M.init[1]", "H.init[1]", "H.init[2]", "M.init[2]", "P.init[2]"]
    );
}

#[test]
fn test_mixin_ids_are_inherited() {
    let f = fixture();
    f.d.apply_mixins(&f.m).unwrap();
    let e = f.d.extend("E");

    let instance = e.new_instance().unwrap();
    assert_eq!(instance.mixin("mixum"), Some(f.m.clone()));
    assert_eq!(e.mixins().keys().collect::<Vec<_>>(), vec!["mixum"]);
    assert!(e.meta().mixins().is_empty());

    // D's junction reaches its mixin from a subclass instance
    f.log.take();
    assert_eq!(instance.call("foo", &[Value::Int(42)]).unwrap(), Value::from("dc42"));
    assert_eq!(f.log.take(), vec!["C.foo=42", "M.foo=42", "D.foo=42"]);
    assert_eq!(
        instance.call_mixin("mixum", "foo", &[Value::Int(7)]).unwrap(),
        Value::from("m7")
    );
}

#[test]
fn test_inherited_mixin_id_is_taken() {
    let f = fixture();
    f.d.apply_mixins(&f.m).unwrap();
    let other = Class::base().extend("Other");

    let g = f.d.extend("G");
    g.define(Definition::new().mixin_as("mixum", &other)).unwrap();
    assert_eq!(
        g.complete(),
        Err(MetaError::DuplicateMixinId {
            host: "G".to_string(),
            id: "mixum".to_string(),
            existing: "M".to_string(),
            incoming: "Other".to_string(),
        })
    );
}

#[test]
fn test_subclass_cannot_be_mixed_in() {
    let host = Class::base().extend("Host");
    let sub = host.extend("Sub");
    host.define(Definition::new().mixin(&sub)).unwrap();

    assert!(matches!(
        host.complete(),
        Err(MetaError::InvalidDeclaration { .. })
    ));
    assert!(matches!(
        sub.complete(),
        Err(MetaError::ClassUnusable { .. })
    ));
}
