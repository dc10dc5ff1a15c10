//! Mixin composition
//!
//! Mixing class `M` into host `H` copies `M`'s own statics and prototype
//! members onto `H` (never overriding what `H` declares itself, never copying
//! chain methods), binds `M` under its effective id, and records `M` so chains
//! run its implementations between `H`'s superclass and `H`.

use indexmap::IndexSet;

use crate::class::Class;
use crate::config::ConfigSpec;
use crate::error::{MetaError, MetaResult};
use crate::options::MixinIdPolicy;
use crate::value::Value;

/// One applied mixin
#[derive(Debug, Clone)]
pub struct MixinRecord {
    /// Id the mixin is bound under, if any
    pub id: Option<String>,
    /// The mixin class (shared, never copied)
    pub source: Class,
    /// Names of members copied onto the host
    pub copied: IndexSet<String>,
    /// Chains the mixin implements
    pub chains: Vec<String>,
}

struct MixinEntry {
    id: Option<String>,
    class: Class,
}

/// Applies mixins to host classes
pub struct MixinComposer;

impl MixinComposer {
    /// Apply `entries` (a class, an `[id, class]` pair, or a list of
    /// either) to `host` in order
    pub fn apply(host: &Class, entries: &Value) -> MetaResult<()> {
        if host.meta().is_completed() {
            return Err(MetaError::AlreadyCompleted(host.name().to_string()));
        }

        for entry in decode(host, entries)? {
            Self::apply_one(host, entry)?;
        }
        Ok(())
    }

    fn apply_one(host: &Class, entry: MixinEntry) -> MetaResult<()> {
        let MixinEntry { id, class: mixin } = entry;

        if mixin == *host {
            return Err(invalid(host, format!("{} cannot mix in itself", host.name())));
        }
        // Completing a subclass completes the host first
        if mixin.is_subclass_of(host) {
            return Err(invalid(
                host,
                format!("{} cannot mix in its subclass {}", host.name(), mixin.name()),
            ));
        }

        mixin.complete()?;
        if let Some(parent) = host.parent() {
            parent.complete()?;
        }
        let id = id.or_else(|| mixin.meta().mixin_id());

        if let Some(id) = &id {
            Self::check_id(host, id, &mixin)?;
        }

        // Re-applying a mixin only binds a new id
        let applied = host
            .meta()
            .state()
            .mixin_records
            .iter()
            .any(|r| r.source == mixin);
        if applied {
            if let Some(id) = id {
                host.meta().state_mut().mixins.insert(id, mixin.clone());
            }
            tracing::trace!(host = host.name(), mixin = mixin.name(), "mixin already applied");
            return Ok(());
        }

        let mut skip = host.meta().known_chains();
        if let Some(parent) = host.parent() {
            skip.extend(parent.meta().chains());
        }
        let mixin_chains = mixin.meta().chains();
        skip.extend(mixin_chains.iter().cloned());

        let mut copied = IndexSet::new();

        for (name, value) in mixin.own_statics() {
            if skip.contains(&name) || host.has_own_static(&name) {
                continue;
            }
            host.set_static(&name, value);
            copied.insert(name);
        }

        for (name, slot) in mixin.own_slots() {
            if skip.contains(&name) || host.has_own_prototype(&name) {
                continue;
            }
            host.insert_slot(&name, slot);
            copied.insert(name);
        }

        let configs: Vec<(String, ConfigSpec)> = mixin.meta().configs().into_iter().collect();
        let chains: Vec<String> = mixin
            .meta()
            .live_chains()
            .into_iter()
            .filter_map(|(name, live)| live.then_some(name))
            .collect();

        tracing::debug!(
            host = host.name(),
            mixin = mixin.name(),
            id = id.as_deref().unwrap_or("<anonymous>"),
            copied = copied.len(),
            "mixin applied"
        );

        let mut state = host.meta().state_mut();
        // Chains only the mixin declares become chains of the host
        state.chains.extend(mixin_chains);
        for (name, spec) in configs {
            state.configs.entry(name).or_insert(spec);
        }
        if let Some(id) = &id {
            state.mixins.insert(id.clone(), mixin.clone());
        }
        state.mixin_records.push(MixinRecord {
            id,
            source: mixin,
            copied,
            chains,
        });

        Ok(())
    }

    fn check_id(host: &Class, id: &str, mixin: &Class) -> MetaResult<()> {
        let existing = host.mixin(id);
        match existing {
            Some(existing) if existing != *mixin => match host.options().mixin_id_policy {
                MixinIdPolicy::Reject => Err(MetaError::DuplicateMixinId {
                    host: host.name().to_string(),
                    id: id.to_string(),
                    existing: existing.name().to_string(),
                    incoming: mixin.name().to_string(),
                }),
                MixinIdPolicy::Replace => {
                    tracing::warn!(
                        host = host.name(),
                        id,
                        existing = existing.name(),
                        incoming = mixin.name(),
                        "replacing mixin id binding"
                    );
                    Ok(())
                }
            },
            _ => Ok(()),
        }
    }
}

fn decode(host: &Class, entries: &Value) -> MetaResult<Vec<MixinEntry>> {
    match entries {
        Value::Null => Ok(Vec::new()),
        Value::Class(class) => Ok(vec![MixinEntry {
            id: None,
            class: class.clone(),
        }]),
        Value::List(items) if is_pair(items) => Ok(vec![decode_entry(host, entries)?]),
        Value::List(items) => items.iter().map(|item| decode_entry(host, item)).collect(),
        other => Err(invalid(
            host,
            format!("expected a class or a list of mixins, got {}", other.type_name()),
        )),
    }
}

/// A bare `[id, class]` pair, as opposed to a list of entries
pub(crate) fn is_pair(items: &[Value]) -> bool {
    matches!(items, [Value::Str(_), Value::Class(_)])
}

fn decode_entry(host: &Class, entry: &Value) -> MetaResult<MixinEntry> {
    match entry {
        Value::Class(class) => Ok(MixinEntry {
            id: None,
            class: class.clone(),
        }),
        Value::List(pair) => match pair.as_slice() {
            [Value::Str(id), Value::Class(class)] => Ok(MixinEntry {
                id: Some(id.clone()),
                class: class.clone(),
            }),
            _ => Err(invalid(host, "a mixin pair must be [id, class]".to_string())),
        },
        other => Err(invalid(
            host,
            format!("expected a mixin class, got {}", other.type_name()),
        )),
    }
}

fn invalid(host: &Class, reason: String) -> MetaError {
    MetaError::InvalidDeclaration {
        class: host.name().to_string(),
        key: crate::definition::MIXINS.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Definition;

    #[test]
    fn test_copies_members_without_overriding_host() {
        let m = Class::base().extend("M");
        m.set_prototype("shared", "mixin").set_prototype("extra", 1);
        m.set_static("tag", "mixin");

        let h = Class::base().extend("H");
        h.set_prototype("shared", "host");
        h.apply_mixins(&m).unwrap();

        assert_eq!(h.own_prototype("shared"), Some(Value::from("host")));
        assert_eq!(h.own_prototype("extra"), Some(Value::Int(1)));
        assert_eq!(h.own_static("tag"), Some(Value::from("mixin")));

        let record = &h.meta().mixin_records()[0];
        assert!(record.id.is_none());
        assert_eq!(record.copied.iter().collect::<Vec<_>>(), vec!["tag", "extra"]);
    }

    #[test]
    fn test_chain_methods_are_not_copied() {
        let m = Class::base().extend("M");
        m.define_method("ctor", |_, _| Ok(Value::Null));
        m.define_method("dtor", |_, _| Ok(Value::Null));
        m.define_method("foo", |_, _| Ok(Value::Null));

        let h = Class::base().extend("H");
        h.apply_mixins(&m).unwrap();

        assert!(!h.has_own_prototype("ctor"));
        assert!(!h.has_own_prototype("dtor"));
        assert!(h.has_own_prototype("foo"));
        assert_eq!(h.meta().mixin_records()[0].chains, vec!["ctor", "dtor"]);
    }

    #[test]
    fn test_effective_id() {
        let m = Class::base().extend("M");
        m.define(Definition::new().mixin_id("moo")).unwrap();

        let h = Class::base().extend("H");
        h.apply_mixins(Value::list([Value::list([Value::from("goo"), Value::from(&m)])]))
            .unwrap();
        assert_eq!(h.mixin("goo"), Some(m.clone()));
        assert!(h.mixin("moo").is_none());

        let g = Class::base().extend("G");
        g.apply_mixins(&m).unwrap();
        assert_eq!(g.mixin("moo"), Some(m));
    }

    #[test]
    fn test_reapply_is_noop() {
        let m = Class::base().extend("M");
        m.set_mixin_id("m");
        let h = Class::base().extend("H");
        h.apply_mixins(&m).unwrap();
        h.apply_mixins(&m).unwrap();

        assert_eq!(h.meta().mixin_records().len(), 1);
        assert_eq!(h.mixins().len(), 1);
    }

    #[test]
    fn test_self_mixin_rejected() {
        let h = Class::base().extend("H");
        assert!(matches!(
            h.apply_mixins(&h),
            Err(MetaError::InvalidDeclaration { .. })
        ));
    }

    #[test]
    fn test_subclass_mixin_rejected() {
        let h = Class::base().extend("H");
        let sub = h.extend("Sub").extend("SubSub");
        assert_eq!(
            h.apply_mixins(&sub),
            Err(MetaError::InvalidDeclaration {
                class: "H".to_string(),
                key: "mixins".to_string(),
                reason: "H cannot mix in its subclass SubSub".to_string(),
            })
        );
        assert!(!sub.meta().is_completed());
        assert!(h.meta().mixin_records().is_empty());
    }

    #[test]
    fn test_bare_pair_is_one_entry() {
        let m = Class::base().extend("M");
        m.set_mixin_id("moo");
        let h = Class::base().extend("H");
        h.apply_mixins(Value::list([Value::from("customId"), Value::from(&m)]))
            .unwrap();

        assert_eq!(h.mixin("customId"), Some(m));
        assert!(h.mixin("moo").is_none());
        assert_eq!(h.meta().mixin_records().len(), 1);
    }

    #[test]
    fn test_mixin_chains_join_host() {
        let m = Class::base().extend("M");
        m.define(Definition::new().chains(["init"])).unwrap();
        m.define_method("init", |_, _| Ok(Value::Null));
        let h = Class::base().extend("H");
        h.apply_mixins(&m).unwrap();

        assert!(!h.has_own_prototype("init"));
        assert!(h.meta().chains().contains(&"init".to_string()));
        assert_eq!(h.meta().mixin_records()[0].chains, vec!["init"]);
    }

    #[test]
    fn test_bad_entries() {
        let h = Class::base().extend("H");
        assert!(h.apply_mixins(Value::Int(1)).is_err());
        assert!(h.apply_mixins(Value::list([Value::list(["a", "b"])])).is_err());
        assert!(h.apply_mixins(Value::Null).is_ok());
    }
}
