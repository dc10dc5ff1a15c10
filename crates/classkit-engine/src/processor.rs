//! Processor declarations and their dependency ordering
//!
//! A processor is a named unit of class-definition behavior applied by calling
//! the static `apply<Name>` on the class being completed. Declarations say
//! which processors must run `after` (or `before`) which; [`ProcessorRegistry`]
//! merges a class's own declarations over the inherited, already-sorted list
//! and emits a depth-first topological order.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::error::{MetaError, MetaResult};
use crate::value::Value;

/// One declared processor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessorSpec {
    /// Processor name (also the declaration key it consumes)
    pub name: String,
    /// Static method invoked to apply the processor
    pub applier: String,
    /// Processors whose effects this one consumes
    pub after: Vec<String>,
    /// Processors that consume this one's effects
    pub before: Vec<String>,
    /// Contributed by an ancestor rather than declared on this class
    pub inherited: bool,
}

impl ProcessorSpec {
    /// Create a processor with no ordering constraints
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            applier: applier_name(name),
            after: Vec::new(),
            before: Vec::new(),
            inherited: false,
        }
    }

    /// Run after `names`
    pub fn after<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.after.extend(names.into_iter().map(Into::into));
        self
    }

    /// Run before `names`
    pub fn before<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.before.extend(names.into_iter().map(Into::into));
        self
    }

    /// Decode one `name: options` entry of a processors map.
    ///
    /// `options` is falsy (no constraint), a name or list of names (run
    /// after those), or a map with optional `after` / `before` keys.
    fn from_options(owner: &str, name: &str, options: &Value) -> MetaResult<Self> {
        let spec = ProcessorSpec::new(name);

        if !options.is_truthy() {
            return Ok(spec);
        }

        match options {
            Value::Str(_) | Value::List(_) => Ok(spec.after(names(owner, options)?)),
            Value::Map(map) => {
                if let Some(key) = map.keys().find(|k| *k != "after" && *k != "before") {
                    return Err(invalid(owner, format!("unknown ordering key \"{}\" on {}", key, name)));
                }
                let after = map.get("after").map_or(Ok(Vec::new()), |v| names(owner, v))?;
                let before = map.get("before").map_or(Ok(Vec::new()), |v| names(owner, v))?;
                Ok(spec.after(after).before(before))
            }
            other => Err(invalid(
                owner,
                format!("ordering for {} must be a name, list, or map, got {}", name, other.type_name()),
            )),
        }
    }

    /// Copy of an ancestor's spec, as seen by a subclass
    fn inherit(&self) -> Self {
        Self {
            inherited: true,
            ..self.clone()
        }
    }
}

/// Name of the static invoked for a processor: `mixins` → `applyMixins`
pub fn applier_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => format!("apply{}{}", first.to_uppercase(), chars.as_str()),
        None => "apply".to_string(),
    }
}

fn invalid(owner: &str, reason: String) -> MetaError {
    MetaError::InvalidDeclaration {
        class: owner.to_string(),
        key: "processors".to_string(),
        reason,
    }
}

fn names(owner: &str, value: &Value) -> MetaResult<Vec<String>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Str(s) => Ok(vec![s.clone()]),
        Value::List(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| invalid(owner, format!("expected processor name, got {}", item.type_name())))
            })
            .collect(),
        other => Err(invalid(owner, format!("expected processor name, got {}", other.type_name()))),
    }
}

#[derive(Clone, Copy)]
enum Mark {
    Sorting,
    Sorted,
}

struct SortState<'a> {
    map: &'a IndexMap<String, ProcessorSpec>,
    /// `B -> [A, ..]` for every `A before B`
    implied: FxHashMap<&'a str, Vec<&'a str>>,
    marks: FxHashMap<&'a str, Mark>,
    path: Vec<&'a str>,
    sorted: Vec<ProcessorSpec>,
}

impl<'a> SortState<'a> {
    fn visit(&mut self, name: &'a str) -> MetaResult<()> {
        match self.marks.get(name) {
            Some(Mark::Sorted) => return Ok(()),
            Some(Mark::Sorting) => {
                let mut path: Vec<String> = self.path.iter().map(|s| s.to_string()).collect();
                path.push(name.to_string());
                return Err(MetaError::CircularProcessorDependency { path });
            }
            None => {}
        }

        let map = self.map;
        let Some((key, spec)) = map.get_key_value(name) else {
            // Targets were validated before sorting started
            return Ok(());
        };

        self.path.push(key);
        self.marks.insert(key, Mark::Sorting);

        for dep in &spec.after {
            self.visit(dep)?;
        }
        let implied = self.implied.get(key.as_str()).cloned().unwrap_or_default();
        for dep in implied {
            self.visit(dep)?;
        }

        self.marks.insert(key, Mark::Sorted);
        self.path.pop();
        self.sorted.push(spec.clone());
        Ok(())
    }
}

/// Decodes processor declarations and orders them
pub struct ProcessorRegistry;

impl ProcessorRegistry {
    /// Decode a class's own declaration over its parent's sorted list.
    ///
    /// `declaration` is a name, a list of names, or a map of name → ordering
    /// options. Own declarations shadow inherited ones of the same name
    /// (edges included). Without a declaration the parent's order is kept
    /// as is. `inherited` is never modified.
    pub fn decode(
        owner: &str,
        declaration: Option<&Value>,
        inherited: &[ProcessorSpec],
    ) -> MetaResult<Vec<ProcessorSpec>> {
        let mut map: IndexMap<String, ProcessorSpec> = IndexMap::new();

        match declaration {
            None | Some(Value::Null) => {
                return Ok(inherited.iter().map(ProcessorSpec::inherit).collect())
            }
            Some(Value::Str(name)) => {
                map.insert(name.clone(), ProcessorSpec::new(name));
            }
            Some(list @ Value::List(_)) => {
                for name in names(owner, list)? {
                    let spec = ProcessorSpec::new(&name);
                    map.insert(name, spec);
                }
            }
            Some(Value::Map(entries)) => {
                for (name, options) in entries {
                    map.insert(name.clone(), ProcessorSpec::from_options(owner, name, options)?);
                }
            }
            Some(other) => {
                return Err(invalid(
                    owner,
                    format!("expected a name, list, or map, got {}", other.type_name()),
                ))
            }
        }

        for spec in inherited {
            if !map.contains_key(&spec.name) {
                map.insert(spec.name.clone(), spec.inherit());
            }
        }

        Self::sort(&map)
    }

    /// Topologically sort a merged processor map.
    ///
    /// The base order is inherited-first then by name, so unconstrained
    /// processors always come out in the same order. Dependencies are emitted
    /// strictly before their dependents.
    pub fn sort(map: &IndexMap<String, ProcessorSpec>) -> MetaResult<Vec<ProcessorSpec>> {
        let mut implied: FxHashMap<&str, Vec<&str>> = FxHashMap::default();

        for spec in map.values() {
            for target in &spec.after {
                if !map.contains_key(target) {
                    return Err(MetaError::UnresolvedOrderingTarget {
                        processor: spec.name.clone(),
                        relation: "after",
                        target: target.clone(),
                    });
                }
            }
            for target in &spec.before {
                let Some((key, _)) = map.get_key_value(target) else {
                    return Err(MetaError::UnresolvedOrderingTarget {
                        processor: spec.name.clone(),
                        relation: "before",
                        target: target.clone(),
                    });
                };
                implied.entry(key.as_str()).or_default().push(spec.name.as_str());
            }
        }

        let mut order: Vec<&ProcessorSpec> = map.values().collect();
        order.sort_by(|a, b| {
            b.inherited
                .cmp(&a.inherited)
                .then_with(|| a.name.cmp(&b.name))
        });

        let mut state = SortState {
            map,
            implied,
            marks: FxHashMap::default(),
            path: Vec::new(),
            sorted: Vec::with_capacity(map.len()),
        };

        for spec in order {
            state.visit(&spec.name)?;
        }

        Ok(state.sorted)
    }
}
