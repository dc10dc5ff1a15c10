//! Per-class metadata and the one-time completion pipeline
//!
//! Every class owns exactly one [`ClassMeta`]. Declarations accumulate in the
//! pending [`Definition`] until completion, which happens once: on the first
//! instantiation or an explicit `Class::complete()`. Completion resolves the
//! processor order (seeded with the parent's resolved list), runs each
//! processor's applier against the declared value, and freezes the chain
//! table.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::{Mutex, ReentrantMutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use rustc_hash::FxHashMap;

use crate::chain::{ChainInvoker, ChainSpec};
use crate::class::Class;
use crate::config::{ConfigSpec, ConfigTable};
use crate::definition::{Definition, CHAINS, MIXIN_ID, PROCESSORS};
use crate::error::{MetaError, MetaResult};
use crate::mixin::MixinRecord;
use crate::processor::{ProcessorRegistry, ProcessorSpec};
use crate::value::Value;

#[derive(Debug, Clone)]
enum Phase {
    Pending,
    Running,
    Completed,
    Failed(MetaError),
}

#[derive(Default)]
pub(crate) struct MetaState {
    pub(crate) processors: Vec<ProcessorSpec>,
    /// Declared chain names, inherited + own
    pub(crate) chains: IndexSet<String>,
    pub(crate) chain_specs: FxHashMap<String, Arc<ChainSpec>>,
    pub(crate) live_chains: FxHashMap<String, bool>,
    pub(crate) mixins: IndexMap<String, Class>,
    pub(crate) mixin_records: Vec<MixinRecord>,
    pub(crate) mixin_id: Option<String>,
    pub(crate) configs: ConfigTable,
}

/// Metadata of one class
pub struct ClassMeta {
    pending: Mutex<Definition>,
    state: RwLock<MetaState>,
    instances: AtomicUsize,
    completed: AtomicBool,
    /// Held for the whole pipeline; re-entrant so an applier that touches its
    /// own class on the completing thread sees `Running` instead of deadlocking
    completion: ReentrantMutex<RefCell<Phase>>,
}

impl ClassMeta {
    pub(crate) fn new() -> Self {
        Self {
            pending: Mutex::new(Definition::new()),
            state: RwLock::new(MetaState::default()),
            instances: AtomicUsize::new(0),
            completed: AtomicBool::new(false),
            completion: ReentrantMutex::new(RefCell::new(Phase::Pending)),
        }
    }

    pub(crate) fn state(&self) -> RwLockReadGuard<'_, MetaState> {
        self.state.read()
    }

    pub(crate) fn state_mut(&self) -> RwLockWriteGuard<'_, MetaState> {
        self.state.write()
    }

    /// Whether the processor pipeline has run
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Instances created against exactly this class
    pub fn instances(&self) -> usize {
        self.instances.load(Ordering::Acquire)
    }

    pub(crate) fn record_instance(&self) -> usize {
        self.instances.fetch_add(1, Ordering::AcqRel)
    }

    /// Resolved processor order (empty until completion)
    pub fn processors(&self) -> Vec<ProcessorSpec> {
        self.state().processors.clone()
    }

    /// Declared chain names, sorted
    pub fn chains(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state().chains.iter().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn has_chain(&self, name: &str) -> bool {
        self.state().chains.contains(name)
    }

    /// Chain name → whether any class or mixin implements it
    pub fn live_chains(&self) -> BTreeMap<String, bool> {
        self.state()
            .live_chains
            .iter()
            .map(|(name, live)| (name.clone(), *live))
            .collect()
    }

    /// Whether `chain` has at least one implementation
    pub fn is_live(&self, chain: &str) -> bool {
        self.state().live_chains.get(chain).copied().unwrap_or(false)
    }

    /// Resolved participants of `chain`
    pub fn chain(&self, chain: &str) -> Option<Arc<ChainSpec>> {
        self.state().chain_specs.get(chain).cloned()
    }

    /// Mixins bound on this class itself, by id
    pub fn mixins(&self) -> IndexMap<String, Class> {
        self.state().mixins.clone()
    }

    /// Mixin bound under `id` on this class itself
    pub fn mixin(&self, id: &str) -> Option<Class> {
        self.state().mixins.get(id).cloned()
    }

    /// Every applied mixin, anonymous ones included, in application order
    pub fn mixin_records(&self) -> Vec<MixinRecord> {
        self.state().mixin_records.clone()
    }

    /// Id this class is addressable by when mixed in
    pub fn mixin_id(&self) -> Option<String> {
        self.state().mixin_id.clone()
    }

    /// Declared configuration properties, inherited + own
    pub fn configs(&self) -> ConfigTable {
        self.state().configs.clone()
    }

    /// Whether any configuration property is declared
    pub fn has_configs(&self) -> bool {
        !self.state().configs.is_empty()
    }

    /// Snapshot of the merged, not yet applied declaration
    pub fn pending(&self) -> Definition {
        self.pending.lock().clone()
    }

    pub(crate) fn register_chain(&self, name: &str) {
        self.state_mut().chains.insert(name.to_string());
    }

    pub(crate) fn register_config(&self, name: &str, spec: ConfigSpec) {
        self.state_mut().configs.insert(name.to_string(), spec);
    }

    pub(crate) fn set_mixin_id(&self, id: Option<String>) {
        self.state_mut().mixin_id = id;
    }

    /// Merge a declaration fragment into the pending declaration
    pub(crate) fn define(&self, owner: &Class, mut definition: Definition) -> MetaResult<()> {
        if self.is_completed() {
            return Err(MetaError::AlreadyCompleted(owner.name().to_string()));
        }

        // Takes effect immediately: hosts may address this class before it
        // completes
        if let Some(id) = definition.take(MIXIN_ID) {
            match id {
                Value::Str(id) => self.set_mixin_id(Some(id)),
                Value::Null => self.set_mixin_id(None),
                other => {
                    return Err(MetaError::InvalidDeclaration {
                        class: owner.name().to_string(),
                        key: MIXIN_ID.to_string(),
                        reason: format!("expected a string, got {}", other.type_name()),
                    })
                }
            }
        }

        self.pending.lock().merge(definition);
        Ok(())
    }

    /// Merge without checks, for built-in roots that cannot be completed yet
    pub(crate) fn seed(&self, definition: Definition) {
        self.pending.lock().merge(definition);
    }

    /// Run the pipeline for `owner` unless it already ran
    pub(crate) fn complete(&self, owner: &Class) -> MetaResult<()> {
        if self.is_completed() {
            return Ok(());
        }

        let guard = self.completion.lock();
        let phase = guard.borrow().clone();
        match phase {
            Phase::Completed | Phase::Running => return Ok(()),
            Phase::Failed(err) => {
                return Err(MetaError::ClassUnusable {
                    class: owner.name().to_string(),
                    reason: err.to_string(),
                })
            }
            Phase::Pending => {}
        }

        *guard.borrow_mut() = Phase::Running;
        tracing::debug!(class = owner.name(), "completing class");

        let result = self.run_pipeline(owner);

        *guard.borrow_mut() = match &result {
            Ok(()) => {
                self.completed.store(true, Ordering::Release);
                Phase::Completed
            }
            Err(err) => Phase::Failed(err.clone()),
        };

        match &result {
            Ok(()) => tracing::debug!(
                class = owner.name(),
                processors = self.state().processors.len(),
                "class completed"
            ),
            Err(err) => tracing::debug!(class = owner.name(), error = %err, "class completion failed"),
        }

        result
    }

    fn run_pipeline(&self, owner: &Class) -> MetaResult<()> {
        let inherited = match owner.parent() {
            Some(parent) => {
                parent.complete()?;
                Some(parent.meta().state_snapshot())
            }
            None => None,
        };

        let declaration = self.pending();
        let processors = ProcessorRegistry::decode(
            owner.name(),
            declaration.get(PROCESSORS),
            inherited
                .as_ref()
                .map(|s| s.processors.as_slice())
                .unwrap_or(&[]),
        )?;

        {
            let mut state = self.state_mut();
            state.processors = processors.clone();
            if let Some(inherited) = inherited {
                for name in inherited.chains {
                    state.chains.insert(name);
                }
                for (name, spec) in inherited.configs {
                    state.configs.entry(name).or_insert(spec);
                }
            }
        }

        for spec in &processors {
            let Some(value) = declaration.get(&spec.name) else {
                continue;
            };
            self.apply(owner, spec, value)?;
        }

        self.resolve_chains(owner);
        Ok(())
    }

    fn apply(&self, owner: &Class, spec: &ProcessorSpec, value: &Value) -> MetaResult<()> {
        match owner.get_static(&spec.applier) {
            Some(Value::Static(applier)) => {
                tracing::trace!(
                    class = owner.name(),
                    processor = spec.name.as_str(),
                    applier = spec.applier.as_str(),
                    "applying processor"
                );
                applier.call(owner, std::slice::from_ref(value))?;
                Ok(())
            }
            _ if !owner.options().strict_appliers => {
                tracing::warn!(
                    class = owner.name(),
                    processor = spec.name.as_str(),
                    applier = spec.applier.as_str(),
                    "skipping processor without applier"
                );
                Ok(())
            }
            _ => Err(MetaError::MissingApplier {
                class: owner.name().to_string(),
                processor: spec.name.clone(),
                applier: spec.applier.clone(),
            }),
        }
    }

    fn resolve_chains(&self, owner: &Class) {
        let names: Vec<String> = self.state().chains.iter().cloned().collect();
        let specs: Vec<ChainSpec> = names
            .iter()
            .map(|name| ChainInvoker::resolve(owner, name))
            .collect();

        let mut state = self.state_mut();
        for spec in specs {
            state.live_chains.insert(spec.name().to_string(), spec.is_live());
            state.chain_specs.insert(spec.name().to_string(), Arc::new(spec));
        }
    }

    /// Chain names known to this class, including ones still only pending
    pub(crate) fn known_chains(&self) -> IndexSet<String> {
        let mut names = self.state().chains.clone();
        if let Some(Value::List(pending)) = self.pending.lock().get(CHAINS) {
            names.extend(pending.iter().filter_map(|v| v.as_str().map(str::to_string)));
        }
        names
    }

    fn state_snapshot(&self) -> Inherited {
        let state = self.state();
        Inherited {
            processors: state.processors.clone(),
            chains: state.chains.iter().cloned().collect(),
            configs: state.configs.clone(),
        }
    }
}

/// What a subclass inherits from its completed parent
struct Inherited {
    processors: Vec<ProcessorSpec>,
    chains: Vec<String>,
    configs: ConfigTable,
}
