//! Lifecycle method chains
//!
//! A chain is a named method every class in a hierarchy may implement, where
//! calling it on an instance runs every *direct* implementation in order:
//! ancestors first, and each class's mixins after its superclass and before
//! the class itself. Participants are resolved once, when the class
//! completes.

use crate::class::Class;
use crate::error::{MetaError, MetaResult};
use crate::function::Method;
use crate::object::Instance;
use crate::value::Value;

/// Construction chain
pub const CTOR: &str = "ctor";
/// Destruction chain, run in reverse
pub const DTOR: &str = "dtor";

/// A class (or mixin) and its direct implementation of a chain
#[derive(Debug, Clone)]
pub struct ChainLink {
    /// Implementing class
    pub class: Class,
    /// The implementation
    pub method: Method,
}

/// Resolved participants of one chain
#[derive(Debug, Clone)]
pub struct ChainSpec {
    name: String,
    links: Vec<ChainLink>,
}

impl ChainSpec {
    /// Chain name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Participants in forward order
    pub fn links(&self) -> &[ChainLink] {
        &self.links
    }

    /// Names of participating classes in forward order
    pub fn participants(&self) -> Vec<String> {
        self.links.iter().map(|l| l.class.name().to_string()).collect()
    }

    /// Whether anything implements the chain
    pub fn is_live(&self) -> bool {
        !self.links.is_empty()
    }
}

/// Resolves and invokes chains
pub struct ChainInvoker;

impl ChainInvoker {
    /// Resolve the participants of `name` for `class`.
    ///
    /// Ancestors and mixins are expected to be completed, so their resolved
    /// specs are reused.
    pub fn resolve(class: &Class, name: &str) -> ChainSpec {
        ChainSpec {
            name: name.to_string(),
            links: Self::collect(class, name),
        }
    }

    fn collect(class: &Class, name: &str) -> Vec<ChainLink> {
        if let Some(spec) = class.meta().chain(name) {
            return spec.links.clone();
        }

        let mut links: Vec<ChainLink> = match class.parent() {
            Some(parent) => Self::collect(parent, name),
            None => Vec::new(),
        };

        for record in class.meta().mixin_records() {
            if !record.chains.iter().any(|chain| chain == name) {
                continue;
            }
            for link in Self::collect(&record.source, name) {
                push_unique(&mut links, link);
            }
        }

        if let Some(method) = class.own_method(name) {
            if !method.is_junction() {
                push_unique(
                    &mut links,
                    ChainLink {
                        class: class.clone(),
                        method,
                    },
                );
            }
        }

        links
    }

    /// Call every participant of chain `name` on `instance`
    pub fn invoke(instance: &Instance, name: &str, args: &[Value], reverse: bool) -> MetaResult<()> {
        let class = instance.class();
        let meta = class.meta();

        if !meta.is_live(name) {
            if meta.has_chain(name) {
                return Ok(());
            }
            return Err(MetaError::UnknownChain {
                class: class.name().to_string(),
                chain: name.to_string(),
            });
        }

        let Some(spec) = meta.chain(name) else {
            return Ok(());
        };

        let mut run = |link: &ChainLink| -> MetaResult<()> {
            tracing::trace!(
                chain = name,
                class = class.name(),
                participant = link.class.name(),
                "invoking chain link"
            );
            link.method.call(instance, args).map(|_| ())
        };

        if reverse {
            spec.links.iter().rev().try_for_each(&mut run)
        } else {
            spec.links.iter().try_for_each(&mut run)
        }
    }
}

fn push_unique(links: &mut Vec<ChainLink>, link: ChainLink) {
    if !links.iter().any(|l| l.class == link.class) {
        links.push(link);
    }
}
