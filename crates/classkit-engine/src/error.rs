//! Error types for class definition, completion, and instance dispatch

use thiserror::Error;

/// Errors raised by the class engine.
///
/// Definition-time kinds (processor graph, mixin ids, missing appliers) are
/// fatal to the class that triggered them: the class is left unusable and
/// every later completion attempt reports [`MetaError::ClassUnusable`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetaError {
    /// A processor's dependency subtree reached a processor still being sorted
    #[error("Circular processor dependencies: {}", .path.join(" --> "))]
    CircularProcessorDependency {
        /// Processor names from the first visited spec to the repeated one
        path: Vec<String>,
    },

    /// An ordering constraint names a processor that is not declared
    #[error("No processor matches \"{relation}\"=\"{target}\" on {processor}")]
    UnresolvedOrderingTarget {
        /// Processor carrying the constraint
        processor: String,
        /// Either `after` or `before`
        relation: &'static str,
        /// The missing processor name
        target: String,
    },

    /// Two different mixins were bound under one id on the same host
    #[error("Mixin id \"{id}\" on {host} is bound to {existing}, cannot bind {incoming}")]
    DuplicateMixinId {
        /// Host class name
        host: String,
        /// The contested id
        id: String,
        /// Class already bound under the id
        existing: String,
        /// Class that attempted to take the id
        incoming: String,
    },

    /// A processor has a declared value but no static applier resolves
    #[error("Class {class} has no static {applier} for processor \"{processor}\"")]
    MissingApplier {
        /// Class being completed
        class: String,
        /// Processor name
        processor: String,
        /// Expected static method name
        applier: String,
    },

    /// A declaration value has the wrong shape
    #[error("Invalid \"{key}\" declaration on {class}: {reason}")]
    InvalidDeclaration {
        /// Class receiving the declaration
        class: String,
        /// Declaration key
        key: String,
        /// What was wrong
        reason: String,
    },

    /// An earlier completion of this class failed
    #[error("Class {class} is unusable: {reason}")]
    ClassUnusable {
        /// Class name
        class: String,
        /// Message of the original failure
        reason: String,
    },

    /// A definition-time operation was attempted after completion
    #[error("Class {0} is already completed")]
    AlreadyCompleted(String),

    /// A chain was invoked that the class never declared
    #[error("Unknown chain \"{chain}\" on {class}")]
    UnknownChain {
        /// Class of the instance
        class: String,
        /// Chain name
        chain: String,
    },

    /// No member with the requested name resolves
    #[error("Method not found: {class}.{name}")]
    MethodNotFound {
        /// Class searched
        class: String,
        /// Member name
        name: String,
    },

    /// A member resolved but is not callable
    #[error("{class}.{name} is not callable (found {found})")]
    NotCallable {
        /// Class searched
        class: String,
        /// Member name
        name: String,
        /// Type name of the member found
        found: &'static str,
    },

    /// Write to a property declared non-writable
    #[error("Property {name} of {class} is read-only")]
    ReadOnlyProperty {
        /// Class declaring the property
        class: String,
        /// Property name
        name: String,
    },

    /// Type error
    #[error("Type error: {0}")]
    TypeError(String),

    /// Failure raised by user code (methods, appliers, merge hooks)
    #[error("{0}")]
    Failed(String),
}

impl From<String> for MetaError {
    fn from(s: String) -> Self {
        MetaError::Failed(s)
    }
}

impl From<&str> for MetaError {
    fn from(s: &str) -> Self {
        MetaError::Failed(s.to_string())
    }
}

/// Result alias used throughout the engine
pub type MetaResult<T> = Result<T, MetaError>;
