//! Engine options carried by a class hierarchy
//!
//! Options are fixed when a root class is adopted and shared by every class
//! extended from it.

use serde::{Deserialize, Serialize};

use crate::error::{MetaError, MetaResult};

/// What to do when a host binds a second, different mixin under an id it
/// already uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MixinIdPolicy {
    /// Fail with `DuplicateMixinId`
    #[default]
    Reject,
    /// Rebind the id to the newer mixin and log a warning
    Replace,
}

/// Options for a class hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Duplicate mixin id handling
    pub mixin_id_policy: MixinIdPolicy,
    /// Treat a declared processor value without an applier as fatal.
    /// When false the processor is skipped with a warning.
    pub strict_appliers: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            mixin_id_policy: MixinIdPolicy::Reject,
            strict_appliers: true,
        }
    }
}

impl EngineOptions {
    /// Parse options from JSON; missing fields keep their defaults
    pub fn from_json(source: &str) -> MetaResult<Self> {
        serde_json::from_str(source)
            .map_err(|e| MetaError::TypeError(format!("invalid engine options: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = EngineOptions::default();
        assert_eq!(options.mixin_id_policy, MixinIdPolicy::Reject);
        assert!(options.strict_appliers);
    }

    #[test]
    fn test_from_json_partial() {
        let options = EngineOptions::from_json(r#"{ "mixin_id_policy": "replace" }"#).unwrap();
        assert_eq!(options.mixin_id_policy, MixinIdPolicy::Replace);
        assert!(options.strict_appliers);
    }

    #[test]
    fn test_from_json_rejects_unknown_policy() {
        assert!(EngineOptions::from_json(r#"{ "mixin_id_policy": "merge" }"#).is_err());
    }
}
