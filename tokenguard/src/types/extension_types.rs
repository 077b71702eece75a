//! Extension types
//!
//! Descriptors registered in the extension registry and the per-subject
//! attachment record maintained by the attachment ledger.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::types::{CapabilityType, ModuleId, SubjectKind};

/// Descriptor of a registered extension module.
///
/// One descriptor exists per module id; re-registration is rejected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionDescriptor {
    /// Unique identifier of the module
    pub module_id: ModuleId,
    /// Functional category of the module
    pub capability_type: CapabilityType,
    /// Subject kinds the module may be attached to
    pub compatible_kinds: HashSet<SubjectKind>,
}

impl ExtensionDescriptor {
    /// Whether the module may be attached to a subject of `kind`
    pub fn is_compatible_with(&self, kind: SubjectKind) -> bool {
        self.compatible_kinds.contains(&kind)
    }
}

/// Per-subject record of attached modules.
///
/// Invariants: `modules` and `membership` always agree; `by_capability`
/// maps each occupied capability type to exactly one member of
/// `membership`; `modules` is insertion-ordered for enumeration but its
/// order carries no semantic meaning and is not preserved across
/// removals.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    /// Attached modules in insertion order
    pub modules: Vec<ModuleId>,
    /// Membership set mirroring `modules`
    pub membership: HashSet<ModuleId>,
    /// Occupied capability slots
    pub by_capability: HashMap<CapabilityType, ModuleId>,
    /// Subject kind pinned at the first attach
    pub kind: Option<SubjectKind>,
}

impl AttachmentRecord {
    /// Whether `module_id` is attached
    pub fn contains(&self, module_id: &ModuleId) -> bool {
        self.membership.contains(module_id)
    }

    /// Append a module, keeping the vec and the set in step
    pub(crate) fn insert(&mut self, module_id: ModuleId) {
        self.membership.insert(module_id.clone());
        self.modules.push(module_id);
    }

    /// Remove a module via swap-with-last-and-truncate. Returns true if
    /// the module was present.
    pub(crate) fn remove(&mut self, module_id: &ModuleId) -> bool {
        if !self.membership.remove(module_id) {
            return false;
        }
        if let Some(position) = self.modules.iter().position(|m| m == module_id) {
            self.modules.swap_remove(position);
        }
        self.by_capability.retain(|_, attached| attached != module_id);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_insert_and_remove_stay_consistent() {
        let mut record = AttachmentRecord::default();
        record.insert("m1".to_string());
        record.insert("m2".to_string());
        record.insert("m3".to_string());
        record
            .by_capability
            .insert(CapabilityType::Royalty, "m2".to_string());

        assert!(record.contains(&"m2".to_string()));
        assert!(record.remove(&"m2".to_string()));

        assert_eq!(record.modules.len(), 2);
        assert_eq!(record.membership.len(), 2);
        assert!(!record.contains(&"m2".to_string()));
        assert!(record.by_capability.is_empty());

        // Double remove is reported, not silently ignored
        assert!(!record.remove(&"m2".to_string()));
    }

    #[test]
    fn test_descriptor_compatibility() {
        let descriptor = ExtensionDescriptor {
            module_id: "royalty-v1".to_string(),
            capability_type: CapabilityType::Royalty,
            compatible_kinds: [SubjectKind::Fungible].into_iter().collect(),
        };

        assert!(descriptor.is_compatible_with(SubjectKind::Fungible));
        assert!(!descriptor.is_compatible_with(SubjectKind::NonFungible));
    }
}
