//! Extension attachment ledger
//!
//! Per-subject record of attached modules, validated against an optional
//! [`ExtensionRegistry`]. With a registry configured, an attach is
//! checked three ways: the descriptor must exist, the subject kind must
//! be compatible, and the capability slot must be free. Without a
//! registry the attach path is deliberately permissive: any non-empty
//! module id is accepted under the `Unknown` capability and no capability
//! slot is occupied.
//!
//! Removal swaps the departing module with the last element and
//! truncates; enumeration order carries no semantic meaning and is not
//! preserved across removals.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::events::{AuditEvent, EventLog};
use crate::extensions::registry::ExtensionRegistry;
use crate::types::error::GuardError;
use crate::types::extension_types::AttachmentRecord;
use crate::types::{CapabilityType, ModuleId, SubjectId, SubjectKind};

/// Per-subject attachment bookkeeping with optional registry validation
#[derive(Debug, Clone)]
pub struct AttachmentLedger {
    records: Arc<RwLock<HashMap<SubjectId, AttachmentRecord>>>,
    registry: Option<ExtensionRegistry>,
    events: EventLog,
}

impl AttachmentLedger {
    /// Create a ledger validating attachments against `registry`
    pub fn new(registry: ExtensionRegistry, events: EventLog) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            registry: Some(registry),
            events,
        }
    }

    /// Create a ledger with no registry configured. Attachments succeed
    /// unconditionally under the `Unknown` capability.
    pub fn unchecked(events: EventLog) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            registry: None,
            events,
        }
    }

    /// Attach `module_id` to `subject` of `kind`
    pub fn attach(
        &self,
        subject: SubjectId,
        kind: SubjectKind,
        module_id: ModuleId,
    ) -> Result<(), GuardError> {
        if module_id.is_empty() {
            return Err(GuardError::invalid_request(
                "cannot attach the zero module id",
            ));
        }

        let mut records = self.records.write();

        if let Some(record) = records.get(&subject) {
            if let Some(pinned) = record.kind {
                if pinned != kind {
                    return Err(GuardError::invalid_request(format!(
                        "subject {} was first attached as {:?}, not {:?}",
                        subject, pinned, kind
                    )));
                }
            }
            if record.contains(&module_id) {
                return Err(GuardError::invalid_request(format!(
                    "module {} is already attached to subject {}",
                    module_id, subject
                )));
            }
        }

        // Resolve the capability slot before touching the record, so a
        // rejected attach leaves no trace.
        let slot = match &self.registry {
            Some(registry) => {
                let descriptor = registry.descriptor(&module_id).ok_or_else(|| {
                    GuardError::not_found(
                        "ExtensionDescriptor",
                        Some(format!("module {}", module_id)),
                    )
                })?;
                if !descriptor.is_compatible_with(kind) {
                    return Err(GuardError::invalid_request(format!(
                        "module {} ({}) is not compatible with {:?} subjects",
                        module_id, descriptor.capability_type, kind
                    )));
                }
                let occupant = records
                    .get(&subject)
                    .and_then(|record| record.by_capability.get(&descriptor.capability_type));
                if let Some(occupant) = occupant {
                    return Err(GuardError::invalid_request(format!(
                        "capability {} on subject {} is already occupied by module {}",
                        descriptor.capability_type, subject, occupant
                    )));
                }
                Some(descriptor.capability_type)
            }
            // Permissive fallback: no descriptor lookup, no capability slot.
            None => None,
        };

        let record = records.entry(subject.clone()).or_default();
        if let Some(capability) = slot {
            record.by_capability.insert(capability, module_id.clone());
        }
        record.kind = Some(kind);
        record.insert(module_id.clone());
        drop(records);

        let capability = slot.unwrap_or(CapabilityType::Unknown);

        info!(%subject, %module_id, %capability, "extension attached");
        self.events.record(AuditEvent::ExtensionAttached {
            subject,
            module_id,
            capability_type: capability,
        });
        Ok(())
    }

    /// Detach `module_id` from `subject`. Rejects a module that is not
    /// attached.
    pub fn detach(&self, subject: &SubjectId, module_id: &ModuleId) -> Result<(), GuardError> {
        let mut records = self.records.write();
        let record = records.get_mut(subject).ok_or_else(|| {
            GuardError::invalid_request(format!(
                "module {} is not attached to subject {}",
                module_id, subject
            ))
        })?;

        let capability = record
            .by_capability
            .iter()
            .find(|(_, attached)| *attached == module_id)
            .map(|(capability, _)| *capability)
            .unwrap_or(CapabilityType::Unknown);

        if !record.remove(module_id) {
            return Err(GuardError::invalid_request(format!(
                "module {} is not attached to subject {}",
                module_id, subject
            )));
        }
        drop(records);

        info!(%subject, %module_id, %capability, "extension detached");
        self.events.record(AuditEvent::ExtensionDetached {
            subject: subject.clone(),
            module_id: module_id.clone(),
            capability_type: capability,
        });
        Ok(())
    }

    /// Modules attached to `subject`, cloned out. Order is arbitrary.
    pub fn attached(&self, subject: &SubjectId) -> Vec<ModuleId> {
        self.records
            .read()
            .get(subject)
            .map(|record| record.modules.clone())
            .unwrap_or_default()
    }

    /// Whether `module_id` is attached to `subject`
    pub fn is_attached(&self, subject: &SubjectId, module_id: &ModuleId) -> bool {
        self.records
            .read()
            .get(subject)
            .map(|record| record.contains(module_id))
            .unwrap_or(false)
    }

    /// The module occupying `capability` on `subject`, if any. An empty
    /// answer means the feature is disabled for that subject.
    pub fn by_capability_type(
        &self,
        subject: &SubjectId,
        capability: CapabilityType,
    ) -> Option<ModuleId> {
        self.records
            .read()
            .get(subject)
            .and_then(|record| record.by_capability.get(&capability))
            .cloned()
    }
}
