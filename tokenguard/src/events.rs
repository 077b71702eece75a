//! Audit events
//!
//! Append-only notifications emitted by the engine for external audit
//! trails. Events never drive internal control flow; consumers read and
//! render them. Each emission is mirrored to `tracing` so embedders with
//! a subscriber installed get structured logs for free.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::types::{AccountId, CapabilityType, ModuleId, OperationClass, SubjectId};

/// Audit trail notification
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEvent {
    PolicyCreated {
        subject: SubjectId,
        operation_class: OperationClass,
    },
    PolicyUpdated {
        subject: SubjectId,
        operation_class: OperationClass,
    },
    PolicyViolation {
        subject: SubjectId,
        actor: AccountId,
        operation_class: OperationClass,
        reason: String,
    },
    TimeRestrictionViolation {
        subject: SubjectId,
        actor: AccountId,
        operation_class: OperationClass,
    },
    WhitelistViolation {
        subject: SubjectId,
        account: AccountId,
        operation_class: OperationClass,
    },
    ApprovalRequested {
        subject: SubjectId,
        request_id: u64,
        requester: AccountId,
        operation_class: OperationClass,
        amount: u64,
    },
    ApprovalGranted {
        subject: SubjectId,
        request_id: u64,
        approver: AccountId,
    },
    ApprovalExecuted {
        subject: SubjectId,
        request_id: u64,
    },
    ExtensionAttached {
        subject: SubjectId,
        module_id: ModuleId,
        capability_type: CapabilityType,
    },
    ExtensionDetached {
        subject: SubjectId,
        module_id: ModuleId,
        capability_type: CapabilityType,
    },
}

/// Append-only in-memory event log shared by the engine components
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<RwLock<Vec<AuditEvent>>>,
}

impl EventLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and mirror it to tracing
    pub fn record(&self, event: AuditEvent) {
        match &event {
            AuditEvent::PolicyViolation {
                subject,
                actor,
                operation_class,
                reason,
            } => {
                tracing::warn!(%subject, %actor, class = %operation_class, %reason, "policy violation");
            }
            AuditEvent::TimeRestrictionViolation {
                subject,
                actor,
                operation_class,
            } => {
                tracing::warn!(%subject, %actor, class = %operation_class, "time restriction violation");
            }
            AuditEvent::WhitelistViolation {
                subject,
                account,
                operation_class,
            } => {
                tracing::warn!(%subject, %account, class = %operation_class, "whitelist violation");
            }
            other => {
                tracing::info!(event = ?other, "audit event");
            }
        }

        self.events.write().push(event);
    }

    /// Snapshot of all recorded events
    pub fn snapshot(&self) -> Vec<AuditEvent> {
        self.events.read().clone()
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}
