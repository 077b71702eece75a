//! TokenGuard
//!
//! Policy-enforcement engine and extension registry for a family of
//! token-like assets. Asset masters call into the [`policy::PolicyEngine`]
//! before committing a state change, and into the
//! [`extensions::AttachmentLedger`] to locate an optional behavior module
//! by capability type.
//!
//! # Architecture
//!
//! * **Policy Engine**: per-(subject, operation-class) policies with
//!   amount caps, epoch-aligned daily limits, cooldowns, activation
//!   windows, whitelist gating and multi-party approval workflows.
//! * **Extension Registry**: catalog of module descriptors tagged with a
//!   capability type and the subject kinds they are compatible with.
//! * **Attachment Ledger**: per-subject attachments with at most one
//!   module per capability type.
//!
//! Every call executes as a serialized transaction against the subject's
//! state: short, synchronous, all-or-nothing. Denials are data
//! ([`types::policy_types::ValidationOutcome`]), not errors; errors are
//! reserved for integration bugs and missing roles.
//!
//! ```rust
//! use std::sync::Arc;
//! use tokenguard::auth::{AuthContext, RoleRegistry};
//! use tokenguard::clock::SystemClock;
//! use tokenguard::policy::PolicyEngine;
//! use tokenguard::types::policy_types::OperationPolicy;
//! use tokenguard::types::OperationClass;
//!
//! let engine = PolicyEngine::new(RoleRegistry::new("admin"), Arc::new(SystemClock));
//! let admin = AuthContext::new("admin");
//! engine
//!     .create_policy(
//!         &admin,
//!         "asset-1".to_string(),
//!         OperationClass::Transfer,
//!         OperationPolicy {
//!             max_amount_per_operation: 1_000,
//!             daily_limit: 5_000,
//!             ..OperationPolicy::default()
//!         },
//!     )
//!     .unwrap();
//!
//! let outcome = engine.validate_operation(
//!     &"asset-1".to_string(),
//!     &"alice".to_string(),
//!     &OperationClass::Transfer,
//!     800,
//! );
//! assert!(outcome.is_allowed());
//! ```

pub mod auth;
pub mod clock;
pub mod events;
pub mod extensions;
pub mod policy;
pub mod types;

// Re-export key components for easier access
pub use auth::{AuthContext, Role, RoleRegistry};
pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{AuditEvent, EventLog};
pub use extensions::{AttachmentLedger, ExtensionRegistry};
pub use policy::{ApprovalWorkflow, PolicyEngine, PolicyStore, WhitelistStore};
pub use types::error::GuardError;
pub use types::policy_types::{
    DenialReason, OperationPolicy, UsageCounter, ValidationOutcome,
};
pub use types::{AccountId, CapabilityType, ModuleId, OperationClass, SubjectId, SubjectKind};

/// Returns the version of the crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
