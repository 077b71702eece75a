//! Extension modules
//!
//! Optional behavior modules (royalty, vesting, compliance, ...) are
//! described once in the [`registry::ExtensionRegistry`] and attached per
//! subject through the [`ledger::AttachmentLedger`]. The ledger enforces
//! the type-uniqueness invariant: at most one module of a given
//! capability type is active per subject at a time. Asset masters locate
//! an attached module through [`ledger::AttachmentLedger::by_capability_type`];
//! an empty answer means the feature is disabled for that subject.

pub mod ledger;
pub mod registry;

pub use ledger::AttachmentLedger;
pub use registry::ExtensionRegistry;
