//! Policy enforcement
//!
//! The policy engine answers "is this operation allowed now" for asset
//! masters, against per-(subject, operation-class) policies with amount
//! caps, epoch-aligned daily limits, cooldowns, activation windows,
//! whitelist gating and multi-party approval workflows.
//!
//! Leaf components:
//! - [`store::PolicyStore`]: policy records and per-actor usage counters
//! - [`whitelist::WhitelistStore`]: per (subject, class) membership sets
//! - [`approval::ApprovalWorkflow`]: sequential request ledger with
//!   multi-party sign-off
//! - [`engine::PolicyEngine`]: the orchestrator asset masters call into

pub mod approval;
pub mod engine;
pub mod store;
pub mod whitelist;

pub use approval::ApprovalWorkflow;
pub use engine::PolicyEngine;
pub use store::PolicyStore;
pub use whitelist::WhitelistStore;
