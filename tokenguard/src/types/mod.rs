//! Core types for TokenGuard
//!
//! This module defines the shared vocabulary of the engine:
//! - Identifier aliases for subjects, accounts and modules
//! - Operation classes validated by the policy engine
//! - Subject kinds and module capability types used by the extension registry

pub mod error;
pub mod extension_types;
pub mod policy_types;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an account interacting with a subject (actor, target,
/// approver or administrator).
pub type AccountId = String;

/// Identifier of the asset instance a policy or extension applies to.
pub type SubjectId = String;

/// Identifier of an attachable extension module.
pub type ModuleId = String;

/// Named category of action being validated against a policy.
///
/// The class determines which account a whitelist check applies to:
/// transfer-shaped classes deliver value to a target account and are
/// checked against the target, every other class is checked against the
/// acting account.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationClass {
    /// Creation of new units delivered to a target account
    Mint,
    /// Movement of units from the actor to a target account
    Transfer,
    /// Redemption of units held by the actor
    Redeem,
    /// Destruction of units held by the actor
    Burn,
    /// Application-defined operation category
    Custom(String),
}

impl OperationClass {
    /// Whether whitelist checks apply to the target account rather than
    /// the actor. Mint and Transfer both deliver value to a recipient.
    pub fn is_transfer_shaped(&self) -> bool {
        matches!(self, OperationClass::Mint | OperationClass::Transfer)
    }
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationClass::Mint => write!(f, "mint"),
            OperationClass::Transfer => write!(f, "transfer"),
            OperationClass::Redeem => write!(f, "redeem"),
            OperationClass::Burn => write!(f, "burn"),
            OperationClass::Custom(name) => write!(f, "custom:{}", name),
        }
    }
}

/// Kind of subject an extension module can be compatible with
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubjectKind {
    /// Divisible token with interchangeable units
    Fungible,
    /// Token whose units are individually identified
    NonFungible,
    /// Special-purpose token with restricted operations
    Restricted,
    /// Token representing an external asset
    Wrapped,
}

/// Functional category of an attachable extension module.
///
/// At most one module of a given capability type may be attached to a
/// subject at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapabilityType {
    /// Royalty computation and distribution
    Royalty,
    /// Lock-up and release scheduling
    Vesting,
    /// Regulatory compliance hooks
    Compliance,
    /// Voting and delegation
    Governance,
    /// Capability of a module attached without a configured registry.
    /// Never occupies a per-subject capability slot.
    Unknown,
}

impl fmt::Display for CapabilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityType::Royalty => write!(f, "royalty"),
            CapabilityType::Vesting => write!(f, "vesting"),
            CapabilityType::Compliance => write!(f, "compliance"),
            CapabilityType::Governance => write!(f, "governance"),
            CapabilityType::Unknown => write!(f, "unknown"),
        }
    }
}
