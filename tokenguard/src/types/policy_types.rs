//! Policy types
//!
//! This module defines the records the policy engine keeps per
//! (subject, operation-class) pair: the policy itself, the rolling usage
//! counter maintained per actor, the approval request ledger entries, and
//! the outcome type returned by validation.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::types::{AccountId, OperationClass, SubjectId};

/// Length of the epoch-aligned daily-limit window in seconds
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Start of the epoch-aligned day containing `timestamp`
pub fn day_window_start(timestamp: u64) -> u64 {
    (timestamp / SECONDS_PER_DAY) * SECONDS_PER_DAY
}

/// Key identifying a policy record
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyKey {
    pub subject: SubjectId,
    pub operation_class: OperationClass,
}

/// Key identifying a per-actor usage counter
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CounterKey {
    pub subject: SubjectId,
    pub operation_class: OperationClass,
    pub actor: AccountId,
}

/// Enforcement policy for one (subject, operation-class) pair.
///
/// A value of 0 for `max_amount_per_operation`, `daily_limit`,
/// `cooldown_period`, `activation_time` or `expiration_time` means the
/// corresponding restriction is not set. Policies are never deleted:
/// deactivation clears the `active` flag and validation treats an
/// inactive policy as absent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationPolicy {
    /// Whether the policy is enforced at all
    pub active: bool,
    /// Maximum amount allowed in a single operation (0 = unlimited)
    pub max_amount_per_operation: u64,
    /// Maximum cumulative amount per actor per epoch-aligned day
    /// (0 = unlimited)
    pub daily_limit: u64,
    /// Minimum seconds between consecutive allowed operations on the same
    /// counter key (0 = no cooldown)
    pub cooldown_period: u64,
    /// Operations are denied before this timestamp (0 = no lower bound)
    pub activation_time: u64,
    /// Operations are denied after this timestamp (0 = no upper bound)
    pub expiration_time: u64,
    /// Whether direct operations are denied in favor of the approval
    /// workflow
    pub requires_approval: bool,
    /// Number of distinct approvals required to execute a request.
    /// Must be >= 1 whenever `requires_approval` is set.
    pub approval_threshold: u32,
    /// Whether operations require whitelist membership
    pub requires_whitelist: bool,
}

impl Default for OperationPolicy {
    fn default() -> Self {
        Self {
            active: true,
            max_amount_per_operation: 0,
            daily_limit: 0,
            cooldown_period: 0,
            activation_time: 0,
            expiration_time: 0,
            requires_approval: false,
            approval_threshold: 0,
            requires_whitelist: false,
        }
    }
}

impl OperationPolicy {
    /// Whether the policy carries an activation or expiration bound
    pub fn is_time_restricted(&self) -> bool {
        self.activation_time > 0 || self.expiration_time > 0
    }
}

/// Rolling usage counter for one (subject, operation-class, actor) key.
///
/// Created lazily on the first allowed operation and mutated only by the
/// allow path of validation. `daily_total` accumulates within one
/// epoch-aligned day and is reset when a new day is first observed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounter {
    /// Timestamp of the last allowed operation (0 = never)
    pub last_operation_timestamp: u64,
    /// Cumulative allowed amount within the current day window
    pub daily_total: u64,
    /// Start of the epoch-aligned day the total belongs to
    pub daily_window_start: u64,
}

/// A pending multi-party approval request.
///
/// The approval count is the cardinality of `approvers`, which makes
/// double counting by the same approver impossible. `executed` moves
/// false to true exactly once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Sequential id, unique per subject
    pub id: u64,
    /// Account that opened the request and is the only one allowed to
    /// execute it
    pub requester: AccountId,
    /// Operation class the request covers
    pub operation_class: OperationClass,
    /// Amount the request covers
    pub amount: u64,
    /// Target account of the requested operation
    pub target: AccountId,
    /// Distinct accounts that signed off so far
    pub approvers: HashSet<AccountId>,
    /// Whether the request has been executed
    pub executed: bool,
    /// Creation timestamp
    pub created_at: u64,
}

impl ApprovalRequest {
    /// Number of distinct approvals granted so far
    pub fn approval_count(&self) -> u32 {
        self.approvers.len() as u32
    }
}

/// Machine-checkable reason for a validation denial
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DenialReason {
    /// The policy's activation time lies in the future
    NotYetActive {
        /// Timestamp at which operations become allowed
        activation_time: u64,
    },
    /// The policy's expiration time has passed
    Expired {
        /// Timestamp after which operations are denied
        expiration_time: u64,
    },
    /// The checked account is not on the whitelist for this class
    NotWhitelisted {
        /// The account that failed the membership check
        account: AccountId,
    },
    /// The policy routes this class through the approval workflow
    RequiresApproval,
    /// The amount exceeds the per-operation maximum
    ExceedsMaxAmount {
        amount: u64,
        max_amount: u64,
    },
    /// The amount exceeds what remains of the daily limit
    ExceedsDailyLimit {
        amount: u64,
        remaining: u64,
    },
    /// The cooldown period since the last allowed operation has not
    /// elapsed
    CooldownActive {
        /// Timestamp at which the key becomes eligible again
        retry_at: u64,
    },
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::NotYetActive { activation_time } => {
                write!(f, "policy not active until {}", activation_time)
            }
            DenialReason::Expired { expiration_time } => {
                write!(f, "policy expired at {}", expiration_time)
            }
            DenialReason::NotWhitelisted { account } => {
                write!(f, "account {} is not whitelisted", account)
            }
            DenialReason::RequiresApproval => {
                write!(f, "operation requires approval")
            }
            DenialReason::ExceedsMaxAmount { amount, max_amount } => {
                write!(f, "amount {} exceeds per-operation maximum {}", amount, max_amount)
            }
            DenialReason::ExceedsDailyLimit { amount, remaining } => {
                write!(f, "amount {} exceeds daily limit, {} remaining", amount, remaining)
            }
            DenialReason::CooldownActive { retry_at } => {
                write!(f, "in cooldown until {}", retry_at)
            }
        }
    }
}

/// Result of validating an operation against a policy
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationOutcome {
    /// The operation may proceed; usage counters have been committed
    Allowed,
    /// The operation must be aborted; nothing was mutated
    Denied(DenialReason),
}

impl ValidationOutcome {
    /// Whether the operation was allowed
    pub fn is_allowed(&self) -> bool {
        matches!(self, ValidationOutcome::Allowed)
    }

    /// The denial reason, if the operation was denied
    pub fn denial_reason(&self) -> Option<&DenialReason> {
        match self {
            ValidationOutcome::Allowed => None,
            ValidationOutcome::Denied(reason) => Some(reason),
        }
    }
}
