//! Policy and usage-counter storage
//!
//! Keyed store over the engine's durable state: policy records per
//! (subject, operation-class) and rolling usage counters per
//! (subject, operation-class, actor). Both maps live under a single
//! write lock so a validation call reads the policy, inspects the
//! counter and commits its update as one serialized transaction. Reads
//! hand out clones; callers never hold references into the store.

use parking_lot::{RwLock, RwLockWriteGuard};
use std::collections::HashMap;
use std::sync::Arc;

use crate::types::error::GuardError;
use crate::types::policy_types::{CounterKey, OperationPolicy, PolicyKey, UsageCounter};

/// Mutable state guarded by the store lock
#[derive(Debug, Default)]
pub struct PolicyState {
    policies: HashMap<PolicyKey, OperationPolicy>,
    counters: HashMap<CounterKey, UsageCounter>,
}

impl PolicyState {
    /// Policy for `key`, cloned out
    pub fn policy(&self, key: &PolicyKey) -> Option<OperationPolicy> {
        self.policies.get(key).cloned()
    }

    /// Usage counter for `key`, cloned out; a fresh counter if none exists
    pub fn counter(&self, key: &CounterKey) -> UsageCounter {
        self.counters.get(key).cloned().unwrap_or_default()
    }

    /// Overwrite the counter for `key`. Only the allow path of validation
    /// calls this.
    pub fn commit_counter(&mut self, key: CounterKey, counter: UsageCounter) {
        self.counters.insert(key, counter);
    }

    fn insert_policy(&mut self, key: PolicyKey, policy: OperationPolicy) -> Result<(), GuardError> {
        if self.policies.contains_key(&key) {
            return Err(GuardError::invalid_request(format!(
                "policy already exists for subject {} class {}",
                key.subject, key.operation_class
            )));
        }
        self.policies.insert(key, policy);
        Ok(())
    }

    fn modify_policy<F>(&mut self, key: &PolicyKey, mutate: F) -> Result<(), GuardError>
    where
        F: FnOnce(&mut OperationPolicy),
    {
        let policy = self.policies.get_mut(key).ok_or_else(|| {
            GuardError::not_found(
                "Policy",
                Some(format!(
                    "subject {} class {}",
                    key.subject, key.operation_class
                )),
            )
        })?;
        mutate(policy);
        Ok(())
    }
}

/// Shared store of policies and usage counters
#[derive(Debug, Clone, Default)]
pub struct PolicyStore {
    state: Arc<RwLock<PolicyState>>,
}

impl PolicyStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the store lock for a multi-step serialized transaction
    pub(crate) fn lock(&self) -> RwLockWriteGuard<'_, PolicyState> {
        self.state.write()
    }

    /// Policy for `key`, cloned out
    pub fn policy(&self, key: &PolicyKey) -> Option<OperationPolicy> {
        self.state.read().policy(key)
    }

    /// Usage counter for `key`, cloned out
    pub fn counter(&self, key: &CounterKey) -> UsageCounter {
        self.state.read().counter(key)
    }

    /// Store a new policy. Rejects creation over an existing record;
    /// policies are mutated in place and never recreated.
    pub fn insert_policy(&self, key: PolicyKey, policy: OperationPolicy) -> Result<(), GuardError> {
        validate_policy(&policy)?;
        self.state.write().insert_policy(key, policy)
    }

    /// Replace an existing policy wholesale
    pub fn replace_policy(&self, key: &PolicyKey, policy: OperationPolicy) -> Result<(), GuardError> {
        validate_policy(&policy)?;
        self.state.write().modify_policy(key, |existing| {
            *existing = policy;
        })
    }

    /// Mutate an existing policy in place
    pub fn modify_policy<F>(&self, key: &PolicyKey, mutate: F) -> Result<(), GuardError>
    where
        F: FnOnce(&mut OperationPolicy),
    {
        self.state.write().modify_policy(key, mutate)
    }
}

/// Structural policy invariants enforced on every create and update
fn validate_policy(policy: &OperationPolicy) -> Result<(), GuardError> {
    if policy.requires_approval && policy.approval_threshold == 0 {
        return Err(GuardError::invalid_request(
            "approval threshold must be at least 1 when approval is required",
        ));
    }
    if policy.activation_time > 0
        && policy.expiration_time > 0
        && policy.expiration_time < policy.activation_time
    {
        return Err(GuardError::invalid_request(
            "expiration time precedes activation time",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OperationClass;

    fn key(subject: &str) -> PolicyKey {
        PolicyKey {
            subject: subject.to_string(),
            operation_class: OperationClass::Transfer,
        }
    }

    #[test]
    fn test_duplicate_create_is_rejected() {
        let store = PolicyStore::new();
        store
            .insert_policy(key("asset-1"), OperationPolicy::default())
            .expect("first create");

        let err = store
            .insert_policy(key("asset-1"), OperationPolicy::default())
            .unwrap_err();
        assert!(matches!(err, GuardError::InvalidRequest { .. }));
    }

    #[test]
    fn test_update_of_absent_policy_is_not_found() {
        let store = PolicyStore::new();
        let err = store
            .replace_policy(&key("asset-1"), OperationPolicy::default())
            .unwrap_err();
        assert!(matches!(err, GuardError::NotFound { .. }));
    }

    #[test]
    fn test_zero_threshold_with_approval_is_rejected() {
        let store = PolicyStore::new();
        let policy = OperationPolicy {
            requires_approval: true,
            approval_threshold: 0,
            ..OperationPolicy::default()
        };

        let err = store.insert_policy(key("asset-1"), policy).unwrap_err();
        assert!(matches!(err, GuardError::InvalidRequest { .. }));
    }

    #[test]
    fn test_inverted_time_window_is_rejected() {
        let store = PolicyStore::new();
        let policy = OperationPolicy {
            activation_time: 1_000,
            expiration_time: 500,
            ..OperationPolicy::default()
        };

        assert!(store.insert_policy(key("asset-1"), policy).is_err());
    }

    #[test]
    fn test_counter_is_lazily_default() {
        let store = PolicyStore::new();
        let counter_key = CounterKey {
            subject: "asset-1".to_string(),
            operation_class: OperationClass::Transfer,
            actor: "alice".to_string(),
        };

        let counter = store.counter(&counter_key);
        assert_eq!(counter, UsageCounter::default());
    }

    #[test]
    fn test_reads_are_copies() {
        let store = PolicyStore::new();
        store
            .insert_policy(key("asset-1"), OperationPolicy::default())
            .expect("create");

        let mut copy = store.policy(&key("asset-1")).expect("policy exists");
        copy.daily_limit = 999;

        let fresh = store.policy(&key("asset-1")).expect("policy exists");
        assert_eq!(fresh.daily_limit, 0, "mutating a copy must not reach the store");
    }
}
