//! Whitelist storage
//!
//! Membership sets per (subject, operation-class). Single-entry add and
//! remove reject duplicates and absent members loudly; the batch add
//! skips empty and already-present entries silently and reports how many
//! it actually added. The asymmetry is intentional and preserved from the
//! original administrative surface.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::types::error::GuardError;
use crate::types::policy_types::PolicyKey;
use crate::types::AccountId;

/// Per (subject, operation-class) whitelist membership store
#[derive(Debug, Clone, Default)]
pub struct WhitelistStore {
    entries: Arc<RwLock<HashMap<PolicyKey, HashSet<AccountId>>>>,
}

impl WhitelistStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `account` is a member of the whitelist for `key`
    pub fn contains(&self, key: &PolicyKey, account: &AccountId) -> bool {
        self.entries
            .read()
            .get(key)
            .map(|members| members.contains(account))
            .unwrap_or(false)
    }

    /// Add `account` to the whitelist for `key`. Rejects the zero
    /// identifier and a duplicate insert.
    pub fn add(&self, key: PolicyKey, account: AccountId) -> Result<(), GuardError> {
        if account.is_empty() {
            return Err(GuardError::invalid_request(
                "cannot whitelist the zero account",
            ));
        }

        let mut entries = self.entries.write();
        let members = entries.entry(key).or_default();
        if !members.insert(account.clone()) {
            return Err(GuardError::invalid_request(format!(
                "account {} is already whitelisted",
                account
            )));
        }
        Ok(())
    }

    /// Add a batch of accounts, skipping empty identifiers and entries
    /// already present. Returns the number of accounts actually added.
    pub fn add_batch(&self, key: PolicyKey, accounts: Vec<AccountId>) -> usize {
        let mut entries = self.entries.write();
        let members = entries.entry(key).or_default();

        let mut added = 0;
        for account in accounts {
            if account.is_empty() {
                continue;
            }
            if members.insert(account) {
                added += 1;
            }
        }
        added
    }

    /// Remove `account` from the whitelist for `key`. Rejects removal of
    /// an account that is not a member.
    pub fn remove(&self, key: &PolicyKey, account: &AccountId) -> Result<(), GuardError> {
        let mut entries = self.entries.write();
        let removed = entries
            .get_mut(key)
            .map(|members| members.remove(account))
            .unwrap_or(false);

        if !removed {
            return Err(GuardError::invalid_request(format!(
                "account {} is not whitelisted",
                account
            )));
        }
        Ok(())
    }

    /// Members of the whitelist for `key`, cloned out
    pub fn members(&self, key: &PolicyKey) -> HashSet<AccountId> {
        self.entries.read().get(key).cloned().unwrap_or_default()
    }
}
