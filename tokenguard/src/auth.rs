//! Role-based authorization
//!
//! Every mutating administrative call receives an explicit
//! [`AuthContext`] naming the caller; the engine resolves the caller's
//! roles against its [`RoleRegistry`] and checks the required role once
//! at the entry point. There is no ambient caller identity.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::types::error::GuardError;
use crate::types::AccountId;

/// Administrative roles recognized by the engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// May create and mutate policies, whitelists and approver grants
    PolicyAdmin,
    /// May sign off on approval requests
    Approver,
    /// May register extension descriptors
    ExtensionAdmin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::PolicyAdmin => write!(f, "policy-admin"),
            Role::Approver => write!(f, "approver"),
            Role::ExtensionAdmin => write!(f, "extension-admin"),
        }
    }
}

/// Authorization context passed into every mutating call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthContext {
    /// The account performing the call
    pub caller: AccountId,
}

impl AuthContext {
    /// Create a context for `caller`
    pub fn new(caller: impl Into<AccountId>) -> Self {
        Self {
            caller: caller.into(),
        }
    }
}

/// Registry of role grants per account.
///
/// Constructed with a root administrator that holds every role; further
/// grants are made through the registry by accounts that already hold
/// `PolicyAdmin`.
#[derive(Debug, Clone)]
pub struct RoleRegistry {
    grants: Arc<RwLock<HashMap<AccountId, HashSet<Role>>>>,
}

impl RoleRegistry {
    /// Create a registry with `root` holding every role
    pub fn new(root: impl Into<AccountId>) -> Self {
        let mut grants = HashMap::new();
        grants.insert(
            root.into(),
            [Role::PolicyAdmin, Role::Approver, Role::ExtensionAdmin]
                .into_iter()
                .collect(),
        );
        Self {
            grants: Arc::new(RwLock::new(grants)),
        }
    }

    /// Check that the caller holds `role`
    pub fn require(&self, ctx: &AuthContext, role: Role) -> Result<(), GuardError> {
        let grants = self.grants.read();
        let has_role = grants
            .get(&ctx.caller)
            .map(|roles| roles.contains(&role))
            .unwrap_or(false);

        if has_role {
            Ok(())
        } else {
            Err(GuardError::unauthorized(format!(
                "caller {} lacks the {} role",
                ctx.caller, role
            )))
        }
    }

    /// Grant `role` to `account`. Rejects a duplicate grant.
    pub fn grant(&self, account: impl Into<AccountId>, role: Role) -> Result<(), GuardError> {
        let account = account.into();
        if account.is_empty() {
            return Err(GuardError::invalid_request(
                "cannot grant a role to the zero account",
            ));
        }

        let mut grants = self.grants.write();
        let roles = grants.entry(account.clone()).or_default();
        if !roles.insert(role) {
            return Err(GuardError::invalid_request(format!(
                "account {} already holds the {} role",
                account, role
            )));
        }
        Ok(())
    }

    /// Whether `account` holds `role`
    pub fn has_role(&self, account: &AccountId, role: Role) -> bool {
        self.grants
            .read()
            .get(account)
            .map(|roles| roles.contains(&role))
            .unwrap_or(false)
    }
}
