//! Policy engine
//!
//! Orchestrates the policy store, whitelist store and approval workflow
//! to answer "is this operation allowed now". Validation follows a fixed,
//! deterministic rule order so audit trails stay comparable across
//! deployments:
//!
//! 1. no active policy: allow unconditionally;
//! 2. activation/expiration window;
//! 3. whitelist membership (target for transfer-shaped classes, actor
//!    otherwise);
//! 4. approval requirement (the direct path never bypasses it);
//! 5. per-operation amount cap;
//! 6. epoch-aligned daily limit;
//! 7. cooldown;
//! 8. allow and commit the usage counter.
//!
//! Denials mutate nothing. The allow path commits the counter update
//! under the same store lock that read the policy, so the very next
//! validation on the same key observes it.

use std::sync::Arc;
use tracing::info;

use crate::auth::{AuthContext, Role, RoleRegistry};
use crate::clock::Clock;
use crate::events::{AuditEvent, EventLog};
use crate::policy::approval::ApprovalWorkflow;
use crate::policy::store::PolicyStore;
use crate::policy::whitelist::WhitelistStore;
use crate::types::error::GuardError;
use crate::types::policy_types::{
    day_window_start, CounterKey, DenialReason, OperationPolicy, PolicyKey, UsageCounter,
    ValidationOutcome,
};
use crate::types::{AccountId, OperationClass, SubjectId};

/// Stateless service over the injected stores; asset masters call
/// [`PolicyEngine::validate_operation`] before committing a state change.
pub struct PolicyEngine {
    store: PolicyStore,
    whitelist: WhitelistStore,
    approvals: ApprovalWorkflow,
    roles: RoleRegistry,
    clock: Arc<dyn Clock>,
    events: EventLog,
}

impl PolicyEngine {
    /// Create an engine with fresh stores
    pub fn new(roles: RoleRegistry, clock: Arc<dyn Clock>) -> Self {
        Self::with_events(roles, clock, EventLog::new())
    }

    /// Create an engine sharing an existing event log
    pub fn with_events(roles: RoleRegistry, clock: Arc<dyn Clock>, events: EventLog) -> Self {
        Self {
            store: PolicyStore::new(),
            whitelist: WhitelistStore::new(),
            approvals: ApprovalWorkflow::new(),
            roles,
            clock,
            events,
        }
    }

    /// The audit trail shared by this engine
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// The approval ledger, for read-only inspection
    pub fn approvals(&self) -> &ApprovalWorkflow {
        &self.approvals
    }

    /// Policy record for (subject, class), cloned out
    pub fn policy(&self, subject: &SubjectId, class: &OperationClass) -> Option<OperationPolicy> {
        self.store.policy(&PolicyKey {
            subject: subject.clone(),
            operation_class: class.clone(),
        })
    }

    /// Usage counter for (subject, class, actor), cloned out
    pub fn usage(
        &self,
        subject: &SubjectId,
        class: &OperationClass,
        actor: &AccountId,
    ) -> UsageCounter {
        self.store.counter(&CounterKey {
            subject: subject.clone(),
            operation_class: class.clone(),
            actor: actor.clone(),
        })
    }

    // ---- validation -----------------------------------------------------

    /// Validate a direct operation. The whitelist check, when required,
    /// applies to the actor. On allow, the usage counter is committed; a
    /// denial mutates nothing.
    pub fn validate_operation(
        &self,
        subject: &SubjectId,
        actor: &AccountId,
        class: &OperationClass,
        amount: u64,
    ) -> ValidationOutcome {
        self.validate_inner(subject, actor, actor, class, amount)
    }

    /// Validate a direct operation with an explicit target. The whitelist
    /// check applies to the target for transfer-shaped classes and to the
    /// actor otherwise.
    pub fn validate_operation_with_target(
        &self,
        subject: &SubjectId,
        actor: &AccountId,
        target: &AccountId,
        class: &OperationClass,
        amount: u64,
    ) -> ValidationOutcome {
        let checked = if class.is_transfer_shaped() {
            target
        } else {
            actor
        };
        self.validate_inner(subject, actor, checked, class, amount)
    }

    fn validate_inner(
        &self,
        subject: &SubjectId,
        actor: &AccountId,
        whitelist_account: &AccountId,
        class: &OperationClass,
        amount: u64,
    ) -> ValidationOutcome {
        let policy_key = PolicyKey {
            subject: subject.clone(),
            operation_class: class.clone(),
        };
        let now = self.clock.now();

        // Single store transaction: policy read, counter read, commit.
        let mut state = self.store.lock();

        let policy = match state.policy(&policy_key) {
            Some(policy) if policy.active => policy,
            // No active policy: allow unconditionally, touch nothing.
            _ => return ValidationOutcome::Allowed,
        };

        if policy.is_time_restricted() {
            if policy.activation_time > 0 && now < policy.activation_time {
                let reason = DenialReason::NotYetActive {
                    activation_time: policy.activation_time,
                };
                drop(state);
                self.record_time_violation(subject, actor, class, &reason);
                return ValidationOutcome::Denied(reason);
            }
            if policy.expiration_time > 0 && now > policy.expiration_time {
                let reason = DenialReason::Expired {
                    expiration_time: policy.expiration_time,
                };
                drop(state);
                self.record_time_violation(subject, actor, class, &reason);
                return ValidationOutcome::Denied(reason);
            }
        }

        if policy.requires_whitelist && !self.whitelist.contains(&policy_key, whitelist_account) {
            let reason = DenialReason::NotWhitelisted {
                account: whitelist_account.clone(),
            };
            drop(state);
            self.events.record(AuditEvent::WhitelistViolation {
                subject: subject.clone(),
                account: whitelist_account.clone(),
                operation_class: class.clone(),
            });
            self.record_violation(subject, actor, class, &reason);
            return ValidationOutcome::Denied(reason);
        }

        if policy.requires_approval {
            let reason = DenialReason::RequiresApproval;
            drop(state);
            self.record_violation(subject, actor, class, &reason);
            return ValidationOutcome::Denied(reason);
        }

        if policy.max_amount_per_operation > 0 && amount > policy.max_amount_per_operation {
            let reason = DenialReason::ExceedsMaxAmount {
                amount,
                max_amount: policy.max_amount_per_operation,
            };
            drop(state);
            self.record_violation(subject, actor, class, &reason);
            return ValidationOutcome::Denied(reason);
        }

        let counter_key = CounterKey {
            subject: subject.clone(),
            operation_class: class.clone(),
            actor: actor.clone(),
        };
        let counter = state.counter(&counter_key);

        // Roll the window locally; the store is only touched on allow.
        let today = day_window_start(now);
        let rolled_total = if counter.daily_window_start == today {
            counter.daily_total
        } else {
            0
        };

        if policy.daily_limit > 0 {
            let remaining = policy.daily_limit.saturating_sub(rolled_total);
            if amount > remaining {
                let reason = DenialReason::ExceedsDailyLimit { amount, remaining };
                drop(state);
                self.record_violation(subject, actor, class, &reason);
                return ValidationOutcome::Denied(reason);
            }
        }

        if policy.cooldown_period > 0 && counter.last_operation_timestamp > 0 {
            let retry_at = counter
                .last_operation_timestamp
                .saturating_add(policy.cooldown_period);
            if now < retry_at {
                let reason = DenialReason::CooldownActive { retry_at };
                drop(state);
                self.record_violation(subject, actor, class, &reason);
                return ValidationOutcome::Denied(reason);
            }
        }

        state.commit_counter(
            counter_key,
            UsageCounter {
                last_operation_timestamp: now,
                // Saturate: with an unlimited daily limit the running
                // total can reach u64::MAX without ever being checked.
                daily_total: rolled_total.saturating_add(amount),
                daily_window_start: today,
            },
        );
        ValidationOutcome::Allowed
    }

    fn record_violation(
        &self,
        subject: &SubjectId,
        actor: &AccountId,
        class: &OperationClass,
        reason: &DenialReason,
    ) {
        self.events.record(AuditEvent::PolicyViolation {
            subject: subject.clone(),
            actor: actor.clone(),
            operation_class: class.clone(),
            reason: reason.to_string(),
        });
    }

    fn record_time_violation(
        &self,
        subject: &SubjectId,
        actor: &AccountId,
        class: &OperationClass,
        reason: &DenialReason,
    ) {
        self.events.record(AuditEvent::TimeRestrictionViolation {
            subject: subject.clone(),
            actor: actor.clone(),
            operation_class: class.clone(),
        });
        self.record_violation(subject, actor, class, reason);
    }

    // ---- administrative surface ------------------------------------------

    /// Create a policy for (subject, class). PolicyAdmin only.
    pub fn create_policy(
        &self,
        ctx: &AuthContext,
        subject: SubjectId,
        class: OperationClass,
        policy: OperationPolicy,
    ) -> Result<(), GuardError> {
        self.roles.require(ctx, Role::PolicyAdmin)?;
        let key = PolicyKey {
            subject: subject.clone(),
            operation_class: class.clone(),
        };
        self.store.insert_policy(key, policy)?;
        info!(%subject, %class, by = %ctx.caller, "policy created");
        self.events.record(AuditEvent::PolicyCreated {
            subject,
            operation_class: class,
        });
        Ok(())
    }

    /// Replace an existing policy. PolicyAdmin only.
    pub fn update_policy(
        &self,
        ctx: &AuthContext,
        subject: SubjectId,
        class: OperationClass,
        policy: OperationPolicy,
    ) -> Result<(), GuardError> {
        self.roles.require(ctx, Role::PolicyAdmin)?;
        let key = PolicyKey {
            subject: subject.clone(),
            operation_class: class.clone(),
        };
        self.store.replace_policy(&key, policy)?;
        info!(%subject, %class, by = %ctx.caller, "policy updated");
        self.events.record(AuditEvent::PolicyUpdated {
            subject,
            operation_class: class,
        });
        Ok(())
    }

    /// Set the activation/expiration window on an existing policy.
    /// PolicyAdmin only.
    pub fn set_time_restrictions(
        &self,
        ctx: &AuthContext,
        subject: SubjectId,
        class: OperationClass,
        activation_time: u64,
        expiration_time: u64,
    ) -> Result<(), GuardError> {
        self.roles.require(ctx, Role::PolicyAdmin)?;
        if activation_time > 0 && expiration_time > 0 && expiration_time < activation_time {
            return Err(GuardError::invalid_request(
                "expiration time precedes activation time",
            ));
        }
        let key = PolicyKey {
            subject: subject.clone(),
            operation_class: class.clone(),
        };
        self.store.modify_policy(&key, |policy| {
            policy.activation_time = activation_time;
            policy.expiration_time = expiration_time;
        })?;
        info!(%subject, %class, activation_time, expiration_time, "time restrictions set");
        self.events.record(AuditEvent::PolicyUpdated {
            subject,
            operation_class: class,
        });
        Ok(())
    }

    /// Route a class through the approval workflow with `threshold`
    /// required sign-offs. PolicyAdmin only; threshold must be >= 1.
    pub fn enable_approval_requirement(
        &self,
        ctx: &AuthContext,
        subject: SubjectId,
        class: OperationClass,
        threshold: u32,
    ) -> Result<(), GuardError> {
        self.roles.require(ctx, Role::PolicyAdmin)?;
        if threshold == 0 {
            return Err(GuardError::invalid_request(
                "approval threshold must be at least 1",
            ));
        }
        let key = PolicyKey {
            subject: subject.clone(),
            operation_class: class.clone(),
        };
        self.store.modify_policy(&key, |policy| {
            policy.requires_approval = true;
            policy.approval_threshold = threshold;
        })?;
        info!(%subject, %class, threshold, "approval requirement enabled");
        self.events.record(AuditEvent::PolicyUpdated {
            subject,
            operation_class: class,
        });
        Ok(())
    }

    /// Toggle whitelist gating on an existing policy. PolicyAdmin only.
    pub fn enable_whitelist_requirement(
        &self,
        ctx: &AuthContext,
        subject: SubjectId,
        class: OperationClass,
        required: bool,
    ) -> Result<(), GuardError> {
        self.roles.require(ctx, Role::PolicyAdmin)?;
        let key = PolicyKey {
            subject: subject.clone(),
            operation_class: class.clone(),
        };
        self.store
            .modify_policy(&key, |policy| policy.requires_whitelist = required)?;
        info!(%subject, %class, required, "whitelist requirement set");
        self.events.record(AuditEvent::PolicyUpdated {
            subject,
            operation_class: class,
        });
        Ok(())
    }

    /// Grant the Approver role to `account`. PolicyAdmin only.
    pub fn add_approver(&self, ctx: &AuthContext, account: AccountId) -> Result<(), GuardError> {
        self.roles.require(ctx, Role::PolicyAdmin)?;
        self.roles.grant(account.clone(), Role::Approver)?;
        info!(%account, by = %ctx.caller, "approver added");
        Ok(())
    }

    /// Add an account to the whitelist for (subject, class).
    /// PolicyAdmin only; rejects the zero account and duplicates.
    pub fn add_to_whitelist(
        &self,
        ctx: &AuthContext,
        subject: SubjectId,
        class: OperationClass,
        account: AccountId,
    ) -> Result<(), GuardError> {
        self.roles.require(ctx, Role::PolicyAdmin)?;
        self.whitelist.add(
            PolicyKey {
                subject,
                operation_class: class,
            },
            account,
        )
    }

    /// Add a batch of accounts to the whitelist, skipping empty and
    /// already-present entries. PolicyAdmin only. Returns the number of
    /// accounts actually added.
    pub fn add_batch_to_whitelist(
        &self,
        ctx: &AuthContext,
        subject: SubjectId,
        class: OperationClass,
        accounts: Vec<AccountId>,
    ) -> Result<usize, GuardError> {
        self.roles.require(ctx, Role::PolicyAdmin)?;
        Ok(self.whitelist.add_batch(
            PolicyKey {
                subject,
                operation_class: class,
            },
            accounts,
        ))
    }

    /// Remove an account from the whitelist for (subject, class).
    /// PolicyAdmin only; rejects removal of a non-member.
    pub fn remove_from_whitelist(
        &self,
        ctx: &AuthContext,
        subject: SubjectId,
        class: OperationClass,
        account: &AccountId,
    ) -> Result<(), GuardError> {
        self.roles.require(ctx, Role::PolicyAdmin)?;
        self.whitelist.remove(
            &PolicyKey {
                subject,
                operation_class: class,
            },
            account,
        )
    }

    /// Whether `account` is whitelisted for (subject, class)
    pub fn is_whitelisted(
        &self,
        subject: &SubjectId,
        class: &OperationClass,
        account: &AccountId,
    ) -> bool {
        self.whitelist.contains(
            &PolicyKey {
                subject: subject.clone(),
                operation_class: class.clone(),
            },
            account,
        )
    }

    // ---- approval workflow ------------------------------------------------

    /// Open an approval request for an operation the direct path denies.
    /// Allowed only when the policy requires approval; returns the
    /// sequential request id.
    pub fn request_approval(
        &self,
        subject: SubjectId,
        requester: AccountId,
        class: OperationClass,
        amount: u64,
        target: AccountId,
    ) -> Result<u64, GuardError> {
        let key = PolicyKey {
            subject: subject.clone(),
            operation_class: class.clone(),
        };
        let policy = self
            .store
            .policy(&key)
            .filter(|policy| policy.active)
            .ok_or_else(|| {
                GuardError::not_found(
                    "Policy",
                    Some(format!("subject {} class {}", subject, class)),
                )
            })?;
        if !policy.requires_approval {
            return Err(GuardError::invalid_request(format!(
                "policy for subject {} class {} does not require approval",
                subject, class
            )));
        }

        let now = self.clock.now();
        let id = self.approvals.create(
            subject.clone(),
            requester.clone(),
            class.clone(),
            amount,
            target,
            now,
        );
        self.events.record(AuditEvent::ApprovalRequested {
            subject,
            request_id: id,
            requester,
            operation_class: class,
            amount,
        });
        Ok(id)
    }

    /// Sign off on a request. Approver role only; rejects executed
    /// requests and repeat sign-offs by the same approver.
    pub fn approve_request(
        &self,
        ctx: &AuthContext,
        subject: &SubjectId,
        request_id: u64,
    ) -> Result<u32, GuardError> {
        self.roles.require(ctx, Role::Approver)?;
        let count = self
            .approvals
            .approve(subject, request_id, ctx.caller.clone())?;
        self.events.record(AuditEvent::ApprovalGranted {
            subject: subject.clone(),
            request_id,
            approver: ctx.caller.clone(),
        });
        Ok(count)
    }

    /// Execute an approved request. Requester-only; requires the approval
    /// count to have reached the policy threshold. Flips the executed
    /// flag; the actual state change happens in the calling asset master.
    pub fn execute_approved_request(
        &self,
        ctx: &AuthContext,
        subject: &SubjectId,
        request_id: u64,
    ) -> Result<(), GuardError> {
        let request = self.approvals.get(subject, request_id).ok_or_else(|| {
            GuardError::not_found(
                "ApprovalRequest",
                Some(format!("subject {} request {}", subject, request_id)),
            )
        })?;

        let key = PolicyKey {
            subject: subject.clone(),
            operation_class: request.operation_class.clone(),
        };
        let threshold = self
            .store
            .policy(&key)
            .filter(|policy| policy.active && policy.requires_approval)
            .map(|policy| policy.approval_threshold)
            .ok_or_else(|| {
                GuardError::invalid_request(format!(
                    "no approval-gated policy for subject {} class {}",
                    subject, request.operation_class
                ))
            })?;

        self.approvals
            .execute(subject, request_id, &ctx.caller, threshold)?;
        self.events.record(AuditEvent::ApprovalExecuted {
            subject: subject.clone(),
            request_id,
        });
        Ok(())
    }
}
