//! Multi-party approval workflow
//!
//! Per-subject sequential ledger of approval requests. Each request
//! collects sign-offs in a set of approver identifiers, so the approval
//! count is the set cardinality and an approver cannot be counted twice.
//! Execution flips the `executed` flag exactly once; the actual state
//! change is performed by the calling asset master.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::types::error::GuardError;
use crate::types::policy_types::ApprovalRequest;
use crate::types::{AccountId, OperationClass, SubjectId};

/// Per-subject approval request ledger
#[derive(Debug, Clone, Default)]
pub struct ApprovalWorkflow {
    requests: Arc<RwLock<HashMap<SubjectId, Vec<ApprovalRequest>>>>,
}

impl ApprovalWorkflow {
    /// Create an empty workflow
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new request and return its sequential id
    pub fn create(
        &self,
        subject: SubjectId,
        requester: AccountId,
        operation_class: OperationClass,
        amount: u64,
        target: AccountId,
        now: u64,
    ) -> u64 {
        let mut requests = self.requests.write();
        let ledger = requests.entry(subject).or_default();
        let id = ledger.len() as u64;
        ledger.push(ApprovalRequest {
            id,
            requester,
            operation_class,
            amount,
            target,
            approvers: HashSet::new(),
            executed: false,
            created_at: now,
        });
        id
    }

    /// Record a sign-off by `approver`. Rejects an unknown request id, an
    /// already-executed request, and a repeat sign-off by the same
    /// approver. Returns the new approval count.
    pub fn approve(
        &self,
        subject: &SubjectId,
        request_id: u64,
        approver: AccountId,
    ) -> Result<u32, GuardError> {
        let mut requests = self.requests.write();
        let request = lookup_mut(&mut requests, subject, request_id)?;

        if request.executed {
            return Err(GuardError::invalid_request(format!(
                "request {} has already been executed",
                request_id
            )));
        }
        if !request.approvers.insert(approver.clone()) {
            return Err(GuardError::invalid_request(format!(
                "approver {} has already approved request {}",
                approver, request_id
            )));
        }
        Ok(request.approval_count())
    }

    /// Mark a request executed. Requires the caller to be the requester,
    /// the approval count to have reached `threshold`, and the request to
    /// be unexecuted. Returns a copy of the executed request so the
    /// caller can perform the actual state change.
    pub fn execute(
        &self,
        subject: &SubjectId,
        request_id: u64,
        caller: &AccountId,
        threshold: u32,
    ) -> Result<ApprovalRequest, GuardError> {
        let mut requests = self.requests.write();
        let request = lookup_mut(&mut requests, subject, request_id)?;

        if request.executed {
            return Err(GuardError::invalid_request(format!(
                "request {} has already been executed",
                request_id
            )));
        }
        if &request.requester != caller {
            return Err(GuardError::unauthorized(format!(
                "only the requester {} may execute request {}",
                request.requester, request_id
            )));
        }
        if request.approval_count() < threshold {
            return Err(GuardError::invalid_request(format!(
                "request {} has {} of {} required approvals",
                request_id,
                request.approval_count(),
                threshold
            )));
        }

        request.executed = true;
        Ok(request.clone())
    }

    /// Request by id, cloned out
    pub fn get(&self, subject: &SubjectId, request_id: u64) -> Option<ApprovalRequest> {
        self.requests
            .read()
            .get(subject)
            .and_then(|ledger| ledger.get(request_id as usize))
            .cloned()
    }

    /// Number of requests opened for `subject`
    pub fn count(&self, subject: &SubjectId) -> u64 {
        self.requests
            .read()
            .get(subject)
            .map(|ledger| ledger.len() as u64)
            .unwrap_or(0)
    }
}

fn lookup_mut<'a>(
    requests: &'a mut HashMap<SubjectId, Vec<ApprovalRequest>>,
    subject: &SubjectId,
    request_id: u64,
) -> Result<&'a mut ApprovalRequest, GuardError> {
    requests
        .get_mut(subject)
        .and_then(|ledger| ledger.get_mut(request_id as usize))
        .ok_or_else(|| {
            GuardError::not_found(
                "ApprovalRequest",
                Some(format!("subject {} request {}", subject, request_id)),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject() -> SubjectId {
        "asset-1".to_string()
    }

    fn open(workflow: &ApprovalWorkflow) -> u64 {
        workflow.create(
            subject(),
            "alice".to_string(),
            OperationClass::Transfer,
            5_000,
            "bob".to_string(),
            100,
        )
    }

    #[test]
    fn test_ids_are_sequential_per_subject() {
        let workflow = ApprovalWorkflow::new();
        assert_eq!(open(&workflow), 0);
        assert_eq!(open(&workflow), 1);

        let other = workflow.create(
            "asset-2".to_string(),
            "alice".to_string(),
            OperationClass::Mint,
            1,
            "bob".to_string(),
            100,
        );
        assert_eq!(other, 0, "ids are allocated per subject");
        assert_eq!(workflow.count(&subject()), 2);
    }

    #[test]
    fn test_same_approver_cannot_sign_twice() {
        let workflow = ApprovalWorkflow::new();
        let id = open(&workflow);

        assert_eq!(workflow.approve(&subject(), id, "carol".to_string()).unwrap(), 1);
        let err = workflow
            .approve(&subject(), id, "carol".to_string())
            .unwrap_err();
        assert!(matches!(err, GuardError::InvalidRequest { .. }));

        assert_eq!(workflow.approve(&subject(), id, "dave".to_string()).unwrap(), 2);
    }

    #[test]
    fn test_execute_requires_threshold_and_requester() {
        let workflow = ApprovalWorkflow::new();
        let id = open(&workflow);
        workflow
            .approve(&subject(), id, "carol".to_string())
            .expect("approve");

        // Below threshold
        let err = workflow
            .execute(&subject(), id, &"alice".to_string(), 2)
            .unwrap_err();
        assert!(matches!(err, GuardError::InvalidRequest { .. }));

        workflow
            .approve(&subject(), id, "dave".to_string())
            .expect("approve");

        // Wrong caller
        let err = workflow
            .execute(&subject(), id, &"carol".to_string(), 2)
            .unwrap_err();
        assert!(matches!(err, GuardError::Unauthorized { .. }));

        // Requester with threshold met
        let executed = workflow
            .execute(&subject(), id, &"alice".to_string(), 2)
            .expect("execute");
        assert!(executed.executed);
        assert_eq!(executed.approval_count(), 2);
    }

    #[test]
    fn test_execute_succeeds_at_most_once() {
        let workflow = ApprovalWorkflow::new();
        let id = open(&workflow);
        workflow
            .approve(&subject(), id, "carol".to_string())
            .expect("approve");
        workflow
            .execute(&subject(), id, &"alice".to_string(), 1)
            .expect("first execute");

        let err = workflow
            .execute(&subject(), id, &"alice".to_string(), 1)
            .unwrap_err();
        assert!(matches!(err, GuardError::InvalidRequest { .. }));

        // Sign-offs after execution are rejected as well
        let err = workflow
            .approve(&subject(), id, "erin".to_string())
            .unwrap_err();
        assert!(matches!(err, GuardError::InvalidRequest { .. }));
    }

    #[test]
    fn test_unknown_request_is_not_found() {
        let workflow = ApprovalWorkflow::new();
        let err = workflow
            .approve(&subject(), 7, "carol".to_string())
            .unwrap_err();
        assert!(matches!(err, GuardError::NotFound { .. }));
    }
}
