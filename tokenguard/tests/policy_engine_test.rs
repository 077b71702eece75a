// End-to-end policy engine scenarios
//
// Exercises the engine the way an asset master would: policies created by
// an administrator, operations validated before commit, approval-gated
// classes routed through the multi-party workflow. The clock is driven
// manually so the daily-limit and cooldown arithmetic is deterministic.

use std::sync::Arc;

use tokenguard::auth::{AuthContext, RoleRegistry};
use tokenguard::clock::ManualClock;
use tokenguard::events::AuditEvent;
use tokenguard::policy::PolicyEngine;
use tokenguard::types::error::GuardError;
use tokenguard::types::policy_types::{DenialReason, OperationPolicy};
use tokenguard::types::OperationClass;

fn setup(start: u64) -> (PolicyEngine, Arc<ManualClock>, AuthContext) {
    let clock = Arc::new(ManualClock::new(start));
    let engine = PolicyEngine::new(RoleRegistry::new("root"), clock.clone());
    (engine, clock, AuthContext::new("root"))
}

fn subject() -> String {
    "asset-1".to_string()
}

#[test]
fn test_cooldown_and_daily_limit_cascade() {
    let (engine, clock, admin) = setup(0);
    engine
        .create_policy(
            &admin,
            subject(),
            OperationClass::Transfer,
            OperationPolicy {
                max_amount_per_operation: 1_000,
                daily_limit: 5_000,
                cooldown_period: 3_600,
                ..OperationPolicy::default()
            },
        )
        .expect("create policy");

    let actor = "alice".to_string();
    let validate = |amount: u64| {
        engine.validate_operation(&subject(), &actor, &OperationClass::Transfer, amount)
    };

    // t=0: first operation is allowed, dailyTotal=800
    assert!(validate(800).is_allowed());
    assert_eq!(
        engine
            .usage(&subject(), &OperationClass::Transfer, &actor)
            .daily_total,
        800
    );

    // t=10: denied by the cooldown, counter untouched
    clock.set(10);
    let outcome = validate(800);
    assert_eq!(
        outcome.denial_reason(),
        Some(&DenialReason::CooldownActive { retry_at: 3_600 })
    );
    assert_eq!(
        engine
            .usage(&subject(), &OperationClass::Transfer, &actor)
            .daily_total,
        800
    );

    // t=3601: cooldown elapsed, dailyTotal=1600
    clock.set(3_601);
    assert!(validate(800).is_allowed());
    assert_eq!(
        engine
            .usage(&subject(), &OperationClass::Transfer, &actor)
            .daily_total,
        1_600
    );

    // Four further calls spaced past the cooldown keep accumulating:
    // 2400, 3200, 4000, 4800, all within the limit
    let mut t = 3_601;
    for expected_total in [2_400, 3_200, 4_000, 4_800] {
        t += 3_700;
        clock.set(t);
        assert!(validate(800).is_allowed(), "total {} should pass", expected_total);
        assert_eq!(
            engine
                .usage(&subject(), &OperationClass::Transfer, &actor)
                .daily_total,
            expected_total
        );
    }

    // The call that would push past 5000 is denied at exactly that point
    t += 3_700;
    clock.set(t);
    assert!(t < 86_400, "scenario must stay within one epoch day");
    let outcome = validate(800);
    assert_eq!(
        outcome.denial_reason(),
        Some(&DenialReason::ExceedsDailyLimit {
            amount: 800,
            remaining: 200
        })
    );

    // The remaining 200 is still spendable today
    assert!(validate(200).is_allowed());

    // A new epoch day resets the counter before the first check
    clock.set(86_400 + 10);
    assert!(validate(800).is_allowed());
    assert_eq!(
        engine
            .usage(&subject(), &OperationClass::Transfer, &actor)
            .daily_total,
        800
    );
}

#[test]
fn test_cooldown_eligibility_boundary() {
    let (engine, clock, admin) = setup(1_000);
    engine
        .create_policy(
            &admin,
            subject(),
            OperationClass::Redeem,
            OperationPolicy {
                cooldown_period: 600,
                ..OperationPolicy::default()
            },
        )
        .expect("create policy");

    let actor = "alice".to_string();
    assert!(engine
        .validate_operation(&subject(), &actor, &OperationClass::Redeem, 1)
        .is_allowed());

    // Strictly before T+C: denied
    clock.set(1_599);
    assert!(!engine
        .validate_operation(&subject(), &actor, &OperationClass::Redeem, 1)
        .is_allowed());

    // At exactly T+C: eligible again
    clock.set(1_600);
    assert!(engine
        .validate_operation(&subject(), &actor, &OperationClass::Redeem, 1)
        .is_allowed());
}

#[test]
fn test_cooldown_is_scoped_per_actor() {
    let (engine, _clock, admin) = setup(0);
    engine
        .create_policy(
            &admin,
            subject(),
            OperationClass::Transfer,
            OperationPolicy {
                cooldown_period: 3_600,
                ..OperationPolicy::default()
            },
        )
        .expect("create policy");

    assert!(engine
        .validate_operation(&subject(), &"alice".to_string(), &OperationClass::Transfer, 1)
        .is_allowed());

    // A different actor has its own counter key
    assert!(engine
        .validate_operation(&subject(), &"bob".to_string(), &OperationClass::Transfer, 1)
        .is_allowed());

    // Alice herself is in cooldown
    assert!(!engine
        .validate_operation(&subject(), &"alice".to_string(), &OperationClass::Transfer, 1)
        .is_allowed());
}

#[test]
fn test_approval_workflow_end_to_end() {
    let (engine, _clock, admin) = setup(0);
    engine
        .create_policy(
            &admin,
            subject(),
            OperationClass::Mint,
            OperationPolicy {
                requires_approval: true,
                approval_threshold: 2,
                ..OperationPolicy::default()
            },
        )
        .expect("create policy");
    engine
        .add_approver(&admin, "carol".to_string())
        .expect("add carol");
    engine
        .add_approver(&admin, "dave".to_string())
        .expect("add dave");

    // The direct path is denied unconditionally for approval-gated classes
    let outcome =
        engine.validate_operation(&subject(), &"alice".to_string(), &OperationClass::Mint, 500);
    assert_eq!(
        outcome.denial_reason(),
        Some(&DenialReason::RequiresApproval)
    );

    let request_id = engine
        .request_approval(
            subject(),
            "alice".to_string(),
            OperationClass::Mint,
            500,
            "bob".to_string(),
        )
        .expect("request approval");
    assert_eq!(request_id, 0);

    // Non-approvers cannot sign off
    let err = engine
        .approve_request(&AuthContext::new("mallory"), &subject(), request_id)
        .unwrap_err();
    assert!(matches!(err, GuardError::Unauthorized { .. }));

    // Execution before the threshold is rejected
    engine
        .approve_request(&AuthContext::new("carol"), &subject(), request_id)
        .expect("carol approves");
    let err = engine
        .execute_approved_request(&AuthContext::new("alice"), &subject(), request_id)
        .unwrap_err();
    assert!(matches!(err, GuardError::InvalidRequest { .. }));

    // The same approver cannot be counted twice
    let err = engine
        .approve_request(&AuthContext::new("carol"), &subject(), request_id)
        .unwrap_err();
    assert!(matches!(err, GuardError::InvalidRequest { .. }));

    engine
        .approve_request(&AuthContext::new("dave"), &subject(), request_id)
        .expect("dave approves");

    // Only the requester may execute
    let err = engine
        .execute_approved_request(&AuthContext::new("carol"), &subject(), request_id)
        .unwrap_err();
    assert!(matches!(err, GuardError::Unauthorized { .. }));

    engine
        .execute_approved_request(&AuthContext::new("alice"), &subject(), request_id)
        .expect("execute");

    // At most once per request
    let err = engine
        .execute_approved_request(&AuthContext::new("alice"), &subject(), request_id)
        .unwrap_err();
    assert!(matches!(err, GuardError::InvalidRequest { .. }));

    let request = engine
        .approvals()
        .get(&subject(), request_id)
        .expect("request exists");
    assert!(request.executed);
}

#[test]
fn test_every_denial_is_audited() {
    let (engine, _clock, admin) = setup(1_000);
    engine
        .create_policy(
            &admin,
            subject(),
            OperationClass::Transfer,
            OperationPolicy {
                max_amount_per_operation: 100,
                ..OperationPolicy::default()
            },
        )
        .expect("create policy");

    let before = engine.events().len();
    let outcome = engine.validate_operation(
        &subject(),
        &"alice".to_string(),
        &OperationClass::Transfer,
        500,
    );
    assert!(!outcome.is_allowed());

    let events = engine.events().snapshot();
    assert!(events.len() > before);
    assert!(
        events.iter().any(|event| matches!(
            event,
            AuditEvent::PolicyViolation { subject: s, actor, .. }
                if s == "asset-1" && actor == "alice"
        )),
        "a denial must leave a PolicyViolation event"
    );
}

#[test]
fn test_whitelist_admin_surface() {
    let (engine, _clock, admin) = setup(0);
    let class = OperationClass::Transfer;

    engine
        .add_to_whitelist(&admin, subject(), class.clone(), "alice".to_string())
        .expect("add");
    let err = engine
        .add_to_whitelist(&admin, subject(), class.clone(), "alice".to_string())
        .unwrap_err();
    assert!(matches!(err, GuardError::InvalidRequest { .. }));

    let added = engine
        .add_batch_to_whitelist(
            &admin,
            subject(),
            class.clone(),
            vec![
                "alice".to_string(),
                String::new(),
                "bob".to_string(),
            ],
        )
        .expect("batch add");
    assert_eq!(added, 1, "batch skips the duplicate and the zero account");

    engine
        .remove_from_whitelist(&admin, subject(), class.clone(), &"alice".to_string())
        .expect("remove");
    let err = engine
        .remove_from_whitelist(&admin, subject(), class.clone(), &"alice".to_string())
        .unwrap_err();
    assert!(matches!(err, GuardError::InvalidRequest { .. }));

    assert!(engine.is_whitelisted(&subject(), &class, &"bob".to_string()));

    // The whole surface is role-gated
    let outsider = AuthContext::new("mallory");
    let err = engine
        .add_to_whitelist(&outsider, subject(), class, "eve".to_string())
        .unwrap_err();
    assert!(matches!(err, GuardError::Unauthorized { .. }));
}

#[test]
fn test_deactivated_policy_stops_enforcing() {
    let (engine, _clock, admin) = setup(0);
    engine
        .create_policy(
            &admin,
            subject(),
            OperationClass::Burn,
            OperationPolicy {
                max_amount_per_operation: 10,
                ..OperationPolicy::default()
            },
        )
        .expect("create policy");

    assert!(!engine
        .validate_operation(&subject(), &"alice".to_string(), &OperationClass::Burn, 100)
        .is_allowed());

    engine
        .update_policy(
            &admin,
            subject(),
            OperationClass::Burn,
            OperationPolicy {
                active: false,
                max_amount_per_operation: 10,
                ..OperationPolicy::default()
            },
        )
        .expect("deactivate");

    assert!(engine
        .validate_operation(&subject(), &"alice".to_string(), &OperationClass::Burn, 100)
        .is_allowed());
}

#[test]
fn test_time_restrictions_via_admin_surface() {
    let (engine, clock, admin) = setup(0);
    engine
        .create_policy(
            &admin,
            subject(),
            OperationClass::Transfer,
            OperationPolicy::default(),
        )
        .expect("create policy");
    engine
        .set_time_restrictions(&admin, subject(), OperationClass::Transfer, 2_000, 3_000)
        .expect("set window");

    // Inverted windows are rejected
    let err = engine
        .set_time_restrictions(&admin, subject(), OperationClass::Transfer, 3_000, 2_000)
        .unwrap_err();
    assert!(matches!(err, GuardError::InvalidRequest { .. }));

    clock.set(1_000);
    let outcome = engine.validate_operation(
        &subject(),
        &"alice".to_string(),
        &OperationClass::Transfer,
        1,
    );
    assert!(!outcome.is_allowed());
    assert!(engine.events().snapshot().iter().any(|event| matches!(
        event,
        AuditEvent::TimeRestrictionViolation { .. }
    )));

    clock.set(2_500);
    assert!(engine
        .validate_operation(&subject(), &"alice".to_string(), &OperationClass::Transfer, 1)
        .is_allowed());
}
