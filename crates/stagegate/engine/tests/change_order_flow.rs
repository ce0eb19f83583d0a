//! End-to-end change order scenarios: lock, suspend, edit, resume.

mod common;

use common::{project_id, rig, width_change_request};
use stagegate_engine::EntityMutation;
use stagegate_types::{
    ActorId, ChangeOrderNumber, ChangeOrderStatus, EngineError, EntityId, EntityKind, GateKey,
    WorkflowEvent,
};

fn alice() -> ActorId {
    ActorId::new("alice")
}

fn width_mutation() -> EntityMutation {
    EntityMutation::new(EntityKind::Cabinet, EntityId(12))
        .for_project(project_id())
        .with_field("width_mm")
}

/// Scenario A: a passing design gate locks the design entity set and a
/// cabinet width edit is rejected, naming the gate.
#[test]
fn passing_design_gate_locks_and_blocks_edits() {
    let rig = rig();

    let outcome = rig
        .evaluator
        .evaluate(&project_id(), &GateKey::new("design_signoff"), &alice())
        .unwrap();
    assert!(outcome.passed);

    // One active lock per design entity kind
    let active = rig.lock_service.active_locks(&project_id());
    assert_eq!(active.len(), 6);
    assert!(rig.projects.get(&project_id()).unwrap().is_design_locked());

    let err = rig.guard.check_mutation(&width_mutation()).unwrap_err();
    let EngineError::LockViolation(violation) = err else {
        panic!("expected lock violation, got something else");
    };
    assert_eq!(violation.gate, GateKey::new("design_signoff"));
    assert!(violation.to_string().contains("design_signoff"));

    // Exempt fields stay editable on the locked entity
    let qc = EntityMutation::new(EntityKind::Cabinet, EntityId(12))
        .for_project(project_id())
        .with_field("qc_notes");
    rig.guard.check_mutation(&qc).unwrap();
}

/// Scenario B: submit → approve blocks the affected set; apply reverts it
/// and re-establishes the lock under the same gate.
#[test]
fn approved_change_order_suspends_work_and_apply_resumes_it() {
    let rig = rig();
    let actor = alice();

    rig.evaluator
        .evaluate(&project_id(), &GateKey::new("design_signoff"), &actor)
        .unwrap();

    let co = rig
        .change_orders
        .create(&project_id(), width_change_request("CO-001"), &actor)
        .unwrap();
    assert_eq!(co.status, ChangeOrderStatus::Draft);
    assert!((co.price_delta - 140.0).abs() < f64::EPSILON);

    rig.change_orders.submit(&co.number, &actor).unwrap();
    assert!(rig.projects.get(&project_id()).unwrap().has_pending_change_order);
    assert_eq!(rig.notifier.submitted().len(), 1);

    rig.change_orders.approve(&co.number, &ActorId::new("bob")).unwrap();

    // Stop actions: two blockable tasks, two holdable POs, delivery blocked
    assert_eq!(rig.tasks.blocked_count(&project_id()), 2);
    assert_eq!(rig.purchasing.held_count(&project_id()), 2);
    assert!(rig.delivery.is_blocked(&project_id()));

    let (notified, summary) = rig.notifier.approved().pop().unwrap();
    assert_eq!(notified, co.number);
    assert_eq!(summary.tasks_blocked, 2);
    assert_eq!(summary.pos_held, 2);
    assert!(summary.delivery_blocked);

    // Locks are released while the change order is in flight
    assert!(rig.lock_service.active_locks(&project_id()).is_empty());
    rig.guard.check_mutation(&width_mutation()).unwrap();

    let applied = rig.change_orders.apply(&co.number, &actor).unwrap();
    assert_eq!(applied.status, ChangeOrderStatus::Applied);
    assert!(applied.lines.iter().all(|l| l.is_applied));

    // Work resumes and the lock is back under the same gate
    assert_eq!(rig.tasks.blocked_count(&project_id()), 0);
    assert_eq!(rig.purchasing.held_count(&project_id()), 0);
    assert!(!rig.delivery.is_blocked(&project_id()));
    assert_eq!(rig.lock_service.active_locks(&project_id()).len(), 6);
    assert!(rig.guard.check_mutation(&width_mutation()).is_err());
    assert!(!rig.projects.get(&project_id()).unwrap().has_pending_change_order);
    assert_eq!(rig.notifier.applied().len(), 1);
}

/// Scenario C: a change order cancelled before approval touches nothing.
#[test]
fn cancelling_before_approval_touches_no_work() {
    let rig = rig();
    let actor = alice();

    let co = rig
        .change_orders
        .create(&project_id(), width_change_request("CO-002"), &actor)
        .unwrap();
    rig.change_orders.submit(&co.number, &actor).unwrap();
    assert!(rig.projects.get(&project_id()).unwrap().has_pending_change_order);

    rig.change_orders.cancel(&co.number, &actor).unwrap();

    assert!(!rig.projects.get(&project_id()).unwrap().has_pending_change_order);
    assert_eq!(rig.tasks.blocked_count(&project_id()), 0);
    assert_eq!(rig.purchasing.held_count(&project_id()), 0);
    assert!(!rig.delivery.is_blocked(&project_id()));
    assert_eq!(rig.notifier.cancelled(), vec![(co.number, false)]);
}

/// Scenario D: cancelling an approved change order reverts stop actions
/// exactly like the applied path, and re-locks.
#[test]
fn cancelling_after_approval_reverts_stop_actions() {
    let rig = rig();
    let actor = alice();

    rig.evaluator
        .evaluate(&project_id(), &GateKey::new("design_signoff"), &actor)
        .unwrap();
    let states_before = rig.tasks.states(&project_id());

    let co = rig
        .change_orders
        .create(&project_id(), width_change_request("CO-003"), &actor)
        .unwrap();
    rig.change_orders.submit(&co.number, &actor).unwrap();
    rig.change_orders.approve(&co.number, &actor).unwrap();
    assert_eq!(rig.tasks.blocked_count(&project_id()), 2);

    rig.change_orders.cancel(&co.number, &actor).unwrap();

    assert_eq!(rig.tasks.blocked_count(&project_id()), 0);
    assert_eq!(rig.tasks.states(&project_id()), states_before);
    assert_eq!(rig.purchasing.held_count(&project_id()), 0);
    assert!(!rig.delivery.is_blocked(&project_id()));
    assert_eq!(rig.lock_service.active_locks(&project_id()).len(), 6);
    assert_eq!(rig.notifier.cancelled(), vec![(co.number, true)]);
}

#[test]
fn one_pending_change_order_per_project() {
    let rig = rig();
    let actor = alice();

    let first = rig
        .change_orders
        .create(&project_id(), width_change_request("CO-001"), &actor)
        .unwrap();
    rig.change_orders.submit(&first.number, &actor).unwrap();

    let err = rig
        .change_orders
        .create(&project_id(), width_change_request("CO-002"), &actor)
        .unwrap_err();
    assert!(matches!(err, EngineError::PendingChangeOrderExists { .. }));
}

#[test]
fn change_order_must_name_its_gate() {
    let rig = rig();

    let mut request = width_change_request("CO-001");
    request.unlocks_gate = GateKey::new("");
    let err = rig
        .change_orders
        .create(&project_id(), request, &alice())
        .unwrap_err();
    assert!(matches!(err, EngineError::MissingUnlockGate(_)));

    let mut unknown = width_change_request("CO-002");
    unknown.unlocks_gate = GateKey::new("no_such_gate");
    let err = rig
        .change_orders
        .create(&project_id(), unknown, &alice())
        .unwrap_err();
    assert!(matches!(err, EngineError::GateNotFound(_)));
}

#[test]
fn illegal_transitions_are_rejected() {
    let rig = rig();
    let actor = alice();

    let co = rig
        .change_orders
        .create(&project_id(), width_change_request("CO-001"), &actor)
        .unwrap();

    // Draft cannot be approved or applied directly
    assert!(matches!(
        rig.change_orders.approve(&co.number, &actor).unwrap_err(),
        EngineError::InvalidTransition { .. }
    ));
    assert!(matches!(
        rig.change_orders.apply(&co.number, &actor).unwrap_err(),
        EngineError::InvalidTransition { .. }
    ));

    rig.change_orders.submit(&co.number, &actor).unwrap();
    rig.change_orders.approve(&co.number, &actor).unwrap();
    rig.change_orders.apply(&co.number, &actor).unwrap();

    // Applied is terminal
    assert!(matches!(
        rig.change_orders.cancel(&co.number, &actor).unwrap_err(),
        EngineError::InvalidTransition { .. }
    ));
}

#[test]
fn transient_stop_action_failure_is_retried() {
    let rig = rig();
    let actor = alice();

    rig.evaluator
        .evaluate(&project_id(), &GateKey::new("design_signoff"), &actor)
        .unwrap();
    let co = rig
        .change_orders
        .create(&project_id(), width_change_request("CO-001"), &actor)
        .unwrap();
    rig.change_orders.submit(&co.number, &actor).unwrap();

    // First hold attempt fails; the listener's retry finishes the job
    rig.purchasing.fail_next_holds(1);
    rig.change_orders.approve(&co.number, &actor).unwrap();

    assert_eq!(rig.tasks.blocked_count(&project_id()), 2);
    assert_eq!(rig.purchasing.held_count(&project_id()), 2);
    let (_, summary) = rig.notifier.approved().pop().unwrap();
    assert_eq!(summary.pos_held, 2);
}

#[test]
fn redelivered_approval_event_converges() {
    let rig = rig();
    let actor = alice();

    rig.evaluator
        .evaluate(&project_id(), &GateKey::new("design_signoff"), &actor)
        .unwrap();
    let co = rig
        .change_orders
        .create(&project_id(), width_change_request("CO-001"), &actor)
        .unwrap();
    rig.change_orders.submit(&co.number, &actor).unwrap();
    rig.change_orders.approve(&co.number, &actor).unwrap();
    assert_eq!(rig.tasks.blocked_count(&project_id()), 2);

    // At-least-once delivery: the same event arrives again
    rig.listeners.dispatch(&WorkflowEvent::ChangeOrderApproved {
        project: project_id(),
        change_order: co.number.clone(),
        actor: actor.clone(),
    });

    assert_eq!(rig.tasks.blocked_count(&project_id()), 2);
    assert_eq!(rig.purchasing.held_count(&project_id()), 2);
    let second = rig.notifier.approved().pop().unwrap().1;
    assert_eq!(second.tasks_blocked, 0);
}

#[test]
fn lifecycle_events_are_published_in_order() {
    let rig = rig();
    let actor = alice();

    let co = rig
        .change_orders
        .create(&project_id(), width_change_request("CO-001"), &actor)
        .unwrap();
    rig.change_orders.submit(&co.number, &actor).unwrap();
    rig.change_orders.approve(&co.number, &actor).unwrap();
    rig.change_orders.apply(&co.number, &actor).unwrap();

    let names: Vec<&'static str> = rig
        .bus
        .events()
        .iter()
        .map(|e| e.name())
        .filter(|n| n.starts_with("change_order"))
        .collect();
    assert_eq!(
        names,
        vec![
            "change_order_created",
            "change_order_submitted",
            "change_order_approved",
            "change_order_applied",
        ]
    );
}

#[test]
fn apply_stamps_lines_and_restores_the_lock_set() {
    let rig = rig();
    let actor = alice();

    rig.evaluator
        .evaluate(&project_id(), &GateKey::new("design_signoff"), &actor)
        .unwrap();
    let co = rig
        .change_orders
        .create(&project_id(), width_change_request("CO-001"), &actor)
        .unwrap();
    rig.change_orders.submit(&co.number, &actor).unwrap();
    rig.change_orders.approve(&co.number, &actor).unwrap();
    rig.change_orders.apply(&co.number, &actor).unwrap();

    assert_eq!(rig.lock_service.active_locks(&project_id()).len(), 6);

    let stored = rig
        .change_order_store
        .get(&ChangeOrderNumber::new("CO-001"))
        .unwrap();
    assert!(stored.lines.iter().all(|l| l.is_applied && l.applied_at.is_some()));
    assert!(stored.applier.is_some());
}
