//! Change order lifecycle: draft → submitted → approved → applied,
//! with cancellation reachable up to approval.

use crate::bus::EventBus;
use crate::enforcement::{EntityMutation, LockGuard};
use crate::listeners::ListenerSet;
use chrono::Utc;
use stagegate_store::{ChangeOrderStore, ProjectStore};
use stagegate_types::{
    ActorId, ChangeOrder, ChangeOrderLine, ChangeOrderNumber, ChangeOrderReason,
    ChangeOrderStatus, EngineError, EngineResult, GateKey, GateRegistry, ProjectId,
    WorkflowEvent,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Input for creating a change order.
pub struct NewChangeOrder {
    pub number: ChangeOrderNumber,
    pub title: String,
    pub reason: ChangeOrderReason,
    /// The gate whose locks the change order suspends. Required.
    pub unlocks_gate: GateKey,
    pub lines: Vec<ChangeOrderLine>,
}

/// Owns the change order state machine.
///
/// Every transition commits the status first, then raises its event; the
/// listeners carry the side effects (unlock, stop actions, relock,
/// notifications). A failed side effect leaves the committed status in
/// place — degraded but recoverable, observable in the logs.
pub struct ChangeOrderService {
    change_orders: Arc<ChangeOrderStore>,
    projects: Arc<ProjectStore>,
    registry: Arc<GateRegistry>,
    guard: Arc<LockGuard>,
    listeners: Arc<ListenerSet>,
    bus: Arc<EventBus>,
}

impl ChangeOrderService {
    pub fn new(
        change_orders: Arc<ChangeOrderStore>,
        projects: Arc<ProjectStore>,
        registry: Arc<GateRegistry>,
        guard: Arc<LockGuard>,
        listeners: Arc<ListenerSet>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            change_orders,
            projects,
            registry,
            guard,
            listeners,
            bus,
        }
    }

    /// Create a draft change order.
    ///
    /// Rejected when the unlock gate is missing or unregistered (a change
    /// order that cannot name the gate it suspends would otherwise release
    /// every lock on the project), or when the project already has a
    /// pending change order.
    pub fn create(
        &self,
        project_id: &ProjectId,
        request: NewChangeOrder,
        requester: &ActorId,
    ) -> EngineResult<ChangeOrder> {
        if self.projects.get(project_id).is_none() {
            return Err(EngineError::ProjectNotFound(project_id.clone()));
        }
        if request.unlocks_gate.is_empty() {
            return Err(EngineError::MissingUnlockGate(request.number));
        }
        if self.registry.get(&request.unlocks_gate).is_none() {
            return Err(EngineError::GateNotFound(request.unlocks_gate));
        }
        if let Some(existing) = self.change_orders.pending_for_project(project_id) {
            return Err(EngineError::PendingChangeOrderExists {
                project: project_id.clone(),
                existing: existing.number,
            });
        }

        let mut change_order = ChangeOrder::new(
            request.number,
            project_id.clone(),
            request.title,
            request.unlocks_gate,
            requester.clone(),
        )
        .with_reason(request.reason);
        for line in request.lines {
            change_order.add_line(line);
        }

        self.change_orders.insert(change_order.clone())?;

        info!(
            change_order = %change_order.number,
            project = %project_id,
            lines = change_order.lines.len(),
            price_delta = change_order.price_delta,
            "change order created"
        );
        let event = WorkflowEvent::ChangeOrderCreated {
            project: project_id.clone(),
            change_order: change_order.number.clone(),
        };
        self.bus.publish(event.clone());
        self.listeners.dispatch(&event);

        Ok(change_order)
    }

    /// Submit a draft for approval.
    pub fn submit(
        &self,
        number: &ChangeOrderNumber,
        actor: &ActorId,
    ) -> EngineResult<ChangeOrder> {
        let current = self.get(number)?;
        self.ensure_transition(&current, ChangeOrderStatus::Submitted)?;

        // The pending slot may have been taken since the draft was created.
        if let Some(existing) = self.change_orders.pending_for_project(&current.project) {
            if existing.number != current.number {
                return Err(EngineError::PendingChangeOrderExists {
                    project: current.project.clone(),
                    existing: existing.number,
                });
            }
        }

        let now = Utc::now();
        let updated =
            self.change_orders
                .transition(number, ChangeOrderStatus::Submitted, |co| {
                    co.submitted_at = Some(now);
                })?;

        info!(change_order = %number, project = %updated.project, "change order submitted");
        let event = WorkflowEvent::ChangeOrderSubmitted {
            project: updated.project.clone(),
            change_order: updated.number.clone(),
            actor: actor.clone(),
        };
        self.bus.publish(event.clone());
        self.listeners.dispatch(&event);

        Ok(updated)
    }

    /// Approve a submitted change order. The approval listener releases the
    /// gate's locks and executes stop actions.
    pub fn approve(
        &self,
        number: &ChangeOrderNumber,
        approver: &ActorId,
    ) -> EngineResult<ChangeOrder> {
        let current = self.get(number)?;
        self.ensure_transition(&current, ChangeOrderStatus::Approved)?;

        let now = Utc::now();
        let actor = approver.clone();
        let updated =
            self.change_orders
                .transition(number, ChangeOrderStatus::Approved, |co| {
                    co.approver = Some(actor);
                    co.approved_at = Some(now);
                })?;

        info!(change_order = %number, approver = %approver, "change order approved");
        let event = WorkflowEvent::ChangeOrderApproved {
            project: updated.project.clone(),
            change_order: updated.number.clone(),
            actor: approver.clone(),
        };
        self.bus.publish(event.clone());
        self.listeners.dispatch(&event);

        Ok(updated)
    }

    /// Apply an approved change order: write its lines under a lock bypass,
    /// then let the applied listener revert stop actions and re-lock.
    pub fn apply(
        &self,
        number: &ChangeOrderNumber,
        applier: &ActorId,
    ) -> EngineResult<ChangeOrder> {
        let current = self.get(number)?;
        self.ensure_transition(&current, ChangeOrderStatus::Applied)?;

        // Line writes go through each entity's save path with enforcement
        // suspended; the lock on these fields is still active until the
        // applied listener re-establishes it under the new gate context.
        for line in current.unapplied_lines() {
            let mutation = EntityMutation::new(line.entity_kind, line.entity_id)
                .for_project(current.project.clone())
                .with_field(&line.field_name);
            self.guard
                .without_lock_check(|| self.guard.check_mutation(&mutation))?;
            debug!(
                change_order = %number,
                entity = %line.entity_kind,
                entity_id = %line.entity_id,
                field = %line.field_name,
                new_value = %line.new_value,
                "change order line applied"
            );
        }

        let now = Utc::now();
        let actor = applier.clone();
        let updated = self
            .change_orders
            .transition(number, ChangeOrderStatus::Applied, |co| {
                for line in co.lines.iter_mut().filter(|l| !l.is_applied) {
                    line.is_applied = true;
                    line.applied_at = Some(now);
                }
                co.applier = Some(actor);
                co.applied_at = Some(now);
            })?;

        info!(
            change_order = %number,
            applier = %applier,
            lines_applied = updated.lines.len(),
            "change order applied"
        );
        let event = WorkflowEvent::ChangeOrderApplied {
            project: updated.project.clone(),
            change_order: updated.number.clone(),
            actor: applier.clone(),
        };
        self.bus.publish(event.clone());
        self.listeners.dispatch(&event);

        Ok(updated)
    }

    /// Cancel a change order that has not reached a terminal state.
    ///
    /// If it had been approved, the cancellation listener reverts the stop
    /// actions and re-locks; otherwise only the pending flag is cleared.
    pub fn cancel(
        &self,
        number: &ChangeOrderNumber,
        actor: &ActorId,
    ) -> EngineResult<ChangeOrder> {
        let current = self.get(number)?;
        self.ensure_transition(&current, ChangeOrderStatus::Cancelled)?;
        let was_approved = current.status == ChangeOrderStatus::Approved;

        let now = Utc::now();
        let updated =
            self.change_orders
                .transition(number, ChangeOrderStatus::Cancelled, |co| {
                    co.cancelled_at = Some(now);
                })?;

        info!(change_order = %number, was_approved, "change order cancelled");
        let event = WorkflowEvent::ChangeOrderCancelled {
            project: updated.project.clone(),
            change_order: updated.number.clone(),
            actor: actor.clone(),
            was_approved,
        };
        self.bus.publish(event.clone());
        self.listeners.dispatch(&event);

        Ok(updated)
    }

    /// Fetch a change order.
    pub fn get(&self, number: &ChangeOrderNumber) -> EngineResult<ChangeOrder> {
        self.change_orders
            .get(number)
            .ok_or_else(|| EngineError::ChangeOrderNotFound(number.clone()))
    }

    fn ensure_transition(
        &self,
        change_order: &ChangeOrder,
        to: ChangeOrderStatus,
    ) -> EngineResult<()> {
        if !change_order.status.can_transition_to(to) {
            return Err(EngineError::InvalidTransition {
                from: change_order.status,
                to,
            });
        }
        Ok(())
    }
}
