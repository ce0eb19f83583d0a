//! Event listeners: the side effects of state transitions.
//!
//! Each handler is idempotent and stateless beyond the event payload, so a
//! re-delivered event converges instead of double-executing. Handlers run
//! synchronously after the transition that raised the event has committed;
//! a failing side effect is logged and retried, never rolled back into the
//! transition — unwinding a committed status while other listeners
//! succeeded would be worse than a stalled side effect, which stays visible
//! in the logs until an operator intervenes.

use crate::locks::EntityLockService;
use crate::stop_actions::StopActionService;
use crate::traits::{NotificationService, TaskModule};
use stagegate_store::{ChangeOrderStore, ProjectStore};
use stagegate_types::{
    ActorId, ChangeOrderNumber, EngineResult, GateRegistry, ProjectId, TaskTemplate,
    WorkflowEvent,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Retry policy for stop-action side effects.
#[derive(Clone, Copy, Debug)]
pub struct ListenerConfig {
    /// Attempts per stop-action execution/reversal (including the first)
    pub stop_action_attempts: u32,
    /// Fixed backoff between attempts
    pub stop_action_backoff: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            stop_action_attempts: 3,
            stop_action_backoff: Duration::from_millis(50),
        }
    }
}

/// The engine's listener bindings, dispatched per event.
pub struct ListenerSet {
    locks: Arc<EntityLockService>,
    stop_actions: Arc<StopActionService>,
    change_orders: Arc<ChangeOrderStore>,
    projects: Arc<ProjectStore>,
    registry: Arc<GateRegistry>,
    tasks: Arc<dyn TaskModule>,
    notifier: Arc<dyn NotificationService>,
    config: ListenerConfig,
}

impl ListenerSet {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        locks: Arc<EntityLockService>,
        stop_actions: Arc<StopActionService>,
        change_orders: Arc<ChangeOrderStore>,
        projects: Arc<ProjectStore>,
        registry: Arc<GateRegistry>,
        tasks: Arc<dyn TaskModule>,
        notifier: Arc<dyn NotificationService>,
        config: ListenerConfig,
    ) -> Self {
        Self {
            locks,
            stop_actions,
            change_orders,
            projects,
            registry,
            tasks,
            notifier,
            config,
        }
    }

    /// Route an event to its handler. Handler failures are logged, never
    /// propagated: the raising transition has already committed.
    pub fn dispatch(&self, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::GatePassed {
                project,
                gate,
                actor,
                task_templates,
                ..
            } => self.on_gate_passed(project, gate, actor, task_templates),
            WorkflowEvent::ChangeOrderSubmitted {
                project,
                change_order,
                ..
            } => self.on_submitted(project, change_order),
            WorkflowEvent::ChangeOrderApproved {
                change_order,
                actor,
                ..
            } => self.on_approved(change_order, actor),
            WorkflowEvent::ChangeOrderApplied {
                change_order,
                actor,
                ..
            } => self.on_applied(change_order, actor),
            WorkflowEvent::ChangeOrderCancelled {
                project,
                change_order,
                actor,
                was_approved,
            } => self.on_cancelled(project, change_order, actor, *was_approved),
            _ => {}
        }
    }

    // ── Handlers ─────────────────────────────────────────────────────

    fn on_gate_passed(
        &self,
        project: &ProjectId,
        gate_key: &stagegate_types::GateKey,
        actor: &ActorId,
        task_templates: &[TaskTemplate],
    ) {
        let Some(gate) = self.registry.get(gate_key) else {
            warn!(gate = %gate_key, "gate passed event for unregistered gate");
            return;
        };
        let gate = gate.clone();

        match self.locks.apply_gate_locks(project, &gate, actor) {
            Ok(created) => {
                if !created.is_empty() {
                    info!(project = %project, gate = %gate.key, locks_created = created.len(), "gate locks applied");
                }
            }
            Err(e) => error!(project = %project, gate = %gate.key, error = %e, "gate lock application failed"),
        }

        if gate.creates_tasks_on_pass {
            let spawned = self.tasks.spawn_from_templates(project, task_templates);
            if !spawned.is_empty() {
                info!(project = %project, gate = %gate.key, tasks_created = spawned.len(), "follow-up tasks created");
            }
        }
    }

    fn on_submitted(&self, project: &ProjectId, number: &ChangeOrderNumber) {
        if let Err(e) = self.projects.update(project, |p| {
            p.has_pending_change_order = true;
            p.active_change_order = Some(number.clone());
        }) {
            error!(change_order = %number, error = %e, "could not flag pending change order");
        }

        match self.change_orders.get(number) {
            Some(co) => self.notifier.notify_submitted(&co),
            None => warn!(change_order = %number, "submitted event for unknown change order"),
        }
    }

    fn on_approved(&self, number: &ChangeOrderNumber, actor: &ActorId) {
        let Some(co) = self.change_orders.get(number) else {
            warn!(change_order = %number, "approved event for unknown change order");
            return;
        };

        if let Err(e) = self.locks.unlock_for_change_order(&co, actor) {
            error!(change_order = %number, error = %e, "unlock for change order failed");
        }

        match self.with_retry("execute stop actions", || {
            self.stop_actions.execute_stop_actions(&co, actor)
        }) {
            Ok(summary) => self.notifier.notify_approved(&co, &summary),
            Err(e) => error!(
                change_order = %number,
                error = %e,
                "stop actions exhausted retries; operator intervention required"
            ),
        }
    }

    fn on_applied(&self, number: &ChangeOrderNumber, actor: &ActorId) {
        let Some(co) = self.change_orders.get(number) else {
            warn!(change_order = %number, "applied event for unknown change order");
            return;
        };

        match self.with_retry("revert stop actions", || {
            self.stop_actions.revert_stop_actions(&co, actor)
        }) {
            Ok(summary) => {
                if let Err(e) = self.locks.relock_after_change_order(&co, actor) {
                    error!(change_order = %number, error = %e, "relock after change order failed");
                }
                self.notifier.notify_applied(&co, &summary);
            }
            Err(e) => error!(
                change_order = %number,
                error = %e,
                "stop action reversal exhausted retries; operator intervention required"
            ),
        }
    }

    fn on_cancelled(
        &self,
        project: &ProjectId,
        number: &ChangeOrderNumber,
        actor: &ActorId,
        was_approved: bool,
    ) {
        let Some(co) = self.change_orders.get(number) else {
            warn!(change_order = %number, "cancelled event for unknown change order");
            return;
        };

        if was_approved {
            // Stop actions were executed at approval; undo them and restore
            // the lock, same as the applied path.
            if let Err(e) = self.with_retry("revert stop actions", || {
                self.stop_actions.revert_stop_actions(&co, actor)
            }) {
                error!(change_order = %number, error = %e, "stop action reversal exhausted retries");
            }
            if let Err(e) = self.locks.relock_after_change_order(&co, actor) {
                error!(change_order = %number, error = %e, "relock after cancellation failed");
            }
        } else if let Err(e) = self.projects.update(project, |p| {
            if p.active_change_order.as_ref() == Some(number) {
                p.has_pending_change_order = false;
                p.active_change_order = None;
            }
        }) {
            error!(change_order = %number, error = %e, "could not clear pending change order flag");
        }

        self.notifier.notify_cancelled(&co, was_approved);
    }

    // ── Internal helpers ─────────────────────────────────────────────

    fn with_retry<T>(
        &self,
        what: &str,
        mut f: impl FnMut() -> EngineResult<T>,
    ) -> EngineResult<T> {
        let mut attempt = 1;
        loop {
            match f() {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.config.stop_action_attempts => {
                    warn!(attempt, error = %e, "{what} failed, retrying");
                    attempt += 1;
                    std::thread::sleep(self.config.stop_action_backoff);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
