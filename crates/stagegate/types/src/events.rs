//! Workflow events raised by state transitions.
//!
//! Events decouple transitions from their side effects. Listeners must be
//! idempotent and stateless beyond the event payload: the queued delivery
//! path assumes at-least-once semantics.

use crate::{ActorId, ChangeOrderNumber, FailureReason, GateKey, ProjectId, TaskTemplate};
use serde::{Deserialize, Serialize};

/// Every event the workflow core emits.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    GateEvaluated {
        project: ProjectId,
        gate: GateKey,
        passed: bool,
    },
    GatePassed {
        project: ProjectId,
        gate: GateKey,
        actor: ActorId,
        applies_design_lock: bool,
        applies_procurement_lock: bool,
        applies_production_lock: bool,
        task_templates: Vec<TaskTemplate>,
    },
    GateFailed {
        project: ProjectId,
        gate: GateKey,
        failure_reasons: Vec<FailureReason>,
    },
    DesignLocked {
        project: ProjectId,
        gate: GateKey,
        locks_created: usize,
    },
    ProcurementLocked {
        project: ProjectId,
        gate: GateKey,
        locks_created: usize,
    },
    ProductionLocked {
        project: ProjectId,
        gate: GateKey,
        locks_created: usize,
    },
    ChangeOrderCreated {
        project: ProjectId,
        change_order: ChangeOrderNumber,
    },
    ChangeOrderSubmitted {
        project: ProjectId,
        change_order: ChangeOrderNumber,
        actor: ActorId,
    },
    ChangeOrderApproved {
        project: ProjectId,
        change_order: ChangeOrderNumber,
        actor: ActorId,
    },
    ChangeOrderApplied {
        project: ProjectId,
        change_order: ChangeOrderNumber,
        actor: ActorId,
    },
    ChangeOrderCancelled {
        project: ProjectId,
        change_order: ChangeOrderNumber,
        actor: ActorId,
        /// Whether stop actions were in effect (order had reached approved)
        was_approved: bool,
    },
}

impl WorkflowEvent {
    /// Stable name used for counters and log lines.
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowEvent::GateEvaluated { .. } => "gate_evaluated",
            WorkflowEvent::GatePassed { .. } => "gate_passed",
            WorkflowEvent::GateFailed { .. } => "gate_failed",
            WorkflowEvent::DesignLocked { .. } => "design_locked",
            WorkflowEvent::ProcurementLocked { .. } => "procurement_locked",
            WorkflowEvent::ProductionLocked { .. } => "production_locked",
            WorkflowEvent::ChangeOrderCreated { .. } => "change_order_created",
            WorkflowEvent::ChangeOrderSubmitted { .. } => "change_order_submitted",
            WorkflowEvent::ChangeOrderApproved { .. } => "change_order_approved",
            WorkflowEvent::ChangeOrderApplied { .. } => "change_order_applied",
            WorkflowEvent::ChangeOrderCancelled { .. } => "change_order_cancelled",
        }
    }

    /// The project the event belongs to.
    pub fn project(&self) -> &ProjectId {
        match self {
            WorkflowEvent::GateEvaluated { project, .. }
            | WorkflowEvent::GatePassed { project, .. }
            | WorkflowEvent::GateFailed { project, .. }
            | WorkflowEvent::DesignLocked { project, .. }
            | WorkflowEvent::ProcurementLocked { project, .. }
            | WorkflowEvent::ProductionLocked { project, .. }
            | WorkflowEvent::ChangeOrderCreated { project, .. }
            | WorkflowEvent::ChangeOrderSubmitted { project, .. }
            | WorkflowEvent::ChangeOrderApproved { project, .. }
            | WorkflowEvent::ChangeOrderApplied { project, .. }
            | WorkflowEvent::ChangeOrderCancelled { project, .. } => project,
        }
    }
}
