//! Gate evaluation: criteria in, audit record and signals out.
//!
//! The evaluator never mutates locks itself — it reports the outcome and
//! raises `GatePassed`/`GateFailed`; the gate-passed listener applies the
//! locks and instantiates follow-up tasks.

use crate::bus::EventBus;
use crate::listeners::ListenerSet;
use stagegate_store::{EvaluationLog, ProjectStore};
use stagegate_types::{
    ActorId, EngineError, EngineResult, FailureReason, Gate, GateEvaluation, GateKey,
    GateRegistry, Project, ProjectId, WorkflowEvent,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Domain pass/fail criteria for a gate, supplied by the application.
///
/// An empty vec means pass. Returning `Err` marks the gate failed with the
/// error as a failure reason — a broken criterion must not crash an
/// evaluation, only fail it.
pub trait GateCriteria: Send + Sync {
    fn check(&self, project: &Project, gate: &Gate) -> Result<Vec<FailureReason>, String>;
}

/// Result of one evaluation: the verdict plus the persisted audit record.
#[derive(Clone, Debug)]
pub struct GateEvaluationOutcome {
    pub passed: bool,
    pub evaluation: GateEvaluation,
    pub failure_reasons: Vec<FailureReason>,
}

/// Pass/fail of one gate within a stage status report.
#[derive(Clone, Debug)]
pub struct GateStatus {
    pub gate: GateKey,
    pub name: String,
    pub blocking: bool,
    pub passed: bool,
    pub failure_reasons: Vec<FailureReason>,
}

/// Evaluates gates against project state.
pub struct GateEvaluator {
    registry: Arc<GateRegistry>,
    criteria: Arc<dyn GateCriteria>,
    evaluations: Arc<EvaluationLog>,
    projects: Arc<ProjectStore>,
    bus: Arc<EventBus>,
    listeners: Arc<ListenerSet>,
}

impl GateEvaluator {
    pub fn new(
        registry: Arc<GateRegistry>,
        criteria: Arc<dyn GateCriteria>,
        evaluations: Arc<EvaluationLog>,
        projects: Arc<ProjectStore>,
        bus: Arc<EventBus>,
        listeners: Arc<ListenerSet>,
    ) -> Self {
        Self {
            registry,
            criteria,
            evaluations,
            projects,
            bus,
            listeners,
        }
    }

    /// Evaluate one gate. Always persists an evaluation record, pass or
    /// fail, then signals the outcome.
    pub fn evaluate(
        &self,
        project_id: &ProjectId,
        gate_key: &GateKey,
        actor: &ActorId,
    ) -> EngineResult<GateEvaluationOutcome> {
        let project = self
            .projects
            .get(project_id)
            .ok_or_else(|| EngineError::ProjectNotFound(project_id.clone()))?;
        let gate = self
            .registry
            .get(gate_key)
            .ok_or_else(|| EngineError::GateNotFound(gate_key.clone()))?
            .clone();

        let failure_reasons = match self.criteria.check(&project, &gate) {
            Ok(reasons) => reasons,
            Err(e) => {
                warn!(project = %project_id, gate = %gate_key, error = %e, "gate criteria check errored");
                vec![FailureReason::new(format!("requirement check failed: {e}"))
                    .with_action("Fix the gate's requirement configuration")]
            }
        };

        let evaluation = GateEvaluation::new(
            project.id.clone(),
            gate.key.clone(),
            failure_reasons.clone(),
            project.context(),
            actor.clone(),
        );
        self.evaluations.append(evaluation.clone())?;
        let passed = evaluation.passed;

        self.bus.publish(WorkflowEvent::GateEvaluated {
            project: project.id.clone(),
            gate: gate.key.clone(),
            passed,
        });

        if passed {
            info!(project = %project_id, gate = %gate_key, "gate passed");
            let event = WorkflowEvent::GatePassed {
                project: project.id.clone(),
                gate: gate.key.clone(),
                actor: actor.clone(),
                applies_design_lock: gate.applies_design_lock,
                applies_procurement_lock: gate.applies_procurement_lock,
                applies_production_lock: gate.applies_production_lock,
                task_templates: gate.task_templates.clone(),
            };
            self.bus.publish(event.clone());
            self.listeners.dispatch(&event);
        } else {
            info!(
                project = %project_id,
                gate = %gate_key,
                reasons = failure_reasons.len(),
                "gate failed"
            );
            let event = WorkflowEvent::GateFailed {
                project: project.id.clone(),
                gate: gate.key.clone(),
                failure_reasons: failure_reasons.clone(),
            };
            self.bus.publish(event.clone());
            self.listeners.dispatch(&event);
        }

        Ok(GateEvaluationOutcome {
            passed,
            evaluation,
            failure_reasons,
        })
    }

    /// Pass/fail for every gate of the project's current stage, in sequence
    /// order. Each check is a full evaluation (recorded, signalled).
    pub fn gate_status(
        &self,
        project_id: &ProjectId,
        actor: &ActorId,
    ) -> EngineResult<Vec<GateStatus>> {
        let project = self
            .projects
            .get(project_id)
            .ok_or_else(|| EngineError::ProjectNotFound(project_id.clone()))?;

        let gates: Vec<Gate> = self
            .registry
            .for_stage(&project.stage_key)
            .into_iter()
            .cloned()
            .collect();

        let mut statuses = Vec::with_capacity(gates.len());
        for gate in gates {
            let outcome = self.evaluate(project_id, &gate.key, actor)?;
            statuses.push(GateStatus {
                gate: gate.key,
                name: gate.name,
                blocking: gate.blocking,
                passed: outcome.passed,
                failure_reasons: outcome.failure_reasons,
            });
        }
        Ok(statuses)
    }

    /// Whether every blocking gate of the current stage passes. Advisory
    /// gates are evaluated but never prevent advance.
    pub fn can_advance(&self, project_id: &ProjectId, actor: &ActorId) -> EngineResult<bool> {
        Ok(self
            .gate_status(project_id, actor)?
            .iter()
            .all(|s| s.passed || !s.blocking))
    }

    /// Failing blocking gates of the current stage, keyed by gate.
    pub fn blockers(
        &self,
        project_id: &ProjectId,
        actor: &ActorId,
    ) -> EngineResult<HashMap<GateKey, Vec<FailureReason>>> {
        Ok(self
            .gate_status(project_id, actor)?
            .into_iter()
            .filter(|s| s.blocking && !s.passed)
            .map(|s| (s.gate, s.failure_reasons))
            .collect())
    }
}
