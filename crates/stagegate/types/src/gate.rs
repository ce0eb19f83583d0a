//! Gate configuration and evaluation records.

use crate::{ActorId, GateKey, LockCategory, ProjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Template for a task instantiated when a gate passes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub name: String,
    /// Stable type key used for dedup when a gate is re-evaluated
    pub task_type: String,
    pub sequence: u32,
}

impl TaskTemplate {
    pub fn new(name: impl Into<String>, task_type: impl Into<String>, sequence: u32) -> Self {
        Self {
            name: name.into(),
            task_type: task_type.into(),
            sequence,
        }
    }
}

/// A named checkpoint in a project's stage progression.
///
/// Gates are configuration data: immutable once referenced by an active lock
/// or change order. Which locks activate on pass is part of the gate itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Gate {
    pub key: GateKey,
    pub name: String,
    /// Stage this gate belongs to; evaluation is isolated per stage
    pub stage_key: String,
    pub sequence: u32,
    /// Blocking gates prevent stage advance on failure; advisory gates do not
    pub blocking: bool,
    pub applies_design_lock: bool,
    pub applies_procurement_lock: bool,
    pub applies_production_lock: bool,
    pub creates_tasks_on_pass: bool,
    pub task_templates: Vec<TaskTemplate>,
}

impl Gate {
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        stage_key: impl Into<String>,
    ) -> Self {
        Self {
            key: GateKey::new(key),
            name: name.into(),
            stage_key: stage_key.into(),
            sequence: 0,
            blocking: true,
            applies_design_lock: false,
            applies_procurement_lock: false,
            applies_production_lock: false,
            creates_tasks_on_pass: false,
            task_templates: Vec::new(),
        }
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn advisory(mut self) -> Self {
        self.blocking = false;
        self
    }

    pub fn with_design_lock(mut self) -> Self {
        self.applies_design_lock = true;
        self
    }

    pub fn with_procurement_lock(mut self) -> Self {
        self.applies_procurement_lock = true;
        self
    }

    pub fn with_production_lock(mut self) -> Self {
        self.applies_production_lock = true;
        self
    }

    pub fn with_task_template(mut self, template: TaskTemplate) -> Self {
        self.creates_tasks_on_pass = true;
        self.task_templates.push(template);
        self
    }

    /// Whether passing this gate activates any lock category.
    pub fn applies_any_lock(&self) -> bool {
        self.applies_design_lock || self.applies_procurement_lock || self.applies_production_lock
    }

    /// The lock categories this gate activates, in application order.
    pub fn lock_categories(&self) -> Vec<LockCategory> {
        let mut categories = Vec::new();
        if self.applies_design_lock {
            categories.push(LockCategory::Design);
        }
        if self.applies_procurement_lock {
            categories.push(LockCategory::Procurement);
        }
        if self.applies_production_lock {
            categories.push(LockCategory::Production);
        }
        categories
    }
}

/// Why a gate evaluation failed, with remediation hints for the UI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

impl FailureReason {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            help_text: None,
            suggested_action: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help_text = Some(help.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.suggested_action = Some(action.into());
        self
    }
}

/// Append-only audit record of one gate evaluation attempt.
///
/// Created every time a gate is checked, pass or fail; never mutated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GateEvaluation {
    pub id: uuid::Uuid,
    pub project: ProjectId,
    pub gate: GateKey,
    pub passed: bool,
    pub failure_reasons: Vec<FailureReason>,
    /// Snapshot of headline project state at evaluation time
    pub context: HashMap<String, String>,
    pub evaluated_at: DateTime<Utc>,
    pub evaluated_by: ActorId,
}

impl GateEvaluation {
    pub fn new(
        project: ProjectId,
        gate: GateKey,
        failure_reasons: Vec<FailureReason>,
        context: HashMap<String, String>,
        evaluated_by: ActorId,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            project,
            gate,
            passed: failure_reasons.is_empty(),
            failure_reasons,
            context,
            evaluated_at: Utc::now(),
            evaluated_by,
        }
    }
}

/// Registry of configured gates, keyed by gate key and grouped by stage.
#[derive(Debug, Default)]
pub struct GateRegistry {
    gates: Vec<Gate>,
}

impl GateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a gate. Keys must be unique.
    pub fn register(&mut self, gate: Gate) -> Result<(), crate::EngineError> {
        if self.gates.iter().any(|g| g.key == gate.key) {
            return Err(crate::EngineError::DuplicateGate(gate.key));
        }
        self.gates.push(gate);
        Ok(())
    }

    pub fn get(&self, key: &GateKey) -> Option<&Gate> {
        self.gates.iter().find(|g| &g.key == key)
    }

    /// Gates of a stage, ordered by sequence.
    pub fn for_stage(&self, stage_key: &str) -> Vec<&Gate> {
        let mut gates: Vec<&Gate> = self
            .gates
            .iter()
            .filter(|g| g.stage_key == stage_key)
            .collect();
        gates.sort_by_key(|g| g.sequence);
        gates
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_categories_follow_flags() {
        let gate = Gate::new("design_signoff", "Design Sign-Off", "design")
            .with_design_lock()
            .with_procurement_lock();

        assert!(gate.applies_any_lock());
        let categories = gate.lock_categories();
        assert_eq!(categories.len(), 2);
        assert!(categories.contains(&LockCategory::Design));
        assert!(categories.contains(&LockCategory::Procurement));
        assert!(!categories.contains(&LockCategory::Production));
    }

    #[test]
    fn adding_template_marks_task_creation() {
        let gate = Gate::new("production_start", "Production Start", "production")
            .with_task_template(TaskTemplate::new("Cut parts", "cut_parts", 1))
            .with_task_template(TaskTemplate::new("Assemble", "assembly", 2));

        assert!(gate.creates_tasks_on_pass);
        assert_eq!(gate.task_templates.len(), 2);
    }

    #[test]
    fn registry_rejects_duplicate_keys() {
        let mut registry = GateRegistry::new();
        registry
            .register(Gate::new("design_signoff", "Design Sign-Off", "design"))
            .unwrap();

        let err = registry
            .register(Gate::new("design_signoff", "Other", "design"))
            .unwrap_err();
        assert!(matches!(err, crate::EngineError::DuplicateGate(_)));
    }

    #[test]
    fn stage_gates_are_isolated_and_ordered() {
        let mut registry = GateRegistry::new();
        registry
            .register(Gate::new("rooms_defined", "Rooms Defined", "discovery").with_sequence(2))
            .unwrap();
        registry
            .register(Gate::new("customer_assigned", "Customer Assigned", "discovery").with_sequence(1))
            .unwrap();
        registry
            .register(Gate::new("design_signoff", "Design Sign-Off", "design"))
            .unwrap();

        let discovery = registry.for_stage("discovery");
        assert_eq!(discovery.len(), 2);
        assert_eq!(discovery[0].key, GateKey::new("customer_assigned"));
        assert_eq!(discovery[1].key, GateKey::new("rooms_defined"));
    }

    #[test]
    fn evaluation_passes_without_reasons() {
        let eval = GateEvaluation::new(
            ProjectId::new("p1"),
            GateKey::new("design_signoff"),
            vec![],
            HashMap::new(),
            ActorId::new("alice"),
        );
        assert!(eval.passed);

        let failed = GateEvaluation::new(
            ProjectId::new("p1"),
            GateKey::new("design_signoff"),
            vec![FailureReason::new("missing drawings")],
            HashMap::new(),
            ActorId::new("alice"),
        );
        assert!(!failed.passed);
    }
}
