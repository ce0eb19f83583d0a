//! Append-only log of gate evaluations.

use stagegate_types::{GateEvaluation, GateKey, ProjectId, StoreError};
use std::sync::RwLock;

/// Audit trail of every gate evaluation ever run, pass or fail.
///
/// No delete or modify operations exist.
#[derive(Default)]
pub struct EvaluationLog {
    records: RwLock<Vec<GateEvaluation>>,
}

impl EvaluationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, evaluation: GateEvaluation) -> Result<(), StoreError> {
        let mut guard = self
            .records
            .write()
            .map_err(|_| StoreError::Poisoned("evaluation log"))?;
        guard.push(evaluation);
        Ok(())
    }

    pub fn for_project(&self, project: &ProjectId) -> Vec<GateEvaluation> {
        self.records
            .read()
            .map(|guard| {
                guard
                    .iter()
                    .filter(|e| &e.project == project)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn for_gate(&self, project: &ProjectId, gate: &GateKey) -> Vec<GateEvaluation> {
        self.records
            .read()
            .map(|guard| {
                guard
                    .iter()
                    .filter(|e| &e.project == project && &e.gate == gate)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Most recent evaluation of a gate, if any.
    pub fn latest(&self, project: &ProjectId, gate: &GateKey) -> Option<GateEvaluation> {
        self.for_gate(project, gate).into_iter().last()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagegate_types::ActorId;
    use std::collections::HashMap;

    fn evaluation(passed: bool) -> GateEvaluation {
        let reasons = if passed {
            vec![]
        } else {
            vec![stagegate_types::FailureReason::new("rooms missing")]
        };
        GateEvaluation::new(
            ProjectId::new("p1"),
            GateKey::new("design_signoff"),
            reasons,
            HashMap::new(),
            ActorId::new("alice"),
        )
    }

    #[test]
    fn every_check_is_recorded() {
        let log = EvaluationLog::new();
        log.append(evaluation(false)).unwrap();
        log.append(evaluation(false)).unwrap();
        log.append(evaluation(true)).unwrap();

        assert_eq!(log.for_project(&ProjectId::new("p1")).len(), 3);
        let latest = log
            .latest(&ProjectId::new("p1"), &GateKey::new("design_signoff"))
            .unwrap();
        assert!(latest.passed);
    }
}
