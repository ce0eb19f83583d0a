//! Error types for the workflow core.

use crate::{
    ChangeOrderNumber, ChangeOrderStatus, EntityId, EntityKind, GateKey, LockLevel, ProjectId,
};
use chrono::{DateTime, Utc};

/// A mutation touched fields frozen by an active lock.
///
/// Carries the full context a caller needs to act: the entity, the offending
/// fields, the gate that locked them, and when. Never auto-retried; resolved
/// only via a change order.
#[derive(Clone, Debug)]
pub struct LockViolation {
    pub project: ProjectId,
    pub entity_kind: EntityKind,
    pub entity_id: Option<EntityId>,
    pub fields: Vec<String>,
    pub gate: GateKey,
    pub level: LockLevel,
    pub locked_at: DateTime<Utc>,
}

impl std::fmt::Display for LockViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.entity_kind)?;
        if let Some(id) = self.entity_id {
            write!(f, " #{}", id)?;
        }
        write!(
            f,
            " is locked at level '{}' by gate '{}' since {}; fields [{}] cannot be edited directly — create a change order",
            self.level,
            self.gate,
            self.locked_at.to_rfc3339(),
            self.fields.join(", "),
        )
    }
}

impl std::error::Error for LockViolation {}

/// A stop action failed against a collaborator module.
///
/// Logged with context and retried by the listener layer; never rolls back
/// the change order's own status transition.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{module} rejected {action}: {reason}")]
pub struct StopActionError {
    pub module: &'static str,
    pub action: &'static str,
    pub reason: String,
}

impl StopActionError {
    pub fn new(module: &'static str, action: &'static str, reason: impl Into<String>) -> Self {
        Self {
            module,
            action,
            reason: reason.into(),
        }
    }
}

/// Errors from the reference stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} lock poisoned")]
    Poisoned(&'static str),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("illegal change order transition: {from} -> {to}")]
    IllegalTransition {
        from: ChangeOrderStatus,
        to: ChangeOrderStatus,
    },
}

/// Errors that can occur in workflow operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("gate not found: {0}")]
    GateNotFound(GateKey),

    #[error("duplicate gate key: {0}")]
    DuplicateGate(GateKey),

    #[error("project not found: {0}")]
    ProjectNotFound(ProjectId),

    #[error("change order not found: {0}")]
    ChangeOrderNotFound(ChangeOrderNumber),

    #[error("invalid change order transition: {from} -> {to}")]
    InvalidTransition {
        from: ChangeOrderStatus,
        to: ChangeOrderStatus,
    },

    #[error("project {project} already has pending change order {existing}")]
    PendingChangeOrderExists {
        project: ProjectId,
        existing: ChangeOrderNumber,
    },

    #[error("change order {0} does not name the gate it unlocks")]
    MissingUnlockGate(ChangeOrderNumber),

    #[error("{0}")]
    LockViolation(Box<LockViolation>),

    #[error("stop action failed: {0}")]
    StopAction(#[from] StopActionError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<LockViolation> for EngineError {
    fn from(violation: LockViolation) -> Self {
        EngineError::LockViolation(Box::new(violation))
    }
}

/// Result type alias for workflow operations.
pub type EngineResult<T> = Result<T, EngineError>;
