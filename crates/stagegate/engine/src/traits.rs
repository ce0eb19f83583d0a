//! Collaborator interfaces consumed by the workflow core.
//!
//! Tasks, purchasing, delivery and notifications are owned by other modules;
//! the engine only drives the stop/release hooks they expose. Every
//! operation here must be idempotent — blocking an already-blocked task is a
//! no-op, not an error — because the listener layer re-runs partially
//! completed work.

use stagegate_types::{
    ChangeOrder, ProjectId, PurchaseOrderId, RevertSummary, StopActionError, StopActionSummary,
    TaskId, TaskTemplate,
};

/// A task that was just blocked, with the state to restore on unblock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskHold {
    pub task: TaskId,
    pub previous_state: String,
}

/// A purchase order that was just held, with the state to restore on release.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderHold {
    pub order: PurchaseOrderId,
    pub previous_state: String,
}

/// The task module's stop/release surface.
pub trait TaskModule: Send + Sync {
    /// Tasks of the project that are in a blockable state (not done,
    /// cancelled, or already blocked).
    fn blockable_tasks(&self, project: &ProjectId) -> Vec<TaskId>;

    /// Block the given tasks. Already-blocked or missing tasks are skipped.
    /// Returns one hold per task actually blocked.
    fn block_tasks(&self, ids: &[TaskId]) -> Result<Vec<TaskHold>, StopActionError>;

    /// Restore previously blocked tasks to their recorded state. Missing
    /// tasks are skipped. Returns the number actually unblocked.
    fn unblock_tasks(&self, holds: &[TaskHold]) -> Result<usize, StopActionError>;

    /// Instantiate follow-up tasks from a gate's templates. Implementations
    /// must dedupe per (project, task type): re-evaluating a passed gate must
    /// not create the tasks again.
    fn spawn_from_templates(&self, project: &ProjectId, templates: &[TaskTemplate]) -> Vec<TaskId>;
}

/// The purchasing module's hold/release surface.
pub trait PurchasingModule: Send + Sync {
    /// Purchase orders of the project in a holdable state.
    fn holdable_orders(&self, project: &ProjectId) -> Vec<PurchaseOrderId>;

    /// Hold the given orders. Already-held or missing orders are skipped.
    fn hold_orders(&self, ids: &[PurchaseOrderId]) -> Result<Vec<OrderHold>, StopActionError>;

    /// Release previously held orders back to their recorded state.
    fn release_orders(&self, holds: &[OrderHold]) -> Result<usize, StopActionError>;
}

/// The delivery module's block/unblock surface.
pub trait DeliveryModule: Send + Sync {
    /// Block the project's delivery. Returns false if already blocked.
    fn block_delivery(&self, project: &ProjectId) -> Result<bool, StopActionError>;

    /// Unblock the project's delivery. Returns false if not blocked.
    fn unblock_delivery(&self, project: &ProjectId) -> Result<bool, StopActionError>;
}

/// Stakeholder notification on change order lifecycle transitions.
pub trait NotificationService: Send + Sync {
    fn notify_submitted(&self, change_order: &ChangeOrder);
    fn notify_approved(&self, change_order: &ChangeOrder, summary: &StopActionSummary);
    fn notify_applied(&self, change_order: &ChangeOrder, summary: &RevertSummary);
    fn notify_cancelled(&self, change_order: &ChangeOrder, stop_actions_reverted: bool);
}
