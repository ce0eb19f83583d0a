//! Change orders: the sanctioned path to modify locked project data.

use crate::{ActorId, ChangeOrderNumber, EntityId, EntityKind, GateKey, ProjectId, PurchaseOrderId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle states of a change order.
///
/// `Applied` and `Cancelled` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOrderStatus {
    Draft,
    Submitted,
    Approved,
    Applied,
    Cancelled,
}

impl ChangeOrderStatus {
    /// Whether a transition from `self` to `to` is legal.
    pub fn can_transition_to(self, to: ChangeOrderStatus) -> bool {
        use ChangeOrderStatus::*;
        matches!(
            (self, to),
            (Draft, Submitted)
                | (Submitted, Approved)
                | (Approved, Applied)
                | (Draft, Cancelled)
                | (Submitted, Cancelled)
                | (Approved, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ChangeOrderStatus::Applied | ChangeOrderStatus::Cancelled)
    }

    /// Pending means the change order occupies the project's single
    /// in-flight slot.
    pub fn is_pending(self) -> bool {
        matches!(self, ChangeOrderStatus::Submitted | ChangeOrderStatus::Approved)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOrderStatus::Draft => "draft",
            ChangeOrderStatus::Submitted => "submitted",
            ChangeOrderStatus::Approved => "approved",
            ChangeOrderStatus::Applied => "applied",
            ChangeOrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ChangeOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why the change was requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOrderReason {
    #[default]
    ClientRequest,
    DesignRevision,
    SiteCondition,
    Pricing,
}

/// One field-level change tracked by a change order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChangeOrderLine {
    pub entity_kind: EntityKind,
    pub entity_id: EntityId,
    pub field_name: String,
    pub old_value: Option<String>,
    pub new_value: String,
    pub price_impact: f64,
    pub is_applied: bool,
    pub applied_at: Option<DateTime<Utc>>,
}

impl ChangeOrderLine {
    pub fn new(
        entity_kind: EntityKind,
        entity_id: EntityId,
        field_name: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        Self {
            entity_kind,
            entity_id,
            field_name: field_name.into(),
            old_value: None,
            new_value: new_value.into(),
            price_impact: 0.0,
            is_applied: false,
            applied_at: None,
        }
    }

    pub fn with_old_value(mut self, old: impl Into<String>) -> Self {
        self.old_value = Some(old.into());
        self
    }

    pub fn with_price_impact(mut self, impact: f64) -> Self {
        self.price_impact = impact;
        self
    }
}

/// A tracked, approved amendment to locked project data.
///
/// Lines are owned exclusively: they cannot outlive or be reassigned across
/// change orders.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChangeOrder {
    pub number: ChangeOrderNumber,
    pub project: ProjectId,
    pub title: String,
    pub reason: ChangeOrderReason,
    pub status: ChangeOrderStatus,
    /// The gate whose locks this change order suspends. Required: a change
    /// order without one is a configuration error.
    pub unlocks_gate: GateKey,
    pub price_delta: f64,
    pub requester: ActorId,
    pub approver: Option<ActorId>,
    pub applier: Option<ActorId>,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub applied_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub lines: Vec<ChangeOrderLine>,
}

impl ChangeOrder {
    pub fn new(
        number: ChangeOrderNumber,
        project: ProjectId,
        title: impl Into<String>,
        unlocks_gate: GateKey,
        requester: ActorId,
    ) -> Self {
        Self {
            number,
            project,
            title: title.into(),
            reason: ChangeOrderReason::default(),
            status: ChangeOrderStatus::Draft,
            unlocks_gate,
            price_delta: 0.0,
            requester,
            approver: None,
            applier: None,
            created_at: Utc::now(),
            submitted_at: None,
            approved_at: None,
            applied_at: None,
            cancelled_at: None,
            lines: Vec::new(),
        }
    }

    pub fn with_reason(mut self, reason: ChangeOrderReason) -> Self {
        self.reason = reason;
        self
    }

    /// Add a line and fold its price impact into the total.
    pub fn add_line(&mut self, line: ChangeOrderLine) {
        self.lines.push(line);
        self.recalculate_price_delta();
    }

    pub fn recalculate_price_delta(&mut self) {
        self.price_delta = self.lines.iter().map(|l| l.price_impact).sum();
    }

    pub fn unapplied_lines(&self) -> impl Iterator<Item = &ChangeOrderLine> {
        self.lines.iter().filter(|l| !l.is_applied)
    }
}

/// What a stop action did, for the audit trail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopActionKind {
    TaskBlocked,
    PoHeld,
    DeliveryBlocked,
}

impl StopActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopActionKind::TaskBlocked => "task_blocked",
            StopActionKind::PoHeld => "po_held",
            StopActionKind::DeliveryBlocked => "delivery_blocked",
        }
    }
}

impl std::fmt::Display for StopActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a stop action acted on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopActionTarget {
    Task(TaskId),
    PurchaseOrder(PurchaseOrderId),
    Delivery(ProjectId),
}

/// Append-only audit row for one executed stop action.
///
/// Reversion reads these records, so revert is always the exact inverse of
/// what was executed — not a recomputation of the affected set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StopActionRecord {
    pub id: uuid::Uuid,
    pub change_order: ChangeOrderNumber,
    pub kind: StopActionKind,
    pub target: StopActionTarget,
    /// State the entity held before the action, restored on revert
    pub previous_state: Option<String>,
    pub performed_at: DateTime<Utc>,
    pub performed_by: ActorId,
    pub reverted_at: Option<DateTime<Utc>>,
    pub reverted_by: Option<ActorId>,
}

impl StopActionRecord {
    pub fn new(
        change_order: ChangeOrderNumber,
        kind: StopActionKind,
        target: StopActionTarget,
        previous_state: Option<String>,
        performed_by: ActorId,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            change_order,
            kind,
            target,
            previous_state,
            performed_at: Utc::now(),
            performed_by,
            reverted_at: None,
            reverted_by: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.reverted_at.is_none()
    }

    pub fn mark_reverted(&mut self, actor: ActorId, at: DateTime<Utc>) {
        self.reverted_at = Some(at);
        self.reverted_by = Some(actor);
    }
}

/// Counts returned by stop-action execution, for logging and notification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopActionSummary {
    pub tasks_blocked: usize,
    pub pos_held: usize,
    pub delivery_blocked: bool,
}

/// Counts returned by stop-action reversal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevertSummary {
    pub tasks_unblocked: usize,
    pub pos_released: usize,
    pub delivery_unblocked: bool,
}
