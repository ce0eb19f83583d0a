//! Stop actions: suspending and resuming dependent work for a change order.
//!
//! Execution records one audit row per action taken; reversal restores
//! exactly the recorded set. That symmetry — not a recomputed affected set —
//! is what guarantees revert is the exact inverse of execute even if tasks
//! or purchase orders changed in between.

use crate::traits::{DeliveryModule, OrderHold, PurchasingModule, TaskHold, TaskModule};
use chrono::Utc;
use stagegate_store::{ProjectStore, StopActionLog};
use stagegate_types::{
    ActorId, ChangeOrder, EngineResult, RevertSummary, StopActionKind, StopActionRecord,
    StopActionSummary, StopActionTarget, TaskId,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Executes and reverts the cross-module side effects of a pending change
/// order: block tasks, hold purchase orders, block delivery.
pub struct StopActionService {
    projects: Arc<ProjectStore>,
    log: Arc<StopActionLog>,
    tasks: Arc<dyn TaskModule>,
    purchasing: Arc<dyn PurchasingModule>,
    delivery: Arc<dyn DeliveryModule>,
}

impl StopActionService {
    pub fn new(
        projects: Arc<ProjectStore>,
        log: Arc<StopActionLog>,
        tasks: Arc<dyn TaskModule>,
        purchasing: Arc<dyn PurchasingModule>,
        delivery: Arc<dyn DeliveryModule>,
    ) -> Self {
        Self {
            projects,
            log,
            tasks,
            purchasing,
            delivery,
        }
    }

    /// Execute stop actions when a change order is approved.
    ///
    /// Safe to re-run after a partial failure: entities already covered by
    /// an active audit row are skipped, so a retry only finishes what the
    /// previous attempt left undone.
    pub fn execute_stop_actions(
        &self,
        change_order: &ChangeOrder,
        actor: &ActorId,
    ) -> EngineResult<StopActionSummary> {
        let mut summary = StopActionSummary::default();

        summary.tasks_blocked = self.block_tasks(change_order, actor)?;
        summary.pos_held = self.hold_purchase_orders(change_order, actor)?;
        summary.delivery_blocked = self.block_delivery(change_order, actor)?;

        self.projects.update(&change_order.project, |project| {
            project.has_pending_change_order = true;
            project.active_change_order = Some(change_order.number.clone());
            if summary.delivery_blocked {
                project.delivery_blocked = true;
            }
        })?;

        info!(
            change_order = %change_order.number,
            project = %change_order.project,
            tasks_blocked = summary.tasks_blocked,
            pos_held = summary.pos_held,
            delivery_blocked = summary.delivery_blocked,
            "stop actions executed"
        );
        Ok(summary)
    }

    /// Revert stop actions when a change order is applied or cancelled.
    pub fn revert_stop_actions(
        &self,
        change_order: &ChangeOrder,
        actor: &ActorId,
    ) -> EngineResult<RevertSummary> {
        let mut summary = RevertSummary::default();

        summary.tasks_unblocked = self.unblock_tasks(change_order, actor)?;
        summary.pos_released = self.release_purchase_orders(change_order, actor)?;
        summary.delivery_unblocked = self.unblock_delivery(change_order, actor)?;

        self.projects.update(&change_order.project, |project| {
            project.has_pending_change_order = false;
            project.active_change_order = None;
            project.delivery_blocked = false;
        })?;

        info!(
            change_order = %change_order.number,
            project = %change_order.project,
            tasks_unblocked = summary.tasks_unblocked,
            pos_released = summary.pos_released,
            delivery_unblocked = summary.delivery_unblocked,
            "stop actions reverted"
        );
        Ok(summary)
    }

    /// Current counts of un-reverted actions for a change order.
    pub fn stop_action_summary(&self, change_order: &ChangeOrder) -> StopActionSummary {
        StopActionSummary {
            tasks_blocked: self
                .log
                .active_of_kind(&change_order.number, StopActionKind::TaskBlocked)
                .len(),
            pos_held: self
                .log
                .active_of_kind(&change_order.number, StopActionKind::PoHeld)
                .len(),
            delivery_blocked: !self
                .log
                .active_of_kind(&change_order.number, StopActionKind::DeliveryBlocked)
                .is_empty(),
        }
    }

    // ── Execution ────────────────────────────────────────────────────

    fn block_tasks(&self, change_order: &ChangeOrder, actor: &ActorId) -> EngineResult<usize> {
        let already: HashSet<TaskId> = self
            .log
            .active_of_kind(&change_order.number, StopActionKind::TaskBlocked)
            .iter()
            .filter_map(|r| match r.target {
                StopActionTarget::Task(id) => Some(id),
                _ => None,
            })
            .collect();

        let candidates: Vec<TaskId> = self
            .tasks
            .blockable_tasks(&change_order.project)
            .into_iter()
            .filter(|id| !already.contains(id))
            .collect();

        let holds = self.tasks.block_tasks(&candidates).map_err(|e| {
            error!(change_order = %change_order.number, error = %e, "task blocking failed");
            e
        })?;

        for hold in &holds {
            self.log.append(StopActionRecord::new(
                change_order.number.clone(),
                StopActionKind::TaskBlocked,
                StopActionTarget::Task(hold.task),
                Some(hold.previous_state.clone()),
                actor.clone(),
            ))?;
        }
        Ok(holds.len())
    }

    fn hold_purchase_orders(
        &self,
        change_order: &ChangeOrder,
        actor: &ActorId,
    ) -> EngineResult<usize> {
        let already: HashSet<_> = self
            .log
            .active_of_kind(&change_order.number, StopActionKind::PoHeld)
            .iter()
            .filter_map(|r| match r.target {
                StopActionTarget::PurchaseOrder(id) => Some(id),
                _ => None,
            })
            .collect();

        let candidates: Vec<_> = self
            .purchasing
            .holdable_orders(&change_order.project)
            .into_iter()
            .filter(|id| !already.contains(id))
            .collect();

        let holds = self.purchasing.hold_orders(&candidates).map_err(|e| {
            error!(change_order = %change_order.number, error = %e, "purchase order hold failed");
            e
        })?;

        for hold in &holds {
            self.log.append(StopActionRecord::new(
                change_order.number.clone(),
                StopActionKind::PoHeld,
                StopActionTarget::PurchaseOrder(hold.order),
                Some(hold.previous_state.clone()),
                actor.clone(),
            ))?;
        }
        Ok(holds.len())
    }

    fn block_delivery(&self, change_order: &ChangeOrder, actor: &ActorId) -> EngineResult<bool> {
        let already = !self
            .log
            .active_of_kind(&change_order.number, StopActionKind::DeliveryBlocked)
            .is_empty();
        if already {
            return Ok(false);
        }

        let blocked = self
            .delivery
            .block_delivery(&change_order.project)
            .map_err(|e| {
                error!(change_order = %change_order.number, error = %e, "delivery block failed");
                e
            })?;
        if !blocked {
            return Ok(false);
        }

        self.log.append(StopActionRecord::new(
            change_order.number.clone(),
            StopActionKind::DeliveryBlocked,
            StopActionTarget::Delivery(change_order.project.clone()),
            Some("not_blocked".into()),
            actor.clone(),
        ))?;
        Ok(true)
    }

    // ── Reversal ─────────────────────────────────────────────────────

    fn unblock_tasks(&self, change_order: &ChangeOrder, actor: &ActorId) -> EngineResult<usize> {
        let records = self
            .log
            .active_of_kind(&change_order.number, StopActionKind::TaskBlocked);
        if records.is_empty() {
            return Ok(0);
        }

        let holds: Vec<TaskHold> = records
            .iter()
            .filter_map(|r| match r.target {
                StopActionTarget::Task(id) => Some(TaskHold {
                    task: id,
                    previous_state: r
                        .previous_state
                        .clone()
                        .unwrap_or_else(|| "pending".into()),
                }),
                _ => None,
            })
            .collect();

        let unblocked = self.tasks.unblock_tasks(&holds).map_err(|e| {
            error!(change_order = %change_order.number, error = %e, "task unblocking failed");
            e
        })?;
        if unblocked < holds.len() {
            warn!(
                change_order = %change_order.number,
                missing = holds.len() - unblocked,
                "some blocked tasks no longer exist"
            );
        }

        let ids: Vec<uuid::Uuid> = records.iter().map(|r| r.id).collect();
        self.log.mark_reverted(&ids, actor, Utc::now())?;
        Ok(unblocked)
    }

    fn release_purchase_orders(
        &self,
        change_order: &ChangeOrder,
        actor: &ActorId,
    ) -> EngineResult<usize> {
        let records = self
            .log
            .active_of_kind(&change_order.number, StopActionKind::PoHeld);
        if records.is_empty() {
            return Ok(0);
        }

        let holds: Vec<OrderHold> = records
            .iter()
            .filter_map(|r| match r.target {
                StopActionTarget::PurchaseOrder(id) => Some(OrderHold {
                    order: id,
                    previous_state: r.previous_state.clone().unwrap_or_else(|| "draft".into()),
                }),
                _ => None,
            })
            .collect();

        let released = self.purchasing.release_orders(&holds).map_err(|e| {
            error!(change_order = %change_order.number, error = %e, "purchase order release failed");
            e
        })?;

        let ids: Vec<uuid::Uuid> = records.iter().map(|r| r.id).collect();
        self.log.mark_reverted(&ids, actor, Utc::now())?;
        Ok(released)
    }

    fn unblock_delivery(&self, change_order: &ChangeOrder, actor: &ActorId) -> EngineResult<bool> {
        let records = self
            .log
            .active_of_kind(&change_order.number, StopActionKind::DeliveryBlocked);
        if records.is_empty() {
            return Ok(false);
        }

        let unblocked = self
            .delivery
            .unblock_delivery(&change_order.project)
            .map_err(|e| {
                error!(change_order = %change_order.number, error = %e, "delivery unblock failed");
                e
            })?;

        let ids: Vec<uuid::Uuid> = records.iter().map(|r| r.id).collect();
        self.log.mark_reverted(&ids, actor, Utc::now())?;
        Ok(unblocked)
    }
}
