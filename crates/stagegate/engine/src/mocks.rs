//! Mock collaborators for testing.
//!
//! Recording doubles for the task, purchasing, delivery and notification
//! modules, plus canned gate criteria. Failure injection (`fail_next_*`)
//! exercises the retry paths.

use crate::evaluator::GateCriteria;
use crate::traits::{
    DeliveryModule, NotificationService, OrderHold, PurchasingModule, TaskHold, TaskModule,
};
use stagegate_types::{
    ChangeOrder, ChangeOrderNumber, FailureReason, Gate, Project, ProjectId, PurchaseOrderId,
    RevertSummary, StopActionError, StopActionSummary, TaskId, TaskTemplate,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::RwLock;

/// Task states the stop-action path considers blockable.
const BLOCKABLE_TASK_STATES: &[&str] = &["pending", "in_progress", "approved"];

/// Purchase order states the stop-action path considers holdable.
const HOLDABLE_ORDER_STATES: &[&str] = &["draft", "sent", "purchase"];

struct MockTask {
    project: ProjectId,
    state: String,
    blocked: bool,
}

/// Mock task module with seedable tasks and failure injection.
#[derive(Default)]
pub struct MockTaskModule {
    tasks: RwLock<BTreeMap<TaskId, MockTask>>,
    spawned: RwLock<HashSet<(String, String)>>,
    next_id: AtomicU64,
    fail_blocks: AtomicU32,
}

impl MockTaskModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a task in the given state; returns its id.
    pub fn seed_task(&self, project: &ProjectId, state: &str) -> TaskId {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.tasks.write().unwrap().insert(
            id,
            MockTask {
                project: project.clone(),
                state: state.to_string(),
                blocked: false,
            },
        );
        id
    }

    /// Make the next `n` calls to `block_tasks` fail.
    pub fn fail_next_blocks(&self, n: u32) {
        self.fail_blocks.store(n, Ordering::SeqCst);
    }

    pub fn blocked_count(&self, project: &ProjectId) -> usize {
        self.tasks
            .read()
            .unwrap()
            .values()
            .filter(|t| &t.project == project && t.blocked)
            .count()
    }

    /// (id, state, blocked) per task of the project, in id order.
    pub fn states(&self, project: &ProjectId) -> Vec<(TaskId, String, bool)> {
        self.tasks
            .read()
            .unwrap()
            .iter()
            .filter(|(_, t)| &t.project == project)
            .map(|(id, t)| (*id, t.state.clone(), t.blocked))
            .collect()
    }

    pub fn task_state(&self, id: TaskId) -> Option<String> {
        self.tasks.read().unwrap().get(&id).map(|t| t.state.clone())
    }

    pub fn spawned_count(&self) -> usize {
        self.spawned.read().unwrap().len()
    }
}

impl TaskModule for MockTaskModule {
    fn blockable_tasks(&self, project: &ProjectId) -> Vec<TaskId> {
        self.tasks
            .read()
            .unwrap()
            .iter()
            .filter(|(_, t)| {
                &t.project == project
                    && !t.blocked
                    && BLOCKABLE_TASK_STATES.contains(&t.state.as_str())
            })
            .map(|(id, _)| *id)
            .collect()
    }

    fn block_tasks(&self, ids: &[TaskId]) -> Result<Vec<TaskHold>, StopActionError> {
        if self.fail_blocks.load(Ordering::SeqCst) > 0 {
            self.fail_blocks.fetch_sub(1, Ordering::SeqCst);
            return Err(StopActionError::new("tasks", "block", "injected failure"));
        }

        let mut guard = self.tasks.write().unwrap();
        let mut holds = Vec::new();
        for id in ids {
            if let Some(task) = guard.get_mut(id) {
                if !task.blocked {
                    holds.push(TaskHold {
                        task: *id,
                        previous_state: task.state.clone(),
                    });
                    task.blocked = true;
                    task.state = "blocked".into();
                }
            }
        }
        Ok(holds)
    }

    fn unblock_tasks(&self, holds: &[TaskHold]) -> Result<usize, StopActionError> {
        let mut guard = self.tasks.write().unwrap();
        let mut count = 0;
        for hold in holds {
            if let Some(task) = guard.get_mut(&hold.task) {
                if task.blocked {
                    task.blocked = false;
                    task.state = hold.previous_state.clone();
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    fn spawn_from_templates(&self, project: &ProjectId, templates: &[TaskTemplate]) -> Vec<TaskId> {
        let mut created = Vec::new();
        for template in templates {
            let key = (project.0.clone(), template.task_type.clone());
            if self.spawned.write().unwrap().insert(key) {
                created.push(self.seed_task(project, "pending"));
            }
        }
        created
    }
}

struct MockOrder {
    project: ProjectId,
    state: String,
    held: bool,
}

/// Mock purchasing module with seedable purchase orders.
#[derive(Default)]
pub struct MockPurchasingModule {
    orders: RwLock<BTreeMap<PurchaseOrderId, MockOrder>>,
    next_id: AtomicU64,
    fail_holds: AtomicU32,
}

impl MockPurchasingModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_order(&self, project: &ProjectId, state: &str) -> PurchaseOrderId {
        let id = PurchaseOrderId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.orders.write().unwrap().insert(
            id,
            MockOrder {
                project: project.clone(),
                state: state.to_string(),
                held: false,
            },
        );
        id
    }

    /// Make the next `n` calls to `hold_orders` fail.
    pub fn fail_next_holds(&self, n: u32) {
        self.fail_holds.store(n, Ordering::SeqCst);
    }

    pub fn held_count(&self, project: &ProjectId) -> usize {
        self.orders
            .read()
            .unwrap()
            .values()
            .filter(|o| &o.project == project && o.held)
            .count()
    }

    pub fn order_state(&self, id: PurchaseOrderId) -> Option<String> {
        self.orders.read().unwrap().get(&id).map(|o| o.state.clone())
    }
}

impl PurchasingModule for MockPurchasingModule {
    fn holdable_orders(&self, project: &ProjectId) -> Vec<PurchaseOrderId> {
        self.orders
            .read()
            .unwrap()
            .iter()
            .filter(|(_, o)| {
                &o.project == project
                    && !o.held
                    && HOLDABLE_ORDER_STATES.contains(&o.state.as_str())
            })
            .map(|(id, _)| *id)
            .collect()
    }

    fn hold_orders(&self, ids: &[PurchaseOrderId]) -> Result<Vec<OrderHold>, StopActionError> {
        if self.fail_holds.load(Ordering::SeqCst) > 0 {
            self.fail_holds.fetch_sub(1, Ordering::SeqCst);
            return Err(StopActionError::new(
                "purchasing",
                "hold",
                "injected failure",
            ));
        }

        let mut guard = self.orders.write().unwrap();
        let mut holds = Vec::new();
        for id in ids {
            if let Some(order) = guard.get_mut(id) {
                if !order.held {
                    holds.push(OrderHold {
                        order: *id,
                        previous_state: order.state.clone(),
                    });
                    order.held = true;
                    order.state = "on_hold".into();
                }
            }
        }
        Ok(holds)
    }

    fn release_orders(&self, holds: &[OrderHold]) -> Result<usize, StopActionError> {
        let mut guard = self.orders.write().unwrap();
        let mut count = 0;
        for hold in holds {
            if let Some(order) = guard.get_mut(&hold.order) {
                if order.held {
                    order.held = false;
                    order.state = hold.previous_state.clone();
                    count += 1;
                }
            }
        }
        Ok(count)
    }
}

/// Mock delivery module tracking a per-project blocked flag.
#[derive(Default)]
pub struct MockDeliveryModule {
    blocked: RwLock<HashSet<ProjectId>>,
}

impl MockDeliveryModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_blocked(&self, project: &ProjectId) -> bool {
        self.blocked.read().unwrap().contains(project)
    }
}

impl DeliveryModule for MockDeliveryModule {
    fn block_delivery(&self, project: &ProjectId) -> Result<bool, StopActionError> {
        Ok(self.blocked.write().unwrap().insert(project.clone()))
    }

    fn unblock_delivery(&self, project: &ProjectId) -> Result<bool, StopActionError> {
        Ok(self.blocked.write().unwrap().remove(project))
    }
}

/// Notification double that records every call.
#[derive(Default)]
pub struct RecordingNotifier {
    submitted: RwLock<Vec<ChangeOrderNumber>>,
    approved: RwLock<Vec<(ChangeOrderNumber, StopActionSummary)>>,
    applied: RwLock<Vec<(ChangeOrderNumber, RevertSummary)>>,
    cancelled: RwLock<Vec<(ChangeOrderNumber, bool)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> Vec<ChangeOrderNumber> {
        self.submitted.read().unwrap().clone()
    }

    pub fn approved(&self) -> Vec<(ChangeOrderNumber, StopActionSummary)> {
        self.approved.read().unwrap().clone()
    }

    pub fn applied(&self) -> Vec<(ChangeOrderNumber, RevertSummary)> {
        self.applied.read().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<(ChangeOrderNumber, bool)> {
        self.cancelled.read().unwrap().clone()
    }
}

impl NotificationService for RecordingNotifier {
    fn notify_submitted(&self, change_order: &ChangeOrder) {
        self.submitted
            .write()
            .unwrap()
            .push(change_order.number.clone());
    }

    fn notify_approved(&self, change_order: &ChangeOrder, summary: &StopActionSummary) {
        self.approved
            .write()
            .unwrap()
            .push((change_order.number.clone(), *summary));
    }

    fn notify_applied(&self, change_order: &ChangeOrder, summary: &RevertSummary) {
        self.applied
            .write()
            .unwrap()
            .push((change_order.number.clone(), *summary));
    }

    fn notify_cancelled(&self, change_order: &ChangeOrder, stop_actions_reverted: bool) {
        self.cancelled
            .write()
            .unwrap()
            .push((change_order.number.clone(), stop_actions_reverted));
    }
}

/// Canned criteria: always the same outcome.
pub struct StaticCriteria {
    reasons: Vec<FailureReason>,
}

impl StaticCriteria {
    pub fn passing() -> Self {
        Self { reasons: vec![] }
    }

    pub fn failing(reasons: Vec<FailureReason>) -> Self {
        Self { reasons }
    }
}

impl GateCriteria for StaticCriteria {
    fn check(&self, _project: &Project, _gate: &Gate) -> Result<Vec<FailureReason>, String> {
        Ok(self.reasons.clone())
    }
}

/// Criteria backed by a closure, for per-test behavior.
pub struct FnCriteria(
    #[allow(clippy::type_complexity)]
    Box<dyn Fn(&Project, &Gate) -> Result<Vec<FailureReason>, String> + Send + Sync>,
);

impl FnCriteria {
    pub fn new(
        f: impl Fn(&Project, &Gate) -> Result<Vec<FailureReason>, String> + Send + Sync + 'static,
    ) -> Self {
        Self(Box::new(f))
    }
}

impl GateCriteria for FnCriteria {
    fn check(&self, project: &Project, gate: &Gate) -> Result<Vec<FailureReason>, String> {
        (self.0)(project, gate)
    }
}
