//! Shared wiring for integration tests: stores, services, mock
//! collaborators, and a project fixture with two blockable tasks and two
//! holdable purchase orders.

#![allow(dead_code)]

use stagegate_engine::mocks::{
    MockDeliveryModule, MockPurchasingModule, MockTaskModule, RecordingNotifier,
};
use stagegate_engine::{
    ChangeOrderService, EntityLockService, EventBus, GateCriteria, GateEvaluator, ListenerConfig,
    ListenerSet, LockGuard, NewChangeOrder, StopActionService,
};
use stagegate_store::{
    ChangeOrderStore, EvaluationLog, LockLedger, ProjectStore, StopActionLog,
};
use stagegate_types::{
    BomLine, ChangeOrderLine, ChangeOrderNumber, ChangeOrderReason, EntityId, EntityKind, Gate,
    GateKey, GateRegistry, Project, ProjectId, Room, TaskTemplate,
};
use std::sync::Arc;
use std::time::Duration;

pub struct Rig {
    pub projects: Arc<ProjectStore>,
    pub change_order_store: Arc<ChangeOrderStore>,
    pub evaluations: Arc<EvaluationLog>,
    pub bus: Arc<EventBus>,
    pub evaluator: GateEvaluator,
    pub lock_service: Arc<EntityLockService>,
    pub guard: Arc<LockGuard>,
    pub change_orders: ChangeOrderService,
    pub listeners: Arc<ListenerSet>,
    pub tasks: Arc<MockTaskModule>,
    pub purchasing: Arc<MockPurchasingModule>,
    pub delivery: Arc<MockDeliveryModule>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn project_id() -> ProjectId {
    ProjectId::new("p1")
}

pub fn rig_with_criteria(criteria: Arc<dyn GateCriteria>) -> Rig {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("stagegate_engine=debug")
        .try_init();

    let ledger = Arc::new(LockLedger::new());
    let projects = Arc::new(ProjectStore::new());
    let evaluations = Arc::new(EvaluationLog::new());
    let stop_log = Arc::new(StopActionLog::new());
    let change_order_store = Arc::new(ChangeOrderStore::new());
    let bus = Arc::new(EventBus::new());

    let mut registry = GateRegistry::new();
    registry
        .register(Gate::new("design_signoff", "Design Sign-Off", "design").with_design_lock())
        .unwrap();
    registry
        .register(
            Gate::new("procurement_commit", "Procurement Commitment", "procurement")
                .with_procurement_lock(),
        )
        .unwrap();
    registry
        .register(
            Gate::new("production_start", "Production Start", "production")
                .with_production_lock()
                .with_task_template(TaskTemplate::new("Cut parts", "cut_parts", 1))
                .with_task_template(TaskTemplate::new("Assemble", "assembly", 2)),
        )
        .unwrap();
    let registry = Arc::new(registry);

    projects
        .insert(
            Project::new(project_id(), "TCS-2026-014", "Hillside Kitchen", "design")
                .with_customer("Meridian Builders")
                .with_bom_line(BomLine {
                    id: 1,
                    product: "PLY-18".into(),
                    component_name: "Side panel".into(),
                    quantity: 12.0,
                    unit: "sheet".into(),
                    material_cost: 68.0,
                })
                .with_room(Room {
                    id: 1,
                    name: "Kitchen".into(),
                    estimated_value: 42_000.0,
                    quoted_price: 45_500.0,
                    linear_feet: 38.0,
                }),
        )
        .unwrap();

    let tasks = Arc::new(MockTaskModule::new());
    tasks.seed_task(&project_id(), "pending");
    tasks.seed_task(&project_id(), "in_progress");
    tasks.seed_task(&project_id(), "done");

    let purchasing = Arc::new(MockPurchasingModule::new());
    purchasing.seed_order(&project_id(), "draft");
    purchasing.seed_order(&project_id(), "purchase");
    purchasing.seed_order(&project_id(), "done");

    let delivery = Arc::new(MockDeliveryModule::new());
    let notifier = Arc::new(RecordingNotifier::new());

    let lock_service = Arc::new(EntityLockService::new(
        ledger.clone(),
        projects.clone(),
        registry.clone(),
        bus.clone(),
    ));
    let stop_service = Arc::new(StopActionService::new(
        projects.clone(),
        stop_log,
        tasks.clone(),
        purchasing.clone(),
        delivery.clone(),
    ));
    let guard = Arc::new(LockGuard::new(ledger));
    let listeners = Arc::new(ListenerSet::new(
        lock_service.clone(),
        stop_service,
        change_order_store.clone(),
        projects.clone(),
        registry.clone(),
        tasks.clone(),
        notifier.clone(),
        ListenerConfig {
            stop_action_attempts: 3,
            stop_action_backoff: Duration::from_millis(1),
        },
    ));
    let evaluator = GateEvaluator::new(
        registry.clone(),
        criteria,
        evaluations.clone(),
        projects.clone(),
        bus.clone(),
        listeners.clone(),
    );
    let change_orders = ChangeOrderService::new(
        change_order_store.clone(),
        projects.clone(),
        registry,
        guard.clone(),
        listeners.clone(),
        bus.clone(),
    );

    Rig {
        projects,
        change_order_store,
        evaluations,
        bus,
        evaluator,
        lock_service,
        guard,
        change_orders,
        listeners,
        tasks,
        purchasing,
        delivery,
        notifier,
    }
}

pub fn rig() -> Rig {
    rig_with_criteria(Arc::new(
        stagegate_engine::mocks::StaticCriteria::passing(),
    ))
}

/// A change order suspending the design gate, widening cabinet #12.
pub fn width_change_request(number: &str) -> NewChangeOrder {
    NewChangeOrder {
        number: ChangeOrderNumber::new(number),
        title: "Widen sink run".into(),
        reason: ChangeOrderReason::ClientRequest,
        unlocks_gate: GateKey::new("design_signoff"),
        lines: vec![
            ChangeOrderLine::new(EntityKind::Cabinet, EntityId(12), "width_mm", "920")
                .with_old_value("900")
                .with_price_impact(140.0),
        ],
    }
}
