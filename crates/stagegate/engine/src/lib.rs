//! Stagegate Workflow Engine — gates, entity locks, and change orders.
//!
//! The engine coordinates three things:
//!
//! 1. **Gate evaluation** ([`GateEvaluator`]): runs a gate's injected
//!    criteria against a project, records an audit evaluation every time,
//!    and signals pass/fail. Evaluation never mutates locks itself.
//! 2. **Entity locking** ([`EntityLockService`], [`LockGuard`]): when a gate
//!    passes, its lock categories freeze the matching entity kinds. The
//!    guard rejects direct edits to frozen fields at save time; the only
//!    path through is a change order (or an explicit scoped bypass for
//!    system-driven writes).
//! 3. **Change orders** ([`ChangeOrderService`], [`StopActionService`]):
//!    the draft → submitted → approved → applied lifecycle, with stop
//!    actions (block tasks, hold purchase orders, block delivery) executed
//!    at approval and reverted — exactly once — at application or
//!    cancellation-from-approved.
//!
//! Services are constructed once and passed explicitly; there is no ambient
//! registry. Transitions publish [`stagegate_types::WorkflowEvent`]s on the
//! [`EventBus`] and hand them to the [`ListenerSet`], whose handlers are
//! idempotent and safe to re-run.

#![deny(unsafe_code)]

mod bus;
mod change_orders;
mod enforcement;
mod evaluator;
mod listeners;
mod locks;
pub mod mocks;
mod stop_actions;
mod traits;

pub use bus::EventBus;
pub use change_orders::{ChangeOrderService, NewChangeOrder};
pub use enforcement::{EntityMutation, LockGuard, EXEMPT_FIELDS};
pub use evaluator::{GateCriteria, GateEvaluationOutcome, GateEvaluator, GateStatus};
pub use listeners::{ListenerConfig, ListenerSet};
pub use locks::EntityLockService;
pub use stop_actions::StopActionService;
pub use traits::{
    DeliveryModule, NotificationService, OrderHold, PurchasingModule, TaskHold, TaskModule,
};
