//! In-memory reference stores for the stagegate workflow core.
//!
//! These adapters are deterministic and test-friendly. Each store wraps its
//! data in an interior `RwLock` so services can share it behind an `Arc`;
//! every mutating call holds a single write guard for the whole operation,
//! which is what makes per-call atomicity (all locks of a gate category
//! created or none) and concurrent-duplicate convergence hold. Production
//! deployments should back the same surfaces with a transactional database
//! at repeatable-read isolation or stronger.
//!
//! Audit stores ([`LockLedger`], [`EvaluationLog`], [`StopActionLog`]) are
//! append-only: records are stamped as released/reverted, never deleted.

#![deny(unsafe_code)]

mod change_order_store;
mod evaluation_log;
mod lock_ledger;
mod project_store;
mod stop_action_log;

pub use change_order_store::ChangeOrderStore;
pub use evaluation_log::EvaluationLog;
pub use lock_ledger::LockLedger;
pub use project_store::ProjectStore;
pub use stop_action_log::StopActionLog;
