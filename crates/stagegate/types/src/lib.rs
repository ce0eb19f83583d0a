//! Domain types for the stagegate workflow core.
//!
//! A project moves through sequential approval **gates** (design sign-off,
//! procurement commitment, production start). When a gate passes, it freezes
//! categories of project data behind **entity locks** so that what was quoted
//! and engineered cannot silently drift from what is built. Any change after
//! a lock flows through a **change order**: a tracked, approved amendment
//! that suspends dependent work, permits the edit, and re-establishes the
//! lock.
//!
//! # Key Concepts
//!
//! - **Gate**: a named checkpoint whose pass/fail evaluation may activate
//!   lock categories and instantiate follow-up tasks.
//! - **GateEvaluation**: the append-only audit record of one evaluation
//!   attempt, pass or fail.
//! - **EntityLock**: a durable record freezing (part of) an entity's field
//!   set, keyed by (project, entity kind, entity id or project-wide, level).
//! - **ChangeOrder**: the only sanctioned path to modify locked data. Owns
//!   its lines exclusively; drives stop actions while pending.
//! - **StopActionRecord**: the audit row that makes stop-action reversal the
//!   exact inverse of execution.
//!
//! # Design Principles
//!
//! 1. Lock creation is idempotent; locks are released, never deleted.
//! 2. Every state transition is explicit and validated. No implicit jumps.
//! 3. Audit records (evaluations, locks, stop actions) are append-only.
//! 4. Snapshots are captured once at lock time and never recomputed in place.

#![deny(unsafe_code)]

mod change_order;
mod errors;
mod events;
mod gate;
mod ids;
mod lock;
mod project;

pub use change_order::*;
pub use errors::*;
pub use events::*;
pub use gate::*;
pub use ids::*;
pub use lock::*;
pub use project::*;
