//! Save-time lock enforcement.
//!
//! One generic guard serves every lockable entity kind: each entity's save
//! path builds an [`EntityMutation`] describing the fields it is about to
//! change and calls [`LockGuard::check_mutation`] before persisting. There
//! is no per-entity inheritance; the field policy lives in the lock level
//! tables.

use stagegate_store::LockLedger;
use stagegate_types::{
    EngineResult, EntityId, EntityKind, LockViolation, ProjectId,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Fields that stay editable under any lock: quality-control results,
/// free-text notes, and bookkeeping timestamps.
pub const EXEMPT_FIELDS: &[&str] = &[
    "qc_status",
    "qc_notes",
    "notes",
    "internal_notes",
    "created_at",
    "updated_at",
    "synced_at",
];

/// A pending entity mutation, as described by the entity's save path.
#[derive(Clone, Debug)]
pub struct EntityMutation {
    /// Owning project; entities not yet linked to a project pass freely
    pub project: Option<ProjectId>,
    pub entity_kind: EntityKind,
    pub entity_id: Option<EntityId>,
    pub changed_fields: Vec<String>,
}

impl EntityMutation {
    pub fn new(entity_kind: EntityKind, entity_id: EntityId) -> Self {
        Self {
            project: None,
            entity_kind,
            entity_id: Some(entity_id),
            changed_fields: Vec::new(),
        }
    }

    pub fn for_project(mut self, project: ProjectId) -> Self {
        self.project = Some(project);
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.changed_fields.push(field.into());
        self
    }
}

/// The save-time guard attached to every lockable entity's persistence path.
pub struct LockGuard {
    ledger: Arc<LockLedger>,
    bypass_depth: AtomicUsize,
}

impl LockGuard {
    pub fn new(ledger: Arc<LockLedger>) -> Self {
        Self {
            ledger,
            bypass_depth: AtomicUsize::new(0),
        }
    }

    /// Reject the mutation if it touches fields frozen by the most
    /// restrictive active lock covering the entity.
    ///
    /// Allowed without further checks: a bypass scope in effect, an entity
    /// with no owning project, or no matching active lock. Exempt fields
    /// and fields the lock level does not block never violate.
    pub fn check_mutation(&self, mutation: &EntityMutation) -> EngineResult<()> {
        if self.bypass_depth.load(Ordering::SeqCst) > 0 {
            debug!(
                entity = %mutation.entity_kind,
                "lock check bypassed for system write"
            );
            return Ok(());
        }

        let Some(project) = &mutation.project else {
            return Ok(());
        };

        let locks = self
            .ledger
            .active_matching(project, mutation.entity_kind, mutation.entity_id);
        let Some(lock) = locks.first() else {
            return Ok(());
        };

        let offending: Vec<String> = mutation
            .changed_fields
            .iter()
            .filter(|f| !EXEMPT_FIELDS.contains(&f.as_str()))
            .filter(|f| lock.blocks_field(f))
            .cloned()
            .collect();

        if offending.is_empty() {
            return Ok(());
        }

        warn!(
            project = %project,
            entity = %mutation.entity_kind,
            gate = %lock.locked_by_gate,
            level = %lock.level,
            fields = ?offending,
            "mutation rejected by entity lock"
        );

        Err(LockViolation {
            project: project.clone(),
            entity_kind: mutation.entity_kind,
            entity_id: mutation.entity_id,
            fields: offending,
            gate: lock.locked_by_gate.clone(),
            level: lock.level,
            locked_at: lock.locked_at,
        }
        .into())
    }

    /// Run `f` with enforcement suspended, restoring it unconditionally —
    /// on early return, error, or panic.
    ///
    /// For trusted system-internal write paths only (change order line
    /// application, derived-value recalculation).
    pub fn without_lock_check<T>(&self, f: impl FnOnce() -> T) -> T {
        let _scope = BypassScope::enter(&self.bypass_depth);
        f()
    }
}

/// RAII token for a bypass scope; re-arms the guard on drop.
struct BypassScope<'a> {
    depth: &'a AtomicUsize,
}

impl<'a> BypassScope<'a> {
    fn enter(depth: &'a AtomicUsize) -> Self {
        depth.fetch_add(1, Ordering::SeqCst);
        Self { depth }
    }
}

impl Drop for BypassScope<'_> {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}
