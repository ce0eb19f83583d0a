//! Entity Lock Service: applies, queries and releases locks.

use crate::bus::EventBus;
use chrono::Utc;
use stagegate_store::{LockLedger, ProjectStore};
use stagegate_types::{
    ActorId, BomSnapshot, BomSnapshotLine, ChangeOrder, EngineError, EngineResult, EntityId,
    EntityKind, EntityLock, Gate, GateRegistry, LockCategory, LockLevel, PricingSnapshot,
    Project, ProjectId, RoomPricing, WorkflowEvent,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Manages locking and unlocking of project entities.
///
/// Locks prevent direct edits to entities after certain gates pass. All
/// operations are idempotent: an already-locked tuple is skipped silently,
/// and "already unlocked" is never an error.
pub struct EntityLockService {
    ledger: Arc<LockLedger>,
    projects: Arc<ProjectStore>,
    registry: Arc<GateRegistry>,
    bus: Arc<EventBus>,
}

impl EntityLockService {
    pub fn new(
        ledger: Arc<LockLedger>,
        projects: Arc<ProjectStore>,
        registry: Arc<GateRegistry>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            ledger,
            projects,
            registry,
            bus,
        }
    }

    /// Apply locks for a gate that just passed.
    ///
    /// Returns only the newly created locks; calling twice for the same
    /// project and gate yields the same active set and an empty second
    /// result.
    pub fn apply_gate_locks(
        &self,
        project_id: &ProjectId,
        gate: &Gate,
        actor: &ActorId,
    ) -> EngineResult<Vec<EntityLock>> {
        let mut created = Vec::new();
        for category in gate.lock_categories() {
            created.extend(self.apply_category(project_id, gate, category, actor)?);
        }
        Ok(created)
    }

    fn apply_category(
        &self,
        project_id: &ProjectId,
        gate: &Gate,
        category: LockCategory,
        actor: &ActorId,
    ) -> EngineResult<Vec<EntityLock>> {
        let locks: Vec<EntityLock> = category
            .entity_kinds()
            .iter()
            .map(|kind| {
                EntityLock::new(
                    project_id.clone(),
                    *kind,
                    None,
                    category.level(),
                    gate.key.clone(),
                    actor.clone(),
                )
            })
            .collect();

        let created = self.ledger.append_all_if_absent(locks)?;
        self.stamp_project(project_id, category, actor)?;

        info!(
            project = %project_id,
            gate = %gate.key,
            category = %category,
            locks_created = created.len(),
            "lock category applied"
        );

        let event = match category {
            LockCategory::Design => WorkflowEvent::DesignLocked {
                project: project_id.clone(),
                gate: gate.key.clone(),
                locks_created: created.len(),
            },
            LockCategory::Procurement => WorkflowEvent::ProcurementLocked {
                project: project_id.clone(),
                gate: gate.key.clone(),
                locks_created: created.len(),
            },
            LockCategory::Production => WorkflowEvent::ProductionLocked {
                project: project_id.clone(),
                gate: gate.key.clone(),
                locks_created: created.len(),
            },
        };
        self.bus.publish(event);

        Ok(created)
    }

    /// Stamp the project's per-category lock fields. Design locking also
    /// captures the BOM and pricing snapshots — once; snapshots already
    /// captured are left untouched.
    fn stamp_project(
        &self,
        project_id: &ProjectId,
        category: LockCategory,
        actor: &ActorId,
    ) -> EngineResult<()> {
        let now = Utc::now();
        let actor = actor.clone();
        self.projects.update(project_id, |project| match category {
            LockCategory::Design => {
                project.design_locked_at = Some(now);
                project.design_locked_by = Some(actor.clone());
                if project.bom_snapshot.is_none() {
                    let snapshot = bom_snapshot_of(project);
                    project.bom_snapshot = Some(snapshot);
                }
                if project.pricing_snapshot.is_none() {
                    let snapshot = pricing_snapshot_of(project);
                    project.pricing_snapshot = Some(snapshot);
                }
            }
            LockCategory::Procurement => {
                project.procurement_locked_at = Some(now);
                project.procurement_locked_by = Some(actor.clone());
            }
            LockCategory::Production => {
                project.production_locked_at = Some(now);
                project.production_locked_by = Some(actor.clone());
            }
        })?;
        Ok(())
    }

    /// Whether any active lock covers the entity (and level, if given).
    ///
    /// A Full lock satisfies any requested level.
    pub fn is_locked(
        &self,
        project: &ProjectId,
        entity_kind: EntityKind,
        entity_id: Option<EntityId>,
        level: Option<LockLevel>,
    ) -> bool {
        let matches = self.ledger.active_matching(project, entity_kind, entity_id);
        match level {
            Some(level) => matches.iter().any(|l| l.level.subsumes(level)),
            None => !matches.is_empty(),
        }
    }

    /// Whether any active lock freezes the given field on the entity.
    pub fn is_field_locked(
        &self,
        project: &ProjectId,
        entity_kind: EntityKind,
        entity_id: Option<EntityId>,
        field: &str,
    ) -> bool {
        self.ledger
            .active_matching(project, entity_kind, entity_id)
            .iter()
            .any(|l| l.blocks_field(field))
    }

    /// The most restrictive active lock covering the entity, if any.
    pub fn lock_info(
        &self,
        project: &ProjectId,
        entity_kind: EntityKind,
        entity_id: Option<EntityId>,
    ) -> Option<EntityLock> {
        self.ledger
            .active_matching(project, entity_kind, entity_id)
            .into_iter()
            .next()
    }

    /// Release the locks held by the change order's gate.
    ///
    /// Returns the number of locks released. The gate is required: change
    /// orders without one are rejected at creation, so there is no
    /// release-everything fallback here.
    pub fn unlock_for_change_order(
        &self,
        change_order: &ChangeOrder,
        actor: &ActorId,
    ) -> EngineResult<usize> {
        if change_order.unlocks_gate.is_empty() {
            return Err(EngineError::MissingUnlockGate(change_order.number.clone()));
        }

        let released = self.ledger.release_for_gate(
            &change_order.project,
            &change_order.unlocks_gate,
            &change_order.number,
            actor,
            Utc::now(),
        )?;

        info!(
            project = %change_order.project,
            change_order = %change_order.number,
            gate = %change_order.unlocks_gate,
            locks_released = released,
            "locks released for change order"
        );
        Ok(released)
    }

    /// Re-apply the gate's lock set after a change order is applied or
    /// cancelled-from-approved. Returns the number of locks created.
    pub fn relock_after_change_order(
        &self,
        change_order: &ChangeOrder,
        actor: &ActorId,
    ) -> EngineResult<usize> {
        let Some(gate) = self.registry.get(&change_order.unlocks_gate) else {
            warn!(
                change_order = %change_order.number,
                gate = %change_order.unlocks_gate,
                "cannot relock: gate no longer registered"
            );
            return Ok(0);
        };
        let gate = gate.clone();

        let created = self.apply_gate_locks(&change_order.project, &gate, actor)?;

        info!(
            project = %change_order.project,
            change_order = %change_order.number,
            locks_created = created.len(),
            "locks reapplied after change order"
        );
        Ok(created.len())
    }

    /// Active locks for a project (query surface for UI panels).
    pub fn active_locks(&self, project: &ProjectId) -> Vec<EntityLock> {
        self.ledger.active_for_project(project)
    }
}

fn bom_snapshot_of(project: &Project) -> BomSnapshot {
    BomSnapshot {
        lines: project
            .bom_lines
            .iter()
            .map(|line| BomSnapshotLine {
                bom_line_id: line.id,
                product: line.product.clone(),
                component_name: line.component_name.clone(),
                quantity: line.quantity,
                unit: line.unit.clone(),
                material_cost: line.material_cost,
            })
            .collect(),
        captured_at: Utc::now(),
    }
}

fn pricing_snapshot_of(project: &Project) -> PricingSnapshot {
    PricingSnapshot {
        total_estimate: project.rooms.iter().map(|r| r.estimated_value).sum(),
        quoted_price: project.rooms.iter().map(|r| r.quoted_price).sum(),
        rooms: project
            .rooms
            .iter()
            .map(|room| RoomPricing {
                room_id: room.id,
                name: room.name.clone(),
                estimated_value: room.estimated_value,
                quoted_price: room.quoted_price,
                linear_feet: room.linear_feet,
            })
            .collect(),
        captured_at: Utc::now(),
    }
}
