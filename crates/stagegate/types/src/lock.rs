//! Entity locks: durable records freezing project data after a gate passes.

use crate::{ActorId, ChangeOrderNumber, EntityId, GateKey, ProjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How much of an entity's field set a lock freezes.
///
/// Levels are ordered by restrictiveness: `Full` subsumes every narrower
/// level. Sorting ascending puts the most restrictive level first.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LockLevel {
    /// Everything except the exempt field set is frozen
    Full,
    /// Geometric fields (widths, heights, depths, quantities) are frozen
    Dimensions,
    /// Material and finish selections are frozen
    Materials,
}

impl LockLevel {
    /// Whether this level also covers `other` (Full covers everything).
    pub fn subsumes(self, other: LockLevel) -> bool {
        self == LockLevel::Full || self == other
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LockLevel::Full => "full",
            LockLevel::Dimensions => "dimensions",
            LockLevel::Materials => "materials",
        }
    }
}

impl std::fmt::Display for LockLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The lockable entity kinds of a cabinetry project.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Cabinet,
    CabinetSection,
    Door,
    Drawer,
    Shelf,
    Pullout,
    BomLine,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Cabinet => "cabinet",
            EntityKind::CabinetSection => "cabinet_section",
            EntityKind::Door => "door",
            EntityKind::Drawer => "drawer",
            EntityKind::Shelf => "shelf",
            EntityKind::Pullout => "pullout",
            EntityKind::BomLine => "bom_line",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Geometric fields frozen by a `Dimensions` lock.
const DIMENSION_FIELDS: &[&str] = &[
    "width_mm",
    "height_mm",
    "depth_mm",
    "length_mm",
    "quantity",
];

/// Material/finish fields frozen by a `Materials` lock.
const MATERIAL_FIELDS: &[&str] = &[
    "material",
    "finish",
    "grain_direction",
    "edge_banding",
    "product",
];

/// Which fields a lock level freezes.
///
/// `Full` blocks every field; callers apply the exemption list separately at
/// enforcement time.
pub fn level_blocks_field(level: LockLevel, field: &str) -> bool {
    match level {
        LockLevel::Full => true,
        LockLevel::Dimensions => DIMENSION_FIELDS.contains(&field),
        LockLevel::Materials => MATERIAL_FIELDS.contains(&field),
    }
}

/// The fixed lock categories a gate can activate on pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockCategory {
    Design,
    Procurement,
    Production,
}

impl LockCategory {
    /// Entity kinds frozen by this category.
    pub fn entity_kinds(&self) -> &'static [EntityKind] {
        match self {
            LockCategory::Design => &[
                EntityKind::Cabinet,
                EntityKind::CabinetSection,
                EntityKind::Door,
                EntityKind::Drawer,
                EntityKind::Shelf,
                EntityKind::Pullout,
            ],
            LockCategory::Procurement => &[EntityKind::BomLine],
            LockCategory::Production => &[
                EntityKind::Cabinet,
                EntityKind::CabinetSection,
                EntityKind::Door,
                EntityKind::Drawer,
            ],
        }
    }

    /// Level the category locks at.
    pub fn level(&self) -> LockLevel {
        match self {
            LockCategory::Design | LockCategory::Procurement => LockLevel::Full,
            LockCategory::Production => LockLevel::Dimensions,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LockCategory::Design => "design",
            LockCategory::Procurement => "procurement",
            LockCategory::Production => "production",
        }
    }
}

impl std::fmt::Display for LockCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A durable lock record.
///
/// A lock is **active** while `unlocked_at` is `None`. Released locks stay in
/// the ledger for audit; they are never deleted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityLock {
    pub project: ProjectId,
    pub entity_kind: EntityKind,
    /// `None` locks every entity of the kind project-wide
    pub entity_id: Option<EntityId>,
    pub level: LockLevel,
    pub locked_by_gate: GateKey,
    pub locked_at: DateTime<Utc>,
    pub locked_by: ActorId,
    pub unlocked_at: Option<DateTime<Utc>>,
    pub unlocked_by: Option<ActorId>,
    pub unlock_change_order: Option<ChangeOrderNumber>,
}

impl EntityLock {
    pub fn new(
        project: ProjectId,
        entity_kind: EntityKind,
        entity_id: Option<EntityId>,
        level: LockLevel,
        locked_by_gate: GateKey,
        locked_by: ActorId,
    ) -> Self {
        Self {
            project,
            entity_kind,
            entity_id,
            level,
            locked_by_gate,
            locked_at: Utc::now(),
            locked_by,
            unlocked_at: None,
            unlocked_by: None,
            unlock_change_order: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.unlocked_at.is_none()
    }

    /// Whether this lock covers the given entity.
    ///
    /// A project-wide lock (no entity id) covers every entity of the kind.
    pub fn applies_to(&self, entity_kind: EntityKind, entity_id: Option<EntityId>) -> bool {
        self.entity_kind == entity_kind
            && (self.entity_id.is_none() || self.entity_id == entity_id)
    }

    /// Whether this lock's level freezes the given field.
    pub fn blocks_field(&self, field: &str) -> bool {
        level_blocks_field(self.level, field)
    }

    /// Identity tuple used for idempotent creation.
    pub fn key(&self) -> (&ProjectId, EntityKind, Option<EntityId>, LockLevel) {
        (&self.project, self.entity_kind, self.entity_id, self.level)
    }

    /// Mark the lock released by a change order. Stamps, never deletes.
    pub fn release(
        &mut self,
        change_order: ChangeOrderNumber,
        actor: ActorId,
        at: DateTime<Utc>,
    ) {
        self.unlocked_at = Some(at);
        self.unlocked_by = Some(actor);
        self.unlock_change_order = Some(change_order);
    }
}

/// One line of the BOM as captured at design-lock time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BomSnapshotLine {
    pub bom_line_id: u64,
    pub product: String,
    pub component_name: String,
    pub quantity: f64,
    pub unit: String,
    pub material_cost: f64,
}

/// Point-in-time copy of the project BOM.
///
/// Captured once when the design lock is applied and never recomputed in
/// place; comparison against the live BOM shows post-lock drift.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BomSnapshot {
    pub lines: Vec<BomSnapshotLine>,
    pub captured_at: DateTime<Utc>,
}

/// Per-room pricing row inside a [`PricingSnapshot`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomPricing {
    pub room_id: u64,
    pub name: String,
    pub estimated_value: f64,
    pub quoted_price: f64,
    pub linear_feet: f64,
}

/// Point-in-time copy of project pricing, captured at design-lock time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PricingSnapshot {
    pub total_estimate: f64,
    pub quoted_price: f64,
    pub rooms: Vec<RoomPricing>,
    pub captured_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_lock(level: LockLevel) -> EntityLock {
        EntityLock::new(
            ProjectId::new("p1"),
            EntityKind::Cabinet,
            None,
            level,
            GateKey::new("design_signoff"),
            ActorId::new("alice"),
        )
    }

    #[test]
    fn full_subsumes_all_levels() {
        assert!(LockLevel::Full.subsumes(LockLevel::Dimensions));
        assert!(LockLevel::Full.subsumes(LockLevel::Materials));
        assert!(LockLevel::Full.subsumes(LockLevel::Full));
        assert!(!LockLevel::Dimensions.subsumes(LockLevel::Full));
        assert!(LockLevel::Dimensions.subsumes(LockLevel::Dimensions));
    }

    #[test]
    fn level_ordering_puts_full_first() {
        let mut levels = vec![LockLevel::Materials, LockLevel::Full, LockLevel::Dimensions];
        levels.sort();
        assert_eq!(levels[0], LockLevel::Full);
    }

    #[test]
    fn full_lock_blocks_any_field() {
        let lock = make_lock(LockLevel::Full);
        assert!(lock.blocks_field("width_mm"));
        assert!(lock.blocks_field("material"));
        assert!(lock.blocks_field("anything_else"));
    }

    #[test]
    fn dimensions_lock_blocks_only_geometry() {
        let lock = make_lock(LockLevel::Dimensions);
        assert!(lock.blocks_field("width_mm"));
        assert!(lock.blocks_field("quantity"));
        assert!(!lock.blocks_field("material"));
        assert!(!lock.blocks_field("notes"));
    }

    #[test]
    fn project_wide_lock_applies_to_any_entity() {
        let lock = make_lock(LockLevel::Full);
        assert!(lock.applies_to(EntityKind::Cabinet, Some(EntityId(7))));
        assert!(lock.applies_to(EntityKind::Cabinet, None));
        assert!(!lock.applies_to(EntityKind::Door, Some(EntityId(7))));
    }

    #[test]
    fn release_stamps_but_keeps_record() {
        let mut lock = make_lock(LockLevel::Full);
        assert!(lock.is_active());

        lock.release(
            ChangeOrderNumber::new("CO-001"),
            ActorId::new("bob"),
            Utc::now(),
        );

        assert!(!lock.is_active());
        assert_eq!(lock.unlock_change_order, Some(ChangeOrderNumber::new("CO-001")));
        assert_eq!(lock.unlocked_by, Some(ActorId::new("bob")));
    }

    #[test]
    fn production_category_locks_dimensions() {
        assert_eq!(LockCategory::Production.level(), LockLevel::Dimensions);
        assert_eq!(LockCategory::Design.level(), LockLevel::Full);
        assert!(LockCategory::Design.entity_kinds().contains(&EntityKind::Shelf));
        assert!(!LockCategory::Production.entity_kinds().contains(&EntityKind::Shelf));
    }
}
