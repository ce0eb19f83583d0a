//! The project aggregate as seen by the workflow core.

use crate::{ActorId, BomSnapshot, ChangeOrderNumber, PricingSnapshot};
use crate::ids::ProjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A live BOM line (source data for the design-lock snapshot).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BomLine {
    pub id: u64,
    pub product: String,
    pub component_name: String,
    pub quantity: f64,
    pub unit: String,
    pub material_cost: f64,
}

/// A room with its pricing figures (source data for the pricing snapshot).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Room {
    pub id: u64,
    pub name: String,
    pub estimated_value: f64,
    pub quoted_price: f64,
    pub linear_feet: f64,
}

/// A custom manufacturing project.
///
/// Carries the lock stamps, captured snapshots, and the denormalized
/// pending-change-order flags used for fast checks. Cabinets, doors and the
/// rest of the lockable entities live in their own modules; the workflow core
/// references them by kind and id only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub number: String,
    pub name: String,
    pub stage_key: String,
    pub customer: Option<String>,
    pub bom_lines: Vec<BomLine>,
    pub rooms: Vec<Room>,

    pub design_locked_at: Option<DateTime<Utc>>,
    pub design_locked_by: Option<ActorId>,
    pub procurement_locked_at: Option<DateTime<Utc>>,
    pub procurement_locked_by: Option<ActorId>,
    pub production_locked_at: Option<DateTime<Utc>>,
    pub production_locked_by: Option<ActorId>,

    pub bom_snapshot: Option<BomSnapshot>,
    pub pricing_snapshot: Option<PricingSnapshot>,

    pub has_pending_change_order: bool,
    pub active_change_order: Option<ChangeOrderNumber>,
    pub delivery_blocked: bool,
}

impl Project {
    pub fn new(
        id: ProjectId,
        number: impl Into<String>,
        name: impl Into<String>,
        stage_key: impl Into<String>,
    ) -> Self {
        Self {
            id,
            number: number.into(),
            name: name.into(),
            stage_key: stage_key.into(),
            customer: None,
            bom_lines: Vec::new(),
            rooms: Vec::new(),
            design_locked_at: None,
            design_locked_by: None,
            procurement_locked_at: None,
            procurement_locked_by: None,
            production_locked_at: None,
            production_locked_by: None,
            bom_snapshot: None,
            pricing_snapshot: None,
            has_pending_change_order: false,
            active_change_order: None,
            delivery_blocked: false,
        }
    }

    pub fn with_customer(mut self, customer: impl Into<String>) -> Self {
        self.customer = Some(customer.into());
        self
    }

    pub fn with_bom_line(mut self, line: BomLine) -> Self {
        self.bom_lines.push(line);
        self
    }

    pub fn with_room(mut self, room: Room) -> Self {
        self.rooms.push(room);
        self
    }

    pub fn is_design_locked(&self) -> bool {
        self.design_locked_at.is_some()
    }

    pub fn is_procurement_locked(&self) -> bool {
        self.procurement_locked_at.is_some()
    }

    pub fn is_production_locked(&self) -> bool {
        self.production_locked_at.is_some()
    }

    /// Headline state captured into every gate evaluation record.
    pub fn context(&self) -> HashMap<String, String> {
        let mut ctx = HashMap::new();
        ctx.insert("project_number".into(), self.number.clone());
        ctx.insert("stage_key".into(), self.stage_key.clone());
        ctx.insert("room_count".into(), self.rooms.len().to_string());
        ctx.insert("bom_line_count".into(), self.bom_lines.len().to_string());
        if let Some(customer) = &self.customer {
            ctx.insert("customer".into(), customer.clone());
        }
        ctx
    }
}
