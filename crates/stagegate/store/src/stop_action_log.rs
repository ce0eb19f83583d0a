//! Append-only log of executed stop actions.

use chrono::{DateTime, Utc};
use stagegate_types::{
    ActorId, ChangeOrderNumber, StopActionKind, StopActionRecord, StoreError,
};
use std::sync::RwLock;

/// Audit rows for stop actions, one per block/hold performed.
///
/// Reversal reads the active rows for a change order and restores exactly
/// what was executed; rows are stamped as reverted, never deleted.
#[derive(Default)]
pub struct StopActionLog {
    records: RwLock<Vec<StopActionRecord>>,
}

impl StopActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, record: StopActionRecord) -> Result<(), StoreError> {
        let mut guard = self
            .records
            .write()
            .map_err(|_| StoreError::Poisoned("stop action log"))?;
        guard.push(record);
        Ok(())
    }

    /// Un-reverted records for a change order.
    pub fn active_for(&self, change_order: &ChangeOrderNumber) -> Vec<StopActionRecord> {
        self.records
            .read()
            .map(|guard| {
                guard
                    .iter()
                    .filter(|r| r.is_active() && &r.change_order == change_order)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Un-reverted records of one kind for a change order.
    pub fn active_of_kind(
        &self,
        change_order: &ChangeOrderNumber,
        kind: StopActionKind,
    ) -> Vec<StopActionRecord> {
        self.active_for(change_order)
            .into_iter()
            .filter(|r| r.kind == kind)
            .collect()
    }

    /// Stamp a batch of records reverted under one write guard.
    pub fn mark_reverted(
        &self,
        ids: &[uuid::Uuid],
        actor: &ActorId,
        at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let mut guard = self
            .records
            .write()
            .map_err(|_| StoreError::Poisoned("stop action log"))?;

        let mut marked = 0;
        for record in guard.iter_mut() {
            if record.is_active() && ids.contains(&record.id) {
                record.mark_reverted(actor.clone(), at);
                marked += 1;
            }
        }
        Ok(marked)
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
