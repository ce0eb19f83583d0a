//! In-memory change order store.

use stagegate_types::{ChangeOrder, ChangeOrderNumber, ChangeOrderStatus, ProjectId, StoreError};
use std::collections::HashMap;
use std::sync::RwLock;

/// Shared store of change orders, keyed by number.
///
/// Status transitions are committed through [`ChangeOrderStore::transition`],
/// which re-validates the transition under the write guard so concurrent
/// callers cannot both advance the same order.
#[derive(Default)]
pub struct ChangeOrderStore {
    orders: RwLock<HashMap<ChangeOrderNumber, ChangeOrder>>,
}

impl ChangeOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, order: ChangeOrder) -> Result<(), StoreError> {
        let mut guard = self
            .orders
            .write()
            .map_err(|_| StoreError::Poisoned("change order store"))?;
        if guard.contains_key(&order.number) {
            return Err(StoreError::Conflict(format!(
                "change order {} already exists",
                order.number
            )));
        }
        guard.insert(order.number.clone(), order);
        Ok(())
    }

    pub fn get(&self, number: &ChangeOrderNumber) -> Option<ChangeOrder> {
        self.orders
            .read()
            .ok()
            .and_then(|guard| guard.get(number).cloned())
    }

    /// Commit a status transition, stamping extra fields via `mutate`.
    ///
    /// The legality check runs against the stored status under the write
    /// guard; a caller racing a concurrent transition gets
    /// [`StoreError::IllegalTransition`] instead of a double-advance.
    pub fn transition<F>(
        &self,
        number: &ChangeOrderNumber,
        to: ChangeOrderStatus,
        mutate: F,
    ) -> Result<ChangeOrder, StoreError>
    where
        F: FnOnce(&mut ChangeOrder),
    {
        let mut guard = self
            .orders
            .write()
            .map_err(|_| StoreError::Poisoned("change order store"))?;
        let order = guard
            .get_mut(number)
            .ok_or_else(|| StoreError::NotFound(format!("change order {}", number)))?;

        if !order.status.can_transition_to(to) {
            return Err(StoreError::IllegalTransition {
                from: order.status,
                to,
            });
        }

        order.status = to;
        mutate(order);
        Ok(order.clone())
    }

    /// Apply a non-status mutation (e.g. marking lines applied).
    pub fn update<F>(&self, number: &ChangeOrderNumber, mutate: F) -> Result<ChangeOrder, StoreError>
    where
        F: FnOnce(&mut ChangeOrder),
    {
        let mut guard = self
            .orders
            .write()
            .map_err(|_| StoreError::Poisoned("change order store"))?;
        let order = guard
            .get_mut(number)
            .ok_or_else(|| StoreError::NotFound(format!("change order {}", number)))?;
        mutate(order);
        Ok(order.clone())
    }

    /// The project's change order currently occupying the pending slot,
    /// if any (status submitted or approved).
    pub fn pending_for_project(&self, project: &ProjectId) -> Option<ChangeOrder> {
        self.orders
            .read()
            .ok()
            .and_then(|guard| {
                guard
                    .values()
                    .find(|co| &co.project == project && co.status.is_pending())
                    .cloned()
            })
    }

    pub fn for_project(&self, project: &ProjectId) -> Vec<ChangeOrder> {
        self.orders
            .read()
            .map(|guard| {
                guard
                    .values()
                    .filter(|co| &co.project == project)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.orders.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
