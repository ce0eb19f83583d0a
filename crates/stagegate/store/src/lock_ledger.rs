//! Append-only ledger of entity locks.

use chrono::{DateTime, Utc};
use stagegate_types::{
    ActorId, ChangeOrderNumber, EntityId, EntityKind, EntityLock, GateKey, ProjectId, StoreError,
};
use std::sync::RwLock;

/// Durable record of active and released locks.
///
/// Append-only: releasing a lock stamps it, nothing is ever deleted. The
/// active-lock invariant (at most one active lock per identity tuple) is
/// enforced here, under the same write guard as the insert, so concurrent
/// duplicate requests converge instead of double-locking.
#[derive(Default)]
pub struct LockLedger {
    records: RwLock<Vec<EntityLock>>,
}

impl LockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert every lock whose identity tuple has no active record yet.
    ///
    /// The whole batch runs under one write guard: either the category's
    /// missing locks are all created or (on a poisoned lock) none are.
    /// Returns only the newly created locks; duplicates are skipped silently.
    pub fn append_all_if_absent(
        &self,
        locks: Vec<EntityLock>,
    ) -> Result<Vec<EntityLock>, StoreError> {
        let mut guard = self
            .records
            .write()
            .map_err(|_| StoreError::Poisoned("lock ledger"))?;

        let mut created = Vec::new();
        for lock in locks {
            let exists = guard
                .iter()
                .any(|existing| existing.is_active() && existing.key() == lock.key());
            if exists {
                continue;
            }
            guard.push(lock.clone());
            created.push(lock);
        }
        Ok(created)
    }

    /// Active locks for a project.
    pub fn active_for_project(&self, project: &ProjectId) -> Vec<EntityLock> {
        self.records
            .read()
            .map(|guard| {
                guard
                    .iter()
                    .filter(|l| l.is_active() && &l.project == project)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Active locks covering the given entity, most restrictive level first.
    pub fn active_matching(
        &self,
        project: &ProjectId,
        entity_kind: EntityKind,
        entity_id: Option<EntityId>,
    ) -> Vec<EntityLock> {
        let mut matches: Vec<EntityLock> = self
            .records
            .read()
            .map(|guard| {
                guard
                    .iter()
                    .filter(|l| {
                        l.is_active()
                            && &l.project == project
                            && l.applies_to(entity_kind, entity_id)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        matches.sort_by_key(|l| l.level);
        matches
    }

    /// Release active locks held by a gate, stamping the releasing change
    /// order. Runs under one write guard. Returns the number released.
    pub fn release_for_gate(
        &self,
        project: &ProjectId,
        gate: &GateKey,
        change_order: &ChangeOrderNumber,
        actor: &ActorId,
        at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let mut guard = self
            .records
            .write()
            .map_err(|_| StoreError::Poisoned("lock ledger"))?;

        let mut released = 0;
        for lock in guard.iter_mut() {
            if lock.is_active() && &lock.project == project && &lock.locked_by_gate == gate {
                lock.release(change_order.clone(), actor.clone(), at);
                released += 1;
            }
        }
        Ok(released)
    }

    /// Full history for a project, released locks included.
    pub fn history_for_project(&self, project: &ProjectId) -> Vec<EntityLock> {
        self.records
            .read()
            .map(|guard| {
                guard
                    .iter()
                    .filter(|l| &l.project == project)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagegate_types::LockLevel;

    fn lock(kind: EntityKind, level: LockLevel) -> EntityLock {
        EntityLock::new(
            ProjectId::new("p1"),
            kind,
            None,
            level,
            GateKey::new("design_signoff"),
            ActorId::new("alice"),
        )
    }

    #[test]
    fn duplicate_active_tuples_are_skipped() {
        let ledger = LockLedger::new();

        let first = ledger
            .append_all_if_absent(vec![lock(EntityKind::Cabinet, LockLevel::Full)])
            .unwrap();
        assert_eq!(first.len(), 1);

        let second = ledger
            .append_all_if_absent(vec![lock(EntityKind::Cabinet, LockLevel::Full)])
            .unwrap();
        assert!(second.is_empty());
        assert_eq!(ledger.active_for_project(&ProjectId::new("p1")).len(), 1);
    }

    #[test]
    fn release_keeps_history() {
        let ledger = LockLedger::new();
        ledger
            .append_all_if_absent(vec![
                lock(EntityKind::Cabinet, LockLevel::Full),
                lock(EntityKind::Door, LockLevel::Full),
            ])
            .unwrap();

        let released = ledger
            .release_for_gate(
                &ProjectId::new("p1"),
                &GateKey::new("design_signoff"),
                &ChangeOrderNumber::new("CO-001"),
                &ActorId::new("bob"),
                Utc::now(),
            )
            .unwrap();

        assert_eq!(released, 2);
        assert!(ledger.active_for_project(&ProjectId::new("p1")).is_empty());
        assert_eq!(ledger.history_for_project(&ProjectId::new("p1")).len(), 2);
    }

    #[test]
    fn release_is_scoped_to_the_gate() {
        let ledger = LockLedger::new();
        let mut other = lock(EntityKind::BomLine, LockLevel::Full);
        other.locked_by_gate = GateKey::new("procurement_commit");
        ledger
            .append_all_if_absent(vec![lock(EntityKind::Cabinet, LockLevel::Full), other])
            .unwrap();

        let released = ledger
            .release_for_gate(
                &ProjectId::new("p1"),
                &GateKey::new("design_signoff"),
                &ChangeOrderNumber::new("CO-001"),
                &ActorId::new("bob"),
                Utc::now(),
            )
            .unwrap();

        assert_eq!(released, 1);
        let active = ledger.active_for_project(&ProjectId::new("p1"));
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].locked_by_gate, GateKey::new("procurement_commit"));
    }

    #[test]
    fn matching_sorts_most_restrictive_first() {
        let ledger = LockLedger::new();
        ledger
            .append_all_if_absent(vec![
                lock(EntityKind::Cabinet, LockLevel::Dimensions),
                lock(EntityKind::Cabinet, LockLevel::Full),
            ])
            .unwrap();

        let matches = ledger.active_matching(
            &ProjectId::new("p1"),
            EntityKind::Cabinet,
            Some(EntityId(3)),
        );
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].level, LockLevel::Full);
    }

    #[test]
    fn released_tuple_can_be_relocked() {
        let ledger = LockLedger::new();
        ledger
            .append_all_if_absent(vec![lock(EntityKind::Cabinet, LockLevel::Full)])
            .unwrap();
        ledger
            .release_for_gate(
                &ProjectId::new("p1"),
                &GateKey::new("design_signoff"),
                &ChangeOrderNumber::new("CO-001"),
                &ActorId::new("bob"),
                Utc::now(),
            )
            .unwrap();

        let relocked = ledger
            .append_all_if_absent(vec![lock(EntityKind::Cabinet, LockLevel::Full)])
            .unwrap();
        assert_eq!(relocked.len(), 1);
        assert_eq!(ledger.history_for_project(&ProjectId::new("p1")).len(), 2);
    }
}
