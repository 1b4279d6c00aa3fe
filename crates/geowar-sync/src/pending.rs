//! Table of locally applied, not yet confirmed operations.
//!
//! Each entity carries at most one pending entry: a newer local operation on
//! the same entity replaces the older guess but keeps the original baseline,
//! so rolling back always returns to the last canonical value.

use std::collections::{BTreeMap, BTreeSet};

use geowar_types::{EntityRef, EntitySnapshot, OperationId};

/// One optimistic change awaiting its canonical answer.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    /// Operation that produced the optimistic value.
    pub op_id: OperationId,
    /// Last canonical value, `None` when the entity did not exist.
    pub baseline: Option<EntitySnapshot>,
    /// Value written locally, `None` when the operation removed the entity.
    pub optimistic: Option<EntitySnapshot>,
}

/// Pending entries indexed by entity and by operation.
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: BTreeMap<EntityRef, PendingEntry>,
    ops: BTreeMap<OperationId, BTreeSet<EntityRef>>,
}

impl PendingTable {
    /// Create an empty table.
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            ops: BTreeMap::new(),
        }
    }

    /// Record an optimistic value for `entity`.
    ///
    /// When another operation was already pending on the entity its guess is
    /// discarded, its baseline inherited, and its id returned.
    pub fn record(
        &mut self,
        op_id: OperationId,
        entity: EntityRef,
        baseline: Option<EntitySnapshot>,
        optimistic: Option<EntitySnapshot>,
    ) -> Option<OperationId> {
        let previous = self.entries.remove(&entity);
        let superseded = previous
            .as_ref()
            .map(|entry| entry.op_id)
            .filter(|previous_op| *previous_op != op_id);
        if let Some(previous_op) = previous.as_ref().map(|entry| entry.op_id) {
            self.unlink(previous_op, entity);
        }
        let baseline = previous.map_or(baseline, |entry| entry.baseline);
        self.entries.insert(
            entity,
            PendingEntry {
                op_id,
                baseline,
                optimistic,
            },
        );
        self.ops.entry(op_id).or_default().insert(entity);
        superseded
    }

    /// Pending entry for `entity`.
    pub fn get(&self, entity: EntityRef) -> Option<&PendingEntry> {
        self.entries.get(&entity)
    }

    /// Remove and return the entry for `entity`.
    pub fn resolve(&mut self, entity: EntityRef) -> Option<PendingEntry> {
        let entry = self.entries.remove(&entity)?;
        self.unlink(entry.op_id, entity);
        Some(entry)
    }

    /// Replace the baseline of a pending entry with a newer canonical value.
    pub fn rebase(&mut self, entity: EntityRef, canonical: Option<EntitySnapshot>) {
        if let Some(entry) = self.entries.get_mut(&entity) {
            entry.baseline = canonical;
        }
    }

    /// Remove every entry recorded under `op_id`.
    pub fn take_op(&mut self, op_id: OperationId) -> Vec<(EntityRef, PendingEntry)> {
        let Some(entities) = self.ops.remove(&op_id) else {
            return Vec::new();
        };
        entities
            .into_iter()
            .filter_map(|entity| self.entries.remove(&entity).map(|entry| (entity, entry)))
            .collect()
    }

    /// Drop everything. Returns the operations that were still pending.
    pub fn clear(&mut self) -> Vec<OperationId> {
        self.entries.clear();
        let ops = std::mem::take(&mut self.ops);
        ops.into_keys().collect()
    }

    /// Whether `op_id` still has unconfirmed entries.
    pub fn contains_op(&self, op_id: OperationId) -> bool {
        self.ops.contains_key(&op_id)
    }

    /// Entities still pending under `op_id`.
    pub fn entities_of(&self, op_id: OperationId) -> Vec<EntityRef> {
        self.ops
            .get(&op_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of pending entities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn unlink(&mut self, op_id: OperationId, entity: EntityRef) {
        if let Some(set) = self.ops.get_mut(&op_id) {
            set.remove(&entity);
            if set.is_empty() {
                self.ops.remove(&op_id);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use geowar_types::{Player, PlayerId};

    use super::*;

    fn player(name: &str) -> EntitySnapshot {
        EntitySnapshot::Player(Player::new(name, Utc::now()))
    }

    #[test]
    fn newer_op_supersedes_but_keeps_baseline() {
        let mut table = PendingTable::new();
        let base = player("base");
        let entity = base.entity_ref();
        let first = OperationId::new();
        let second = OperationId::new();

        assert_eq!(table.record(first, entity, Some(base.clone()), Some(player("a"))), None);
        let superseded = table.record(second, entity, Some(player("a")), Some(player("b")));

        assert_eq!(superseded, Some(first));
        assert!(!table.contains_op(first));
        let entry = table.get(entity).unwrap();
        assert_eq!(entry.op_id, second);
        assert_eq!(entry.baseline, Some(base));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn take_op_returns_all_entities_of_the_op() {
        let mut table = PendingTable::new();
        let op = OperationId::new();
        let a = EntityRef::Player(PlayerId::new());
        let b = EntityRef::Player(PlayerId::new());
        table.record(op, a, None, None);
        table.record(op, b, None, None);

        assert_eq!(table.entities_of(op).len(), 2);
        let taken = table.take_op(op);
        assert_eq!(taken.len(), 2);
        assert!(table.is_empty());
        assert!(!table.contains_op(op));
    }

    #[test]
    fn resolve_unlinks_the_op_once_empty() {
        let mut table = PendingTable::new();
        let op = OperationId::new();
        let entity = EntityRef::Player(PlayerId::new());
        table.record(op, entity, None, Some(player("x")));

        assert!(table.resolve(entity).is_some());
        assert!(!table.contains_op(op));
        assert!(table.resolve(entity).is_none());
    }

    #[test]
    fn clear_reports_discarded_ops() {
        let mut table = PendingTable::new();
        let op = OperationId::new();
        table.record(op, EntityRef::Player(PlayerId::new()), None, None);
        assert_eq!(table.clear(), vec![op]);
        assert!(table.is_empty());
    }
}
