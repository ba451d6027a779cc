#![forbid(unsafe_code)]

//! Object pool backing the operation log.
//!
//! Every operation references one pool slot. The slot holds either a deep
//! copy of the object taken before a modification, or the object's own
//! handle for creations and removals.
//!
//! # Lifetime
//!
//! ```text
//! register ──► add() ──► slot live ──► remove(slot)
//!                                        │
//!                    reachable from model? ─── no ──► freed
//!                                        │
//!                                       yes ──► deferred (kept until pool drop)
//! ```
//!
//! Deferred entries are never pruned incrementally. An object that becomes
//! unreachable after being deferred is only released when the pool itself
//! is dropped.

use std::collections::BTreeMap;
use std::fmt;

use crate::model::SchemaModel;
use crate::object::ObjectHandle;

use super::operation::OperationKind;

/// Stable reference to a pooled object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolSlot(u64);

impl PoolSlot {
    /// Get the raw slot number.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PoolSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outcome of removing a slot from the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposal {
    /// The object was dropped.
    Freed,
    /// The object is still reachable from the model and was moved to the
    /// deferred-deletion list.
    Deferred,
}

struct PoolEntry<O> {
    object: ObjectHandle<O>,
    kind: OperationKind,
}

/// Owned storage for object snapshots referenced by operations.
pub struct ObjectPool<O> {
    entries: BTreeMap<PoolSlot, PoolEntry<O>>,
    deferred: Vec<ObjectHandle<O>>,
    next_slot: u64,
}

impl<O> fmt::Debug for ObjectPool<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("live", &self.entries.len())
            .field("deferred", &self.deferred.len())
            .field("next_slot", &self.next_slot)
            .finish()
    }
}

impl<O> Default for ObjectPool<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O> ObjectPool<O> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            deferred: Vec::new(),
            next_slot: 0,
        }
    }

    /// Take ownership of `object` and return its slot.
    pub fn add(&mut self, object: ObjectHandle<O>, kind: OperationKind) -> PoolSlot {
        let slot = PoolSlot(self.next_slot);
        self.next_slot += 1;
        self.entries.insert(slot, PoolEntry { object, kind });
        slot
    }

    /// Whether `object` (by identity) is a live pool entry.
    #[must_use]
    pub fn contains(&self, object: &ObjectHandle<O>) -> bool {
        self.entries.values().any(|e| e.object.ptr_eq(object))
    }

    /// Whether `slot` is still live.
    #[must_use]
    pub fn has_slot(&self, slot: PoolSlot) -> bool {
        self.entries.contains_key(&slot)
    }

    /// Object stored in `slot`.
    #[must_use]
    pub fn get(&self, slot: PoolSlot) -> Option<&ObjectHandle<O>> {
        self.entries.get(&slot).map(|e| &e.object)
    }

    /// Replace the object stored in `slot`, keeping the slot number.
    pub(crate) fn replace(&mut self, slot: PoolSlot, object: ObjectHandle<O>) -> bool {
        match self.entries.get_mut(&slot) {
            Some(entry) => {
                entry.object = object;
                true
            }
            None => false,
        }
    }

    /// Remove `slot`, freeing the object unless `model` still reaches it.
    ///
    /// Returns `None` when the slot was not live.
    pub fn remove<M>(&mut self, slot: PoolSlot, model: &M) -> Option<Disposal>
    where
        M: SchemaModel<Object = O>,
    {
        let entry = self.entries.remove(&slot)?;
        let disposal = if model.is_reachable(&entry.object) {
            self.deferred.push(entry.object);
            Disposal::Deferred
        } else {
            Disposal::Freed
        };
        tracing::trace!(
            target: "schema_history.oplog",
            slot = slot.raw(),
            kind = ?entry.kind,
            disposal = ?disposal,
            "pool slot removed"
        );
        Some(disposal)
    }

    /// Remove every live slot, honouring the deferred-deletion rule.
    pub fn clear<M>(&mut self, model: &M)
    where
        M: SchemaModel<Object = O>,
    {
        let slots: Vec<PoolSlot> = self.entries.keys().copied().collect();
        for slot in slots {
            self.remove(slot, model);
        }
    }

    /// Number of live slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no live slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Objects awaiting destruction with the pool.
    #[must_use]
    pub fn deferred(&self) -> &[ObjectHandle<O>] {
        &self.deferred
    }

    #[cfg(test)]
    pub(crate) fn forget(&mut self, slot: PoolSlot) {
        self.entries.remove(&slot);
    }
}

impl<O> Drop for ObjectPool<O> {
    fn drop(&mut self) {
        if !self.deferred.is_empty() {
            tracing::trace!(
                target: "schema_history.oplog",
                deferred = self.deferred.len(),
                "releasing deferred objects"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryModel, MemoryObject};

    #[test]
    fn slots_are_stable_and_unique() {
        let mut pool = ObjectPool::new();
        let a = pool.add(
            ObjectHandle::new(MemoryObject::table("a")),
            OperationKind::Modified,
        );
        let b = pool.add(
            ObjectHandle::new(MemoryObject::table("b")),
            OperationKind::Modified,
        );
        assert_ne!(a, b);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get(a).unwrap().name(), "a");
        assert_eq!(pool.get(b).unwrap().name(), "b");
    }

    #[test]
    fn contains_checks_identity() {
        let mut pool = ObjectPool::new();
        let handle = ObjectHandle::new(MemoryObject::table("users"));
        pool.add(handle.clone(), OperationKind::Created);

        assert!(pool.contains(&handle));
        assert!(!pool.contains(&handle.deep_copy()));
    }

    #[test]
    fn unreachable_object_is_freed() {
        let model = MemoryModel::new();
        let mut pool = ObjectPool::new();
        let handle = ObjectHandle::new(MemoryObject::table("orphan"));
        let slot = pool.add(handle.clone(), OperationKind::Removed);

        assert_eq!(pool.remove(slot, &model), Some(Disposal::Freed));
        assert!(pool.is_empty());
        assert!(pool.deferred().is_empty());
        assert_eq!(handle.share_count(), 1);
    }

    #[test]
    fn reachable_object_is_deferred() {
        let mut model = MemoryModel::new();
        let table = model.add_table("users");
        let mut pool = ObjectPool::new();
        let slot = pool.add(table.clone(), OperationKind::Created);

        assert_eq!(pool.remove(slot, &model), Some(Disposal::Deferred));
        assert!(!pool.has_slot(slot));
        assert_eq!(pool.deferred().len(), 1);
        assert!(pool.deferred()[0].ptr_eq(&table));
    }

    #[test]
    fn removing_dead_slot_is_none() {
        let model = MemoryModel::new();
        let mut pool = ObjectPool::new();
        let slot = pool.add(
            ObjectHandle::new(MemoryObject::table("t")),
            OperationKind::Modified,
        );
        pool.remove(slot, &model);
        assert_eq!(pool.remove(slot, &model), None);
    }

    #[test]
    fn clear_keeps_deferred_entries() {
        let mut model = MemoryModel::new();
        let live = model.add_table("live");
        let mut pool = ObjectPool::new();
        pool.add(live, OperationKind::Created);
        pool.add(
            ObjectHandle::new(MemoryObject::table("gone")),
            OperationKind::Removed,
        );

        pool.clear(&model);
        assert!(pool.is_empty());
        assert_eq!(pool.deferred().len(), 1);
    }

    #[test]
    fn replace_keeps_slot() {
        let mut pool = ObjectPool::new();
        let slot = pool.add(
            ObjectHandle::new(MemoryObject::table("old")),
            OperationKind::Modified,
        );
        assert!(pool.replace(slot, ObjectHandle::new(MemoryObject::table("new"))));
        assert_eq!(pool.get(slot).unwrap().name(), "new");
        assert!(!pool.replace(PoolSlot(99), ObjectHandle::new(MemoryObject::table("x"))));
    }
}
