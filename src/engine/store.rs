//! Per-entity stores: a preallocated dense slot array for ids below a
//! threshold, plus an overflow map for ids above it. Each dense slot
//! carries its own lock, and each overflow entry is protected by
//! `DashMap`'s per-shard lock — a lock embedded in each record, rather
//! than one coarse lock guarding the whole store's content.

use dashmap::DashMap;
use std::sync::RwLock;

pub struct Store<T> {
    dense: Box<[RwLock<Option<T>>]>,
    overflow: DashMap<i32, T>,
}

impl<T> Store<T> {
    pub fn new(dense_capacity: usize) -> Self {
        Self {
            dense: std::iter::repeat_with(|| RwLock::new(None))
                .take(dense_capacity)
                .collect(),
            overflow: DashMap::new(),
        }
    }

    fn in_dense_range(&self, id: i32) -> bool {
        id >= 0 && (id as usize) < self.dense.len()
    }

    /// Inserts `rec` under `id`. Returns `false` (and drops `rec`) if an
    /// entry already occupies that id — ids are never reused.
    pub fn add(&self, id: i32, rec: T) -> bool {
        if self.in_dense_range(id) {
            let mut slot = self.dense[id as usize].write().unwrap();
            if slot.is_some() {
                return false;
            }
            *slot = Some(rec);
            true
        } else {
            match self.overflow.entry(id) {
                dashmap::mapref::entry::Entry::Occupied(_) => false,
                dashmap::mapref::entry::Entry::Vacant(v) => {
                    v.insert(rec);
                    true
                }
            }
        }
    }

    /// Runs `f` against a read-only reference to the stored record, if
    /// present.
    pub fn read<R>(&self, id: i32, f: impl FnOnce(&T) -> R) -> Option<R> {
        if self.in_dense_range(id) {
            let slot = self.dense[id as usize].read().unwrap();
            slot.as_ref().map(f)
        } else {
            self.overflow.get(&id).map(|r| f(&r))
        }
    }

    /// Runs `f` against a mutable reference to the stored record, if
    /// present. This is the store's sole mutation entry point; the lock
    /// `f` runs under is scoped to this one entity, never the whole store.
    pub fn apply<R>(&self, id: i32, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        if self.in_dense_range(id) {
            let mut slot = self.dense[id as usize].write().unwrap();
            slot.as_mut().map(f)
        } else {
            self.overflow.get_mut(&id).map(|mut r| f(&mut r))
        }
    }

    pub fn contains(&self, id: i32) -> bool {
        self.read(id, |_| ()).is_some()
    }

    /// Clones a snapshot of every stored record. Used for startup stats
    /// only — not a hot-path operation.
    pub fn len(&self) -> usize {
        let dense_count = self
            .dense
            .iter()
            .filter(|slot| slot.read().unwrap().is_some())
            .count();
        dense_count + self.overflow.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_rejects_duplicate_dense_id() {
        let store: Store<i32> = Store::new(16);
        assert!(store.add(3, 100));
        assert!(!store.add(3, 200));
        assert_eq!(store.read(3, |v| *v), Some(100));
    }

    #[test]
    fn add_rejects_duplicate_overflow_id() {
        let store: Store<i32> = Store::new(4);
        assert!(store.add(100, 1));
        assert!(!store.add(100, 2));
        assert_eq!(store.read(100, |v| *v), Some(1));
    }

    #[test]
    fn apply_mutates_in_place() {
        let store: Store<i32> = Store::new(16);
        store.add(1, 10);
        store.apply(1, |v| *v += 5);
        assert_eq!(store.read(1, |v| *v), Some(15));
    }

    #[test]
    fn missing_id_yields_none() {
        let store: Store<i32> = Store::new(4);
        assert_eq!(store.read(9, |v| *v), None);
        assert_eq!(store.apply(9, |v| *v += 1), None);
    }
}
