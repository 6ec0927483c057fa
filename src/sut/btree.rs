//! `BTreeMap` behind a reader-writer lock

use super::ConcurrentMap;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Coarse-grained baseline: one lock for the whole tree
#[derive(Debug, Default)]
pub struct LockedBTree {
    map: RwLock<BTreeMap<u64, u64>>,
}

impl LockedBTree {
    pub fn new() -> Self {
        Self::default()
    }

    // A worker that panicked mid-operation cannot leave the map in a torn
    // state, so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<u64, u64>> {
        self.map.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<u64, u64>> {
        self.map.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ConcurrentMap for LockedBTree {
    fn name(&self) -> &'static str {
        "btree"
    }

    fn insert(&self, _tid: usize, key: u64, value: u64) -> Option<u64> {
        self.write().insert(key, value)
    }

    fn insert_if_absent(&self, _tid: usize, key: u64, value: u64) -> Option<u64> {
        match self.write().entry(key) {
            Entry::Occupied(e) => Some(*e.get()),
            Entry::Vacant(e) => {
                e.insert(value);
                None
            }
        }
    }

    fn find(&self, _tid: usize, key: u64) -> Option<u64> {
        self.read().get(&key).copied()
    }

    fn contains(&self, _tid: usize, key: u64) -> bool {
        self.read().contains_key(&key)
    }

    fn erase(&self, _tid: usize, key: u64) -> Option<u64> {
        self.write().remove(&key)
    }

    fn len(&self) -> usize {
        self.read().len()
    }
}
