//! Structures under test
//!
//! This module defines the capability contract every benchmarked ordered map
//! must provide. The harness knows nothing else about a structure: it brackets
//! each worker's operations with `init_thread` / `deinit_thread` and issues the
//! verbs below. Outcomes are opaque beyond "a value or no value".
//!
//! # Bundled structures
//!
//! - **btree**: `std::collections::BTreeMap` behind a `RwLock` (coarse-grained
//!   baseline)
//! - **skiplist**: `crossbeam_skiplist::SkipMap` (lock-free)
//!
//! # Example
//!
//! ```
//! use skewbench::sut::{ConcurrentMap, btree::LockedBTree};
//!
//! let map = LockedBTree::new();
//! map.init_thread(0);
//! assert_eq!(map.insert_if_absent(0, 7, 70), None);
//! assert_eq!(map.insert_if_absent(0, 7, 71), Some(70));
//! assert_eq!(map.find(0, 7), Some(70));
//! map.deinit_thread(0);
//! ```

pub mod btree;
pub mod mock;
pub mod skiplist;

use crate::config::workload::StructureType;

/// Concurrent ordered map capability contract
///
/// `None` plays the role of the "no value" sentinel.
///
/// # Thread Safety
///
/// Structures must be `Sync`: one instance is shared by every worker of a
/// phase and mutated concurrently. Any synchronization is the structure's own
/// business.
///
/// # Thread registration
///
/// `init_thread` and `deinit_thread` are called exactly once per worker per
/// phase, on the worker thread, around all of that worker's operations. `tid`
/// is the worker index `0..threads`.
pub trait ConcurrentMap: Sync {
    /// Short name for reports
    fn name(&self) -> &'static str;

    fn init_thread(&self, _tid: usize) {}

    fn deinit_thread(&self, _tid: usize) {}

    /// Insert or overwrite, returning the previous value when the structure
    /// reports it
    fn insert(&self, tid: usize, key: u64, value: u64) -> Option<u64>;

    /// Insert only if `key` is absent; returns the existing value otherwise
    fn insert_if_absent(&self, tid: usize, key: u64, value: u64) -> Option<u64>;

    fn find(&self, tid: usize, key: u64) -> Option<u64>;

    fn contains(&self, tid: usize, key: u64) -> bool {
        self.find(tid, key).is_some()
    }

    /// Remove `key`, returning the removed value
    fn erase(&self, tid: usize, key: u64) -> Option<u64>;

    /// Number of keys currently stored
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Instantiate a bundled structure
pub fn build_structure(kind: StructureType) -> Box<dyn ConcurrentMap> {
    match kind {
        StructureType::Btree => Box::new(btree::LockedBTree::new()),
        StructureType::Skiplist => Box::new(skiplist::SkipListMap::new()),
    }
}
