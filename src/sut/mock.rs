//! Call-recording structure for testing
//!
//! `MockMap` behaves like an ordinary map but also records every thread
//! registration and counts every verb, so tests can check how the harness
//! drives a structure without depending on a real implementation.
//!
//! # Example
//!
//! ```
//! use skewbench::sut::{ConcurrentMap, mock::{MockMap, Verb}};
//!
//! let map = MockMap::new();
//! map.init_thread(3);
//! map.insert(3, 1, 1);
//! map.deinit_thread(3);
//!
//! assert_eq!(map.registrations(3), (1, 1));
//! assert_eq!(map.calls(Verb::Insert), 1);
//! ```

use super::ConcurrentMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Verbs counted by [`MockMap`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Insert,
    InsertIfAbsent,
    Find,
    Contains,
    Erase,
}

impl Verb {
    const COUNT: usize = 5;
}

/// Registration state of one worker thread
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Registration {
    inits: u32,
    deinits: u32,
    /// Verbs issued while the thread was not between init and deinit
    unregistered_calls: u64,
}

/// Mock structure under test
#[derive(Debug, Default)]
pub struct MockMap {
    map: Mutex<BTreeMap<u64, u64>>,
    threads: Mutex<HashMap<usize, Registration>>,
    calls: [AtomicU64; Verb::COUNT],
}

impl MockMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map pre-populated with `key -> key` for each key
    pub fn with_keys<I: IntoIterator<Item = u64>>(keys: I) -> Self {
        let mock = Self::new();
        {
            let mut map = mock.map.lock().unwrap_or_else(PoisonError::into_inner);
            for key in keys {
                map.insert(key, key);
            }
        }
        mock
    }

    /// `(init_thread, deinit_thread)` call counts for `tid`
    pub fn registrations(&self, tid: usize) -> (u32, u32) {
        let threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        threads
            .get(&tid)
            .map(|r| (r.inits, r.deinits))
            .unwrap_or((0, 0))
    }

    /// Thread ids that registered at least once, sorted
    pub fn registered_threads(&self) -> Vec<usize> {
        let threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<usize> = threads.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Verbs issued by threads outside their init/deinit bracket
    pub fn unregistered_calls(&self) -> u64 {
        let threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        threads.values().map(|r| r.unregistered_calls).sum()
    }

    pub fn calls(&self, verb: Verb) -> u64 {
        self.calls[verb as usize].load(Ordering::Relaxed)
    }

    pub fn total_calls(&self) -> u64 {
        self.calls.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    fn record(&self, tid: usize, verb: Verb) {
        self.calls[verb as usize].fetch_add(1, Ordering::Relaxed);
        let mut threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        let reg = threads.entry(tid).or_default();
        if reg.inits <= reg.deinits {
            reg.unregistered_calls += 1;
        }
    }

    fn with_map<R>(&self, f: impl FnOnce(&mut BTreeMap<u64, u64>) -> R) -> R {
        let mut map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut map)
    }
}

impl ConcurrentMap for MockMap {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn init_thread(&self, tid: usize) {
        let mut threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        threads.entry(tid).or_default().inits += 1;
    }

    fn deinit_thread(&self, tid: usize) {
        let mut threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        threads.entry(tid).or_default().deinits += 1;
    }

    fn insert(&self, tid: usize, key: u64, value: u64) -> Option<u64> {
        self.record(tid, Verb::Insert);
        self.with_map(|m| m.insert(key, value))
    }

    fn insert_if_absent(&self, tid: usize, key: u64, value: u64) -> Option<u64> {
        self.record(tid, Verb::InsertIfAbsent);
        self.with_map(|m| match m.get(&key) {
            Some(&existing) => Some(existing),
            None => {
                m.insert(key, value);
                None
            }
        })
    }

    fn find(&self, tid: usize, key: u64) -> Option<u64> {
        self.record(tid, Verb::Find);
        self.with_map(|m| m.get(&key).copied())
    }

    fn contains(&self, tid: usize, key: u64) -> bool {
        self.record(tid, Verb::Contains);
        self.with_map(|m| m.contains_key(&key))
    }

    fn erase(&self, tid: usize, key: u64) -> Option<u64> {
        self.record(tid, Verb::Erase);
        self.with_map(|m| m.remove(&key))
    }

    fn len(&self) -> usize {
        self.with_map(|m| m.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_tracks_registration() {
        let map = MockMap::new();
        map.find(0, 1);
        map.init_thread(0);
        map.find(0, 1);
        map.deinit_thread(0);

        assert_eq!(map.registrations(0), (1, 1));
        assert_eq!(map.unregistered_calls(), 1);
        assert_eq!(map.calls(Verb::Find), 2);
    }

    #[test]
    fn test_mock_with_keys() {
        let map = MockMap::with_keys(0..10);
        assert_eq!(map.len(), 10);
        assert_eq!(map.find(0, 4), Some(4));
        assert_eq!(map.total_calls(), 1);
    }
}
