//! Lock-free skip list from crossbeam

use super::ConcurrentMap;
use crossbeam_skiplist::SkipMap;

/// `crossbeam_skiplist::SkipMap<u64, u64>`
///
/// Every operation is a single traversal. `SkipMap::insert` does not hand back
/// the entry it replaced, so `insert` always reports no previous value.
pub struct SkipListMap {
    map: SkipMap<u64, u64>,
}

impl SkipListMap {
    pub fn new() -> Self {
        Self { map: SkipMap::new() }
    }
}

impl Default for SkipListMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ConcurrentMap for SkipListMap {
    fn name(&self) -> &'static str {
        "skiplist"
    }

    fn insert(&self, _tid: usize, key: u64, value: u64) -> Option<u64> {
        self.map.insert(key, value);
        None
    }

    fn insert_if_absent(&self, _tid: usize, key: u64, value: u64) -> Option<u64> {
        let mut inserted = false;
        let entry = self.map.get_or_insert_with(key, || {
            inserted = true;
            value
        });
        if inserted {
            None
        } else {
            Some(*entry.value())
        }
    }

    fn find(&self, _tid: usize, key: u64) -> Option<u64> {
        self.map.get(&key).map(|e| *e.value())
    }

    fn contains(&self, _tid: usize, key: u64) -> bool {
        self.map.contains_key(&key)
    }

    fn erase(&self, _tid: usize, key: u64) -> Option<u64> {
        self.map.remove(&key).map(|e| *e.value())
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_insert_overwrites() {
        let map = SkipListMap::new();
        assert_eq!(map.insert(0, 1, 10), None);
        map.insert(0, 1, 11);
        assert_eq!(map.find(0, 1), Some(11));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_racing_insert_if_absent_has_one_winner() {
        for key in 0..50u64 {
            let map = SkipListMap::new();
            let winners = AtomicUsize::new(0);
            std::thread::scope(|s| {
                for tid in 0..4u64 {
                    let (map, winners) = (&map, &winners);
                    s.spawn(move || {
                        match map.insert_if_absent(tid as usize, key, tid) {
                            None => {
                                winners.fetch_add(1, Ordering::SeqCst);
                            }
                            Some(existing) => assert!(existing < 4),
                        }
                    });
                }
            });
            assert_eq!(winners.load(Ordering::SeqCst), 1, "key {}", key);
            assert_eq!(map.len(), 1);
        }
    }
}
