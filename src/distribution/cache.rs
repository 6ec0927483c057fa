//! Range table cache
//!
//! Phases that refresh their sampler every batch would otherwise rebuild the
//! same table a hundred times. The cache is a plain owned map: building goes
//! through `&mut self`, so construction is never concurrent. Hand the built
//! `Arc<RangeTable>` to worker threads, not the cache.

use super::zipf::RangeTable;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// Built range tables keyed by `(max, skew)`
#[derive(Debug, Default)]
pub struct TableCache {
    tables: HashMap<(u64, u64), Arc<RangeTable>>,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached table for `(max, skew)`, building it on first use
    ///
    /// Failed builds are not cached.
    pub fn get_or_build(&mut self, max: u64, skew: f64) -> Result<Arc<RangeTable>> {
        let key = (max, skew.to_bits());
        if let Some(table) = self.tables.get(&key) {
            return Ok(Arc::clone(table));
        }

        let table = Arc::new(RangeTable::new(max, skew)?);
        self.tables.insert(key, Arc::clone(&table));
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
