//! Skewed ranks over a large uniformly addressed index space
//!
//! A small logical rank space `[0, max)` is drawn with Zipfian skew, then each
//! rank is mapped to its own contiguous slice of width `index_max / max` in
//! the physical space `[0, index_max)`, and a key is drawn uniformly inside
//! that slice. Hot ranks therefore become hot *regions* rather than hot keys.

use super::{mix, zipf::RangeTable, Distribution};
use crate::error::BenchError;
use crate::Result;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::sync::Arc;

/// Largest rank domain for which a permutation is materialized
pub const MAX_PERMUTATION_LEN: u64 = 1 << 24;

/// Random bijection over `[0, len)`
#[derive(Debug, Clone)]
pub struct PermutationTable {
    entries: Vec<u64>,
}

impl PermutationTable {
    /// Fisher-Yates shuffle of the identity, seeded for reproducibility
    pub fn shuffled(len: u64, seed: u64) -> Result<Self> {
        if len > MAX_PERMUTATION_LEN {
            return Err(BenchError::config(format!(
                "pim rank domain {} exceeds the permutation limit of {}",
                len, MAX_PERMUTATION_LEN
            ))
            .into());
        }

        let mut entries: Vec<u64> = (0..len).collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        entries.shuffle(&mut rng);
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.entries
    }
}

/// PIM sampler
///
/// Ranks are scattered with [`mix`]; the phase's [`PermutationTable`] stays
/// with the template and is not consulted per draw.
pub struct PimDistribution {
    table: Arc<RangeTable>,
    index_max: u64,
    width: u64,
    rng: Xoshiro256PlusPlus,
}

impl PimDistribution {
    /// `index_max` must be at least `table.max()`; templates check this.
    pub fn with_seed(table: Arc<RangeTable>, index_max: u64, seed: u64) -> Self {
        let width = (index_max / table.max()).max(1);
        Self {
            table,
            index_max,
            width,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }

    /// Width of the index slice owned by each rank
    pub fn width(&self) -> u64 {
        self.width
    }

    pub fn index_max(&self) -> u64 {
        self.index_max
    }

    /// Slice `[start, end)` of the index space owned by `rank_index`
    pub fn slice_of(&self, rank_index: u64) -> (u64, u64) {
        let start = rank_index * self.width;
        (start, start + self.width)
    }
}

impl Distribution for PimDistribution {
    #[inline]
    fn next_key(&mut self) -> u64 {
        let rank = self.table.sample_rank(&mut self.rng);
        let rank_index = mix(rank) % self.table.max();
        rank_index * self.width + self.rng.gen_range(0..self.width)
    }
}
