//! Approximate Zipfian sampling over very large domains
//!
//! The domain `[0, max)` is split into contiguous ranges whose sizes grow by a
//! fixed factor `ERROR_RATIO^(1/skew)`. Inside one range the weights
//! `1/(rank+1)^skew` differ by at most `ERROR_RATIO`, so drawing uniformly
//! within a range keeps the per-key probability within ~1% of the exact Zipf
//! value.
//!
//! Sampling draws `x` in `[0, total_weight)`, binary-searches the first range
//! whose cumulative weight exceeds `x`, then draws uniformly inside it.
//!
//! Range weights are summed exactly for small ranges and estimated with the
//! Euler-Maclaurin formula for large ones, so construction cost depends on the
//! skew only, never on `max`.

use super::{mix, Distribution};
use crate::error::BenchError;
use crate::Result;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::sync::Arc;

/// Upper bound on the number of ranges in one table
pub const MAX_RANGES: usize = 10_000;

/// Largest allowed weight ratio between the first and last key of a range
pub const ERROR_RATIO: f64 = 1.01;

/// Domains at or below this size collide too often under [`mix`] for the
/// scrambled mode to keep its skew
pub const MIN_SCRAMBLED_DOMAIN: u64 = 1000;

/// Ranges up to this many keys are summed term by term
const EXACT_SUM_LIMIT: u64 = 1024;

/// Contiguous sub-range `[start, start + size)` of the domain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeBucket {
    pub start: u64,
    pub size: u64,
    /// Weight of every range up to and including this one
    pub cumulative_weight: f64,
}

impl RangeBucket {
    pub fn end(&self) -> u64 {
        self.start + self.size
    }
}

/// Piecewise approximation of the Zipfian CDF over `[0, max)`
///
/// Buckets partition the domain exactly and their cumulative weights are
/// strictly increasing; the last one equals `total_weight`. When the remaining
/// tail carries less mass than `f64` can add to the running total it is folded
/// into the last bucket.
#[derive(Debug, Clone)]
pub struct RangeTable {
    buckets: Vec<RangeBucket>,
    total_weight: f64,
    max: u64,
    skew: f64,
}

impl RangeTable {
    /// Build the table for `max` keys with exponent `skew`
    ///
    /// # Errors
    ///
    /// Configuration error if `skew` is not a positive finite number, `max` is
    /// zero, or the table would need more than [`MAX_RANGES`] ranges.
    pub fn new(max: u64, skew: f64) -> Result<Self> {
        Self::with_range_limit(max, skew, MAX_RANGES)
    }

    fn with_range_limit(max: u64, skew: f64, range_limit: usize) -> Result<Self> {
        if !(skew > 0.0 && skew.is_finite()) {
            return Err(BenchError::config(format!("zipf skew must be positive, got {}", skew)).into());
        }
        if max == 0 {
            return Err(BenchError::config("zipf domain must not be empty").into());
        }

        let multiplier = ERROR_RATIO.powf(1.0 / skew);
        let mut buckets: Vec<RangeBucket> = Vec::new();
        let mut total_weight = 0.0;
        let mut start = 0u64;

        while start < max {
            if buckets.len() == range_limit {
                return Err(BenchError::config(format!(
                    "zipf over {} keys with skew {} needs more than {} ranges",
                    max, skew, range_limit
                ))
                .into());
            }

            let end = ((start as f64 + 1.0) * multiplier).floor();
            let end = if end >= max as f64 {
                max
            } else {
                (end as u64).clamp(start + 1, max)
            };

            // Keys start..end carry ranks start+1..=end
            let weight = range_weight(start + 1, end, skew);
            let next_total = total_weight + weight;
            if next_total <= total_weight {
                if let Some(last) = buckets.last_mut() {
                    last.size = max - last.start;
                }
                break;
            }
            total_weight = next_total;

            buckets.push(RangeBucket {
                start,
                size: end - start,
                cumulative_weight: total_weight,
            });
            start = end;
        }

        tracing::debug!(
            max,
            skew,
            ranges = buckets.len(),
            total_weight,
            "built zipf range table"
        );

        Ok(Self {
            buckets,
            total_weight,
            max,
            skew,
        })
    }

    /// Draw a rank in `[0, max)`
    #[inline]
    pub fn sample_rank<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        let x = rng.gen::<f64>() * self.total_weight;
        let idx = self
            .buckets
            .partition_point(|b| b.cumulative_weight <= x)
            .min(self.buckets.len() - 1);
        let bucket = &self.buckets[idx];
        bucket.start + rng.gen_range(0..bucket.size)
    }

    pub fn buckets(&self) -> &[RangeBucket] {
        &self.buckets
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn skew(&self) -> f64 {
        self.skew
    }
}

/// Sum of `k^-skew` for `k` in `lo..=hi` (`lo >= 1`)
fn range_weight(lo: u64, hi: u64, skew: f64) -> f64 {
    if hi - lo < EXACT_SUM_LIMIT {
        return (lo..=hi).map(|k| (k as f64).powf(-skew)).sum();
    }

    let a = lo as f64;
    let b = hi as f64;
    let f = |x: f64| x.powf(-skew);
    let df = |x: f64| -skew * x.powf(-skew - 1.0);

    // a^(1-s) * ((b/a)^(1-s) - 1) / (1-s), written to stay stable near s = 1
    let t = 1.0 - skew;
    let log_ratio = (b / a).ln();
    let integral = if t.abs() < 1e-9 {
        log_ratio
    } else {
        a.powf(t) * (t * log_ratio).exp_m1() / t
    };

    integral + (f(a) + f(b)) / 2.0 + (df(b) - df(a)) / 12.0
}

/// How a drawn rank becomes a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZipfMode {
    /// `mix(rank) % max`: hot keys spread across the domain
    Scrambled,
    /// The rank itself: key 0 is the hottest
    Rank,
}

/// Zipf sampler over a shared range table
pub struct ZipfDistribution {
    table: Arc<RangeTable>,
    mode: ZipfMode,
    rng: Xoshiro256PlusPlus,
}

impl ZipfDistribution {
    /// Sampler with its own RNG seeded from `seed`
    pub fn with_seed(table: Arc<RangeTable>, mode: ZipfMode, seed: u64) -> Self {
        Self {
            table,
            mode,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }
}

impl Distribution for ZipfDistribution {
    #[inline]
    fn next_key(&mut self) -> u64 {
        let rank = self.table.sample_rank(&mut self.rng);
        match self.mode {
            ZipfMode::Scrambled => mix(rank) % self.table.max,
            ZipfMode::Rank => rank,
        }
    }
}
