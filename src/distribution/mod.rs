//! Workload samplers
//!
//! A sampler produces one key per call from a configured distribution. All
//! zipf-family samplers share an immutable [`zipf::RangeTable`]: a piecewise
//! approximation of the Zipfian CDF whose size depends only on the skew, so
//! sampling is `O(log buckets)` and memory is `O(buckets)` regardless of the
//! domain size.
//!
//! # Distributions
//!
//! - **uniform**: every key in `[0, max)` equally likely
//! - **zipf**: Zipfian ranks scattered over `[0, max)` with [`mix`]
//! - **zipf-rank**: Zipfian ranks unpermuted, rank 0 is the hottest key
//! - **pim**: Zipfian ranks, each owning an equal contiguous slice of a larger
//!   index space `[0, index_max)`
//!
//! # Threading
//!
//! Tables are shared read-only behind `Arc`. The RNG is the only mutable state
//! and lives in the sampler itself, so each worker owns its own sampler built
//! from a shared [`DistributionTemplate`].
//!
//! # Example
//!
//! ```
//! use skewbench::config::workload::DistributionConfig;
//! use skewbench::distribution::{cache::TableCache, DistributionTemplate};
//!
//! let mut cache = TableCache::new();
//! let template = DistributionTemplate::build(&DistributionConfig::zipf_rank(2000, 1.0), &mut cache, 7).unwrap();
//! let mut sampler = template.instantiate(42);
//! assert!(sampler.next_key() < 2000);
//! ```

pub mod cache;
pub mod pim;
pub mod uniform;
pub mod zipf;

use crate::config::workload::{DistributionConfig, DistributionType};
use crate::error::BenchError;
use crate::Result;
use std::sync::Arc;

use cache::TableCache;
use pim::{PermutationTable, PimDistribution};
use uniform::UniformDistribution;
use zipf::{RangeTable, ZipfDistribution, ZipfMode};

/// Key generator
///
/// `Send` so a sampler can be handed to the worker that owns it. Samplers are
/// never shared: `next_key` mutates the RNG.
pub trait Distribution: Send {
    /// Next key, always below the configured domain
    fn next_key(&mut self) -> u64;
}

/// 64-bit avalanche mix (murmur3 finalizer constants)
///
/// Used to scatter hot Zipfian ranks across the key space and to derive
/// independent RNG seeds.
#[inline]
pub fn mix(mut x: u64) -> u64 {
    x ^= x >> 33;
    x = x.wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    x ^= x >> 29;
    x = x.wrapping_mul(0x1656_67B1_9E37_79F9);
    x ^= x >> 32;
    x
}

/// Seed for stream `stream` of run seed `base`
///
/// Worker `tid` in batch `batch` uses `derive_seed(base, (tid << 32) | batch)`.
pub fn derive_seed(base: u64, stream: u64) -> u64 {
    mix(base ^ mix(stream.wrapping_add(0x9E37_79B9_7F4A_7C15)))
}

/// A built distribution, ready to hand out per-thread samplers
///
/// Building does all the expensive work (range table, permutation); each
/// [`instantiate`](Self::instantiate) only seeds a fresh RNG.
#[derive(Debug, Clone)]
pub enum DistributionTemplate {
    Uniform {
        max: u64,
    },
    Zipf {
        table: Arc<RangeTable>,
        mode: ZipfMode,
    },
    Pim {
        table: Arc<RangeTable>,
        permutation: Arc<PermutationTable>,
        index_max: u64,
    },
}

impl DistributionTemplate {
    /// Build a template, taking range tables from `cache` when possible
    ///
    /// `seed` drives the pim permutation shuffle.
    pub fn build(config: &DistributionConfig, cache: &mut TableCache, seed: u64) -> Result<Self> {
        if config.max == 0 {
            return Err(BenchError::config("distribution domain must not be empty").into());
        }

        let template = match config.distribution {
            DistributionType::Uniform => DistributionTemplate::Uniform { max: config.max },
            DistributionType::Zipf { skew } => {
                if config.max <= zipf::MIN_SCRAMBLED_DOMAIN {
                    tracing::warn!(
                        max = config.max,
                        "zipf over a small domain: hash collisions will flatten the skew, consider zipf-rank"
                    );
                }
                DistributionTemplate::Zipf {
                    table: cache.get_or_build(config.max, skew)?,
                    mode: ZipfMode::Scrambled,
                }
            }
            DistributionType::ZipfRank { skew } => DistributionTemplate::Zipf {
                table: cache.get_or_build(config.max, skew)?,
                mode: ZipfMode::Rank,
            },
            DistributionType::Pim { skew, index_max } => {
                if index_max < config.max {
                    return Err(BenchError::config(format!(
                        "pim index space ({}) must be at least the rank domain ({})",
                        index_max, config.max
                    ))
                    .into());
                }
                let table = cache.get_or_build(config.max, skew)?;
                let permutation = Arc::new(PermutationTable::shuffled(config.max, seed)?);
                DistributionTemplate::Pim {
                    table,
                    permutation,
                    index_max,
                }
            }
        };

        Ok(template)
    }

    /// A sampler owning its own RNG seeded with `seed`
    pub fn instantiate(&self, seed: u64) -> Box<dyn Distribution> {
        match self {
            DistributionTemplate::Uniform { max } => {
                Box::new(UniformDistribution::with_seed(*max, seed))
            }
            DistributionTemplate::Zipf { table, mode } => {
                Box::new(ZipfDistribution::with_seed(Arc::clone(table), *mode, seed))
            }
            DistributionTemplate::Pim {
                table, index_max, ..
            } => Box::new(PimDistribution::with_seed(Arc::clone(table), *index_max, seed)),
        }
    }

    /// The rank permutation of a pim template
    pub fn permutation(&self) -> Option<&PermutationTable> {
        match self {
            DistributionTemplate::Pim { permutation, .. } => Some(permutation),
            _ => None,
        }
    }
}
