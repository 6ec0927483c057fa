//! Workload configuration types

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key distribution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum DistributionType {
    Uniform,
    /// Zipfian ranks scattered over the domain by a mix hash
    Zipf { skew: f64 },
    /// Zipfian ranks returned as-is, 0 most probable
    ZipfRank { skew: f64 },
    /// Zipfian ranks, each owning an equal slice of a larger index space
    Pim { skew: f64, index_max: u64 },
}

impl Default for DistributionType {
    fn default() -> Self {
        Self::Uniform
    }
}

impl DistributionType {
    /// Skew exponent, if this is a zipf-family distribution
    pub fn skew(&self) -> Option<f64> {
        match *self {
            DistributionType::Uniform => None,
            DistributionType::Zipf { skew }
            | DistributionType::ZipfRank { skew }
            | DistributionType::Pim { skew, .. } => Some(skew),
        }
    }
}

/// A distribution together with the size of its rank domain `[0, max)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionConfig {
    #[serde(flatten)]
    pub distribution: DistributionType,
    pub max: u64,
}

impl DistributionConfig {
    pub fn uniform(max: u64) -> Self {
        Self { distribution: DistributionType::Uniform, max }
    }

    pub fn zipf(max: u64, skew: f64) -> Self {
        Self { distribution: DistributionType::Zipf { skew }, max }
    }

    pub fn zipf_rank(max: u64, skew: f64) -> Self {
        Self { distribution: DistributionType::ZipfRank { skew }, max }
    }

    pub fn pim(max: u64, skew: f64, index_max: u64) -> Self {
        Self { distribution: DistributionType::Pim { skew, index_max }, max }
    }

    /// Exclusive upper bound of the keys this distribution produces
    pub fn key_bound(&self) -> u64 {
        match self.distribution {
            DistributionType::Pim { index_max, .. } => {
                let width = index_max / self.max.max(1);
                width * self.max
            }
            _ => self.max,
        }
    }
}

/// What a phase asks of the structure under test
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PhaseKind {
    /// Unconditional inserts, used to populate the structure
    Load,
    /// Lookups only
    Search,
    /// insertIfAbsent only
    Insert,
    /// Lookup with probability `read_ratio`, otherwise insertIfAbsent
    Mixed { read_ratio: f64 },
    /// Replay of tagged log records, verb taken from each record
    Replay,
}

/// Lookup verb used by search and mixed phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LookupVerb {
    #[default]
    Find,
    Contains,
}

/// Bundled structures under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum StructureType {
    #[default]
    Btree,
    Skiplist,
}

/// Hardware counter backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CounterBackend {
    /// perf if the kernel allows it, otherwise none
    #[default]
    Auto,
    Perf,
    None,
}

/// On-disk operation log layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum KeyFormat {
    /// Tagged fixed-width operation records
    #[default]
    Records,
    /// Raw untagged 64-bit keys
    Keys,
}

impl fmt::Display for DistributionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistributionType::Uniform => write!(f, "uniform"),
            DistributionType::Zipf { skew } => write!(f, "zipf(skew={})", skew),
            DistributionType::ZipfRank { skew } => write!(f, "zipf-rank(skew={})", skew),
            DistributionType::Pim { skew, index_max } => {
                write!(f, "pim(skew={}, index_max={})", skew, index_max)
            }
        }
    }
}

impl fmt::Display for DistributionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} over [0, {})", self.distribution, self.max)
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseKind::Load => write!(f, "load"),
            PhaseKind::Search => write!(f, "search"),
            PhaseKind::Insert => write!(f, "insert"),
            PhaseKind::Mixed { read_ratio } => write!(f, "mixed(read_ratio={})", read_ratio),
            PhaseKind::Replay => write!(f, "replay"),
        }
    }
}

impl fmt::Display for StructureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructureType::Btree => write!(f, "btree"),
            StructureType::Skiplist => write!(f, "skiplist"),
        }
    }
}

impl fmt::Display for CounterBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CounterBackend::Auto => write!(f, "auto"),
            CounterBackend::Perf => write!(f, "perf"),
            CounterBackend::None => write!(f, "none"),
        }
    }
}

impl fmt::Display for KeyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyFormat::Records => write!(f, "records"),
            KeyFormat::Keys => write!(f, "keys"),
        }
    }
}
