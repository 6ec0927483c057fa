//! skewbench - concurrent ordered-map benchmark under skewed key distributions
//!
//! skewbench drives a concurrent ordered map (the structure under test)
//! through phases of lookups and inserts whose keys follow a Zipfian,
//! rank-Zipfian or PIM-style skew, and reports throughput, hit ratio,
//! latency and per-operation hardware counters.
//!
//! # Architecture
//!
//! - **Samplers** ([`distribution`]): uniform, zipf, zipf-rank and pim
//! - **Operation sources** ([`source`]): sampled keys, key logs or record logs,
//!   partitioned across threads
//! - **Harness** ([`harness`]): phase state machine over scoped worker threads
//! - **Metrics** ([`stats`]): per-thread stats folded after every phase
//! - **Operation logs** ([`oplog`]): memory-mapped fixed-width records

pub mod config;
pub mod counters;
pub mod distribution;
pub mod error;
pub mod harness;
pub mod oplog;
pub mod output;
pub mod source;
pub mod stats;
pub mod sut;
pub mod util;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use error::BenchError;
pub use harness::{Harness, PhasePlan};

/// Result type used throughout skewbench
pub type Result<T> = anyhow::Result<T>;
