//! CLI argument parsing using clap

use super::workload::{CounterBackend, KeyFormat, LookupVerb, StructureType};
use super::ExecutionMode;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Distribution selector for log generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DistributionMode {
    Uniform,
    /// Zipf with ranks scattered by a mix hash
    Zipf,
    /// Zipf with rank 0 the hottest key
    ZipfRank,
    /// Zipf ranks spread over a larger index space
    Pim,
}

/// skewbench - skewed-workload benchmark for concurrent ordered maps
///
/// The number of positional arguments selects the mode:
///   (none)                   replay operation logs
///   COUNT SKEW               load, then search and insert over a skewed distribution
///   COUNT SKEW READ_RATIO    load, then one mixed phase
#[derive(Parser, Debug, Default)]
#[command(name = "skewbench")]
#[command(version, about, long_about = None, verbatim_doc_comment)]
pub struct Cli {
    /// Keys loaded before the measured phases (measured phases run COUNT/5)
    #[arg(value_name = "COUNT")]
    pub count: Option<u64>,

    /// Zipf skew exponent (> 0)
    #[arg(value_name = "SKEW")]
    pub skew: Option<f64>,

    /// Probability that a mixed-phase operation is a lookup (0.0-1.0)
    #[arg(value_name = "READ_RATIO")]
    pub read_ratio: Option<f64>,

    // === Basic Options ===
    /// Number of worker threads [default: number of CPUs]
    #[arg(short = 't', long, env = "SKEWBENCH_THREADS")]
    pub threads: Option<usize>,

    /// Structure under test
    #[arg(long, value_enum, env = "SKEWBENCH_STRUCTURE")]
    pub structure: Option<StructureType>,

    /// Run the benchmark or generate a log
    #[arg(long, value_enum)]
    pub mode: Option<ExecutionMode>,

    /// TOML configuration file; command-line flags take precedence
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // === Log Replay Options ===
    /// Operation records replayed by the run phase
    #[arg(long, value_name = "PATH", env = "SKEWBENCH_RECORDS_LOG")]
    pub records_log: Option<PathBuf>,

    /// Operation records whose keys populate the structure
    #[arg(long, value_name = "PATH", env = "SKEWBENCH_LOAD_LOG")]
    pub load_log: Option<PathBuf>,

    /// Raw 64-bit keys: first 5/6 loaded, remainder searched then inserted
    #[arg(long, value_name = "PATH", env = "SKEWBENCH_KEYS_LOG")]
    pub keys_log: Option<PathBuf>,

    // === Workload Options ===
    /// Sampler refreshes per phase
    #[arg(long)]
    pub batch_count: Option<usize>,

    /// Logical rank count of pim phases
    #[arg(long)]
    pub pim_ranks: Option<u64>,

    /// Physical key space of synthetic runs [default: i64::MAX]
    #[arg(long)]
    pub index_max: Option<u64>,

    /// Lookup verb of search and mixed phases
    #[arg(long, value_enum)]
    pub lookup: Option<LookupVerb>,

    /// Base seed for reproducible runs
    #[arg(long, env = "SKEWBENCH_SEED")]
    pub seed: Option<u64>,

    // === Hardware Options ===
    /// Hardware counter backend
    #[arg(long, value_enum, env = "SKEWBENCH_COUNTERS")]
    pub counters: Option<CounterBackend>,

    /// Pin worker i to a core
    #[arg(long)]
    pub pin_threads: bool,

    /// Cores to pin to, e.g. "0,2-4" (implies --pin-threads)
    #[arg(long)]
    pub cpu_cores: Option<String>,

    // === Output Options ===
    /// Write a JSON report to this path
    #[arg(long, value_name = "PATH")]
    pub json_output: Option<PathBuf>,

    /// Print latency percentiles
    #[arg(long)]
    pub show_latency: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    // === Generate Options ===
    /// Log file to write (generate mode)
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Log layout (generate mode)
    #[arg(long, value_enum)]
    pub key_format: Option<KeyFormat>,

    /// Key distribution (generate mode)
    #[arg(long, value_enum)]
    pub distribution: Option<DistributionMode>,

    /// Rank domain size (generate mode)
    #[arg(long)]
    pub max: Option<u64>,

    /// Skew of the generated distribution (generate mode)
    #[arg(long = "skew", value_name = "SKEW")]
    pub dist_skew: Option<f64>,

    /// Fraction of generated records that are gets (generate mode)
    #[arg(long)]
    pub get_ratio: Option<f64>,
}

impl Cli {
    /// Number of positional arguments given
    pub fn positional_count(&self) -> usize {
        [
            self.count.is_some(),
            self.skew.is_some(),
            self.read_ratio.is_some(),
        ]
        .iter()
        .filter(|&&given| given)
        .count()
    }
}
