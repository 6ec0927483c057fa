//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.
//! Precedence, lowest first: built-in defaults, the `--config` TOML file,
//! command-line flags (and their `SKEWBENCH_*` environment variables).

pub mod cli;
pub mod toml;
pub mod validator;
pub mod workload;

use crate::error::BenchError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use workload::*;

/// Complete benchmark configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub workload: WorkloadConfig,
    #[serde(default)]
    pub logs: LogConfig,
    #[serde(default)]
    pub generate: GenerateConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        validator::validate_config(self)
    }
}

/// What the benchmark does with the structure
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RunMode {
    /// Load and run phases taken from operation logs
    Replay,
    /// Uniform load, then a search phase and an insert phase over a pim distribution
    Synthetic { count: u64, skew: f64 },
    /// Uniform load, then one mixed phase
    Mixed { count: u64, skew: f64, read_ratio: f64 },
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Replay => write!(f, "replay"),
            RunMode::Synthetic { count, skew } => {
                write!(f, "synthetic(count={}, skew={})", count, skew)
            }
            RunMode::Mixed {
                count,
                skew,
                read_ratio,
            } => write!(
                f,
                "mixed(count={}, skew={}, read_ratio={})",
                count, skew, read_ratio
            ),
        }
    }
}

/// Benchmark or log generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// Run the benchmark (default)
    #[default]
    Run,
    /// Write an operation log instead of running
    Generate,
}

/// Workload parameters
///
/// `count`, `skew` and `read_ratio` are the positional arguments: how many of
/// them are set selects the [`RunMode`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Keys inserted by the load phase; later phases run `count / 5` operations
    pub count: Option<u64>,
    /// Zipf exponent of the search, insert and mixed phases
    pub skew: Option<f64>,
    /// Probability that a mixed-phase operation is a lookup
    pub read_ratio: Option<f64>,
    /// Sampler refreshes per phase
    #[serde(default = "default_batch_count")]
    pub batch_count: usize,
    /// Logical rank count of pim phases
    #[serde(default = "default_pim_ranks")]
    pub pim_ranks: u64,
    /// Physical key space of synthetic runs
    #[serde(default = "default_index_max")]
    pub index_max: u64,
    #[serde(default)]
    pub lookup: LookupVerb,
}

/// Sampler refreshes per phase
pub const DEFAULT_BATCH_COUNT: usize = 100;

/// Divisor turning the load size into the size of later phases
pub const PHASE_DIVISOR: u64 = 5;

fn default_batch_count() -> usize {
    DEFAULT_BATCH_COUNT
}

fn default_pim_ranks() -> u64 {
    2048
}

fn default_index_max() -> u64 {
    i64::MAX as u64
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            count: None,
            skew: None,
            read_ratio: None,
            batch_count: default_batch_count(),
            pim_ranks: default_pim_ranks(),
            index_max: default_index_max(),
            lookup: LookupVerb::default(),
        }
    }
}

impl WorkloadConfig {
    /// Mode selected by the positional parameters
    pub fn run_mode(&self) -> Result<RunMode> {
        match (self.count, self.skew, self.read_ratio) {
            (None, None, None) => Ok(RunMode::Replay),
            (Some(count), Some(skew), None) => Ok(RunMode::Synthetic { count, skew }),
            (Some(count), Some(skew), Some(read_ratio)) => Ok(RunMode::Mixed {
                count,
                skew,
                read_ratio,
            }),
            _ => Err(BenchError::config(
                "expected no positional arguments, COUNT SKEW, or COUNT SKEW READ_RATIO",
            )
            .into()),
        }
    }

    /// Operations of each phase after the load
    pub fn phase_ops(&self) -> u64 {
        self.count.unwrap_or(0) / PHASE_DIVISOR
    }

    /// Distribution of synthetic search, insert and mixed phases
    pub fn pim_distribution(&self, skew: f64) -> DistributionConfig {
        DistributionConfig::pim(self.pim_ranks, skew, self.index_max)
    }

    /// Distribution of the synthetic load phase
    pub fn load_distribution(&self) -> DistributionConfig {
        DistributionConfig::uniform(self.index_max)
    }
}

/// Operation log inputs of replay runs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    /// Tagged records replayed by the run phase
    pub records_log: Option<PathBuf>,
    /// Tagged records whose keys populate the structure
    pub load_log: Option<PathBuf>,
    /// Raw keys: the first 5/6 load, the rest are searched then inserted
    pub keys_log: Option<PathBuf>,
}

/// Log generation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateConfig {
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub key_format: KeyFormat,
    #[serde(default = "default_generate_distribution")]
    pub distribution: DistributionConfig,
    /// Fraction of generated records that are `get`, the rest `insert`
    #[serde(default = "default_get_ratio")]
    pub get_ratio: f64,
}

fn default_generate_distribution() -> DistributionConfig {
    DistributionConfig::uniform(1 << 20)
}

fn default_get_ratio() -> f64 {
    0.5
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            output: None,
            key_format: KeyFormat::default(),
            distribution: default_generate_distribution(),
            get_ratio: default_get_ratio(),
        }
    }
}

/// Worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of worker threads
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Pin each worker to a core
    #[serde(default)]
    pub pin_threads: bool,
    /// Cores to pin to (e.g. "0,2-4"); all cores when unset
    pub cpu_cores: Option<String>,
}

fn default_threads() -> usize {
    num_cpus::get()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            pin_threads: false,
            cpu_cores: None,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JSON report path
    pub json_output: Option<PathBuf>,
    /// Print latency percentiles
    #[serde(default)]
    pub show_latency: bool,
}

/// Runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default)]
    pub structure: StructureType,
    #[serde(default)]
    pub counters: CounterBackend,
    /// Base seed; drawn from entropy when unset
    pub seed: Option<u64>,
    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,
}

// Display trait implementations

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        writeln!(f, "  Workload: {}", self.workload)?;
        writeln!(f, "  Logs: {}", self.logs)?;
        writeln!(f, "  Workers: {}", self.workers)?;
        writeln!(f, "  Output: {}", self.output)?;
        writeln!(f, "  Runtime: {}", self.runtime)?;
        if self.runtime.mode == ExecutionMode::Generate {
            writeln!(f, "  Generate: {}", self.generate)?;
        }
        Ok(())
    }
}

impl fmt::Display for WorkloadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.run_mode() {
            Ok(mode) => write!(f, "{}", mode)?,
            Err(_) => write!(f, "invalid positional arguments")?,
        }
        write!(
            f,
            ", batches={}, pim_ranks={}, index_max={}, lookup={:?}",
            self.batch_count, self.pim_ranks, self.index_max, self.lookup
        )
    }
}

impl fmt::Display for LogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |p: &Option<PathBuf>| {
            p.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string())
        };
        write!(
            f,
            "load={}, records={}, keys={}",
            show(&self.load_log),
            show(&self.records_log),
            show(&self.keys_log)
        )
    }
}

impl fmt::Display for GenerateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} as {}", self.distribution, self.key_format)?;
        if let Some(ref path) = self.output {
            write!(f, " -> {}", path.display())?;
        }
        Ok(())
    }
}

impl fmt::Display for WorkerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} thread(s)", self.threads)?;
        if self.pin_threads {
            match self.cpu_cores {
                Some(ref cores) => write!(f, ", pinned to {}", cores)?,
                None => write!(f, ", pinned")?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for OutputConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.json_output {
            Some(ref path) => write!(f, "json={}", path.display())?,
            None => write!(f, "text")?,
        }
        if self.show_latency {
            write!(f, ", latency")?;
        }
        Ok(())
    }
}

impl fmt::Display for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mode={:?}, structure={}, counters={}",
            self.mode, self.structure, self.counters
        )?;
        if let Some(seed) = self.seed {
            write!(f, ", seed={}", seed)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_mode_from_positionals() {
        let mut w = WorkloadConfig::default();
        assert_eq!(w.run_mode().unwrap(), RunMode::Replay);

        w.count = Some(1000);
        assert!(w.run_mode().is_err());

        w.skew = Some(0.99);
        assert_eq!(
            w.run_mode().unwrap(),
            RunMode::Synthetic {
                count: 1000,
                skew: 0.99
            }
        );

        w.read_ratio = Some(0.9);
        assert!(matches!(w.run_mode().unwrap(), RunMode::Mixed { .. }));
        assert_eq!(w.phase_ops(), 200);
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.workload.batch_count, 100);
        assert_eq!(config.workload.pim_ranks, 2048);
        assert_eq!(config.workload.index_max, i64::MAX as u64);
        assert!(config.workers.threads >= 1);
        assert_eq!(config.runtime.mode, ExecutionMode::Run);
        assert_eq!(config.generate.key_format, KeyFormat::Records);
    }

    #[test]
    fn test_synthetic_distributions() {
        let w = WorkloadConfig {
            pim_ranks: 16,
            index_max: 1600,
            ..Default::default()
        };
        assert_eq!(w.pim_distribution(1.0), DistributionConfig::pim(16, 1.0, 1600));
        assert_eq!(w.load_distribution(), DistributionConfig::uniform(1600));
    }

    #[test]
    fn test_display_mentions_mode() {
        let mut config = Config::default();
        config.workload.count = Some(10);
        config.workload.skew = Some(1.5);
        let shown = config.to_string();
        assert!(shown.contains("synthetic(count=10, skew=1.5)"));
    }
}
