//! TOML configuration file parsing

use super::*;
use crate::config::cli::{Cli, DistributionMode};
use anyhow::Context;
use std::fs;
use std::path::Path;

/// Skew assumed when `--distribution` picks a zipf-family mode without `--skew`
const DEFAULT_GENERATE_SKEW: f64 = 0.99;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config =
        ::toml::from_str(contents).context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Build the effective configuration: defaults, then `--config`, then flags
pub fn load_config(cli: &Cli) -> Result<Config> {
    let base = match cli.config {
        Some(ref path) => parse_toml_file(path)?,
        None => Config::default(),
    };
    let config = merge_cli_with_config(cli, base)?;
    config.validate()?;
    Ok(config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Result<Config> {
    if let Some(mode) = cli.mode {
        config.runtime.mode = mode;
    }

    // Positionals replace the file's trio as a whole, so a stale read ratio
    // from the file cannot turn a two-argument run into a mixed one.
    if cli.positional_count() > 0 {
        if cli.positional_count() == 1 && config.runtime.mode == ExecutionMode::Run {
            return Err(BenchError::config(
                "a single positional argument is not a valid mode; give COUNT SKEW or COUNT SKEW READ_RATIO",
            )
            .into());
        }
        config.workload.count = cli.count;
        config.workload.skew = cli.skew;
        config.workload.read_ratio = cli.read_ratio;
    }

    // Workload
    if let Some(batch_count) = cli.batch_count {
        config.workload.batch_count = batch_count;
    }
    if let Some(pim_ranks) = cli.pim_ranks {
        config.workload.pim_ranks = pim_ranks;
    }
    if let Some(index_max) = cli.index_max {
        config.workload.index_max = index_max;
    }
    if let Some(lookup) = cli.lookup {
        config.workload.lookup = lookup;
    }

    // Logs
    if cli.records_log.is_some() {
        config.logs.records_log = cli.records_log.clone();
    }
    if cli.load_log.is_some() {
        config.logs.load_log = cli.load_log.clone();
    }
    if cli.keys_log.is_some() {
        config.logs.keys_log = cli.keys_log.clone();
    }

    // Workers
    if let Some(threads) = cli.threads {
        config.workers.threads = threads;
    }
    if cli.pin_threads {
        config.workers.pin_threads = true;
    }
    if cli.cpu_cores.is_some() {
        config.workers.cpu_cores = cli.cpu_cores.clone();
        config.workers.pin_threads = true;
    }

    // Output
    if cli.json_output.is_some() {
        config.output.json_output = cli.json_output.clone();
    }
    if cli.show_latency {
        config.output.show_latency = true;
    }

    // Runtime
    if let Some(structure) = cli.structure {
        config.runtime.structure = structure;
    }
    if let Some(counters) = cli.counters {
        config.runtime.counters = counters;
    }
    if cli.seed.is_some() {
        config.runtime.seed = cli.seed;
    }
    if cli.debug {
        config.runtime.debug = true;
    }

    // Generation
    if cli.output.is_some() {
        config.generate.output = cli.output.clone();
    }
    if let Some(format) = cli.key_format {
        config.generate.key_format = format;
    }
    if let Some(ratio) = cli.get_ratio {
        config.generate.get_ratio = ratio;
    }
    merge_generate_distribution(cli, &mut config.generate.distribution, config.workload.index_max);

    Ok(config)
}

fn merge_generate_distribution(cli: &Cli, dist: &mut DistributionConfig, index_max: u64) {
    if let Some(max) = cli.max {
        dist.max = max;
    }

    let skew = cli
        .dist_skew
        .or_else(|| dist.distribution.skew())
        .unwrap_or(DEFAULT_GENERATE_SKEW);

    let mode = match cli.distribution {
        Some(mode) => mode,
        None => match dist.distribution {
            DistributionType::Uniform => DistributionMode::Uniform,
            DistributionType::Zipf { .. } => DistributionMode::Zipf,
            DistributionType::ZipfRank { .. } => DistributionMode::ZipfRank,
            DistributionType::Pim { .. } => DistributionMode::Pim,
        },
    };

    let pim_index_max = match dist.distribution {
        DistributionType::Pim { index_max, .. } if cli.index_max.is_none() => index_max,
        _ => index_max,
    };

    dist.distribution = match mode {
        DistributionMode::Uniform => DistributionType::Uniform,
        DistributionMode::Zipf => DistributionType::Zipf { skew },
        DistributionMode::ZipfRank => DistributionType::ZipfRank { skew },
        DistributionMode::Pim => DistributionType::Pim {
            skew,
            index_max: pim_index_max,
        },
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["skewbench"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_toml_basic() {
        let toml = r#"
[workload]
count = 100000
skew = 0.99
batch_count = 10

[workers]
threads = 4

[runtime]
structure = "skiplist"
counters = "none"
seed = 7
"#;

        let config = parse_toml_string(toml).unwrap();
        assert_eq!(config.workload.count, Some(100_000));
        assert_eq!(config.workload.batch_count, 10);
        assert_eq!(config.workload.pim_ranks, 2048);
        assert_eq!(config.workers.threads, 4);
        assert_eq!(config.runtime.structure, StructureType::Skiplist);
        assert_eq!(config.runtime.counters, CounterBackend::None);
        assert_eq!(config.runtime.seed, Some(7));
    }

    #[test]
    fn test_parse_toml_generate_section() {
        let toml = r#"
[runtime]
mode = "generate"

[generate]
output = "/tmp/out.bin"
key_format = "keys"

[generate.distribution]
mode = "zipf"
skew = 1.1
max = 50000
"#;
        let config = parse_toml_string(toml).unwrap();
        assert_eq!(config.runtime.mode, ExecutionMode::Generate);
        assert_eq!(config.generate.key_format, KeyFormat::Keys);
        assert_eq!(config.generate.distribution, DistributionConfig::zipf(50_000, 1.1));
    }

    #[test]
    fn test_parse_toml_rejects_unknown_mode() {
        assert!(parse_toml_string("[runtime]\nstructure = \"hashmap\"\n").is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        let base = parse_toml_string("[workers]\nthreads = 4\n[workload]\ncount = 10\nskew = 1.0\nread_ratio = 0.5\n").unwrap();
        let merged = merge_cli_with_config(&cli(&["2000", "0.5", "-t", "2"]), base).unwrap();
        assert_eq!(merged.workers.threads, 2);
        assert_eq!(merged.workload.count, Some(2000));
        // positionals replace the whole trio
        assert_eq!(merged.workload.read_ratio, None);
        assert_eq!(
            merged.workload.run_mode().unwrap(),
            RunMode::Synthetic {
                count: 2000,
                skew: 0.5
            }
        );
    }

    #[test]
    fn test_file_positionals_kept_without_cli_positionals() {
        let base = parse_toml_string("[workload]\ncount = 10\nskew = 1.0\n").unwrap();
        let merged = merge_cli_with_config(&cli(&["--counters", "none"]), base).unwrap();
        assert_eq!(merged.workload.count, Some(10));
    }

    #[test]
    fn test_single_positional_is_configuration_error() {
        let err = merge_cli_with_config(&cli(&["1000"]), Config::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BenchError>(),
            Some(BenchError::Configuration(_))
        ));
    }

    #[test]
    fn test_single_positional_allowed_in_generate_mode() {
        let merged =
            merge_cli_with_config(&cli(&["--mode", "generate", "1000"]), Config::default()).unwrap();
        assert_eq!(merged.workload.count, Some(1000));
    }

    #[test]
    fn test_cpu_cores_imply_pinning() {
        let merged = merge_cli_with_config(&cli(&["--cpu-cores", "0-1"]), Config::default()).unwrap();
        assert!(merged.workers.pin_threads);
    }

    #[test]
    fn test_generate_distribution_merge() {
        let merged = merge_cli_with_config(
            &cli(&["--distribution", "zipf-rank", "--max", "5000"]),
            Config::default(),
        )
        .unwrap();
        assert_eq!(
            merged.generate.distribution,
            DistributionConfig::zipf_rank(5000, DEFAULT_GENERATE_SKEW)
        );

        let merged = merge_cli_with_config(
            &cli(&["--distribution", "pim", "--skew", "2.0", "--max", "10", "--index-max", "100"]),
            Config::default(),
        )
        .unwrap();
        assert_eq!(
            merged.generate.distribution,
            DistributionConfig::pim(10, 2.0, 100)
        );
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[workers]\nthreads = 3\n[runtime]\ncounters = \"none\"").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = load_config(&cli(&["--config", &path, "600", "0.9"])).unwrap();
        assert_eq!(config.workers.threads, 3);
        assert_eq!(config.workload.count, Some(600));
    }

    #[test]
    fn test_load_config_validates() {
        assert!(load_config(&cli(&["100", "0"])).is_err());
        assert!(load_config(&cli(&["100", "0.5", "1.5"])).is_err());
    }
}
