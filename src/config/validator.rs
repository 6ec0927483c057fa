//! Configuration validation
//!
//! Everything here is a configuration error and is reported before any
//! worker thread exists.

use super::*;
use crate::distribution::pim::MAX_PERMUTATION_LEN;
use crate::worker::affinity::parse_cpu_list;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_workers(&config.workers)?;
    match config.runtime.mode {
        ExecutionMode::Run => {
            let mode = config.workload.run_mode()?;
            validate_workload(&config.workload, config.workers.threads)?;
            if mode == RunMode::Replay {
                validate_logs(&config.logs)?;
            }
        }
        ExecutionMode::Generate => validate_generate(&config.generate, config.workload.count)?,
    }
    Ok(())
}

fn invalid(msg: String) -> anyhow::Error {
    BenchError::config(msg).into()
}

/// Validate worker configuration
pub fn validate_workers(workers: &WorkerConfig) -> Result<()> {
    if workers.threads == 0 {
        return Err(invalid("threads must be at least 1".to_string()));
    }
    if let Some(ref cores) = workers.cpu_cores {
        parse_cpu_list(cores)
            .map_err(|e| invalid(format!("invalid cpu_cores '{}': {:#}", cores, e)))?;
    }
    Ok(())
}

/// Validate workload configuration
pub fn validate_workload(workload: &WorkloadConfig, threads: usize) -> Result<()> {
    if workload.batch_count == 0 {
        return Err(invalid("batch_count must be at least 1".to_string()));
    }
    if workload.pim_ranks == 0 {
        return Err(invalid("pim_ranks must be at least 1".to_string()));
    }
    validate_rank_domain("pim_ranks", workload.pim_ranks)?;
    if workload.index_max < workload.pim_ranks {
        return Err(invalid(format!(
            "index_max ({}) must be at least pim_ranks ({})",
            workload.index_max, workload.pim_ranks
        )));
    }
    if let Some(skew) = workload.skew {
        validate_skew(skew)?;
    }
    if let Some(ratio) = workload.read_ratio {
        validate_ratio("read_ratio", ratio)?;
    }
    if let Some(count) = workload.count {
        if count < threads as u64 {
            return Err(invalid(format!(
                "count ({}) must be at least the thread count ({})",
                count, threads
            )));
        }
    }
    Ok(())
}

/// Validate the inputs of a replay run
pub fn validate_logs(logs: &LogConfig) -> Result<()> {
    if logs.keys_log.is_some() {
        if logs.records_log.is_some() || logs.load_log.is_some() {
            return Err(invalid(
                "keys_log cannot be combined with records_log or load_log".to_string(),
            ));
        }
        return Ok(());
    }
    if logs.records_log.is_none() {
        return Err(invalid(
            "replay needs --records-log (optionally with --load-log) or --keys-log; \
             or pass COUNT SKEW for a synthetic run"
                .to_string(),
        ));
    }
    Ok(())
}

/// Validate log generation
pub fn validate_generate(generate: &GenerateConfig, count: Option<u64>) -> Result<()> {
    if generate.output.is_none() {
        return Err(invalid("generate mode needs --output".to_string()));
    }
    match count {
        Some(0) | None => return Err(invalid("generate mode needs a positive COUNT".to_string())),
        Some(_) => {}
    }
    let dist = &generate.distribution;
    if dist.max == 0 {
        return Err(invalid("distribution max must be at least 1".to_string()));
    }
    if let Some(skew) = dist.distribution.skew() {
        validate_skew(skew)?;
    }
    if let DistributionType::Pim { index_max, .. } = dist.distribution {
        validate_rank_domain("pim max", dist.max)?;
        if index_max < dist.max {
            return Err(invalid(format!(
                "pim index_max ({}) must be at least max ({})",
                index_max, dist.max
            )));
        }
    }
    validate_ratio("get_ratio", generate.get_ratio)
}

/// The pim permutation is materialized, so its domain is capped
fn validate_rank_domain(name: &str, ranks: u64) -> Result<()> {
    if ranks > MAX_PERMUTATION_LEN {
        return Err(invalid(format!(
            "{} ({}) exceeds the permutation limit of {}",
            name, ranks, MAX_PERMUTATION_LEN
        )));
    }
    Ok(())
}

fn validate_skew(skew: f64) -> Result<()> {
    if !(skew.is_finite() && skew > 0.0) {
        return Err(invalid(format!("skew must be positive, got {}", skew)));
    }
    Ok(())
}

fn validate_ratio(name: &str, ratio: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&ratio) {
        return Err(invalid(format!("{} must be between 0 and 1, got {}", name, ratio)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic() -> Config {
        let mut config = Config::default();
        config.workers.threads = 4;
        config.workload.count = Some(1000);
        config.workload.skew = Some(0.99);
        config
    }

    fn is_config_error(result: Result<()>) -> bool {
        matches!(
            result.unwrap_err().downcast_ref::<BenchError>(),
            Some(BenchError::Configuration(_))
        )
    }

    #[test]
    fn test_valid_synthetic() {
        assert!(validate_config(&synthetic()).is_ok());
    }

    #[test]
    fn test_invalid_threads() {
        let mut config = synthetic();
        config.workers.threads = 0;
        assert!(is_config_error(validate_config(&config)));
    }

    #[test]
    fn test_invalid_skew() {
        for skew in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let mut config = synthetic();
            config.workload.skew = Some(skew);
            assert!(is_config_error(validate_config(&config)), "skew {}", skew);
        }
    }

    #[test]
    fn test_invalid_read_ratio() {
        let mut config = synthetic();
        config.workload.read_ratio = Some(1.5);
        assert!(is_config_error(validate_config(&config)));
        config.workload.read_ratio = Some(1.0);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_count_below_threads() {
        let mut config = synthetic();
        config.workload.count = Some(3);
        assert!(is_config_error(validate_config(&config)));
    }

    #[test]
    fn test_index_space_smaller_than_ranks() {
        let mut config = synthetic();
        config.workload.index_max = 100;
        assert!(is_config_error(validate_config(&config)));
    }

    #[test]
    fn test_rank_domain_above_permutation_limit() {
        let mut config = synthetic();
        config.workload.index_max = u64::MAX;
        config.workload.pim_ranks = MAX_PERMUTATION_LEN;
        assert!(validate_config(&config).is_ok());
        config.workload.pim_ranks = MAX_PERMUTATION_LEN + 1;
        assert!(is_config_error(validate_config(&config)));
    }

    #[test]
    fn test_zero_batches() {
        let mut config = synthetic();
        config.workload.batch_count = 0;
        assert!(is_config_error(validate_config(&config)));
    }

    #[test]
    fn test_replay_needs_logs() {
        let mut config = Config::default();
        assert!(is_config_error(validate_config(&config)));

        config.logs.records_log = Some("/tmp/run.bin".into());
        assert!(validate_config(&config).is_ok());

        config.logs.keys_log = Some("/tmp/keys.bin".into());
        assert!(is_config_error(validate_config(&config)));
    }

    #[test]
    fn test_bad_cpu_cores() {
        let mut config = synthetic();
        config.workers.cpu_cores = Some("3-1".to_string());
        assert!(is_config_error(validate_config(&config)));
    }

    #[test]
    fn test_generate_validation() {
        let mut config = Config::default();
        config.runtime.mode = ExecutionMode::Generate;
        config.workload.count = Some(100);
        assert!(is_config_error(validate_config(&config)));

        config.generate.output = Some("/tmp/out.bin".into());
        assert!(validate_config(&config).is_ok());

        config.generate.distribution = DistributionConfig::pim(100, 1.0, 10);
        assert!(is_config_error(validate_config(&config)));

        config.generate.distribution = DistributionConfig::zipf(100, 1.0);
        config.generate.get_ratio = -0.1;
        assert!(is_config_error(validate_config(&config)));
    }
}
