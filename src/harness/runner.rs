//! Run modes
//!
//! A run is a fixed sequence of phases against one structure. Which sequence
//! depends on the [`RunMode`]:
//!
//! | mode      | phases                                               |
//! |-----------|------------------------------------------------------|
//! | replay    | load log (optional), then the records log            |
//! | replay    | first 5/6 of a key log, then search + insert on 1/6  |
//! | synthetic | `count` uniform loads, `count/5` searches and inserts |
//! | mixed     | `count` uniform loads, `count/5` mixed operations    |
//!
//! Load phases never open counter sessions.

use super::{build_templates, Harness, PhasePlan};
use crate::config::workload::PhaseKind;
use crate::config::{Config, RunMode};
use crate::counters::CounterSource;
use crate::distribution::cache::TableCache;
use crate::distribution::{derive_seed, DistributionTemplate};
use crate::error::BenchError;
use crate::oplog::mapped::MappedArray;
use crate::oplog::{validate_records, OperationRecord};
use crate::source::OperationSource;
use crate::stats::BenchmarkReport;
use crate::sut::ConcurrentMap;
use crate::worker::affinity::parse_cpu_list;
use crate::Result;
use anyhow::Context;
use std::path::Path;

// Seed streams, one per sampled phase
const LOAD_STREAM: u64 = 0x4C4F_4144;
const SEARCH_STREAM: u64 = 0x5345_4152;
const INSERT_STREAM: u64 = 0x494E_5352;
const MIXED_STREAM: u64 = 0x4D49_5844;

/// Drives every phase of one run against one structure
pub struct Runner<'a> {
    config: &'a Config,
    harness: Harness,
    sut: &'a dyn ConcurrentMap,
    counters: &'a dyn CounterSource,
    cache: TableCache,
    seed: u64,
}

impl<'a> Runner<'a> {
    pub fn new(
        config: &'a Config,
        seed: u64,
        sut: &'a dyn ConcurrentMap,
        counters: &'a dyn CounterSource,
    ) -> Result<Self> {
        let mut harness = Harness::new(config.workers.threads)?.with_seed(seed);
        if config.workers.pin_threads {
            let cores = match config.workers.cpu_cores {
                Some(ref list) => parse_cpu_list(list)?,
                None => Vec::new(),
            };
            harness = harness.with_pinning(cores);
        }
        Ok(Self {
            config,
            harness,
            sut,
            counters,
            cache: TableCache::new(),
            seed,
        })
    }

    /// Run every phase of the configured mode, handing each report to
    /// `on_phase` as soon as its phase finishes
    pub fn run<F>(mut self, mut on_phase: F) -> Result<Vec<BenchmarkReport>>
    where
        F: FnMut(&BenchmarkReport),
    {
        self.config.validate()?;
        let mode = self.config.workload.run_mode()?;
        tracing::info!(%mode, structure = self.sut.name(), counters = self.counters.name(), "run starting");

        let mut reports = Vec::new();
        let mut emit = |report: BenchmarkReport| {
            on_phase(&report);
            reports.push(report);
        };

        match mode {
            RunMode::Replay => self.replay(&mut emit)?,
            RunMode::Synthetic { count, skew } => {
                self.load_uniform(count, &mut emit)?;
                let ops = self.config.workload.phase_ops();
                self.sampled_phase("search", PhaseKind::Search, skew, ops, SEARCH_STREAM, &mut emit)?;
                self.sampled_phase("insert", PhaseKind::Insert, skew, ops, INSERT_STREAM, &mut emit)?;
            }
            RunMode::Mixed {
                count,
                skew,
                read_ratio,
            } => {
                self.load_uniform(count, &mut emit)?;
                let ops = self.config.workload.phase_ops();
                self.sampled_phase(
                    "mixed",
                    PhaseKind::Mixed { read_ratio },
                    skew,
                    ops,
                    MIXED_STREAM,
                    &mut emit,
                )?;
            }
        }

        tracing::info!(phases = reports.len(), "run finished");
        Ok(reports)
    }

    fn run_plan(&mut self, plan: PhasePlan<'_>) -> Result<BenchmarkReport> {
        let plan = plan.with_lookup(self.config.workload.lookup);
        self.harness.run_phase(&plan, self.sut, self.counters)
    }

    /// `count` unconditional inserts of uniform keys over `[0, index_max)`
    fn load_uniform(&mut self, count: u64, emit: &mut dyn FnMut(BenchmarkReport)) -> Result<()> {
        let total = op_count(count)?;
        let template = DistributionTemplate::build(
            &self.config.workload.load_distribution(),
            &mut self.cache,
            derive_seed(self.seed, LOAD_STREAM),
        )?;
        let templates = [template];
        let source = OperationSource::Sampled {
            templates: &templates,
            total,
            seed: derive_seed(self.seed, LOAD_STREAM + 1),
        };
        let report = self.run_plan(PhasePlan::new("load", PhaseKind::Load, source).without_counters())?;
        emit(report);
        Ok(())
    }

    /// `ops` keys from the pim distribution, reseeded at every batch boundary
    fn sampled_phase(
        &mut self,
        name: &str,
        kind: PhaseKind,
        skew: f64,
        ops: u64,
        stream: u64,
        emit: &mut dyn FnMut(BenchmarkReport),
    ) -> Result<()> {
        let templates = build_templates(
            &self.config.workload.pim_distribution(skew),
            self.config.workload.batch_count,
            &mut self.cache,
            derive_seed(self.seed, stream),
        )?;
        let source = OperationSource::Sampled {
            templates: &templates,
            total: op_count(ops)?,
            seed: derive_seed(self.seed, stream + 1),
        };
        let report = self.run_plan(PhasePlan::new(name, kind, source))?;
        emit(report);
        Ok(())
    }

    /// Every log is mapped and checked before the first phase starts
    fn replay(&mut self, emit: &mut dyn FnMut(BenchmarkReport)) -> Result<()> {
        let config = self.config;
        let logs = &config.logs;
        if let Some(ref path) = logs.keys_log {
            return self.replay_keys(path, emit);
        }

        let path = logs
            .records_log
            .as_deref()
            .ok_or_else(|| BenchError::config("replay needs a records log"))?;
        let load = logs.load_log.as_deref().map(open_records).transpose()?;
        let records = open_records(path)?;

        if let Some(load) = load {
            // every record's key is inserted, whatever its kind
            let plan = PhasePlan::new("load", PhaseKind::Load, OperationSource::Records(load.as_slice()))
                .without_counters();
            let report = self.run_plan(plan)?;
            load.close()?;
            emit(report);
        }

        let plan = PhasePlan::new(
            "replay",
            PhaseKind::Replay,
            OperationSource::Records(records.as_slice()),
        );
        let report = self.run_plan(plan)?;
        records.close()?;
        emit(report);
        Ok(())
    }

    /// First 5/6 of the keys populate the structure; the last 1/6 is looked
    /// up and then inserted
    fn replay_keys(&mut self, path: &Path, emit: &mut dyn FnMut(BenchmarkReport)) -> Result<()> {
        let keys = MappedArray::<u64>::open(path)?;
        let (load, run) = split_key_log(keys.as_slice());
        tracing::info!(path = %path.display(), load = load.len(), run = run.len(), "mapped key log");

        let phases = [
            PhasePlan::new("load", PhaseKind::Load, OperationSource::Keys(load)).without_counters(),
            PhasePlan::new("search", PhaseKind::Search, OperationSource::Keys(run)),
            PhasePlan::new("insert", PhaseKind::Insert, OperationSource::Keys(run)),
        ];
        for plan in phases {
            let report = self.run_plan(plan)?;
            emit(report);
        }
        keys.close()
    }
}

/// Split a key log into its load part (first 5/6) and run part (the rest)
pub fn split_key_log(keys: &[u64]) -> (&[u64], &[u64]) {
    keys.split_at(keys.len() / 6 * 5)
}

fn open_records(path: &Path) -> Result<MappedArray<OperationRecord>> {
    let records = MappedArray::<OperationRecord>::open(path)?;
    let counts = validate_records(records.as_slice())
        .with_context(|| format!("Invalid operation log: {}", path.display()))?;
    tracing::info!(path = %path.display(), records = records.len(), %counts, "mapped operation log");
    Ok(records)
}

fn op_count(count: u64) -> Result<usize> {
    usize::try_from(count)
        .map_err(|_| BenchError::config(format!("operation count {} is too large", count)).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::mock::FixedCounters;
    use crate::counters::{CounterDeltas, HwEvent, NullCounters};
    use crate::distribution::pim::MAX_PERMUTATION_LEN;
    use crate::oplog::writer::{write_keys, write_records};
    use crate::oplog::OpKind;
    use crate::sut::mock::{MockMap, Verb};

    fn synthetic(count: u64, skew: f64) -> Config {
        let mut config = Config::default();
        config.workers.threads = 2;
        config.workload.count = Some(count);
        config.workload.skew = Some(skew);
        config.workload.batch_count = 4;
        config.workload.pim_ranks = 16;
        config.workload.index_max = 1 << 20;
        config
    }

    #[test]
    fn test_split_key_log() {
        let keys: Vec<u64> = (0..600).collect();
        let (load, run) = split_key_log(&keys);
        assert_eq!(load.len(), 500);
        assert_eq!(run.len(), 100);
        assert_eq!(run[0], 500);

        let (load, run) = split_key_log(&keys[..5]);
        assert!(load.is_empty());
        assert_eq!(run.len(), 5);
    }

    #[test]
    fn test_synthetic_runs_three_phases() {
        let config = synthetic(1000, 0.99);
        let sut = MockMap::new();
        let counters = FixedCounters::new(CounterDeltas::default().with(HwEvent::Instructions, 50));

        let mut seen = Vec::new();
        let reports = Runner::new(&config, 7, &sut, &counters)
            .unwrap()
            .run(|r| seen.push(r.phase.clone()))
            .unwrap();

        assert_eq!(seen, vec!["load", "search", "insert"]);
        assert_eq!(reports[0].total_ops, 1000);
        assert_eq!(reports[1].total_ops, 200);
        assert_eq!(reports[2].total_ops, 200);
        // load runs without counters
        assert!(reports[0].counters.is_empty());
        assert!(reports[1].counter(HwEvent::Instructions).is_some());
        assert_eq!(sut.calls(Verb::Insert), 1000);
        assert_eq!(sut.calls(Verb::Find), 200);
        assert_eq!(sut.calls(Verb::InsertIfAbsent), 200);
    }

    #[test]
    fn test_mixed_runs_two_phases() {
        let mut config = synthetic(1000, 1.2);
        config.workload.read_ratio = Some(1.0);
        let sut = MockMap::new();

        let reports = Runner::new(&config, 3, &sut, &NullCounters)
            .unwrap()
            .run(|_| {})
            .unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].phase, "mixed");
        assert_eq!(reports[1].lookups, 200);
        assert_eq!(sut.calls(Verb::InsertIfAbsent), 0);
    }

    #[test]
    fn test_replay_records_with_load_log() {
        let dir = tempfile::tempdir().unwrap();
        let load_path = dir.path().join("load.bin");
        let run_path = dir.path().join("run.bin");
        write_records(
            &load_path,
            &(0..10)
                .map(|k| OperationRecord::new(OpKind::Insert, k, k))
                .collect::<Vec<_>>(),
        )
        .unwrap();
        write_records(
            &run_path,
            &[
                OperationRecord::new(OpKind::Get, 3, 0),
                OperationRecord::new(OpKind::Remove, 4, 0),
                OperationRecord::new(OpKind::Update, 5, 9),
                OperationRecord::new(OpKind::Empty, 0, 0),
            ],
        )
        .unwrap();

        let mut config = Config::default();
        config.workers.threads = 2;
        config.logs.load_log = Some(load_path);
        config.logs.records_log = Some(run_path);
        let sut = MockMap::new();

        let reports = Runner::new(&config, 1, &sut, &NullCounters)
            .unwrap()
            .run(|_| {})
            .unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].total_ops, 10);
        assert_eq!(reports[1].phase, "replay");
        assert_eq!(reports[1].total_ops, 4);
        assert_eq!(reports[1].skipped, 1);
        assert_eq!(sut.calls(Verb::Erase), 1);
        assert_eq!(sut.calls(Verb::Insert), 11);
    }

    #[test]
    fn test_replay_rejects_bad_record_kind_before_running() {
        let dir = tempfile::tempdir().unwrap();
        let run_path = dir.path().join("run.bin");
        let mut bad = OperationRecord::new(OpKind::Get, 1, 0);
        bad.kind = 42;
        write_records(&run_path, &[OperationRecord::new(OpKind::Get, 1, 0), bad]).unwrap();

        let mut config = Config::default();
        config.workers.threads = 1;
        config.logs.records_log = Some(run_path);
        let sut = MockMap::new();

        let err = Runner::new(&config, 1, &sut, &NullCounters)
            .unwrap()
            .run(|_| {})
            .unwrap_err();
        assert!(format!("{:#}", err).contains("record 1"));
        assert!(sut.registered_threads().is_empty());
    }

    #[test]
    fn test_replay_key_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.bin");
        write_keys(&path, &(0..1200).collect::<Vec<u64>>()).unwrap();

        let mut config = Config::default();
        config.workers.threads = 4;
        config.logs.keys_log = Some(path);
        let sut = MockMap::new();

        let reports = Runner::new(&config, 1, &sut, &NullCounters)
            .unwrap()
            .run(|_| {})
            .unwrap();

        let phases: Vec<_> = reports.iter().map(|r| (r.phase.as_str(), r.total_ops)).collect();
        assert_eq!(phases, vec![("load", 1000), ("search", 200), ("insert", 200)]);
        assert_eq!(reports[1].hits, 0);
    }

    #[test]
    fn test_oversized_rank_domain_rejected_before_load() {
        let mut config = synthetic(1000, 0.99);
        config.workload.pim_ranks = MAX_PERMUTATION_LEN + 1;
        config.workload.index_max = MAX_PERMUTATION_LEN * 2;
        let sut = MockMap::new();

        let err = Runner::new(&config, 1, &sut, &NullCounters)
            .unwrap()
            .run(|_| {})
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BenchError>(),
            Some(BenchError::Configuration(_))
        ));
        assert!(sut.registered_threads().is_empty());
        assert_eq!(sut.total_calls(), 0);
    }

    #[test]
    fn test_misaligned_records_log_fails_before_load() {
        let dir = tempfile::tempdir().unwrap();
        let load_path = dir.path().join("load.bin");
        let run_path = dir.path().join("run.bin");
        write_records(&load_path, &[OperationRecord::new(OpKind::Insert, 1, 1)]).unwrap();
        let mut bytes = vec![0u8; std::mem::size_of::<OperationRecord>() * 2];
        bytes.push(0);
        std::fs::write(&run_path, bytes).unwrap();

        let mut config = Config::default();
        config.workers.threads = 2;
        config.logs.load_log = Some(load_path);
        config.logs.records_log = Some(run_path);
        let sut = MockMap::new();

        let err = Runner::new(&config, 1, &sut, &NullCounters)
            .unwrap()
            .run(|_| {})
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BenchError>(),
            Some(BenchError::LogFormat(_))
        ));
        assert!(sut.registered_threads().is_empty());
        assert_eq!(sut.total_calls(), 0);
    }

    #[test]
    fn test_empty_key_log_fails_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.bin");
        std::fs::write(&path, b"").unwrap();

        let mut config = Config::default();
        config.workers.threads = 2;
        config.logs.keys_log = Some(path);
        let sut = MockMap::new();

        let err = Runner::new(&config, 1, &sut, &NullCounters)
            .unwrap()
            .run(|_| {})
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BenchError>(),
            Some(BenchError::LogFormat(_))
        ));
        assert!(sut.registered_threads().is_empty());
        assert_eq!(sut.total_calls(), 0);
    }

    #[test]
    fn test_missing_log_is_resource_error() {
        let mut config = Config::default();
        config.workers.threads = 1;
        config.logs.records_log = Some("/nonexistent/skewbench/run.bin".into());
        let sut = MockMap::new();

        let err = Runner::new(&config, 1, &sut, &NullCounters)
            .unwrap()
            .run(|_| {})
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BenchError>(),
            Some(BenchError::Resource { .. })
        ));
    }
}
