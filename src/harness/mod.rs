//! Phase orchestration
//!
//! The [`Harness`] runs a fixed number of worker threads through one phase at
//! a time. Each phase spawns fresh scoped threads, joins every one of them,
//! and only then aggregates their statistics. Nothing survives between
//! phases except the structure under test.
//!
//! # Phase protocol
//!
//! 1. Sampled phases build their [`DistributionTemplate`] once, up front, and
//!    share it across refresh batches through [`build_templates`]
//! 2. `T` workers are spawned, each owning its partition of the source
//! 3. All workers are joined (hard barrier)
//! 4. The per-thread stats are folded by the [`MetricsAggregator`]
//!
//! A spawn failure, a worker error or a worker panic fails the phase. Threads
//! that did start are still joined before the error is returned, and
//! operations already applied to the structure stay applied.
//!
//! # Example
//!
//! ```
//! use skewbench::config::workload::PhaseKind;
//! use skewbench::counters::NullCounters;
//! use skewbench::harness::{Harness, PhasePlan};
//! use skewbench::source::OperationSource;
//! use skewbench::sut::btree::LockedBTree;
//!
//! let keys: Vec<u64> = (0..1000).collect();
//! let sut = LockedBTree::new();
//! let mut harness = Harness::new(4).unwrap();
//!
//! let plan = PhasePlan::new("load", PhaseKind::Load, OperationSource::Keys(&keys));
//! let report = harness.run_phase(&plan, &sut, &NullCounters).unwrap();
//! assert_eq!(report.total_ops, 1000);
//! ```

pub mod runner;

pub use runner::Runner;

use crate::config::workload::{DistributionConfig, LookupVerb, PhaseKind};
use crate::counters::{CounterSource, NullCounters};
use crate::distribution::cache::TableCache;
use crate::distribution::{derive_seed, DistributionTemplate};
use crate::error::BenchError;
use crate::source::OperationSource;
use crate::stats::aggregator::MetricsAggregator;
use crate::stats::{BenchmarkReport, ThreadStats};
use crate::sut::ConcurrentMap;
use crate::worker::affinity;
use crate::worker::Worker;
use crate::Result;
use anyhow::Context;
use std::fmt;

/// Where the harness is in its phase lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseState {
    Idle,
    Running,
    Done,
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseState::Idle => write!(f, "idle"),
            PhaseState::Running => write!(f, "running"),
            PhaseState::Done => write!(f, "done"),
        }
    }
}

/// One phase to run
#[derive(Clone, Copy)]
pub struct PhasePlan<'a> {
    pub name: &'a str,
    pub kind: PhaseKind,
    pub source: OperationSource<'a>,
    pub lookup: LookupVerb,
    /// Open a counter session per worker; off for load phases
    pub counters: bool,
}

impl<'a> PhasePlan<'a> {
    pub fn new(name: &'a str, kind: PhaseKind, source: OperationSource<'a>) -> Self {
        Self {
            name,
            kind,
            source,
            lookup: LookupVerb::Find,
            counters: true,
        }
    }

    pub fn with_lookup(mut self, lookup: LookupVerb) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn without_counters(mut self) -> Self {
        self.counters = false;
        self
    }
}

/// Multi-threaded phase runner
#[derive(Debug)]
pub struct Harness {
    threads: usize,
    /// `Some` when workers are pinned; an empty list means "core = tid mod cpus"
    pin_cores: Option<Vec<usize>>,
    seed: u64,
    state: PhaseState,
    phases_run: u64,
}

impl Harness {
    /// Harness running `threads` workers per phase
    pub fn new(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(BenchError::config("thread count must be at least 1").into());
        }
        affinity::warn_if_oversubscribed(threads);
        Ok(Self {
            threads,
            pin_cores: None,
            seed: 0,
            state: PhaseState::Idle,
            phases_run: 0,
        })
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Pin worker `i` to `cores[i % len]`, or to `i % cpus` if `cores` is empty
    pub fn with_pinning(mut self, cores: Vec<usize>) -> Self {
        self.pin_cores = Some(cores);
        self
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn state(&self) -> PhaseState {
        self.state
    }

    /// Run one phase to completion and report it
    pub fn run_phase(
        &mut self,
        plan: &PhasePlan<'_>,
        sut: &dyn ConcurrentMap,
        counters: &dyn CounterSource,
    ) -> Result<BenchmarkReport> {
        if self.state != PhaseState::Idle {
            anyhow::bail!(
                "cannot start phase '{}' while the harness is {}",
                plan.name,
                self.state
            );
        }

        let dropped = plan.source.len() % self.threads;
        tracing::info!(
            phase = plan.name,
            kind = %plan.kind,
            ops = plan.source.len() - dropped,
            threads = self.threads,
            structure = sut.name(),
            "phase starting"
        );
        if dropped > 0 {
            tracing::debug!(phase = plan.name, dropped, "remainder operations dropped");
        }

        self.state = PhaseState::Running;
        let phase_seed = derive_seed(self.seed, self.phases_run);
        self.phases_run += 1;

        let counters: &dyn CounterSource = if plan.counters { counters } else { &NullCounters };
        let joined = self.spawn_and_join(plan, sut, counters, phase_seed);
        self.state = PhaseState::Done;

        let report = joined
            .with_context(|| format!("Phase '{}' failed", plan.name))
            .and_then(|stats| {
                let mut aggregator = MetricsAggregator::new();
                for s in stats {
                    aggregator.add_thread(s);
                }
                aggregator.report(plan.name, sut.name())
            });
        self.state = PhaseState::Idle;

        let report = report?;
        tracing::info!(
            phase = plan.name,
            ops = report.total_ops,
            throughput_ops_per_ms = report.throughput_ops_per_ms,
            "phase finished"
        );
        Ok(report)
    }

    fn spawn_and_join(
        &self,
        plan: &PhasePlan<'_>,
        sut: &dyn ConcurrentMap,
        counters: &dyn CounterSource,
        seed: u64,
    ) -> Result<Vec<ThreadStats>> {
        let threads = self.threads;

        let scoped = crossbeam::scope(|scope| {
            let mut handles = Vec::with_capacity(threads);
            let mut failure: Option<anyhow::Error> = None;

            for tid in 0..threads {
                let pin_core = self
                    .pin_cores
                    .as_deref()
                    .map(|cores| affinity::core_for_worker(tid, cores));
                let worker = match Worker::new(
                    tid,
                    plan.kind,
                    sut,
                    counters,
                    plan.source.thread_view(tid, threads),
                    seed,
                ) {
                    Ok(worker) => worker.with_lookup(plan.lookup).with_pin_core(pin_core),
                    Err(e) => {
                        failure = Some(e.context(format!("Failed to set up worker {}", tid)));
                        break;
                    }
                };

                let spawned = scope
                    .builder()
                    .name(format!("skewbench-worker-{}", tid))
                    .spawn(move |_| worker.run());
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        failure = Some(
                            BenchError::resource(format!("spawn worker thread {}", tid), e).into(),
                        );
                        break;
                    }
                }
            }

            let mut stats = Vec::with_capacity(handles.len());
            for (tid, handle) in handles.into_iter().enumerate() {
                match handle.join() {
                    Ok(Ok(s)) => stats.push(s),
                    Ok(Err(e)) => {
                        failure.get_or_insert(e);
                    }
                    Err(_) => {
                        failure.get_or_insert(anyhow::anyhow!("Worker {} panicked", tid));
                    }
                }
            }

            match failure {
                Some(e) => Err(e),
                None => Ok(stats),
            }
        });

        scoped.map_err(|_| anyhow::anyhow!("Worker thread panicked"))?
    }
}

/// One template per refresh batch, all sharing a single build
///
/// The range table and the pim permutation are built once for the phase.
/// Batches differ only in the sampler seeds the source derives per batch.
pub fn build_templates(
    config: &DistributionConfig,
    batches: usize,
    cache: &mut TableCache,
    seed: u64,
) -> Result<Vec<DistributionTemplate>> {
    if batches == 0 {
        return Err(BenchError::config("batch count must be at least 1").into());
    }
    let template = DistributionTemplate::build(config, cache, seed)
        .with_context(|| format!("Failed to build {}", config))?;
    if let Some(permutation) = template.permutation() {
        tracing::debug!(ranks = permutation.len(), batches, "built pim permutation");
    }
    Ok(vec![template; batches])
}
