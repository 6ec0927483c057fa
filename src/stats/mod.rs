//! Statistics collection and reporting
//!
//! Workers fill a [`ThreadStats`] each; nothing is shared while a phase runs.
//! After the join barrier the [`aggregator::MetricsAggregator`] folds them into
//! one [`BenchmarkReport`].

pub mod aggregator;
pub mod histogram;

use crate::counters::{CounterDeltas, HwEvent};
use crate::Result;
use histogram::{LatencyHistogram, LatencySummary};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Everything one worker measured during one phase
#[derive(Debug, Clone)]
pub struct ThreadStats {
    pub thread_id: usize,
    /// Operations issued, including skipped `empty` records
    pub ops: u64,
    /// Sum of per-operation times
    pub busy: Duration,
    /// Wall time from registration to deregistration
    pub window: Duration,
    pub counters: CounterDeltas,
    pub latency: LatencyHistogram,
    /// Lookups issued (find / contains)
    pub lookups: u64,
    /// Lookups that found their key
    pub hits: u64,
    /// Log records with nothing to execute
    pub skipped: u64,
}

impl ThreadStats {
    pub fn new(thread_id: usize) -> Result<Self> {
        Ok(Self {
            thread_id,
            ops: 0,
            busy: Duration::ZERO,
            window: Duration::ZERO,
            counters: CounterDeltas::default(),
            latency: LatencyHistogram::new()?,
            lookups: 0,
            hits: 0,
            skipped: 0,
        })
    }

    /// Operations per millisecond of busy time, 0 if the thread never ran
    pub fn rate_per_ms(&self) -> f64 {
        let busy_ms = duration_ms(self.busy);
        if busy_ms > 0.0 {
            self.ops as f64 / busy_ms
        } else {
            0.0
        }
    }
}

/// Milliseconds as `f64`, exact for whole milliseconds
pub fn duration_ms(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1_000_000.0
}

/// One normalized counter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CounterRate {
    pub event: HwEvent,
    pub total: u64,
    pub per_op: f64,
}

/// Result of one phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub phase: String,
    pub structure: String,
    pub threads: usize,
    pub total_ops: u64,
    /// Sum of per-thread rates, operations per millisecond
    pub throughput_ops_per_ms: f64,
    /// Events measured on every thread, divided by `total_ops`
    pub counters: Vec<CounterRate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencySummary>,
    pub lookups: u64,
    pub hits: u64,
    pub skipped: u64,
    /// Longest registration window of any thread, in milliseconds
    pub slowest_thread_ms: f64,
}

impl BenchmarkReport {
    /// Fraction of lookups that hit, if any lookups ran
    pub fn hit_ratio(&self) -> Option<f64> {
        if self.lookups == 0 {
            None
        } else {
            Some(self.hits as f64 / self.lookups as f64)
        }
    }

    pub fn counter(&self, event: HwEvent) -> Option<&CounterRate> {
        self.counters.iter().find(|c| c.event == event)
    }
}
