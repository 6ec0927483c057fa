//! Phase metrics aggregation
//!
//! Throughput is the **sum of independent per-thread rates**: every thread
//! with nonzero busy time contributes `ops / busy_ms`. This is not
//! `total_ops / wall_clock`; it needs no shared stop instant and keeps results
//! comparable with earlier runs of the same benchmark, so it must not be
//! "simplified".
//!
//! Counters are normalized per operation: the sum of each event over all
//! threads divided by the operations executed by all threads. An event is
//! reported only if every thread measured it.
//!
//! # Example
//!
//! ```
//! use skewbench::stats::{ThreadStats, aggregator::MetricsAggregator};
//! use std::time::Duration;
//!
//! let mut aggregator = MetricsAggregator::new();
//! for tid in 0..2 {
//!     let mut stats = ThreadStats::new(tid).unwrap();
//!     stats.ops = 1000;
//!     stats.busy = Duration::from_millis(1000);
//!     aggregator.add_thread(stats);
//! }
//! assert_eq!(aggregator.throughput(), 2.0);
//! ```

use super::histogram::LatencyHistogram;
use super::{duration_ms, BenchmarkReport, CounterRate, ThreadStats};
use crate::counters::HwEvent;
use crate::Result;

/// Folds per-thread results into one report
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    threads: Vec<ThreadStats>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_thread(&mut self, stats: ThreadStats) {
        self.threads.push(stats);
    }

    pub fn threads(&self) -> &[ThreadStats] {
        &self.threads
    }

    pub fn total_ops(&self) -> u64 {
        self.threads.iter().map(|t| t.ops).sum()
    }

    /// Sum of per-thread rates in operations per millisecond
    pub fn throughput(&self) -> f64 {
        self.threads
            .iter()
            .filter(|t| !t.busy.is_zero())
            .map(ThreadStats::rate_per_ms)
            .sum()
    }

    /// Event counts per operation, for events every thread measured
    pub fn counters_per_op(&self) -> Vec<CounterRate> {
        let total_ops = self.total_ops();
        if self.threads.is_empty() || total_ops == 0 {
            return Vec::new();
        }

        HwEvent::ALL
            .iter()
            .filter_map(|&event| {
                let total = self
                    .threads
                    .iter()
                    .map(|t| t.counters.get(event))
                    .sum::<Option<u64>>()?;
                Some(CounterRate {
                    event,
                    total,
                    per_op: total as f64 / total_ops as f64,
                })
            })
            .collect()
    }

    /// All threads' latencies in one histogram
    pub fn merged_latency(&self) -> Result<LatencyHistogram> {
        let mut merged = LatencyHistogram::new()?;
        for t in &self.threads {
            merged.merge(&t.latency)?;
        }
        Ok(merged)
    }

    /// Build the phase report
    pub fn report(&self, phase: &str, structure: &str) -> Result<BenchmarkReport> {
        let slowest = self
            .threads
            .iter()
            .map(|t| t.window)
            .max()
            .unwrap_or_default();

        Ok(BenchmarkReport {
            phase: phase.to_string(),
            structure: structure.to_string(),
            threads: self.threads.len(),
            total_ops: self.total_ops(),
            throughput_ops_per_ms: self.throughput(),
            counters: self.counters_per_op(),
            latency: self.merged_latency()?.summary(),
            lookups: self.threads.iter().map(|t| t.lookups).sum(),
            hits: self.threads.iter().map(|t| t.hits).sum(),
            skipped: self.threads.iter().map(|t| t.skipped).sum(),
            slowest_thread_ms: duration_ms(slowest),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::CounterDeltas;
    use std::time::Duration;

    fn thread(tid: usize, ops: u64, busy_ms: u64) -> ThreadStats {
        let mut stats = ThreadStats::new(tid).unwrap();
        stats.ops = ops;
        stats.busy = Duration::from_millis(busy_ms);
        stats.window = Duration::from_millis(busy_ms);
        stats
    }

    #[test]
    fn test_single_thread_throughput() {
        let mut agg = MetricsAggregator::new();
        agg.add_thread(thread(0, 1000, 1000));
        assert_eq!(agg.throughput(), 1.0);
    }

    #[test]
    fn test_throughput_sums_thread_rates() {
        let mut agg = MetricsAggregator::new();
        agg.add_thread(thread(0, 1000, 1000));
        agg.add_thread(thread(1, 1000, 1000));
        assert_eq!(agg.throughput(), 2.0);
    }

    #[test]
    fn test_throughput_is_not_total_over_wall_clock() {
        // 1000 ops in 1s plus 1000 ops in 4s: rates 1.0 + 0.25, while
        // total / longest would give 0.5.
        let mut agg = MetricsAggregator::new();
        agg.add_thread(thread(0, 1000, 1000));
        agg.add_thread(thread(1, 1000, 4000));
        assert_eq!(agg.throughput(), 1.25);
    }

    #[test]
    fn test_idle_threads_do_not_contribute() {
        let mut agg = MetricsAggregator::new();
        agg.add_thread(thread(0, 1000, 1000));
        agg.add_thread(thread(1, 0, 0));
        assert_eq!(agg.throughput(), 1.0);
        assert_eq!(agg.total_ops(), 1000);
    }

    #[test]
    fn test_counters_normalized_by_total_ops() {
        let mut agg = MetricsAggregator::new();
        for tid in 0..2 {
            let mut t = thread(tid, 500, 100);
            t.counters = CounterDeltas::default()
                .with(HwEvent::Instructions, 50_000)
                .with(HwEvent::LlcMisses, 1_000);
            agg.add_thread(t);
        }

        let counters = agg.counters_per_op();
        assert_eq!(counters.len(), 2);
        let instructions = counters
            .iter()
            .find(|c| c.event == HwEvent::Instructions)
            .unwrap();
        assert_eq!(instructions.total, 100_000);
        assert_eq!(instructions.per_op, 100.0);
    }

    #[test]
    fn test_counter_missing_on_one_thread_is_dropped() {
        let mut agg = MetricsAggregator::new();
        let mut a = thread(0, 10, 1);
        a.counters = CounterDeltas::default()
            .with(HwEvent::Instructions, 10)
            .with(HwEvent::L2Misses, 3);
        let mut b = thread(1, 10, 1);
        b.counters = CounterDeltas::default().with(HwEvent::Instructions, 30);
        agg.add_thread(a);
        agg.add_thread(b);

        let counters = agg.counters_per_op();
        assert_eq!(counters.len(), 1);
        assert_eq!(counters[0].event, HwEvent::Instructions);
        assert_eq!(counters[0].per_op, 2.0);
    }

    #[test]
    fn test_report_fields() {
        let mut agg = MetricsAggregator::new();
        let mut a = thread(0, 100, 10);
        a.lookups = 100;
        a.hits = 40;
        a.latency.record(Duration::from_nanos(200));
        let mut b = thread(1, 100, 20);
        b.lookups = 100;
        b.hits = 60;
        agg.add_thread(a);
        agg.add_thread(b);

        let report = agg.report("search", "btree").unwrap();
        assert_eq!(report.threads, 2);
        assert_eq!(report.total_ops, 200);
        assert_eq!(report.hit_ratio(), Some(0.5));
        assert_eq!(report.slowest_thread_ms, 20.0);
        assert_eq!(report.latency.map(|l| l.samples), Some(1));
        assert!(report.counters.is_empty());
    }

    #[test]
    fn test_empty_aggregator() {
        let agg = MetricsAggregator::new();
        assert_eq!(agg.throughput(), 0.0);
        assert!(agg.counters_per_op().is_empty());
        let report = agg.report("load", "btree").unwrap();
        assert_eq!(report.total_ops, 0);
        assert!(report.latency.is_none());
    }
}
