//! Latency histogram using HdrHistogram
//!
//! Each worker records the latency of every SUT call into its own histogram;
//! the aggregator merges them after the join barrier.
//!
//! # Example
//!
//! ```
//! use skewbench::stats::histogram::LatencyHistogram;
//! use std::time::Duration;
//!
//! let mut hist = LatencyHistogram::new().unwrap();
//! hist.record(Duration::from_nanos(120));
//! hist.record(Duration::from_nanos(480));
//!
//! assert_eq!(hist.len(), 2);
//! assert!(hist.percentile(50.0).is_some());
//! ```

use crate::Result;
use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Highest trackable latency: one hour in nanoseconds
const MAX_TRACKABLE_NANOS: u64 = 3_600_000_000_000;

/// Latency histogram wrapper
///
/// Tracks latencies from 1 nanosecond to 1 hour with 3 significant digits,
/// so every recorded value is accurate to within 0.1%. Recording and
/// querying are O(1).
#[derive(Debug, Clone)]
pub struct LatencyHistogram {
    histogram: Histogram<u64>,
}

impl LatencyHistogram {
    /// Create a new latency histogram
    pub fn new() -> Result<Self> {
        let histogram = Histogram::new_with_bounds(1, MAX_TRACKABLE_NANOS, 3)
            .map_err(|e| anyhow::anyhow!("Failed to create latency histogram: {}", e))?;

        Ok(Self { histogram })
    }

    /// Record a latency sample
    ///
    /// Samples above the trackable range land in the top bucket.
    #[inline]
    pub fn record(&mut self, latency: Duration) {
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        self.histogram.saturating_record(nanos);
    }

    /// Latency at `percentile` (0.0 - 100.0), or None if empty
    pub fn percentile(&self, percentile: f64) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        Some(Duration::from_nanos(self.histogram.value_at_percentile(percentile)))
    }

    pub fn max(&self) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        Some(Duration::from_nanos(self.histogram.max()))
    }

    pub fn mean(&self) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        Some(Duration::from_nanos(self.histogram.mean() as u64))
    }

    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histogram.len() == 0
    }

    /// Merge another histogram into this one
    pub fn merge(&mut self, other: &LatencyHistogram) -> Result<()> {
        self.histogram
            .add(&other.histogram)
            .map_err(|e| anyhow::anyhow!("Failed to merge histograms: {}", e))?;
        Ok(())
    }

    /// Percentile summary, or None if empty
    pub fn summary(&self) -> Option<LatencySummary> {
        if self.is_empty() {
            return None;
        }
        let at = |p: f64| self.histogram.value_at_percentile(p);
        Some(LatencySummary {
            samples: self.len(),
            mean_ns: self.histogram.mean(),
            p50_ns: at(50.0),
            p90_ns: at(90.0),
            p99_ns: at(99.0),
            p999_ns: at(99.9),
            max_ns: self.histogram.max(),
        })
    }
}

/// Per-operation latency percentiles in nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub samples: u64,
    pub mean_ns: f64,
    pub p50_ns: u64,
    pub p90_ns: u64,
    pub p99_ns: u64,
    pub p999_ns: u64,
    pub max_ns: u64,
}
