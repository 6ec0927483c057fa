//! Hardware performance counters
//!
//! Counters are an injected capability: a [`CounterSource`] opens one
//! [`CounterSession`] per worker thread, on that thread, right after the
//! worker registers with the structure under test. Stopping the session
//! yields the raw event deltas for that thread's window.
//!
//! # Backends
//!
//! - **perf**: Linux `perf_event_open`, user-space counts only
//! - **null**: no events, every delta is absent
//! - **mock** (tests): fixed deltas per thread
//!
//! `auto` tries perf and falls back to null with a warning, so benchmarks
//! still run in containers where perf is locked down.

pub mod mock;
pub mod perf;

use crate::config::workload::CounterBackend;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of tracked events
pub const TRACKED_EVENTS: usize = 4;

/// Tracked hardware events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HwEvent {
    /// Last-level cache misses
    LlcMisses = 0,
    /// Reference cycles (not scaled by frequency changes)
    RefCycles = 1,
    /// Retired instructions
    Instructions = 2,
    /// L2 misses, counted as requests reaching the last-level cache
    L2Misses = 3,
}

impl HwEvent {
    pub const ALL: [HwEvent; TRACKED_EVENTS] = [
        HwEvent::LlcMisses,
        HwEvent::RefCycles,
        HwEvent::Instructions,
        HwEvent::L2Misses,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            HwEvent::LlcMisses => "llc_misses",
            HwEvent::RefCycles => "ref_cycles",
            HwEvent::Instructions => "instructions",
            HwEvent::L2Misses => "l2_misses",
        }
    }
}

impl fmt::Display for HwEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw event counts of one session; `None` when the event was not measured
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterDeltas {
    counts: [Option<u64>; TRACKED_EVENTS],
}

impl CounterDeltas {
    pub fn get(&self, event: HwEvent) -> Option<u64> {
        self.counts[event as usize]
    }

    pub fn set(&mut self, event: HwEvent, value: u64) {
        self.counts[event as usize] = Some(value);
    }

    /// Builder form of [`set`](Self::set)
    pub fn with(mut self, event: HwEvent, value: u64) -> Self {
        self.set(event, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(Option::is_none)
    }
}

/// Factory for per-thread counter sessions
///
/// Shared by all workers of a phase, hence `Sync`.
pub trait CounterSource: Sync {
    fn name(&self) -> &'static str;

    /// Start counting for the calling thread
    fn start(&self, tid: usize) -> Result<Box<dyn CounterSession + '_>>;
}

/// Counting window of one thread, owned by that thread
pub trait CounterSession {
    /// Stop counting and return the deltas since `start`
    fn stop(self: Box<Self>) -> Result<CounterDeltas>;
}

/// Backend that measures nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCounters;

struct NullSession;

impl CounterSource for NullCounters {
    fn name(&self) -> &'static str {
        "none"
    }

    fn start(&self, _tid: usize) -> Result<Box<dyn CounterSession + '_>> {
        Ok(Box::new(NullSession))
    }
}

impl CounterSession for NullSession {
    fn stop(self: Box<Self>) -> Result<CounterDeltas> {
        Ok(CounterDeltas::default())
    }
}

/// Counter source for `backend`
///
/// `Perf` fails if the kernel refuses perf events; `Auto` falls back to
/// [`NullCounters`].
pub fn select_source(backend: CounterBackend) -> Result<Box<dyn CounterSource>> {
    match backend {
        CounterBackend::None => Ok(Box::new(NullCounters)),
        CounterBackend::Perf => Ok(Box::new(perf::PerfCounters::detect()?)),
        CounterBackend::Auto => match perf::PerfCounters::detect() {
            Ok(source) => Ok(Box::new(source)),
            Err(e) => {
                tracing::warn!("hardware counters unavailable, continuing without them: {:#}", e);
                Ok(Box::new(NullCounters))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deltas_builder() {
        let deltas = CounterDeltas::default()
            .with(HwEvent::Instructions, 100)
            .with(HwEvent::LlcMisses, 3);
        assert_eq!(deltas.get(HwEvent::Instructions), Some(100));
        assert_eq!(deltas.get(HwEvent::LlcMisses), Some(3));
        assert_eq!(deltas.get(HwEvent::RefCycles), None);
        assert!(!deltas.is_empty());
        assert!(CounterDeltas::default().is_empty());
    }

    #[test]
    fn test_null_counters() {
        let source = NullCounters;
        let session = source.start(0).unwrap();
        assert!(session.stop().unwrap().is_empty());
    }

    #[test]
    fn test_select_none_and_auto() {
        assert_eq!(select_source(CounterBackend::None).unwrap().name(), "none");
        // auto never fails: it either gets perf or falls back
        let auto = select_source(CounterBackend::Auto).unwrap();
        assert!(matches!(auto.name(), "perf" | "none"));
    }
}
