//! Deterministic counter source for testing
//!
//! Every session returns the deltas produced by a per-thread function, and
//! the source counts how many sessions were started and stopped.

use super::{CounterDeltas, CounterSession, CounterSource};
use crate::Result;
use std::sync::atomic::{AtomicUsize, Ordering};

type DeltaFn = dyn Fn(usize) -> CounterDeltas + Sync;

/// Mock counter source
pub struct FixedCounters {
    deltas: Box<DeltaFn>,
    started: AtomicUsize,
    stopped: AtomicUsize,
}

impl FixedCounters {
    /// Every thread reports `deltas`
    pub fn new(deltas: CounterDeltas) -> Self {
        Self::per_thread(move |_| deltas)
    }

    /// Thread `tid` reports `f(tid)`
    pub fn per_thread<F>(f: F) -> Self
    where
        F: Fn(usize) -> CounterDeltas + Sync + 'static,
    {
        Self {
            deltas: Box::new(f),
            started: AtomicUsize::new(0),
            stopped: AtomicUsize::new(0),
        }
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }
}

struct FixedSession<'a> {
    source: &'a FixedCounters,
    tid: usize,
}

impl CounterSource for FixedCounters {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn start(&self, tid: usize) -> Result<Box<dyn CounterSession + '_>> {
        self.started.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FixedSession { source: self, tid }))
    }
}

impl<'a> CounterSession for FixedSession<'a> {
    fn stop(self: Box<Self>) -> Result<CounterDeltas> {
        self.source.stopped.fetch_add(1, Ordering::SeqCst);
        Ok((self.source.deltas)(self.tid))
    }
}
