//! Worker thread implementation
//!
//! A [`Worker`] is the execution unit of a phase. It owns one thread's slice
//! of the operation stream and drives it against the shared structure under
//! test, recording per-thread statistics. Workers share nothing mutable; they
//! communicate only through the [`ThreadStats`] they return.
//!
//! # Lifecycle
//!
//! 1. Optional CPU pinning
//! 2. `init_thread` on the structure
//! 3. Counter session start
//! 4. The operation loop, each SUT call timed individually
//! 5. `deinit_thread`, then counter session stop
//!
//! Key generation happens between timed calls, so sampling cost never shows up
//! in busy time or latency.

pub mod affinity;

use crate::config::workload::{LookupVerb, PhaseKind};
use crate::counters::CounterSource;
use crate::distribution::derive_seed;
use crate::oplog::{Operation, OperationRecord};
use crate::source::ThreadOps;
use crate::stats::ThreadStats;
use crate::sut::ConcurrentMap;
use crate::util::fast_time::FastInstant;
use crate::Result;
use anyhow::Context;
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Seed stream reserved for the read/insert coin of mixed phases
const MIX_COIN_STREAM: u64 = 0x4D49_5845_4400_0000;

/// One worker of one phase
pub struct Worker<'a> {
    /// Worker index, `0..threads`
    id: usize,

    kind: PhaseKind,

    lookup: LookupVerb,

    sut: &'a dyn ConcurrentMap,

    counters: &'a dyn CounterSource,

    ops: ThreadOps<'a>,

    /// Core to pin to before registering
    pin_core: Option<usize>,

    /// Operation coin for mixed phases
    rng: Xoshiro256PlusPlus,

    stats: ThreadStats,
}

/// Outcome of one SUT call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Lookup { hit: bool },
    Write,
    Skipped,
}

impl<'a> Worker<'a> {
    pub fn new(
        id: usize,
        kind: PhaseKind,
        sut: &'a dyn ConcurrentMap,
        counters: &'a dyn CounterSource,
        ops: ThreadOps<'a>,
        seed: u64,
    ) -> Result<Self> {
        Ok(Self {
            id,
            kind,
            lookup: LookupVerb::Find,
            sut,
            counters,
            ops,
            pin_core: None,
            rng: Xoshiro256PlusPlus::seed_from_u64(derive_seed(seed, MIX_COIN_STREAM ^ id as u64)),
            stats: ThreadStats::new(id)?,
        })
    }

    pub fn with_lookup(mut self, lookup: LookupVerb) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn with_pin_core(mut self, core: Option<usize>) -> Self {
        self.pin_core = core;
        self
    }

    /// Run the worker to completion on the calling thread
    ///
    /// The structure sees exactly one `init_thread` and, once that succeeded,
    /// exactly one `deinit_thread`, even when the counter session or an
    /// operation fails.
    pub fn run(mut self) -> Result<ThreadStats> {
        if let Some(core) = self.pin_core {
            affinity::pin_current_thread(core)
                .with_context(|| format!("Failed to pin worker {} to core {}", self.id, core))?;
        }

        let sut = self.sut;
        let counters = self.counters;
        sut.init_thread(self.id);

        let session = match counters.start(self.id) {
            Ok(session) => session,
            Err(e) => {
                sut.deinit_thread(self.id);
                return Err(e)
                    .with_context(|| format!("Worker {}: failed to start counters", self.id));
            }
        };

        let window_start = FastInstant::now();
        let outcome = self.drive();
        sut.deinit_thread(self.id);
        let deltas = session.stop();
        self.stats.window = window_start.elapsed();

        outcome?;
        self.stats.counters =
            deltas.with_context(|| format!("Worker {}: failed to read counters", self.id))?;

        tracing::debug!(
            worker = self.id,
            ops = self.stats.ops,
            busy_ms = crate::stats::duration_ms(self.stats.busy),
            "worker finished"
        );
        Ok(self.stats)
    }

    /// The operation loop
    fn drive(&mut self) -> Result<()> {
        let idle = ThreadOps::Records(<&[OperationRecord]>::default().iter());
        match std::mem::replace(&mut self.ops, idle) {
            ThreadOps::Keys(keys) => {
                for key in keys {
                    self.key_op(key);
                }
            }
            ThreadOps::Records(records) => {
                for record in records {
                    self.record_op(record)?;
                }
            }
        }
        Ok(())
    }

    #[inline]
    fn key_op(&mut self, key: u64) {
        let id = self.id;
        let sut = self.sut;
        let lookup = self.lookup;

        let read = match self.kind {
            PhaseKind::Search => true,
            PhaseKind::Mixed { read_ratio } => self.rng.gen::<f64>() < read_ratio,
            PhaseKind::Load | PhaseKind::Insert | PhaseKind::Replay => false,
        };

        let start = FastInstant::now();
        let outcome = if read {
            Outcome::Lookup {
                hit: do_lookup(sut, lookup, id, key),
            }
        } else {
            match self.kind {
                PhaseKind::Load => sut.insert(id, key, key),
                _ => sut.insert_if_absent(id, key, key),
            };
            Outcome::Write
        };
        self.finish(start, outcome);
    }

    #[inline]
    fn record_op(&mut self, record: &OperationRecord) -> Result<()> {
        let op = record
            .decode()
            .with_context(|| format!("Worker {}: bad operation record", self.id))?;

        if self.kind != PhaseKind::Replay {
            return match op.key() {
                Some(key) => {
                    self.key_op(key);
                    Ok(())
                }
                None => {
                    self.skip();
                    Ok(())
                }
            };
        }

        let id = self.id;
        let sut = self.sut;
        let lookup = self.lookup;

        let start = FastInstant::now();
        let outcome = match op {
            Operation::Empty => Outcome::Skipped,
            Operation::Get { key }
            | Operation::Predecessor { key }
            | Operation::Scan { low: key, .. } => Outcome::Lookup {
                hit: do_lookup(sut, lookup, id, key),
            },
            Operation::Update { key, value } => {
                sut.insert(id, key, value);
                Outcome::Write
            }
            Operation::Insert { key, value } => {
                sut.insert_if_absent(id, key, value);
                Outcome::Write
            }
            Operation::Remove { key } => {
                sut.erase(id, key);
                Outcome::Write
            }
        };

        if outcome == Outcome::Skipped {
            self.skip();
        } else {
            self.finish(start, outcome);
        }
        Ok(())
    }

    #[inline]
    fn finish(&mut self, start: FastInstant, outcome: Outcome) {
        let elapsed = start.elapsed();
        self.stats.ops += 1;
        self.stats.busy += elapsed;
        self.stats.latency.record(elapsed);
        if let Outcome::Lookup { hit } = outcome {
            self.stats.lookups += 1;
            if hit {
                self.stats.hits += 1;
            }
        }
    }

    fn skip(&mut self) {
        self.stats.ops += 1;
        self.stats.skipped += 1;
    }
}

#[inline]
fn do_lookup(sut: &dyn ConcurrentMap, verb: LookupVerb, tid: usize, key: u64) -> bool {
    match verb {
        LookupVerb::Find => sut.find(tid, key).is_some(),
        LookupVerb::Contains => sut.contains(tid, key),
    }
}
