//! Per-thread operation streams
//!
//! A phase has `N` operations and `T` threads. Thread `i` owns the contiguous
//! global indices `[i * (N / T), (i + 1) * (N / T))`; the `N mod T` leftover
//! operations are dropped. Operations come from one of three backings, fixed
//! for the whole phase:
//!
//! - **sampled**: keys drawn from per-batch [`DistributionTemplate`]s. Each
//!   thread splits its own partition into the refresh batches, so every
//!   thread walks batch 0 through batch `B - 1`.
//! - **keys**: a slice of a raw key log
//! - **records**: a slice of a tagged record log
//!
//! Streams are lazy and single-pass; sampling happens inside the worker that
//! owns the stream.

use crate::distribution::{derive_seed, Distribution, DistributionTemplate};
use crate::oplog::OperationRecord;
use std::ops::Range;

/// Global index range owned by `thread` of `threads`
pub fn partition_range(total: usize, threads: usize, thread: usize) -> Range<usize> {
    let per_thread = total / threads.max(1);
    thread * per_thread..(thread + 1) * per_thread
}

/// All per-thread ranges, ordered by thread id
pub fn partition(total: usize, threads: usize) -> Vec<Range<usize>> {
    (0..threads).map(|t| partition_range(total, threads, t)).collect()
}

/// Batch that index `index` falls into when `total` operations are split
/// into `batches` equal refresh windows
pub fn batch_of(index: usize, total: usize, batches: usize) -> usize {
    if total == 0 || batches <= 1 {
        return 0;
    }
    let batch = (index as u128 * batches as u128 / total as u128) as usize;
    batch.min(batches - 1)
}

/// Where a phase gets its operations
#[derive(Clone, Copy)]
pub enum OperationSource<'a> {
    /// `total` keys drawn from `templates`, one template per refresh batch
    Sampled {
        templates: &'a [DistributionTemplate],
        total: usize,
        seed: u64,
    },
    Keys(&'a [u64]),
    Records(&'a [OperationRecord]),
}

impl<'a> OperationSource<'a> {
    /// Operations in the phase before partitioning
    pub fn len(&self) -> usize {
        match self {
            OperationSource::Sampled { total, .. } => *total,
            OperationSource::Keys(keys) => keys.len(),
            OperationSource::Records(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stream for `thread` of `threads`
    pub fn thread_view(&self, thread: usize, threads: usize) -> ThreadOps<'a> {
        let range = partition_range(self.len(), threads, thread);
        match *self {
            OperationSource::Sampled { templates, seed, .. } => {
                ThreadOps::Keys(KeyStream::Sampled(SampledKeys {
                    templates,
                    seed,
                    thread,
                    start: range.start,
                    next: range.start,
                    end: range.end,
                    batch: None,
                    sampler: None,
                }))
            }
            OperationSource::Keys(keys) => {
                ThreadOps::Keys(KeyStream::Slice(keys[range].iter().copied()))
            }
            OperationSource::Records(records) => ThreadOps::Records(records[range].iter()),
        }
    }
}

/// One thread's operations
pub enum ThreadOps<'a> {
    Keys(KeyStream<'a>),
    Records(std::slice::Iter<'a, OperationRecord>),
}

impl<'a> ThreadOps<'a> {
    pub fn remaining(&self) -> usize {
        match self {
            ThreadOps::Keys(keys) => keys.size_hint().0,
            ThreadOps::Records(records) => records.len(),
        }
    }
}

/// Keys for one thread
pub enum KeyStream<'a> {
    Sampled(SampledKeys<'a>),
    Slice(std::iter::Copied<std::slice::Iter<'a, u64>>),
}

impl<'a> Iterator for KeyStream<'a> {
    type Item = u64;

    #[inline]
    fn next(&mut self) -> Option<u64> {
        match self {
            KeyStream::Sampled(keys) => keys.next(),
            KeyStream::Slice(keys) => keys.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            KeyStream::Sampled(keys) => keys.size_hint(),
            KeyStream::Slice(keys) => keys.size_hint(),
        }
    }
}

/// Sampled keys, switching to a freshly seeded sampler at each batch boundary
///
/// Batches are counted within the thread's own partition `[start, end)`.
pub struct SampledKeys<'a> {
    templates: &'a [DistributionTemplate],
    seed: u64,
    thread: usize,
    start: usize,
    next: usize,
    end: usize,
    batch: Option<usize>,
    sampler: Option<Box<dyn Distribution>>,
}

impl<'a> SampledKeys<'a> {
    /// Batch the most recent key came from
    pub fn current_batch(&self) -> Option<usize> {
        self.batch
    }
}

impl<'a> Iterator for SampledKeys<'a> {
    type Item = u64;

    #[inline]
    fn next(&mut self) -> Option<u64> {
        if self.next >= self.end || self.templates.is_empty() {
            return None;
        }

        let batch = batch_of(
            self.next - self.start,
            self.end - self.start,
            self.templates.len(),
        );
        if self.batch != Some(batch) {
            let stream = ((self.thread as u64) << 32) | batch as u64;
            self.sampler = Some(self.templates[batch].instantiate(derive_seed(self.seed, stream)));
            self.batch = Some(batch);
        }
        self.next += 1;

        self.sampler.as_mut().map(|s| s.next_key())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = if self.templates.is_empty() {
            0
        } else {
            self.end.saturating_sub(self.next)
        };
        (n, Some(n))
    }
}
