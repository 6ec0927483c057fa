//! Per-operation clock
//!
//! Every SUT call is bracketed by two timestamps, so the clock sits on the hot
//! path of each worker. Reading CLOCK_MONOTONIC directly avoids the extra
//! bookkeeping of `std::time::Instant`.

use std::time::Duration;

/// Monotonic timestamp with nanosecond resolution
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FastInstant {
    nanos: u64,
}

impl FastInstant {
    /// Current CLOCK_MONOTONIC time
    #[inline(always)]
    pub fn now() -> Self {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };

        // CLOCK_MONOTONIC is always available on Linux; the call cannot fail
        // with a valid timespec pointer.
        unsafe {
            libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
        }

        let nanos = (ts.tv_sec as u64) * 1_000_000_000 + (ts.tv_nsec as u64);

        Self { nanos }
    }

    /// Duration since `earlier`, saturating at zero
    #[inline(always)]
    pub fn duration_since(&self, earlier: FastInstant) -> Duration {
        Duration::from_nanos(self.nanos.saturating_sub(earlier.nanos))
    }

    #[inline(always)]
    pub fn elapsed(&self) -> Duration {
        Self::now().duration_since(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_elapsed_covers_sleep() {
        let start = FastInstant::now();
        thread::sleep(Duration::from_millis(10));
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_clock_is_monotonic() {
        let samples: Vec<FastInstant> = (0..1000).map(|_| FastInstant::now()).collect();
        assert!(samples.windows(2).all(|w| w[0] <= w[1]));
        // reversed order saturates instead of wrapping
        assert_eq!(samples[0].duration_since(samples[999]), Duration::ZERO);
    }
}
