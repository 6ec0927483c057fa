//! Linux `perf_event_open` counter backend
//!
//! Each session opens one counter per tracked event for the calling thread
//! (`pid = 0`, any CPU), user-space only, so it works with
//! `perf_event_paranoid <= 2`. Events the PMU does not support are reported
//! as absent rather than failing the session.

use super::{CounterDeltas, CounterSession, CounterSource, HwEvent};
use crate::error::BenchError;
use crate::Result;
use std::fs::File;
use std::io::Read;
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd};

const PERF_TYPE_HARDWARE: u32 = 0;

const PERF_COUNT_HW_INSTRUCTIONS: u64 = 1;
const PERF_COUNT_HW_CACHE_REFERENCES: u64 = 2;
const PERF_COUNT_HW_CACHE_MISSES: u64 = 3;
const PERF_COUNT_HW_REF_CPU_CYCLES: u64 = 9;

// attr.flags bits
const ATTR_DISABLED: u64 = 1 << 0;
const ATTR_EXCLUDE_KERNEL: u64 = 1 << 5;
const ATTR_EXCLUDE_HV: u64 = 1 << 6;

const PERF_FLAG_FD_CLOEXEC: libc::c_ulong = 1 << 3;

// _IO('$', n)
const PERF_EVENT_IOC_ENABLE: libc::c_ulong = 0x2400;
const PERF_EVENT_IOC_DISABLE: libc::c_ulong = 0x2401;
const PERF_EVENT_IOC_RESET: libc::c_ulong = 0x2403;

/// `struct perf_event_attr`, PERF_ATTR_SIZE_VER5 layout
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
#[allow(dead_code)]
struct PerfEventAttr {
    type_: u32,
    size: u32,
    config: u64,
    sample_period: u64,
    sample_type: u64,
    read_format: u64,
    flags: u64,
    wakeup_events: u32,
    bp_type: u32,
    config1: u64,
    config2: u64,
    branch_sample_type: u64,
    sample_regs_user: u64,
    sample_stack_user: u32,
    clockid: i32,
    sample_regs_intr: u64,
    aux_watermark: u32,
    sample_max_stack: u16,
    reserved_2: u16,
}

const PERF_ATTR_SIZE_VER5: u32 = 112;
const _: () = assert!(std::mem::size_of::<PerfEventAttr>() == PERF_ATTR_SIZE_VER5 as usize);

fn event_attr(event: HwEvent) -> PerfEventAttr {
    let (type_, config) = match event {
        HwEvent::LlcMisses => (PERF_TYPE_HARDWARE, PERF_COUNT_HW_CACHE_MISSES),
        HwEvent::RefCycles => (PERF_TYPE_HARDWARE, PERF_COUNT_HW_REF_CPU_CYCLES),
        HwEvent::Instructions => (PERF_TYPE_HARDWARE, PERF_COUNT_HW_INSTRUCTIONS),
        // generic perf has no L2 event; every L2 miss is an LLC reference
        HwEvent::L2Misses => (PERF_TYPE_HARDWARE, PERF_COUNT_HW_CACHE_REFERENCES),
    };

    PerfEventAttr {
        type_,
        size: PERF_ATTR_SIZE_VER5,
        config,
        flags: ATTR_DISABLED | ATTR_EXCLUDE_KERNEL | ATTR_EXCLUDE_HV,
        ..Default::default()
    }
}

/// Open a disabled counter for the calling thread
fn open_counter(event: HwEvent) -> Result<File> {
    let attr = event_attr(event);
    let fd = unsafe {
        libc::syscall(
            libc::SYS_perf_event_open,
            &attr as *const PerfEventAttr,
            0 as libc::c_long,
            -1 as libc::c_long,
            -1 as libc::c_long,
            PERF_FLAG_FD_CLOEXEC as libc::c_long,
        )
    };
    if fd < 0 {
        return Err(BenchError::last_os(format!("perf_event_open({})", event)).into());
    }

    // SAFETY: fd was just returned by the kernel and is owned by nobody else.
    let owned = unsafe { OwnedFd::from_raw_fd(fd as libc::c_int) };
    Ok(File::from(owned))
}

fn counter_ioctl(file: &File, request: libc::c_ulong, event: HwEvent) -> Result<()> {
    let rc = unsafe { libc::ioctl(file.as_raw_fd(), request as _, 0) };
    if rc == -1 {
        return Err(BenchError::last_os(format!("perf ioctl {:#x} ({})", request, event)).into());
    }
    Ok(())
}

/// perf-backed counter source
#[derive(Debug, Clone, Copy)]
pub struct PerfCounters {
    _private: (),
}

impl PerfCounters {
    /// Check that the kernel lets this process count its own instructions
    pub fn detect() -> Result<Self> {
        let file = open_counter(HwEvent::Instructions)?;
        drop(file);
        tracing::debug!("perf counters available");
        Ok(Self { _private: () })
    }
}

struct PerfSession {
    counters: Vec<(HwEvent, File)>,
}

impl CounterSource for PerfCounters {
    fn name(&self) -> &'static str {
        "perf"
    }

    fn start(&self, tid: usize) -> Result<Box<dyn CounterSession + '_>> {
        let mut counters = Vec::with_capacity(HwEvent::ALL.len());
        for event in HwEvent::ALL {
            match open_counter(event) {
                Ok(file) => counters.push((event, file)),
                Err(e) => tracing::debug!(tid, "skipping {}: {:#}", event, e),
            }
        }

        for (event, file) in &counters {
            counter_ioctl(file, PERF_EVENT_IOC_RESET, *event)?;
        }
        for (event, file) in &counters {
            counter_ioctl(file, PERF_EVENT_IOC_ENABLE, *event)?;
        }

        Ok(Box::new(PerfSession { counters }))
    }
}

impl CounterSession for PerfSession {
    fn stop(self: Box<Self>) -> Result<CounterDeltas> {
        let session = *self;
        for (event, file) in &session.counters {
            counter_ioctl(file, PERF_EVENT_IOC_DISABLE, *event)?;
        }

        let mut deltas = CounterDeltas::default();
        for (event, mut file) in session.counters {
            let mut buf = [0u8; 8];
            file.read_exact(&mut buf)
                .map_err(|e| BenchError::resource(format!("read perf counter {}", event), e))?;
            deltas.set(event, u64::from_ne_bytes(buf));
        }
        Ok(deltas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_encoding() {
        let attr = event_attr(HwEvent::L2Misses);
        assert_eq!(attr.type_, PERF_TYPE_HARDWARE);
        assert_eq!(attr.config, PERF_COUNT_HW_CACHE_REFERENCES);
        assert_eq!(attr.size, 112);
        assert_eq!(attr.flags, 0b110_0001);

        let attr = event_attr(HwEvent::RefCycles);
        assert_eq!((attr.type_, attr.config), (PERF_TYPE_HARDWARE, 9));
    }

    #[test]
    fn test_session_counts_instructions_when_available() {
        // perf is often unavailable in CI containers
        let Ok(source) = PerfCounters::detect() else {
            return;
        };
        let session = source.start(0).unwrap();
        let mut x = 0u64;
        for i in 0..100_000u64 {
            x = x.wrapping_add(std::hint::black_box(i));
        }
        std::hint::black_box(x);
        let deltas = session.stop().unwrap();
        if let Some(instructions) = deltas.get(HwEvent::Instructions) {
            assert!(instructions > 100_000);
        }
    }
}
