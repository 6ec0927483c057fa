//! CPU pinning for worker threads
//!
//! Pinning keeps a worker and its counter session on one core, so cache and
//! cycle counts are not smeared across migrations. Worker `i` is pinned to
//! `cores[i % cores.len()]`.
//!
//! # Example
//!
//! ```no_run
//! use skewbench::worker::affinity::{parse_cpu_list, pin_current_thread, core_for_worker};
//!
//! let cores = parse_cpu_list("0,2-4").unwrap();
//! pin_current_thread(core_for_worker(3, &cores)).unwrap();
//! ```

use crate::error::BenchError;
use crate::Result;
use anyhow::Context;

/// Highest core id a `cpu_set_t` can hold
const MAX_CORE_ID: usize = 1023;

/// Pin the calling thread to `core`
#[cfg(target_os = "linux")]
pub fn pin_current_thread(core: usize) -> Result<()> {
    use libc::{cpu_set_t, sched_setaffinity, CPU_SET, CPU_ZERO};
    use std::mem;

    if core > MAX_CORE_ID {
        return Err(BenchError::config(format!(
            "CPU core ID {} is too large (max {})",
            core, MAX_CORE_ID
        ))
        .into());
    }

    let result = unsafe {
        let mut cpu_set: cpu_set_t = mem::zeroed();
        CPU_ZERO(&mut cpu_set);
        CPU_SET(core, &mut cpu_set);
        sched_setaffinity(0, mem::size_of::<cpu_set_t>(), &cpu_set)
    };

    if result != 0 {
        return Err(BenchError::last_os(format!("sched_setaffinity(core {})", core)).into());
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn pin_current_thread(_core: usize) -> Result<()> {
    anyhow::bail!("CPU affinity is only supported on Linux")
}

/// Core worker `tid` runs on
pub fn core_for_worker(tid: usize, cores: &[usize]) -> usize {
    if cores.is_empty() {
        tid % num_cpus()
    } else {
        cores[tid % cores.len()]
    }
}

/// Parse a CPU list such as `"0,2-4,7"` into sorted, unique core ids
pub fn parse_cpu_list(list: &str) -> Result<Vec<usize>> {
    let mut cores = Vec::new();

    for part in list.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some((start, end)) = part.split_once('-') {
            let start: usize = start
                .trim()
                .parse()
                .with_context(|| format!("Invalid CPU core number: {}", start))?;
            let end: usize = end
                .trim()
                .parse()
                .with_context(|| format!("Invalid CPU core number: {}", end))?;
            if start > end {
                anyhow::bail!("Invalid CPU range: start ({}) > end ({})", start, end);
            }
            cores.extend(start..=end);
        } else {
            let core: usize = part
                .parse()
                .with_context(|| format!("Invalid CPU core number: {}", part))?;
            cores.push(core);
        }
    }

    if cores.is_empty() {
        anyhow::bail!("CPU core list cannot be empty");
    }
    if let Some(&core) = cores.iter().find(|&&c| c > MAX_CORE_ID) {
        anyhow::bail!("CPU core ID {} is too large (max {})", core, MAX_CORE_ID);
    }

    cores.sort_unstable();
    cores.dedup();
    Ok(cores)
}

/// Logical CPUs available to this process
pub fn num_cpus() -> usize {
    num_cpus::get()
}

/// Warn when there are more workers than CPUs
///
/// Returns true if the run is oversubscribed.
pub fn warn_if_oversubscribed(thread_count: usize) -> bool {
    let cpu_count = num_cpus();
    if thread_count > cpu_count {
        tracing::warn!(
            threads = thread_count,
            cpus = cpu_count,
            "more worker threads than CPUs; per-thread timings will include preemption"
        );
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_list_mixed() {
        assert_eq!(parse_cpu_list("0,2-4,7").unwrap(), vec![0, 2, 3, 4, 7]);
        assert_eq!(parse_cpu_list("0, 2-4, 7").unwrap(), vec![0, 2, 3, 4, 7]);
    }

    #[test]
    fn test_parse_cpu_list_dedups_and_sorts() {
        assert_eq!(parse_cpu_list("3,1,1,2-3,0").unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_parse_cpu_list_errors() {
        assert!(parse_cpu_list("").is_err());
        assert!(parse_cpu_list("0,abc,2").is_err());
        assert!(parse_cpu_list("5-2").is_err());
        assert!(parse_cpu_list("0-2-4").is_err());
        assert!(parse_cpu_list("2048").is_err());
    }

    #[test]
    fn test_core_for_worker_wraps() {
        let cores = [4, 6];
        assert_eq!(core_for_worker(0, &cores), 4);
        assert_eq!(core_for_worker(1, &cores), 6);
        assert_eq!(core_for_worker(2, &cores), 4);
        assert!(core_for_worker(5, &[]) < num_cpus());
    }

    #[test]
    fn test_warn_if_oversubscribed() {
        let cpu_count = num_cpus();
        assert!(!warn_if_oversubscribed(cpu_count));
        assert!(warn_if_oversubscribed(cpu_count + 1));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_pin_current_thread() {
        let handle = std::thread::spawn(|| pin_current_thread(0));
        assert!(handle.join().unwrap().is_ok());
    }
}
