//! Worker-to-core pinning
//!
//! With a core list configured, worker rank `r` runs on `cores[r % cores.len()]`;
//! more workers than cores wrap around the list. Pinning is Linux-only. On
//! other platforms the worker reports an affinity failure instead of running.
//!
//! ```
//! use threadfan::worker::affinity::{core_for_rank, parse_cpu_list};
//!
//! let cores = parse_cpu_list("0,2-3").unwrap();
//! assert_eq!(core_for_rank(&cores, 3), Some(0));
//! assert_eq!(core_for_rank(&cores, 4), Some(2));
//! ```

use crate::Result;
use anyhow::Context;

/// Highest core ID a `cpu_set_t` can hold, plus one
#[cfg(target_os = "linux")]
const CPU_SET_CAPACITY: usize = libc::CPU_SETSIZE as usize;

/// Restrict the calling thread to a single core
#[cfg(target_os = "linux")]
pub fn pin_current_thread(core: usize) -> Result<()> {
    if core >= CPU_SET_CAPACITY {
        anyhow::bail!("core {} does not fit in a cpu set of {}", core, CPU_SET_CAPACITY);
    }

    // SAFETY: `set` is a plain bitmask owned by this frame and `core` was
    // bounds-checked above; pid 0 addresses the calling thread.
    let rc = unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_SET(core, &mut set);
        libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set)
    };

    if rc != 0 {
        return Err(std::io::Error::last_os_error())
            .with_context(|| format!("sched_setaffinity to core {}", core));
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn pin_current_thread(core: usize) -> Result<()> {
    anyhow::bail!("cannot pin to core {}: pinning needs Linux", core)
}

fn parse_core(text: &str) -> Result<usize> {
    let text = text.trim();
    text.parse()
        .with_context(|| format!("'{}' is not a core number", text))
}

/// Parse a core list such as `"0,2-4,7"` into sorted, unique core IDs
///
/// ```
/// use threadfan::worker::affinity::parse_cpu_list;
///
/// assert_eq!(parse_cpu_list("7,0,2-4,3").unwrap(), vec![0, 2, 3, 4, 7]);
/// ```
pub fn parse_cpu_list(spec: &str) -> Result<Vec<usize>> {
    let mut cores = Vec::new();

    for item in spec.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        match item.split_once('-') {
            Some((lo, hi)) => {
                let (lo, hi) = (parse_core(lo)?, parse_core(hi)?);
                if lo > hi {
                    anyhow::bail!("core range '{}' runs backwards", item);
                }
                cores.extend(lo..=hi);
            }
            None => cores.push(parse_core(item)?),
        }
    }

    if cores.is_empty() {
        anyhow::bail!("no cores listed in '{}'", spec);
    }

    cores.sort_unstable();
    cores.dedup();
    Ok(cores)
}

/// Core assigned to a worker rank, wrapping around the list
pub fn core_for_rank(cores: &[usize], rank: usize) -> Option<usize> {
    if cores.is_empty() {
        None
    } else {
        Some(cores[rank % cores.len()])
    }
}

/// Number of logical CPU cores available
pub fn num_cpus() -> usize {
    num_cpus::get()
}

/// Warn when the worker count exceeds the CPU count
///
/// Returns true if the run is oversubscribed.
pub fn warn_if_oversubscribed(thread_count: usize) -> bool {
    let cpu_count = num_cpus();
    if thread_count > cpu_count {
        eprintln!(
            "Warning: Thread count ({}) exceeds CPU count ({}); workers will share cores.",
            thread_count, cpu_count
        );
        true
    } else {
        false
    }
}
