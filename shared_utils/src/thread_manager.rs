//! Thread budgeting for the conversion worker pool
//!
//! Treats CPU cores as a fixed budget split between parallel jobs and the
//! threads each job may use, and allows environment-based overrides.

use std::sync::OnceLock;

/// Environment variable overriding the worker pool size.
pub const THREADS_ENV: &str = "IMG_CATALOG_THREADS";

/// Cached core count for this process
static CPU_COUNT: OnceLock<usize> = OnceLock::new();

fn cpu_count() -> usize {
    *CPU_COUNT.get_or_init(num_cpus::get)
}

/// Workload type for thread balancing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadType {
    /// Decode/encode happens on the worker thread itself.
    InProcess,
    /// Each job spawns an external encoder that is multi-threaded on its own.
    ExternalEncoder,
}

/// Default pool size for `workload` on this machine.
///
/// Leaves headroom for the OS. External encoders are assumed to use two
/// cores each, so they get half as many parallel jobs.
pub fn get_balanced_thread_config(workload: WorkloadType) -> usize {
    balanced_for_cores(cpu_count(), workload)
}

fn balanced_for_cores(total_cores: usize, workload: WorkloadType) -> usize {
    // reserve 20% of cores, minimum 1, maximum 2
    let reserved = ((total_cores as f64 * 0.2).ceil() as usize).clamp(1, 2);
    let available_cores = total_cores.saturating_sub(reserved).max(1);

    match workload {
        WorkloadType::InProcess => available_cores.clamp(1, 16),
        WorkloadType::ExternalEncoder => (available_cores / 2).clamp(1, 8),
    }
}

/// Worker count from [`THREADS_ENV`], if set to a positive integer.
pub fn threads_from_env() -> Option<usize> {
    parse_thread_count(std::env::var(THREADS_ENV).ok()?.as_str())
}

fn parse_thread_count(raw: &str) -> Option<usize> {
    match raw.trim().parse::<usize>() {
        Ok(0) | Err(_) => {
            tracing::warn!(value = raw, "Ignoring invalid {}", THREADS_ENV);
            None
        }
        Ok(n) => Some(n),
    }
}

/// Pool size: explicit request, then environment, then balanced default.
pub fn resolve_worker_threads(requested: Option<usize>, workload: WorkloadType) -> usize {
    requested
        .filter(|&n| n > 0)
        .or_else(threads_from_env)
        .unwrap_or_else(|| get_balanced_thread_config(workload))
}
