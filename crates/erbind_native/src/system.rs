//! Host system resources reported by the diagnostic module.

use crate::error::{EngineError, EngineResult};
use sysinfo::{CpuRefreshKind, RefreshKind, System};

/// A snapshot of host memory and CPU counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemInfo {
    /// Total physical memory in bytes.
    pub total_memory: u64,
    /// Memory available for new allocations in bytes.
    pub available_memory: u64,
    /// Physical CPU cores. Never exceeds `logical_cores`.
    pub physical_cores: usize,
    /// Logical CPU cores (hardware threads on the host).
    pub logical_cores: usize,
}

impl SystemInfo {
    /// Reads the current values from the operating system.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the platform reports no memory.
    pub fn current() -> EngineResult<Self> {
        let mut system =
            System::new_with_specifics(RefreshKind::new().with_cpu(CpuRefreshKind::new()));
        system.refresh_memory();

        let total_memory = system.total_memory();
        if total_memory == 0 {
            return Err(EngineError::Internal(
                "platform reported zero total memory".into(),
            ));
        }
        // Some platforms do not report reclaimable memory; fall back to free.
        let available_memory = match system.available_memory() {
            0 => system.free_memory(),
            n => n,
        }
        .max(1);

        let (physical_cores, logical_cores) =
            core_counts(system.cpus().len(), system.physical_core_count());

        Ok(Self {
            total_memory,
            available_memory,
            physical_cores,
            logical_cores,
        })
    }
}

/// Reconciles the CPU counts sysinfo reports into `(physical, logical)`.
///
/// Both counts are at least one and physical never exceeds logical.
fn core_counts(cpus: usize, physical: Option<usize>) -> (usize, usize) {
    let logical = match cpus {
        0 => std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
        n => n,
    };
    let physical = physical
        .filter(|n| *n > 0)
        .unwrap_or(logical)
        .min(logical);
    (physical, logical)
}
