use crate::error::ProbeError;
use tracing::debug;

pub struct RuntimeConfig;

impl RuntimeConfig {
    /// Logical CPU IDs the process may run on.
    pub fn available_cpus() -> Vec<usize> {
        core_affinity::get_core_ids()
            .unwrap_or_default()
            .into_iter()
            .map(|c| c.id)
            .collect()
    }

    /// Pin the current thread to logical CPU `cpu`.
    /// CPUID and XGETBV answer for the logical processor they execute on, so
    /// pinning selects one specific CPU on hybrid parts.
    pub fn pin_thread(cpu: usize) -> Result<(), ProbeError> {
        let pin_error = || ProbeError::CpuPin {
            cpu,
            available: Self::available_cpus(),
        };
        let core_id = core_affinity::get_core_ids()
            .unwrap_or_default()
            .into_iter()
            .find(|c| c.id == cpu)
            .ok_or_else(pin_error)?;

        if !core_affinity::set_for_current(core_id) {
            return Err(pin_error());
        }
        debug!(cpu, "thread pinned");
        Ok(())
    }
}
