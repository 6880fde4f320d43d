use nix::sched::{sched_getaffinity, sched_setaffinity, CpuSet};
use nix::unistd::Pid;

use crate::error::{CacheMonError, Result};

/// Pins the calling thread to one CPU until dropped
///
/// Counters are per logical core, so the workload in the measurement window
/// has to run on the core whose counter is read.
pub struct AffinityGuard {
    old_affinity: CpuSet,
    cpu: usize,
}

impl AffinityGuard {
    pub fn new(cpu: u32) -> Result<Self> {
        let cpu = cpu as usize;
        if cpu >= CpuSet::count() {
            return Err(CacheMonError::AffinityError(format!(
                "Invalid CPU ID: {cpu}"
            )));
        }

        let old_affinity = sched_getaffinity(Pid::from_raw(0))
            .map_err(|e| CacheMonError::AffinityError(format!("Failed to get affinity: {e}")))?;

        let mut new_affinity = CpuSet::new();
        new_affinity.set(cpu).map_err(|e| {
            CacheMonError::AffinityError(format!("Failed to set CPU {cpu} in set: {e}"))
        })?;

        sched_setaffinity(Pid::from_raw(0), &new_affinity).map_err(|e| {
            CacheMonError::AffinityError(format!("Failed to set affinity to CPU {cpu}: {e}"))
        })?;

        tracing::debug!("Pinned thread to CPU {}", cpu);

        Ok(Self { old_affinity, cpu })
    }

    pub fn cpu(&self) -> usize {
        self.cpu
    }
}

impl Drop for AffinityGuard {
    fn drop(&mut self) {
        if let Err(e) = sched_setaffinity(Pid::from_raw(0), &self.old_affinity) {
            tracing::warn!("Failed to restore affinity after CPU {}: {}", self.cpu, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affinity_guard_pins_and_restores() {
        let before = sched_getaffinity(Pid::from_raw(0)).unwrap();
        let cpu = (0..CpuSet::count()).find(|&c| before.is_set(c).unwrap_or(false));
        let Some(cpu) = cpu else { return };

        {
            let guard = AffinityGuard::new(cpu as u32).unwrap();
            assert_eq!(guard.cpu(), cpu);
            let pinned = sched_getaffinity(Pid::from_raw(0)).unwrap();
            assert!(pinned.is_set(cpu).unwrap());
        }

        let after = sched_getaffinity(Pid::from_raw(0)).unwrap();
        for c in 0..CpuSet::count() {
            assert_eq!(before.is_set(c).unwrap(), after.is_set(c).unwrap());
        }
    }

    #[test]
    fn test_affinity_guard_rejects_out_of_range() {
        let result = AffinityGuard::new(CpuSet::count() as u32);
        assert!(matches!(result, Err(CacheMonError::AffinityError(_))));
    }
}
