//! Process-level real-time helpers (Linux).

use nix::sched::{CpuSet, sched_setaffinity};
use nix::sys::mman::{MlockAllFlags, mlockall};
use nix::unistd::Pid;

use crate::error::{HwError, Result};

/// Lock the process memory. `future` also locks pages mapped later.
pub fn lock_memory(future: bool) -> Result<()> {
    let mut flags = MlockAllFlags::MCL_CURRENT;
    if future {
        flags |= MlockAllFlags::MCL_FUTURE;
    }
    mlockall(flags).map_err(|e| HwError::Io(std::io::Error::from(e)))?;
    tracing::info!(future, "process memory locked");
    Ok(())
}

/// Pin the calling thread to one CPU.
pub fn pin_to_cpu(cpu: usize) -> Result<()> {
    let mut set = CpuSet::new();
    set.set(cpu)
        .map_err(|e| HwError::Io(std::io::Error::from(e)))?;
    sched_setaffinity(Pid::from_raw(0), &set).map_err(|e| HwError::Io(std::io::Error::from(e)))?;
    tracing::info!(cpu, "pinned to cpu");
    Ok(())
}

/// Switch the calling thread to `SCHED_FIFO` at `priority`, clamped to the
/// range the kernel reports.
pub fn set_fifo_priority(priority: i32) -> Result<i32> {
    // SAFETY: plain syscalls on the calling thread with a valid param struct.
    unsafe {
        let min = libc::sched_get_priority_min(libc::SCHED_FIFO);
        let max = libc::sched_get_priority_max(libc::SCHED_FIFO);
        let prio = priority.clamp(min, max);
        let param = libc::sched_param {
            sched_priority: prio,
        };
        if libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) != 0 {
            return Err(HwError::Io(std::io::Error::last_os_error()));
        }
        tracing::info!(priority = prio, "SCHED_FIFO enabled");
        Ok(prio)
    }
}
