//! Real-time scheduling setup (Linux SCHED_FIFO / affinity / mlockall).

use crate::cli::RtLock;

#[cfg(target_os = "linux")]
fn memlock_limit_hint() -> Option<String> {
    // SAFETY: getrlimit only writes the struct it is handed.
    unsafe {
        let mut rlim = std::mem::MaybeUninit::<libc::rlimit>::uninit();
        if libc::getrlimit(libc::RLIMIT_MEMLOCK, rlim.as_mut_ptr()) != 0 {
            return None;
        }
        let cur = rlim.assume_init().rlim_cur;
        if cur == libc::RLIM_INFINITY {
            Some("memlock limit: unlimited".to_string())
        } else {
            Some(format!("memlock limit: {} KiB", cur / 1024))
        }
    }
}

#[cfg(all(feature = "rt", target_os = "linux"))]
fn privilege_hint() -> String {
    // SAFETY: geteuid cannot fail.
    let euid = unsafe { libc::geteuid() };
    if euid == 0 {
        String::new()
    } else {
        format!("; running as uid {euid}, needs CAP_SYS_NICE/CAP_IPC_LOCK or root")
    }
}

#[cfg(all(feature = "rt", target_os = "linux"))]
pub fn setup_rt_once(rt: bool, prio: Option<i32>, lock: RtLock, rt_cpu: Option<usize>) {
    use afc_hardware::rt::{lock_memory, pin_to_cpu, set_fifo_priority};
    use std::sync::OnceLock;
    static RT_ONCE: OnceLock<()> = OnceLock::new();

    if !rt {
        return;
    }
    RT_ONCE.get_or_init(|| {
        let locked = match lock {
            RtLock::None => Ok(()),
            RtLock::Current => lock_memory(false),
            // fall back to current pages if future ones cannot be locked
            RtLock::All => lock_memory(true).or_else(|_| lock_memory(false)),
        };
        match locked {
            Ok(()) => eprintln!("RT: memory lock = {lock:?}"),
            Err(err) => {
                let hint = memlock_limit_hint().unwrap_or_default();
                eprintln!("Warning: mlockall failed: {err}; {hint}{}", privilege_hint());
            }
        }
        // 80 leaves headroom above typical IRQ threads
        match set_fifo_priority(prio.unwrap_or(80)) {
            Ok(p) => eprintln!("RT: SCHED_FIFO priority {p}"),
            Err(err) => eprintln!(
                "Warning: sched_setscheduler(SCHED_FIFO) failed: {err}{}",
                privilege_hint()
            ),
        }
        if let Err(err) = pin_to_cpu(rt_cpu.unwrap_or(0)) {
            eprintln!("Warning: affinity not applied: {err}");
        }
    });
}

#[cfg(not(all(feature = "rt", target_os = "linux")))]
pub fn setup_rt_once(rt: bool, _prio: Option<i32>, _lock: RtLock, _rt_cpu: Option<usize>) {
    if rt {
        #[cfg(target_os = "linux")]
        eprintln!(
            "Warning: built without the `rt` feature; real-time mode not applied ({})",
            memlock_limit_hint().unwrap_or_default()
        );
        #[cfg(not(target_os = "linux"))]
        eprintln!("Warning: real-time mode is only supported on Linux");
    }
}
