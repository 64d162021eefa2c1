//! Real-time scheduling: SCHED_FIFO, CPU pinning and mlockall on Linux;
//! mlockall only on macOS. Applied at most once per process; every failure
//! is a warning and the run continues with normal scheduling.

use crate::cli::{RtArgs, RtLock};
use std::sync::OnceLock;

static RT_ONCE: OnceLock<()> = OnceLock::new();

pub fn setup_rt_once(args: &RtArgs) {
    if !args.rt {
        return;
    }
    let lock = args.rt_lock.unwrap_or_else(RtLock::os_default);
    RT_ONCE.get_or_init(|| apply(lock, args.rt_prio, args.rt_cpu));
}

#[cfg(unix)]
fn mlockall(flags: libc::c_int) -> std::io::Result<()> {
    // SAFETY: mlockall takes only flags and touches no caller memory.
    let rc = unsafe { libc::mlockall(flags) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(unix)]
fn lock_memory(lock: RtLock) -> std::io::Result<&'static str> {
    match lock {
        RtLock::None => Ok("none"),
        RtLock::Current => mlockall(libc::MCL_CURRENT).map(|()| "current"),
        RtLock::All => match mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) {
            Ok(()) => Ok("all"),
            Err(e) if matches!(e.raw_os_error(), Some(libc::EPERM | libc::ENOMEM)) => {
                tracing::warn!(error = %e, "mlockall(current|future) failed, trying current");
                mlockall(libc::MCL_CURRENT).map(|()| "current")
            }
            Err(e) => Err(e),
        },
    }
}

#[cfg(target_os = "linux")]
fn has_sys_nice() -> bool {
    const CAP_SYS_NICE: u64 = 1 << 23;
    let Ok(status) = std::fs::read_to_string("/proc/self/status") else {
        return false;
    };
    status
        .lines()
        .filter_map(|line| line.strip_prefix("CapEff:"))
        .filter_map(|hex| u64::from_str_radix(hex.trim(), 16).ok())
        .any(|caps| caps & CAP_SYS_NICE != 0)
}

#[cfg(target_os = "linux")]
fn set_fifo(prio: Option<i32>) -> eyre::Result<i32> {
    // SAFETY: plain syscalls without pointer arguments.
    let root = unsafe { libc::geteuid() } == 0;
    if !root && !has_sys_nice() {
        eyre::bail!("needs CAP_SYS_NICE or root (try: sudo setcap cap_sys_nice=ep $(which teleop))");
    }
    // SAFETY: as above.
    let (min, max) = unsafe {
        (
            libc::sched_get_priority_min(libc::SCHED_FIFO),
            libc::sched_get_priority_max(libc::SCHED_FIFO),
        )
    };
    let (min, max) = if min < 0 || max < 0 { (1, 99) } else { (min, max) };
    let param = libc::sched_param {
        sched_priority: prio.unwrap_or(max).clamp(min, max),
    };
    // SAFETY: `param` is a valid sched_param for the duration of the call.
    let rc = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(param.sched_priority)
}

#[cfg(target_os = "linux")]
fn pin_cpu(cpu: usize) -> eyre::Result<()> {
    let capacity = std::mem::size_of::<libc::cpu_set_t>() * 8;
    if cpu >= capacity {
        eyre::bail!("CPU {cpu} exceeds cpu_set_t capacity {capacity}");
    }
    // SAFETY: cpu_set_t is plain data; the CPU_* helpers stay within it
    // because `cpu < capacity`.
    unsafe {
        let mut allowed: libc::cpu_set_t = std::mem::zeroed();
        if libc::sched_getaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &mut allowed) != 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        if !libc::CPU_ISSET(cpu, &allowed) {
            eyre::bail!("CPU {cpu} is not in the current affinity mask");
        }
        let mut wanted: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut wanted);
        libc::CPU_SET(cpu, &mut wanted);
        if libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &wanted) != 0 {
            return Err(std::io::Error::last_os_error().into());
        }
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn apply(lock: RtLock, prio: Option<i32>, cpu: Option<usize>) {
    match lock_memory(lock) {
        Ok(mode) => tracing::info!(mode, "rt: memory lock"),
        Err(e) => tracing::warn!(error = %e, "rt: mlockall failed (check ulimit -l / CAP_IPC_LOCK)"),
    }
    match set_fifo(prio) {
        Ok(p) => tracing::info!(priority = p, "rt: SCHED_FIFO"),
        Err(e) => tracing::warn!(error = %e, "rt: SCHED_FIFO not applied"),
    }
    let cpu = cpu.unwrap_or(0);
    match pin_cpu(cpu) {
        Ok(()) => tracing::info!(cpu, "rt: pinned"),
        Err(e) => tracing::warn!(cpu, error = %e, "rt: affinity not applied"),
    }
}

#[cfg(all(unix, not(target_os = "linux")))]
fn apply(lock: RtLock, prio: Option<i32>, cpu: Option<usize>) {
    match lock_memory(lock) {
        Ok(mode) => tracing::info!(mode, "rt: memory lock"),
        Err(e) => tracing::warn!(error = %e, "rt: mlockall failed"),
    }
    if prio.is_some() || cpu.is_some() {
        tracing::warn!("rt: SCHED_FIFO and affinity are Linux only; ignoring --rt-prio/--rt-cpu");
    }
}

#[cfg(not(unix))]
fn apply(_lock: RtLock, _prio: Option<i32>, _cpu: Option<usize>) {
    tracing::warn!("rt: real-time mode is not supported on this OS");
}
