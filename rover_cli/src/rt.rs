//! Real-time scheduling for the supervisor process (Linux SCHED_FIFO).

#[cfg(target_os = "linux")]
pub fn setup_rt_once(rt: bool, prio: Option<i32>) {
    use std::sync::OnceLock;
    static RT_ONCE: OnceLock<()> = OnceLock::new();

    if !rt {
        return;
    }
    RT_ONCE.get_or_init(|| match try_apply_fifo_priority(prio) {
        Ok(applied) => tracing::info!(priority = applied, "RT: SCHED_FIFO enabled"),
        Err(err) => {
            let prio_dbg = prio.map_or_else(|| "(max)".into(), |p| p.to_string());
            tracing::warn!(
                error = %err,
                priority = %prio_dbg,
                "sched_setscheduler(SCHED_FIFO) failed; running with normal scheduling"
            );
        }
    });
}

/// Apply SCHED_FIFO, clamped to the system range. Returns the priority used.
#[cfg(target_os = "linux")]
fn try_apply_fifo_priority(prio: Option<i32>) -> eyre::Result<i32> {
    use libc::{SCHED_FIFO, sched_get_priority_max, sched_get_priority_min, sched_param};

    if !has_sys_nice() {
        let euid = unsafe { libc::geteuid() };
        if euid != 0 {
            eyre::bail!(
                "insufficient privileges for SCHED_FIFO: needs CAP_SYS_NICE or root (euid {euid}). \
                 Hint: 'sudo setcap cap_sys_nice=ep /path/to/rover'"
            );
        }
    }

    let (min, max) = unsafe {
        let min = sched_get_priority_min(SCHED_FIFO);
        let max = sched_get_priority_max(SCHED_FIFO);
        if min < 0 || max < 0 { (1, 99) } else { (min, max) }
    };
    let wanted = prio.unwrap_or(max).clamp(min, max);
    let param = sched_param {
        sched_priority: wanted,
    };
    let rc = unsafe { libc::sched_setscheduler(0, SCHED_FIFO, &param) };
    if rc != 0 {
        return Err(eyre::eyre!(std::io::Error::last_os_error()));
    }
    Ok(wanted)
}

/// CAP_SYS_NICE (bit 23) in the effective or permitted set.
#[cfg(target_os = "linux")]
fn has_sys_nice() -> bool {
    let Ok(status) = std::fs::read_to_string("/proc/self/status") else {
        return false;
    };
    status
        .lines()
        .filter(|line| line.starts_with("CapEff:") || line.starts_with("CapPrm:"))
        .filter_map(|line| line.split_whitespace().nth(1))
        .filter_map(|hex| u64::from_str_radix(hex, 16).ok())
        .any(|caps| caps & 0x80_0000 != 0)
}

#[cfg(not(target_os = "linux"))]
pub fn setup_rt_once(rt: bool, _prio: Option<i32>) {
    if rt {
        tracing::warn!("--rt is only supported on Linux; ignoring");
    }
}
