//! Thread Priority
//!
//! Platform-specific scheduling for the streaming threads. The bridge worker
//! runs user processing for every hardware block and is elevated to
//! real-time class; the measurement polling thread only wakes once per
//! reporting period and is lowered below normal.
//!
//! # Platform Support
//!
//! - **macOS**: pthread QoS class + mach time-constraint policy
//! - **Windows**: MMCSS "Pro Audio" task, thread priority fallback
//! - **Linux**: SCHED_FIFO / SCHED_RR (requires CAP_SYS_NICE or an rtprio limit)
//!
//! Both calls act on the calling thread only and never fail hard: a thread
//! that cannot be elevated keeps running at default priority.

use std::cell::Cell;

thread_local! {
    /// Whether the current thread has already been elevated
    static REALTIME_SET: Cell<bool> = const { Cell::new(false) };
}

/// Result of a priority change attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityResult {
    /// Priority changed
    Success,
    /// Already elevated on this thread (no action needed)
    AlreadySet,
    /// Failed to change priority (non-fatal, default is kept)
    Failed,
    /// Platform not supported
    Unsupported,
}

impl PriorityResult {
    /// Whether the thread now runs at the requested priority
    pub fn is_applied(self) -> bool {
        matches!(self, PriorityResult::Success | PriorityResult::AlreadySet)
    }
}

/// Set real-time priority for the current thread.
///
/// Safe to call repeatedly: elevation is attempted once per thread, a failed
/// attempt may be retried.
pub fn set_realtime_priority() -> PriorityResult {
    if REALTIME_SET.with(|set| set.replace(true)) {
        return PriorityResult::AlreadySet;
    }

    let result = platform_set_realtime();

    match result {
        PriorityResult::Success => {
            log::info!("{} elevated to real-time priority", current_thread_label());
        }
        PriorityResult::Failed => {
            log::warn!(
                "Failed to set real-time priority for {} (non-fatal)",
                current_thread_label()
            );
            REALTIME_SET.with(|set| set.set(false));
        }
        PriorityResult::Unsupported => {
            log::debug!("Real-time priority not supported on this platform");
        }
        PriorityResult::AlreadySet => {}
    }

    result
}

/// Lower the current thread below normal priority.
pub fn set_background_priority() -> PriorityResult {
    let result = platform_set_background();
    if result == PriorityResult::Failed {
        log::debug!("Failed to lower priority for {}", current_thread_label());
    }
    result
}

/// Forget the elevation state of the current thread (for testing)
#[doc(hidden)]
pub fn reset_priority_state() {
    REALTIME_SET.with(|set| set.set(false));
}

fn current_thread_label() -> String {
    let thread = std::thread::current();
    match thread.name() {
        Some(name) => format!("thread '{name}'"),
        None => format!("thread {:?}", thread.id()),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// macOS Implementation
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(target_os = "macos")]
const QOS_CLASS_USER_INTERACTIVE: u32 = 0x21;

#[cfg(target_os = "macos")]
const QOS_CLASS_UTILITY: u32 = 0x11;

#[cfg(target_os = "macos")]
unsafe extern "C" {
    fn pthread_set_qos_class_self_np(qos_class: u32, relative_priority: i32) -> i32;
}

#[cfg(target_os = "macos")]
fn platform_set_realtime() -> PriorityResult {
    use std::mem::MaybeUninit;

    #[repr(C)]
    struct ThreadTimeConstraintPolicy {
        period: u32,
        computation: u32,
        constraint: u32,
        preemptible: i32,
    }

    #[repr(C)]
    struct MachTimebaseInfo {
        numer: u32,
        denom: u32,
    }

    unsafe extern "C" {
        fn mach_thread_self() -> u32;
        fn mach_timebase_info(info: *mut MachTimebaseInfo) -> i32;
        fn thread_policy_set(
            thread: u32,
            flavor: u32,
            policy_info: *const ThreadTimeConstraintPolicy,
            count: u32,
        ) -> i32;
    }

    const THREAD_TIME_CONSTRAINT_POLICY: u32 = 2;
    const THREAD_TIME_CONSTRAINT_POLICY_COUNT: u32 = 4;

    let qos_result = unsafe { pthread_set_qos_class_self_np(QOS_CLASS_USER_INTERACTIVE, 0) };
    if qos_result != 0 {
        log::debug!("pthread_set_qos_class_self_np failed: {}", qos_result);
    }

    let mut timebase = MaybeUninit::<MachTimebaseInfo>::uninit();
    let timebase = unsafe {
        mach_timebase_info(timebase.as_mut_ptr());
        timebase.assume_init()
    };
    let ns_to_abs =
        |ns: u64| -> u32 { ((ns * timebase.denom as u64) / timebase.numer as u64) as u32 };

    // 1 ms period, up to 500 µs of work, preemptible on overrun
    let policy = ThreadTimeConstraintPolicy {
        period: ns_to_abs(1_000_000),
        computation: ns_to_abs(500_000),
        constraint: ns_to_abs(1_000_000),
        preemptible: 1,
    };

    let result = unsafe {
        thread_policy_set(
            mach_thread_self(),
            THREAD_TIME_CONSTRAINT_POLICY,
            &policy,
            THREAD_TIME_CONSTRAINT_POLICY_COUNT,
        )
    };

    if result == 0 || qos_result == 0 {
        PriorityResult::Success
    } else {
        log::debug!("thread_policy_set failed: {}", result);
        PriorityResult::Failed
    }
}

#[cfg(target_os = "macos")]
fn platform_set_background() -> PriorityResult {
    if unsafe { pthread_set_qos_class_self_np(QOS_CLASS_UTILITY, 0) } == 0 {
        PriorityResult::Success
    } else {
        PriorityResult::Failed
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Windows Implementation
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(target_os = "windows")]
fn platform_set_realtime() -> PriorityResult {
    use windows::Win32::System::Threading::{
        AvSetMmThreadCharacteristicsW, GetCurrentThread, SetThreadPriority,
        THREAD_PRIORITY_TIME_CRITICAL,
    };
    use windows::core::PCWSTR;

    let task_name: Vec<u16> = "Pro Audio\0".encode_utf16().collect();
    let mut task_index: u32 = 0;

    let mmcss = unsafe { AvSetMmThreadCharacteristicsW(PCWSTR(task_name.as_ptr()), &mut task_index) };
    if let Ok(handle) = mmcss {
        if !handle.is_invalid() {
            log::debug!("MMCSS Pro Audio task registered (index {})", task_index);
            return PriorityResult::Success;
        }
    }

    log::debug!("MMCSS registration failed, falling back to thread priority");

    match unsafe { SetThreadPriority(GetCurrentThread(), THREAD_PRIORITY_TIME_CRITICAL) } {
        Ok(()) => PriorityResult::Success,
        Err(_) => PriorityResult::Failed,
    }
}

#[cfg(target_os = "windows")]
fn platform_set_background() -> PriorityResult {
    use windows::Win32::System::Threading::{
        GetCurrentThread, SetThreadPriority, THREAD_PRIORITY_BELOW_NORMAL,
    };

    match unsafe { SetThreadPriority(GetCurrentThread(), THREAD_PRIORITY_BELOW_NORMAL) } {
        Ok(()) => PriorityResult::Success,
        Err(_) => PriorityResult::Failed,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Linux Implementation
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(target_os = "linux")]
fn platform_set_realtime() -> PriorityResult {
    use libc::{
        SCHED_FIFO, SCHED_RR, pthread_self, pthread_setschedparam, sched_param, sched_setscheduler,
    };

    // pid 0 targets the calling thread; 80 leaves room for kernel threads
    let mut param = sched_param { sched_priority: 80 };
    if unsafe { sched_setscheduler(0, SCHED_FIFO, &param) } == 0 {
        return PriorityResult::Success;
    }

    log::debug!("SCHED_FIFO failed (need CAP_SYS_NICE), trying SCHED_RR");

    param.sched_priority = 70;
    if unsafe { sched_setscheduler(0, SCHED_RR, &param) } == 0 {
        return PriorityResult::Success;
    }

    log::debug!("SCHED_RR failed, trying pthread_setschedparam");

    param.sched_priority = 50;
    let result = unsafe { pthread_setschedparam(pthread_self(), SCHED_FIFO, &param) };
    if result == 0 {
        PriorityResult::Success
    } else {
        log::debug!("All Linux RT scheduling methods failed (errno: {})", result);
        PriorityResult::Failed
    }
}

#[cfg(target_os = "linux")]
fn platform_set_background() -> PriorityResult {
    // Linux applies nice values per thread when who = 0
    let result = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, 10) };
    if result == 0 {
        PriorityResult::Success
    } else {
        PriorityResult::Failed
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Unsupported Platforms
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
fn platform_set_realtime() -> PriorityResult {
    PriorityResult::Unsupported
}

#[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
fn platform_set_background() -> PriorityResult {
    PriorityResult::Unsupported
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
