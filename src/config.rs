//! Kernel configuration: the constants the original hardcodes as `#define`s,
//! plus the two policy choices §6 says are fixed "at construction time" by
//! the embedding driver.

use crate::kernel::mm::replacement::ReplacementKind;
use crate::kernel::scheduler::SchedulerKind;

/// Instructions between successive timer interrupts (`INTERVALO_INTERRUPCAO`
/// in the original).
pub const TIMER_INTERVAL: i32 = 50;

/// Quantum credited to a process on admission or re-enqueue under a quantum
/// scheduler (round-robin, priority-aged).
pub const QUANTUM_INITIAL: i32 = 5;

/// Instructions the secondary memory stays busy after servicing one page
/// transfer.
pub const DISK_LATENCY: i32 = 40;

/// Bytes per page / frame.
pub const PAGE_SIZE: i32 = 256;

/// Terminals in the system; a process's terminal is `pid mod TERMINAL_COUNT`.
pub const TERMINAL_COUNT: usize = 4;

/// Upper bound on live process descriptors.
pub const MAX_PROCESSES: usize = 16;

/// Total physical frames backing main memory.
pub const FRAME_COUNT: usize = 32;

/// Well-known CPU save-area addresses (§6): `A`, `PC`, `err`.
pub const CPU_END_A: i32 = 56;
pub const CPU_END_PC: i32 = 57;
pub const CPU_END_ERRO: i32 = 58;
/// Reserved slot for the `X` register, saved by the trap glue before the
/// kernel entry is called (§6).
pub const CPU_END_X: i32 = 59;

/// First address the trap handler image occupies; also the expected return
/// value of loading it during reset (§4.1).
pub const CPU_END_TRATADOR: i32 = 0;

/// Last address of memory reserved for the trap handler and CPU save area;
/// frames below this boundary are never handed to a process (§4.1 reset).
pub const CPU_END_FIM_PROT: i32 = 2 * PAGE_SIZE - 1;

/// CPU error codes (§4.1 "read the error code"). Exact values are
/// implementation-chosen but fixed, matching §6's note on syscall numbers.
pub const CPU_ERR_OK: i32 = 0;
pub const CPU_ERR_PAGE_FAULT: i32 = 1;

/// Syscall numbers read from the `A` register (§6).
pub const SYSCALL_READ: i32 = 1;
pub const SYSCALL_WRITE: i32 = 2;
pub const SYSCALL_SPAWN: i32 = 3;
pub const SYSCALL_KILL: i32 = 4;
pub const SYSCALL_WAIT: i32 = 5;

/// Runtime kernel configuration, fixed for the lifetime of a [`crate::kernel::Kernel`].
#[derive(Debug, Clone, Copy)]
pub struct KernelConfig {
    pub scheduler: SchedulerKind,
    pub replacement: ReplacementKind,
    /// Whether `SPAWN` eagerly pre-touches every page of the new process
    /// (§4.5, §9 open question). The original does; a fully lazy
    /// implementation is also spec-compliant.
    pub spawn_pretouch: bool,
}

impl KernelConfig {
    #[must_use]
    pub const fn new(scheduler: SchedulerKind, replacement: ReplacementKind) -> Self {
        Self {
            scheduler,
            replacement,
            spawn_pretouch: true,
        }
    }

    #[must_use]
    pub const fn with_spawn_pretouch(mut self, pretouch: bool) -> Self {
        self.spawn_pretouch = pretouch;
        self
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::new(SchedulerKind::Fcfs, ReplacementKind::Fifo)
    }
}
