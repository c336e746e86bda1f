//! The `Kernel` struct and the interrupt-dispatch pipeline (§4.1):
//! snapshot → handle → pendency sweep → schedule → dispatch.

use log::{debug, trace, warn};

use crate::config::{
    KernelConfig, CPU_ERR_OK, CPU_ERR_PAGE_FAULT, CPU_END_FIM_PROT, CPU_END_TRATADOR, PAGE_SIZE,
    TIMER_INTERVAL,
};
use crate::kernel::hw::{Console, Cpu, DeviceRegister, Irq, Memory, Mmu, PageTableId, ProgramSource};
use crate::kernel::loader;
use crate::kernel::mm::Pager;
use crate::kernel::process::{Pid, Process, ProcessState, ProcessTable, WaitReason};
use crate::kernel::scheduler::{recompute_priority, Scheduler, SchedulerKind};
use crate::kernel::terminal::TerminalTable;

/// The kernel, generic over its six external collaborators (§6): the CPU
/// trap glue, the MMU, main memory, secondary memory, the I/O controller,
/// the console, and the program-image source.
///
/// There is exactly one of these per simulated machine; it owns the
/// process table, scheduler, pager, and terminal table outright. Per §5,
/// the kernel is single-threaded cooperative, so none of this needs a lock.
pub struct Kernel<C, M, Mem, Sec, Io, Con, L> {
    pub(crate) config: KernelConfig,
    pub(crate) cpu: C,
    pub(crate) mmu: M,
    pub(crate) main: Mem,
    pub(crate) secondary: Sec,
    pub(crate) io: Io,
    pub(crate) console: Con,
    pub(crate) source: L,

    pub(crate) processes: ProcessTable,
    pub(crate) scheduler: Scheduler,
    pub(crate) pager: Pager,
    pub(crate) terminals: TerminalTable,

    pub(crate) next_free_secondary: i32,
    pub(crate) now: i64,
    reset_done: bool,
    pub(crate) internal_error: bool,
    /// Set by the pendency sweep when a quantum schedulers' current process
    /// hits zero (§4.4 step 3); forces the schedule step to take
    /// `next_ready()` instead of keeping the current process, since our
    /// `ProcessState` has no separate "blocked for quantum" value (see
    /// DESIGN.md).
    quantum_expired: bool,
}

impl<C, M, Mem, Sec, Io, Con, L> Kernel<C, M, Mem, Sec, Io, Con, L>
where
    C: Cpu,
    M: Mmu,
    Mem: Memory,
    Sec: Memory,
    Io: crate::kernel::hw::IoController,
    Con: Console,
    L: ProgramSource,
{
    #[must_use]
    pub fn new(
        config: KernelConfig,
        cpu: C,
        mmu: M,
        main: Mem,
        secondary: Sec,
        io: Io,
        console: Con,
        source: L,
        frame_count: usize,
    ) -> Self {
        let protected_floor = ((CPU_END_FIM_PROT + 1) / PAGE_SIZE) as usize;
        Self {
            pager: Pager::new(frame_count, config.replacement, protected_floor),
            scheduler: Scheduler::new(config.scheduler),
            config,
            cpu,
            mmu,
            main,
            secondary,
            io,
            console,
            source,
            processes: ProcessTable::new(),
            terminals: TerminalTable::new(),
            next_free_secondary: 0,
            now: 0,
            reset_done: false,
            internal_error: false,
            quantum_expired: false,
        }
    }

    #[must_use]
    pub fn internal_error(&self) -> bool {
        self.internal_error
    }

    #[must_use]
    pub fn current_pid(&self) -> Option<Pid> {
        self.processes.current_pid()
    }

    #[must_use]
    pub fn process(&self, pid: Pid) -> Option<&Process> {
        self.processes.get(pid)
    }

    /// Mutable access to the simulated CPU, for an embedding driver to
    /// place arguments in the save area before raising `Irq::Syscall`, or
    /// to read a result afterward (§6 CPU trap contract).
    pub fn cpu_mut(&mut self) -> &mut C {
        &mut self.cpu
    }

    /// Mutable access to main memory, e.g. to place a SPAWN argument string
    /// before trapping (§4.5 SPAWN).
    pub fn main_mut(&mut self) -> &mut Mem {
        &mut self.main
    }

    /// Mutable access to the I/O controller, for an embedding driver to
    /// deliver keypresses or mark a terminal's screen ready (§6).
    pub fn io_mut(&mut self) -> &mut Io {
        &mut self.io
    }

    /// The single kernel entry point (§4.1). `irq` is the trap cause; the
    /// return value is the trap glue's resume/halt decision (0/1, §6).
    pub fn handle_interrupt(&mut self, irq: Irq) -> i32 {
        self.now += 1;
        self.snapshot();

        match irq {
            Irq::Reset => self.handle_reset(),
            Irq::Syscall => self.handle_syscall(),
            Irq::CpuErr => self.handle_cpu_error(),
            Irq::Timer => self.handle_timer(),
            Irq::Unknown => self.kill_current("unknown IRQ"),
        }

        self.pendency_sweep();
        self.schedule_and_dispatch()
    }

    /// Step 1: copy the CPU save area into the current descriptor, unless
    /// there is no current process or it is already Dead (§4.1).
    fn snapshot(&mut self) {
        let Some(pid) = self.processes.current_pid() else {
            return;
        };
        let is_dead = self
            .processes
            .get(pid)
            .is_none_or(|p| p.state == ProcessState::Dead);
        if is_dead {
            return;
        }
        match self.cpu.read_save_area() {
            Ok(regs) => {
                if let Some(p) = self.processes.get_mut(pid) {
                    p.regs = regs;
                    p.cpu_ticks += 1;
                }
            }
            Err(e) => {
                warn!("snapshot failed for pid {pid}: {e}");
                self.internal_error = true;
            }
        }
    }

    /// *Reset*, run exactly once (§4.1).
    fn handle_reset(&mut self) {
        if self.reset_done {
            return;
        }
        self.reset_done = true;

        if let Ok(image) = self.source.open("trap_handler") {
            if let Err(e) = loader::load_trap_handler(&image, &mut self.main, CPU_END_TRATADOR) {
                warn!("failed to install trap handler: {e}");
                self.internal_error = true;
            }
        }

        let _ = self.io.write_register(DeviceRegister::Timer, TIMER_INTERVAL);

        let Some(pid) = self.processes.allocate() else {
            self.internal_error = true;
            return;
        };
        let proc = self.processes.get_mut(pid).expect("just allocated");
        match loader::load(
            proc,
            "init",
            &self.source,
            &mut self.secondary,
            &mut self.next_free_secondary,
        ) {
            Ok(_) => {
                proc.state = ProcessState::Ready;
                self.scheduler.enqueue_ready(pid, proc.priority);
                debug!("reset: init process {pid} ready");
            }
            Err(e) => {
                warn!("failed to load init process: {e}");
                self.processes.remove(pid);
                self.internal_error = true;
            }
        }
    }

    /// *Syscall* (§4.1, §4.5): dispatch on the current process's `A`.
    fn handle_syscall(&mut self) {
        let Some(pid) = self.processes.current_pid() else {
            return;
        };
        let a = self
            .processes
            .get(pid)
            .map(|p| p.regs.a)
            .unwrap_or_default();
        self.dispatch_syscall(pid, a);
    }

    /// *CPU error* (§4.1): route page faults to the pager; anything else
    /// kills the current process.
    fn handle_cpu_error(&mut self) {
        let Some(pid) = self.processes.current_pid() else {
            return;
        };
        let erro = self.processes.get(pid).map(|p| p.regs.erro).unwrap_or(CPU_ERR_OK);
        if erro == CPU_ERR_PAGE_FAULT {
            let virt = self.cpu.fault_address();
            self.resolve_page_fault(pid, virt);
        } else if erro != CPU_ERR_OK {
            self.kill_current("CPU error");
        }
    }

    fn resolve_page_fault(&mut self, pid: Pid, virt: i32) {
        use crate::kernel::mm::pager::FaultOutcome;
        let outcome = self.pager.on_fault(
            pid,
            virt,
            &mut self.processes,
            &mut self.main,
            &mut self.secondary,
        );
        match outcome {
            FaultOutcome::Resolved => {
                self.pager.charge_disk(self.now, crate::config::DISK_LATENCY as i64);
                if let Some(p) = self.processes.get_mut(pid) {
                    p.faults += 1;
                    p.state = ProcessState::Ready;
                }
                // `pid` was current when it faulted and stays current
                // through this trap; the schedule step keeps a Ready
                // current process without consulting the ready queue, so
                // it must not be enqueued here too.
                trace!("pid {pid} fault on {virt} resolved");
            }
            FaultOutcome::OutOfRange => {
                self.kill_current("page fault out of process range");
            }
        }
    }

    /// *Timer* (§4.1, §4.3 `tickAging`): rearm, decrement quantum, age.
    fn handle_timer(&mut self) {
        let _ = self.io.write_register(DeviceRegister::IrqClear, 0);
        let _ = self.io.write_register(DeviceRegister::Timer, TIMER_INTERVAL);

        if self.scheduler.uses_quantum() {
            if let Some(pid) = self.processes.current_pid() {
                if let Some(p) = self.processes.get_mut(pid) {
                    p.quantum -= 1;
                }
            }
        }

        if self.pager.replacement_len() > 0 {
            if let Some(pid) = self.processes.current_pid() {
                self.pager.tick_aging(pid, &mut self.processes);
            }
        }
    }

    fn kill_current(&mut self, reason: &str) {
        if let Some(pid) = self.processes.current_pid() {
            self.kill(pid, reason);
        }
    }

    /// Shared by `KILL` (§4.5) and every "kill the caller" control-flow
    /// path in §7: frees frames and page table, marks Dead, releases the
    /// terminal, wakes joiners.
    pub(crate) fn kill(&mut self, pid: Pid, reason: &str) {
        self.pager.free_process_frames(pid, &self.processes);
        self.scheduler.remove(pid);

        let terminal = self.processes.get(pid).map(|p| p.terminal);
        if let Some(p) = self.processes.get_mut(pid) {
            p.page_table.invalidate_all();
            p.state = ProcessState::Dead;
            p.wait = WaitReason::None;
        }
        if let Some(t) = terminal {
            self.terminals.set_busy(t, false);
        }

        let mut woken = Vec::new();
        for waiter in self.processes.iter_ascending_mut() {
            if waiter.wait == WaitReason::JoinPid(pid) {
                waiter.wait = WaitReason::None;
                waiter.regs.a = 0;
                waiter.state = ProcessState::Ready;
                woken.push((waiter.pid(), waiter.priority));
            }
        }
        // A woken joiner is only enqueued if it isn't the current process;
        // a current process stays "kept" by the schedule step instead (see
        // `resolve_page_fault`).
        let current = self.processes.current_pid();
        for (w, prio) in woken {
            if Some(w) != current {
                self.scheduler.enqueue_ready(w, prio);
            }
        }

        debug!("killed pid {pid}: {reason}");
    }

    /// Step 3 (§4.4): unblock waiters whose condition is now satisfied.
    fn pendency_sweep(&mut self) {
        if let Some(pid) = self.processes.current_pid() {
            if let Some(p) = self.processes.get(pid) {
                if p.state == ProcessState::Blocked || p.wait == WaitReason::None {
                    self.terminals.set_busy(p.terminal, false);
                }
            }
        }

        let pids: Vec<Pid> = self.processes.iter_ascending().map(Process::pid).collect();
        for pid in pids {
            self.sweep_one(pid);
        }

        if self.scheduler.uses_quantum() {
            self.sweep_quantum_expiry();
        }
    }

    fn sweep_one(&mut self, pid: Pid) {
        let Some((state, wait, terminal)) = self
            .processes
            .get(pid)
            .map(|p| (p.state, p.wait, p.terminal))
        else {
            return;
        };
        if state != ProcessState::Blocked {
            return;
        }
        match wait {
            WaitReason::Read => {
                let ready = self
                    .io
                    .read_register(DeviceRegister::KeyboardOk(terminal.0))
                    .unwrap_or(0)
                    != 0;
                if ready && !self.terminals.is_busy(terminal) {
                    let word = self
                        .io
                        .read_register(DeviceRegister::Keyboard(terminal.0))
                        .unwrap_or(0);
                    self.unblock(pid, terminal, |p| p.regs.a = word);
                }
            }
            WaitReason::Write => {
                let ready = self
                    .io
                    .read_register(DeviceRegister::ScreenOk(terminal.0))
                    .unwrap_or(0)
                    != 0;
                if ready && !self.terminals.is_busy(terminal) {
                    let low_byte = self.processes.get(pid).map(|p| p.regs.x & 0xff).unwrap_or(0);
                    let _ = self
                        .io
                        .write_register(DeviceRegister::Screen(terminal.0), low_byte);
                    self.unblock(pid, terminal, |p| p.regs.a = 0);
                }
            }
            WaitReason::Disk => {
                if self.pager.disk_is_free(self.now) {
                    let t = terminal;
                    self.unblock_no_terminal_claim(pid, t, |_| {});
                }
            }
            WaitReason::JoinPid(_) | WaitReason::None => {}
        }
    }

    fn unblock(&mut self, pid: Pid, terminal: crate::kernel::process::TerminalId, set: impl FnOnce(&mut Process)) {
        let mut prio = 0.0;
        if let Some(p) = self.processes.get_mut(pid) {
            set(p);
            p.wait = WaitReason::None;
            p.state = ProcessState::Ready;
            prio = p.priority;
        }
        // `pid` is Blocked, hence not current, except for the degenerate
        // same-trap case where it just became Blocked and is unblocked in
        // the same sweep; either way a current process is kept by the
        // schedule step, not taken from the ready queue.
        if self.processes.current_pid() != Some(pid) {
            self.scheduler.enqueue_ready(pid, prio);
        }
        self.terminals.set_busy(terminal, true);
    }

    fn unblock_no_terminal_claim(
        &mut self,
        pid: Pid,
        _terminal: crate::kernel::process::TerminalId,
        set: impl FnOnce(&mut Process),
    ) {
        let mut prio = 0.0;
        if let Some(p) = self.processes.get_mut(pid) {
            set(p);
            p.wait = WaitReason::None;
            p.state = ProcessState::Ready;
            prio = p.priority;
        }
        if self.processes.current_pid() != Some(pid) {
            self.scheduler.enqueue_ready(pid, prio);
        }
    }

    fn sweep_quantum_expiry(&mut self) {
        let Some(pid) = self.processes.current_pid() else {
            return;
        };
        let Some((state, quantum, priority)) = self
            .processes
            .get(pid)
            .map(|p| (p.state, p.quantum, p.priority))
        else {
            return;
        };
        if state != ProcessState::Ready || quantum > 0 || self.scheduler.is_empty() {
            return;
        }
        let new_priority = if self.scheduler.kind() == SchedulerKind::PriorityAged {
            recompute_priority(priority, quantum)
        } else {
            priority
        };
        if let Some(p) = self.processes.get_mut(pid) {
            p.priority = new_priority;
            p.quantum = crate::config::QUANTUM_INITIAL;
        }
        self.scheduler.enqueue_ready(pid, new_priority);
        self.quantum_expired = true;
    }

    /// Steps 4 and 5 (§4.1, §4.2): choose the next process and write it
    /// back to the CPU/MMU, or unbind and halt.
    fn schedule_and_dispatch(&mut self) -> i32 {
        let next = self.schedule();

        match next {
            Some(pid) => {
                let regs = self.processes.get(pid).map(|p| p.regs).unwrap_or_default();
                if self.cpu.write_save_area(regs).is_err() {
                    self.internal_error = true;
                    self.mmu.bind_page_table(None);
                    self.processes.set_current(None);
                    return 1;
                }
                self.mmu.bind_page_table(Some(PageTableId(pid.as_u32())));
                self.processes.set_current(Some(pid));
                0
            }
            None => {
                self.mmu.bind_page_table(None);
                self.processes.set_current(None);
                1
            }
        }
    }

    fn schedule(&mut self) -> Option<Pid> {
        let current = self.processes.current_pid();
        let expired = self.quantum_expired;
        self.quantum_expired = false;

        if let Some(pid) = current {
            let is_ready = self
                .processes
                .get(pid)
                .is_some_and(|p| p.state == ProcessState::Ready);
            if is_ready && !expired {
                // Kept without consulting the ready queue: per the
                // scheduler's invariant, a current process is never also
                // present in the ready queue (every transition away from
                // Ready purges it — see `sys_read`/`sys_write`/`sys_wait`/
                // `kill`), so there is nothing to reconcile here.
                return Some(pid);
            }
        }
        self.scheduler.pop_ready()
    }
}
