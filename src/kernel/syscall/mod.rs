//! READ, WRITE, SPAWN, KILL, WAIT (§4.5).
//!
//! All five read their arguments from and return results via the current
//! process's saved `A`/`X` registers; none of them take a Rust-level
//! argument beyond the pid they act on.

use log::{info, warn};

use crate::config::{SYSCALL_KILL, SYSCALL_READ, SYSCALL_SPAWN, SYSCALL_WAIT, SYSCALL_WRITE};
use crate::kernel::dispatcher::Kernel;
use crate::kernel::hw::{Console, Cpu, DeviceRegister, IoController, Memory, Mmu, ProgramSource};
use crate::kernel::loader;
use crate::kernel::process::{Pid, ProcessState, WaitReason};

impl<C, M, Mem, Sec, Io, Con, L> Kernel<C, M, Mem, Sec, Io, Con, L>
where
    C: Cpu,
    M: Mmu,
    Mem: Memory,
    Sec: Memory,
    Io: IoController,
    Con: Console,
    L: ProgramSource,
{
    pub(crate) fn dispatch_syscall(&mut self, pid: Pid, a: i32) {
        match a {
            SYSCALL_READ => self.sys_read(pid),
            SYSCALL_WRITE => self.sys_write(pid),
            SYSCALL_SPAWN => self.sys_spawn(pid),
            SYSCALL_KILL => self.sys_kill(pid),
            SYSCALL_WAIT => self.sys_wait(pid),
            other => {
                warn!("pid {pid} made unknown syscall {other}");
                self.kill(pid, "invalid syscall number");
            }
        }
    }

    /// **READ** (§4.5): blocks the caller if the keyboard isn't ready yet.
    fn sys_read(&mut self, pid: Pid) {
        let Some(terminal) = self.processes.get(pid).map(|p| p.terminal) else {
            return;
        };
        let ready = self
            .io
            .read_register(DeviceRegister::KeyboardOk(terminal.0))
            .unwrap_or(0)
            != 0;
        if !ready {
            if let Some(p) = self.processes.get_mut(pid) {
                p.wait = WaitReason::Read;
                p.state = ProcessState::Blocked;
            }
            self.scheduler.remove(pid);
            return;
        }
        let word = self
            .io
            .read_register(DeviceRegister::Keyboard(terminal.0))
            .unwrap_or(0);
        if let Some(p) = self.processes.get_mut(pid) {
            p.regs.a = word;
        }
    }

    /// **WRITE** (§4.5): blocks the caller if the screen isn't ready yet.
    fn sys_write(&mut self, pid: Pid) {
        let Some(terminal) = self.processes.get(pid).map(|p| p.terminal) else {
            return;
        };
        let ready = self
            .io
            .read_register(DeviceRegister::ScreenOk(terminal.0))
            .unwrap_or(0)
            != 0;
        if !ready {
            if let Some(p) = self.processes.get_mut(pid) {
                p.wait = WaitReason::Write;
                p.state = ProcessState::Blocked;
            }
            self.scheduler.remove(pid);
            return;
        }
        let low_byte = self
            .processes
            .get(pid)
            .map(|p| p.regs.x & 0xff)
            .unwrap_or(0);
        let _ = self
            .io
            .write_register(DeviceRegister::Screen(terminal.0), low_byte);
        if let Some(p) = self.processes.get_mut(pid) {
            p.regs.a = 0;
        }
    }

    /// **SPAWN** (§4.5): reads a null-terminated image name from the
    /// caller's memory at the address in `X`, loads it for a freshly
    /// allocated descriptor, and writes the new pid (or -1) into the
    /// caller's `A`.
    fn sys_spawn(&mut self, pid: Pid) {
        let Some(addr) = self.processes.get(pid).map(|p| p.regs.x) else {
            return;
        };
        let name = match self.read_c_string(pid, addr) {
            Some(n) => n,
            None => {
                self.fail_spawn(pid);
                return;
            }
        };

        let Some(child) = self.processes.allocate() else {
            self.fail_spawn(pid);
            return;
        };

        let proc = self.processes.get_mut(child).expect("just allocated");
        let result = loader::load(
            proc,
            &name,
            &self.source,
            &mut self.secondary,
            &mut self.next_free_secondary,
        );

        match result {
            Ok(_) => {
                if self.config.spawn_pretouch {
                    self.pretouch(child);
                }
                if let Some(p) = self.processes.get_mut(child) {
                    p.state = ProcessState::Ready;
                }
                let prio = self.processes.get(child).map(|p| p.priority).unwrap_or(0.0);
                self.scheduler.enqueue_ready(child, prio);
                if let Some(p) = self.processes.get_mut(pid) {
                    p.regs.a = child.as_u32() as i32;
                }
                info!("pid {pid} spawned pid {child} ({name})");
            }
            Err(e) => {
                warn!("pid {pid} spawn of '{name}' failed: {e}");
                self.processes.remove(child);
                self.fail_spawn(pid);
            }
        }
    }

    fn fail_spawn(&mut self, pid: Pid) {
        if let Some(p) = self.processes.get_mut(pid) {
            p.regs.a = -1;
        }
    }

    /// Best-effort page-fault pre-touch of every page of a freshly spawned
    /// process (§4.5, §9: optional, gated by [`crate::config::KernelConfig::spawn_pretouch`]).
    fn pretouch(&mut self, child: Pid) {
        use crate::config::PAGE_SIZE;
        let page_count = self
            .processes
            .get(child)
            .map(|p| p.page_table.page_count())
            .unwrap_or(0);
        for page in 0..page_count {
            let virt = page as i32 * PAGE_SIZE;
            self.pager
                .on_fault(child, virt, &mut self.processes, &mut self.main, &mut self.secondary);
        }
        self.pager.charge_disk(self.now, crate::config::DISK_LATENCY as i64);
    }

    /// Reads a null-terminated string from `pid`'s virtual memory at
    /// `addr`, preferring MMU translation and falling back to secondary
    /// memory on a translation miss (§6 MMU contract).
    fn read_c_string(&mut self, pid: Pid, addr: i32) -> Option<String> {
        use crate::kernel::hw::AccessMode;

        let secondary_base = self.processes.get(pid)?.secondary_base;
        let mut out = String::new();
        let mut offset = 0i32;
        loop {
            let byte = match self.mmu.translate(addr + offset, AccessMode::Read) {
                Ok(phys) => self.main.read(phys).ok()?,
                Err(_) => self.secondary.read(secondary_base + addr + offset).ok()?,
            };
            if byte == 0 {
                break;
            }
            out.push(u8::try_from(byte).ok()? as char);
            offset += 1;
            if offset > 4096 {
                return None;
            }
        }
        Some(out)
    }

    /// **KILL** (§4.5): the target is always the current process; `X` is
    /// not consulted.
    fn sys_kill(&mut self, pid: Pid) {
        self.kill(pid, "KILL syscall");
    }

    /// **WAIT(pid)** (§4.5): implemented per the contract this spec
    /// supplies, completing what the original leaves stubbed (see
    /// DESIGN.md).
    fn sys_wait(&mut self, pid: Pid) {
        let target_raw = self.processes.get(pid).map(|p| p.regs.x).unwrap_or(-1);
        if target_raw < 0 {
            if let Some(p) = self.processes.get_mut(pid) {
                p.regs.a = -1;
            }
            return;
        }
        let target = Pid::from_raw(target_raw as u32);
        if self.processes.is_dead_or_absent(target) {
            if let Some(p) = self.processes.get_mut(pid) {
                p.regs.a = 0;
            }
            return;
        }
        if let Some(p) = self.processes.get_mut(pid) {
            p.wait = WaitReason::JoinPid(target);
            p.state = ProcessState::Blocked;
        }
        self.scheduler.remove(pid);
    }
}
