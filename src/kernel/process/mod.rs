//! The process descriptor and process table (§3 "Process descriptor").
//!
//! Page tables live on the descriptor itself (one owner, §9 "a single owner
//! holding all three vectors"); [`crate::kernel::mm`] only hands back frame
//! and page indices, never a reference into another process's state.

use crate::config::{MAX_PROCESSES, QUANTUM_INITIAL, TERMINAL_COUNT};
use crate::kernel::mm::page_table::PageTable;

/// Dense, monotonically assigned process identity (§3). A killed pid is
/// never reissued; only its table slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(u32);

impl Pid {
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for Pid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A terminal identity, statically `pid mod TERMINAL_COUNT` (§3, GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TerminalId(pub u8);

impl TerminalId {
    #[must_use]
    pub fn for_pid(pid: Pid) -> Self {
        Self((pid.as_u32() % TERMINAL_COUNT as u32) as u8)
    }
}

/// Process lifecycle state (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Ready,
    Blocked,
    Dead,
}

/// Why a Blocked process is blocked (§3, §4.4, §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitReason {
    None,
    Read,
    Write,
    Disk,
    JoinPid(Pid),
}

/// Saved user-visible registers (§4.1 snapshot, §6 CPU trap contract).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SavedRegisters {
    pub a: i32,
    pub x: i32,
    pub pc: i32,
    pub erro: i32,
}

/// One process's full descriptor (§3).
pub struct Process {
    pid: Pid,
    pub state: ProcessState,
    pub regs: SavedRegisters,
    pub cpu_ticks: u64,
    pub run_count: u64,
    pub faults: u64,
    pub priority: f64,
    pub quantum: i32,
    pub terminal: TerminalId,
    pub wait: WaitReason,
    pub virt_base: i32,
    pub virt_size: i32,
    pub secondary_base: i32,
    pub page_count: u32,
    pub page_table: PageTable,
}

impl Process {
    fn new(pid: Pid) -> Self {
        Self {
            pid,
            state: ProcessState::Ready,
            regs: SavedRegisters::default(),
            cpu_ticks: 0,
            run_count: 0,
            faults: 0,
            priority: 0.0,
            quantum: QUANTUM_INITIAL,
            terminal: TerminalId::for_pid(pid),
            wait: WaitReason::None,
            virt_base: 0,
            virt_size: 0,
            secondary_base: 0,
            page_count: 0,
            page_table: PageTable::new(),
        }
    }

    #[must_use]
    pub fn pid(&self) -> Pid {
        self.pid
    }
}

/// The fixed-size table of live process descriptors (§3 "Fixed-size process
/// table"), plus the monotonic pid counter and the current-process pointer.
///
/// There is exactly one `ProcessTable`, owned by [`crate::kernel::Kernel`];
/// unlike the teacher's `PROCESS_TABLE`, it is not a global — the kernel is
/// single-threaded cooperative (§5) so no synchronization primitive is
/// needed to reach it.
pub struct ProcessTable {
    slots: Vec<Option<Process>>,
    next_pid: u32,
    current: Option<Pid>,
}

impl ProcessTable {
    #[must_use]
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(MAX_PROCESSES);
        slots.resize_with(MAX_PROCESSES, || None);
        Self {
            slots,
            next_pid: 0,
            current: None,
        }
    }

    /// Allocates a descriptor in the first free slot. Returns `None` if the
    /// table is full (§7 `OutOfProcessSlots`).
    pub fn allocate(&mut self) -> Option<Pid> {
        let slot = self.slots.iter().position(Option::is_none)?;
        let pid = Pid::from_raw(self.next_pid);
        self.next_pid += 1;
        self.slots[slot] = Some(Process::new(pid));
        Some(pid)
    }

    fn index_of(&self, pid: Pid) -> Option<usize> {
        self.slots
            .iter()
            .position(|p| p.as_ref().is_some_and(|p| p.pid() == pid))
    }

    #[must_use]
    pub fn get(&self, pid: Pid) -> Option<&Process> {
        self.index_of(pid).and_then(|i| self.slots[i].as_ref())
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Process> {
        let i = self.index_of(pid)?;
        self.slots[i].as_mut()
    }

    #[must_use]
    pub fn current(&self) -> Option<&Process> {
        self.current.and_then(|pid| self.get(pid))
    }

    pub fn current_mut(&mut self) -> Option<&mut Process> {
        self.current.and_then(move |pid| self.get_mut(pid))
    }

    #[must_use]
    pub fn current_pid(&self) -> Option<Pid> {
        self.current
    }

    pub fn set_current(&mut self, pid: Option<Pid>) {
        self.current = pid;
    }

    /// Frees `pid`'s slot, marking it `Dead` first so callers can still
    /// read accounting fields up to the point of removal is not needed —
    /// the descriptor is dropped outright, matching §3's "death frees its
    /// frames, pages, and page table", which callers perform before
    /// calling this.
    pub fn remove(&mut self, pid: Pid) {
        if let Some(i) = self.index_of(pid) {
            self.slots[i] = None;
        }
        if self.current == Some(pid) {
            self.current = None;
        }
    }

    /// Visits every live descriptor in ascending table-slot order, matching
    /// the original's list-order traversal (§4.4 "Ordering is stable:
    /// descriptors are visited in ascending index").
    pub fn iter_ascending(&self) -> impl Iterator<Item = &Process> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    pub fn iter_ascending_mut(&mut self) -> impl Iterator<Item = &mut Process> {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }

    #[must_use]
    pub fn is_dead_or_absent(&self, pid: Pid) -> bool {
        match self.get(pid) {
            None => true,
            Some(p) => p.state == ProcessState::Dead,
        }
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_never_reuses_a_pid() {
        let mut table = ProcessTable::new();
        let a = table.allocate().unwrap();
        table.remove(a);
        let b = table.allocate().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn terminal_binding_is_pid_mod_four() {
        let mut table = ProcessTable::new();
        for expected in 0..8u8 {
            let pid = table.allocate().unwrap();
            assert_eq!(table.get(pid).unwrap().terminal.0, expected % 4);
        }
    }

    #[test]
    fn table_full_returns_none() {
        let mut table = ProcessTable::new();
        for _ in 0..MAX_PROCESSES {
            assert!(table.allocate().is_some());
        }
        assert!(table.allocate().is_none());
    }

    #[test]
    fn iter_ascending_is_slot_order() {
        let mut table = ProcessTable::new();
        let a = table.allocate().unwrap();
        let b = table.allocate().unwrap();
        table.remove(a);
        let c = table.allocate().unwrap();
        let pids: Vec<_> = table.iter_ascending().map(Process::pid).collect();
        assert_eq!(pids, vec![c, b]);
    }
}
