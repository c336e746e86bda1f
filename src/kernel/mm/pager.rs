//! Resolves page faults, evicts, writes back, loads in, and charges disk
//! time (§4.3 Pager).

use crate::config::PAGE_SIZE;
use crate::kernel::hw::Memory;
use crate::kernel::mm::frame_pool::{Frame, FramePool};
use crate::kernel::mm::page_table::Page;
use crate::kernel::mm::replacement::{Replacement, ReplacementKind};
use crate::kernel::process::{Pid, ProcessTable};
use log::{debug, trace};

/// Outcome of resolving a fault, reported back to the dispatcher so it can
/// advance the faulting process's fault counter and mark it Ready (§4.3
/// `onFault`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOutcome {
    Resolved,
    /// The faulting address was outside the process's image; the caller
    /// must KILL it (§4.3: "if `virtAddr` is outside [...] KILL it").
    OutOfRange,
}

/// Owns the frame pool and the active replacement structure; every method
/// that touches memory takes the main/secondary [`Memory`] collaborators
/// and the process table as parameters rather than holding them, since
/// [`crate::kernel::Kernel`] is the sole owner of all three.
pub struct Pager {
    frames: FramePool,
    replacement: Replacement,
    /// Frames below this index are reserved for the trap-handler image and
    /// are never handed out (§4.1 reset).
    protected_floor: usize,
    /// Instant (in kernel ticks) at which the secondary memory becomes free
    /// again (§4.3 "Disk-busy accounting").
    disk_free_at: i64,
}

impl Pager {
    #[must_use]
    pub fn new(frame_count: usize, kind: ReplacementKind, protected_floor: usize) -> Self {
        Self {
            frames: FramePool::new(frame_count),
            replacement: Replacement::new(kind),
            protected_floor,
            disk_free_at: 0,
        }
    }

    #[must_use]
    pub fn disk_free_at(&self) -> i64 {
        self.disk_free_at
    }

    /// Reserves the protected-memory frames as occupied by nobody, so they
    /// are never returned by `first_free` (§4.1 reset). The reservation is
    /// structural: `protected_floor` is simply the search floor passed to
    /// every later allocation.
    #[must_use]
    pub fn protected_floor(&self) -> usize {
        self.protected_floor
    }

    /// Is `now` past the instant the disk becomes free?
    #[must_use]
    pub fn disk_is_free(&self, now: i64) -> bool {
        now >= self.disk_free_at
    }

    /// Advances `disk_free_at` by `latency`, from `now` if the disk is
    /// already idle, or from the current busy-until instant otherwise
    /// (§4.3: "if `now ≥ diskFreeAt` then `diskFreeAt := now + DISK_LATENCY`;
    /// else `diskFreeAt += DISK_LATENCY`").
    pub fn charge_disk(&mut self, now: i64, latency: i64) {
        if now >= self.disk_free_at {
            self.disk_free_at = now + latency;
        } else {
            self.disk_free_at += latency;
        }
    }

    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.frames.occupied_count()
    }

    #[must_use]
    pub fn replacement_len(&self) -> usize {
        self.replacement.len()
    }

    /// Right-shifts the aging counter of every frame owned by `pid`,
    /// setting the top bit iff the page's `referenced` bit is set, then
    /// clearing that bit (§4.3 `tickAging`, scoped to the current process
    /// per the original).
    pub fn tick_aging(&mut self, pid: Pid, table: &mut ProcessTable) {
        if self.replacement.kind() != ReplacementKind::Aging {
            return;
        }
        let Some(proc) = table.get_mut(pid) else {
            return;
        };
        let page_count = proc.page_table.page_count();
        for i in 0..page_count {
            let page = Page(i as u32);
            if let Some(frame) = proc.page_table.frame_of(page) {
                let referenced = proc.page_table.referenced(page);
                self.replacement.age(frame, referenced);
                if referenced {
                    proc.page_table.set_referenced(page, false);
                }
            }
        }
    }

    /// `evict(vf)` (§4.3): writes back if the owner's page is modified,
    /// invalidates the owner's mapping, frees the frame.
    fn evict(&mut self, frame: Frame, table: &mut ProcessTable, secondary: &mut dyn Memory) {
        let Some((owner_pid, page)) = self.frames.owner(frame) else {
            return;
        };
        if let Some(owner) = table.get_mut(owner_pid) {
            if owner.page_table.modified(page) {
                let base = owner.secondary_base + page.0 as i32 * PAGE_SIZE;
                let phys = frame.0 as i32 * PAGE_SIZE;
                for i in 0..PAGE_SIZE {
                    if let Ok(word) = secondary.read(phys + i) {
                        let _ = secondary.write(base + i, word);
                    }
                }
            }
            owner.page_table.invalidate(page);
        }
        self.replacement.remove(frame);
        self.frames.free(frame);
        trace!("evicted frame {} (was {:?} page {})", frame.0, owner_pid, page.0);
    }

    /// `loadPage(p)` (§4.3): finds or frees a frame, copies the page in
    /// from secondary memory, and binds it.
    fn load_page(
        &mut self,
        pid: Pid,
        page: Page,
        table: &mut ProcessTable,
        main: &mut dyn Memory,
        secondary: &mut dyn Memory,
    ) {
        let frame = match self.frames.first_free(self.protected_floor) {
            Some(f) => f,
            None => {
                let victim = self
                    .replacement
                    .choose_victim()
                    .expect("replacement structure empty while frame pool is full");
                self.evict(victim, table, secondary);
                self.frames
                    .first_free(self.protected_floor)
                    .expect("frame just evicted must be free")
            }
        };

        let proc = table.get_mut(pid).expect("faulting process must exist");
        let secondary_base = proc.secondary_base + page.0 as i32 * PAGE_SIZE;
        let phys_base = frame.0 as i32 * PAGE_SIZE;
        for i in 0..PAGE_SIZE {
            let word = secondary.read(secondary_base + i).unwrap_or(0);
            let _ = main.write(phys_base + i, word);
        }
        proc.page_table.bind(page, frame);
        self.frames.assign(frame, pid, page);
        self.replacement.enroll(frame);
        debug!("loaded pid {} page {} into frame {}", pid, page.0, frame.0);
    }

    /// `onFault(virtAddr)` (§4.3): the dispatcher's single entry point into
    /// the pager. Does not itself mark the process Ready or bump the fault
    /// counter beyond what's noted below; the caller (`Kernel`) increments
    /// `faults` and sets state per §4.3 after checking the outcome.
    pub fn on_fault(
        &mut self,
        pid: Pid,
        virt_addr: i32,
        table: &mut ProcessTable,
        main: &mut dyn Memory,
        secondary: &mut dyn Memory,
    ) -> FaultOutcome {
        let proc = table.get(pid).expect("faulting process must exist");
        let limit = proc.page_count as i32 * PAGE_SIZE;
        if virt_addr < 0 || virt_addr >= limit {
            return FaultOutcome::OutOfRange;
        }
        let page = Page((virt_addr / PAGE_SIZE) as u32);
        self.load_page(pid, page, table, main, secondary);
        FaultOutcome::Resolved
    }

    /// Frees every frame owned by `pid` and removes them from the
    /// replacement structure (§3: "death frees its frames").
    pub fn free_process_frames(&mut self, pid: Pid, table: &ProcessTable) {
        if let Some(proc) = table.get(pid) {
            for i in 0..proc.page_table.page_count() {
                if let Some(frame) = proc.page_table.frame_of(Page(i as u32)) {
                    self.replacement.remove(frame);
                }
            }
        }
        self.frames.free_all_owned_by(pid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::process::ProcessTable;

    struct VecMemory(Vec<i32>);
    impl Memory for VecMemory {
        fn read(&self, addr: i32) -> Result<i32, crate::error::HwError> {
            Ok(*self.0.get(addr as usize).unwrap_or(&0))
        }
        fn write(&mut self, addr: i32, value: i32) -> Result<(), crate::error::HwError> {
            if let Some(slot) = self.0.get_mut(addr as usize) {
                *slot = value;
            }
            Ok(())
        }
    }

    fn setup(frame_count: usize, kind: ReplacementKind) -> (Pager, ProcessTable, VecMemory, VecMemory) {
        let pager = Pager::new(frame_count, kind, 0);
        let table = ProcessTable::new();
        let main = VecMemory(vec![0; frame_count as usize * PAGE_SIZE as usize]);
        let secondary = VecMemory(vec![0; 16 * PAGE_SIZE as usize]);
        (pager, table, main, secondary)
    }

    #[test]
    fn disk_busy_accounting_matches_scenario_3() {
        let (mut pager, ..) = setup(4, ReplacementKind::Fifo);
        assert!(pager.disk_is_free(0));
        pager.charge_disk(0, 40);
        assert_eq!(pager.disk_free_at(), 40);
        assert!(!pager.disk_is_free(10));
        pager.charge_disk(10, 40);
        // disk was busy at t=10, so the new instant stacks rather than
        // resetting from `now`.
        assert_eq!(pager.disk_free_at(), 80);
    }

    #[test]
    fn fault_out_of_range_is_reported() {
        let (mut pager, mut table, mut main, mut secondary) = setup(4, ReplacementKind::Fifo);
        let pid = table.allocate().unwrap();
        table.get_mut(pid).unwrap().page_count = 2;
        table.get_mut(pid).unwrap().page_table.reset(2);
        let outcome = pager.on_fault(pid, 1000, &mut table, &mut main, &mut secondary);
        assert_eq!(outcome, FaultOutcome::OutOfRange);
    }

    #[test]
    fn fault_loads_page_and_enrolls_frame() {
        let (mut pager, mut table, mut main, mut secondary) = setup(4, ReplacementKind::Fifo);
        let pid = table.allocate().unwrap();
        {
            let proc = table.get_mut(pid).unwrap();
            proc.page_count = 2;
            proc.page_table.reset(2);
            proc.secondary_base = 0;
        }
        let outcome = pager.on_fault(pid, 0, &mut table, &mut main, &mut secondary);
        assert_eq!(outcome, FaultOutcome::Resolved);
        assert!(table.get(pid).unwrap().page_table.is_valid(Page(0)));
        assert_eq!(pager.occupied_count(), 1);
        assert_eq!(pager.replacement_len(), 1);
    }

    #[test]
    fn fifo_eviction_writes_back_only_if_modified() {
        let (mut pager, mut table, mut main, mut secondary) = setup(1, ReplacementKind::Fifo);
        let pid = table.allocate().unwrap();
        {
            let proc = table.get_mut(pid).unwrap();
            proc.page_count = 2;
            proc.page_table.reset(2);
            proc.secondary_base = 0;
        }
        secondary.write(0, 111).unwrap();
        pager.on_fault(pid, 0, &mut table, &mut main, &mut secondary);
        table.get_mut(pid).unwrap().page_table.set_modified(Page(0), true);
        main.write(0, 222).unwrap();

        // only one frame exists, so faulting on page 1 evicts page 0.
        secondary.write(PAGE_SIZE, 333).unwrap();
        pager.on_fault(pid, PAGE_SIZE, &mut table, &mut main, &mut secondary);

        assert!(!table.get(pid).unwrap().page_table.is_valid(Page(0)));
        assert!(table.get(pid).unwrap().page_table.is_valid(Page(1)));
        // the modified word was written back to page 0's secondary slot.
        assert_eq!(secondary.read(0).unwrap(), 222);
    }
}
