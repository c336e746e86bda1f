//! The array of physical frames backing main memory (§3 "Frame pool").

use crate::kernel::mm::page_table::Page;
use crate::kernel::process::Pid;

/// A physical frame index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frame(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Owner {
    pid: Pid,
    page: Page,
}

/// `free[f] ⇔ owner[f] = ⊥` (§3 frame-pool invariant), enforced by
/// construction: a frame is `owner.is_none()` exactly when it is free.
pub struct FramePool {
    owners: Vec<Option<Owner>>,
}

impl FramePool {
    #[must_use]
    pub fn new(frame_count: usize) -> Self {
        Self {
            owners: vec![None; frame_count],
        }
    }

    #[must_use]
    pub fn is_free(&self, frame: Frame) -> bool {
        self.owners[frame.0 as usize].is_none()
    }

    #[must_use]
    pub fn owner(&self, frame: Frame) -> Option<(Pid, Page)> {
        self.owners[frame.0 as usize].map(|o| (o.pid, o.page))
    }

    /// Finds the first free frame at or above `floor`, honoring the
    /// protected-memory boundary (§4.1).
    #[must_use]
    pub fn first_free(&self, floor: usize) -> Option<Frame> {
        self.owners
            .iter()
            .enumerate()
            .skip(floor)
            .find(|(_, o)| o.is_none())
            .map(|(i, _)| Frame(i as u32))
    }

    /// Assigns `frame` to `(pid, page)` (§4.3 `loadPage`:
    /// "`free[vf]=false`, `owner[vf]=(currentPid, p)`").
    pub fn assign(&mut self, frame: Frame, pid: Pid, page: Page) {
        self.owners[frame.0 as usize] = Some(Owner { pid, page });
    }

    /// Frees `frame` (§4.3 `evict`: "Mark `vf` free with `owner[vf]=⊥`").
    pub fn free(&mut self, frame: Frame) {
        self.owners[frame.0 as usize] = None;
    }

    /// Frees every frame owned by `pid` (§3 "death frees its frames").
    pub fn free_all_owned_by(&mut self, pid: Pid) {
        for o in &mut self.owners {
            if o.is_some_and(|owner| owner.pid == pid) {
                *o = None;
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.owners.iter().filter(|o| o.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: u32) -> Pid {
        Pid::from_raw(n)
    }

    #[test]
    fn fresh_pool_is_all_free() {
        let pool = FramePool::new(4);
        assert!((0..4).all(|i| pool.is_free(Frame(i))));
        assert_eq!(pool.occupied_count(), 0);
    }

    #[test]
    fn assign_then_free_round_trips() {
        let mut pool = FramePool::new(4);
        pool.assign(Frame(1), pid(7), Page(2));
        assert!(!pool.is_free(Frame(1)));
        assert_eq!(pool.owner(Frame(1)), Some((pid(7), Page(2))));
        pool.free(Frame(1));
        assert!(pool.is_free(Frame(1)));
        assert_eq!(pool.owner(Frame(1)), None);
    }

    #[test]
    fn free_all_owned_by_only_touches_that_pid() {
        let mut pool = FramePool::new(4);
        pool.assign(Frame(0), pid(1), Page(0));
        pool.assign(Frame(1), pid(2), Page(0));
        pool.free_all_owned_by(pid(1));
        assert!(pool.is_free(Frame(0)));
        assert!(!pool.is_free(Frame(1)));
    }

    #[test]
    fn first_free_respects_floor() {
        let pool = FramePool::new(4);
        assert_eq!(pool.first_free(2), Some(Frame(2)));
    }
}
