//! Per-process virtual→physical map with `referenced`/`modified` bits
//! (§3 "Page table").

use crate::kernel::mm::frame_pool::Frame;

/// One page-table entry: either invalid or bound to a frame with its two
/// status bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    frame: Option<Frame>,
    referenced: bool,
    modified: bool,
}

impl Entry {
    const fn invalid() -> Self {
        Self {
            frame: None,
            referenced: false,
            modified: false,
        }
    }
}

/// A page number within a process's virtual address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Page(pub u32);

/// A process's page table. Grows to fit the page count the loader assigns;
/// every entry starts invalid (§4.6 "invalidates all pages").
#[derive(Debug, Clone)]
pub struct PageTable {
    entries: Vec<Entry>,
}

impl PageTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Resizes to hold `page_count` entries, all invalid.
    pub fn reset(&mut self, page_count: usize) {
        self.entries.clear();
        self.entries.resize(page_count, Entry::invalid());
    }

    #[must_use]
    pub fn is_valid(&self, page: Page) -> bool {
        self.entries
            .get(page.0 as usize)
            .is_some_and(|e| e.frame.is_some())
    }

    #[must_use]
    pub fn frame_of(&self, page: Page) -> Option<Frame> {
        self.entries.get(page.0 as usize).and_then(|e| e.frame)
    }

    /// Binds `page` to `frame`, clearing both status bits (§4.3 `loadPage`:
    /// "mark `referenced=modified=0`").
    pub fn bind(&mut self, page: Page, frame: Frame) {
        if let Some(e) = self.entries.get_mut(page.0 as usize) {
            e.frame = Some(frame);
            e.referenced = false;
            e.modified = false;
        }
    }

    /// Invalidates `page`'s mapping and clears `modified` (§4.3 `evict`).
    pub fn invalidate(&mut self, page: Page) {
        if let Some(e) = self.entries.get_mut(page.0 as usize) {
            *e = Entry::invalid();
        }
    }

    pub fn invalidate_all(&mut self) {
        for e in &mut self.entries {
            *e = Entry::invalid();
        }
    }

    #[must_use]
    pub fn referenced(&self, page: Page) -> bool {
        self.entries
            .get(page.0 as usize)
            .is_some_and(|e| e.referenced)
    }

    pub fn set_referenced(&mut self, page: Page, value: bool) {
        if let Some(e) = self.entries.get_mut(page.0 as usize) {
            e.referenced = value;
        }
    }

    #[must_use]
    pub fn modified(&self, page: Page) -> bool {
        self.entries
            .get(page.0 as usize)
            .is_some_and(|e| e.modified)
    }

    pub fn set_modified(&mut self, page: Page, value: bool) {
        if let Some(e) = self.entries.get_mut(page.0 as usize) {
            e.modified = value;
        }
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.entries.len()
    }
}

impl Default for PageTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_entries_are_invalid() {
        let mut pt = PageTable::new();
        pt.reset(4);
        assert!(!pt.is_valid(Page(0)));
        assert!(!pt.is_valid(Page(3)));
    }

    #[test]
    fn bind_clears_status_bits() {
        let mut pt = PageTable::new();
        pt.reset(1);
        pt.set_referenced(Page(0), true);
        pt.bind(Page(0), Frame(3));
        assert!(pt.is_valid(Page(0)));
        assert!(!pt.referenced(Page(0)));
        assert!(!pt.modified(Page(0)));
        assert_eq!(pt.frame_of(Page(0)), Some(Frame(3)));
    }

    #[test]
    fn invalidate_clears_modified_too() {
        let mut pt = PageTable::new();
        pt.reset(1);
        pt.bind(Page(0), Frame(1));
        pt.set_modified(Page(0), true);
        pt.invalidate(Page(0));
        assert!(!pt.is_valid(Page(0)));
        assert!(!pt.modified(Page(0)));
    }
}
