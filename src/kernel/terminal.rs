//! The terminal table (§3) and the I/O-readiness half of the pendency
//! sweep (§4.4).

use crate::config::TERMINAL_COUNT;
use crate::kernel::process::TerminalId;

/// For each of the four terminals, whether a process currently owns it for
/// an in-progress I/O round (§3 "Terminal table").
pub struct TerminalTable {
    busy: [bool; TERMINAL_COUNT],
}

impl TerminalTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            busy: [false; TERMINAL_COUNT],
        }
    }

    #[must_use]
    pub fn is_busy(&self, terminal: TerminalId) -> bool {
        self.busy[terminal.0 as usize]
    }

    pub fn set_busy(&mut self, terminal: TerminalId, busy: bool) {
        self.busy[terminal.0 as usize] = busy;
    }
}

impl Default for TerminalTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_table_is_idle() {
        let t = TerminalTable::new();
        assert!(!t.is_busy(TerminalId(0)));
    }

    #[test]
    fn busy_is_per_terminal() {
        let mut t = TerminalTable::new();
        t.set_busy(TerminalId(2), true);
        assert!(t.is_busy(TerminalId(2)));
        assert!(!t.is_busy(TerminalId(0)));
    }
}
