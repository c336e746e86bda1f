//! The three interchangeable scheduling policies of §4.2.
//!
//! Mirrors the teacher's `Scheduler` trait (schedule/remove/task_count) but
//! is specialized to pids and priorities rather than boxed `Task` objects,
//! since the kernel already owns the one true process table.

use crate::config::QUANTUM_INITIAL;
use crate::kernel::process::Pid;

/// Which policy [`crate::config::KernelConfig`] selected at boot (§4.2,
/// "selected at boot and immutable thereafter").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerKind {
    Fcfs,
    RoundRobin,
    PriorityAged,
}

/// One entry in the ready list: a pid plus its cached scheduling priority.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ReadyEntry {
    pid: Pid,
    priority: f64,
}

/// A ready queue implementing one of the three §4.2 policies.
///
/// `enqueue_ready` is idempotent (§4.2 contract); `next_ready` returns the
/// head pid without removing it, matching the dispatcher's
/// look-then-take-or-keep rescheduling decision.
pub struct Scheduler {
    kind: SchedulerKind,
    ready: Vec<ReadyEntry>,
}

impl Scheduler {
    #[must_use]
    pub fn new(kind: SchedulerKind) -> Self {
        Self {
            kind,
            ready: Vec::new(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> SchedulerKind {
        self.kind
    }

    /// Is this a quantum-based policy (round-robin or priority-aged)?
    #[must_use]
    pub fn uses_quantum(&self) -> bool {
        !matches!(self.kind, SchedulerKind::Fcfs)
    }

    /// Appends `pid` to the ready list unless it is already present (§4.2:
    /// "idempotent: if the pid is already in the ready list, nothing
    /// changes").
    pub fn enqueue_ready(&mut self, pid: Pid, priority: f64) {
        if self.ready.iter().any(|e| e.pid == pid) {
            return;
        }
        match self.kind {
            SchedulerKind::Fcfs | SchedulerKind::RoundRobin => {
                self.ready.push(ReadyEntry { pid, priority });
            }
            SchedulerKind::PriorityAged => {
                let pos = self
                    .ready
                    .iter()
                    .position(|e| e.priority < priority)
                    .unwrap_or(self.ready.len());
                self.ready.insert(pos, ReadyEntry { pid, priority });
            }
        }
    }

    /// Removes `pid` from the ready list if present; used when a ready
    /// process is KILLed or about to become current again.
    pub fn remove(&mut self, pid: Pid) {
        self.ready.retain(|e| e.pid != pid);
    }

    /// Returns the head pid without removing it.
    #[must_use]
    pub fn next_ready(&self) -> Option<Pid> {
        self.ready.first().map(|e| e.pid)
    }

    /// Pops and returns the head pid.
    pub fn pop_ready(&mut self) -> Option<Pid> {
        if self.ready.is_empty() {
            None
        } else {
            Some(self.ready.remove(0))
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ready.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ready.len()
    }
}

/// Recomputes priority on re-enqueue under the priority-aged policy (§4.2):
/// `(prio_prev + used/QUANTUM_INITIAL) / 2`, `used = QUANTUM_INITIAL -
/// quantum_remaining`.
#[must_use]
pub fn recompute_priority(prio_prev: f64, quantum_remaining: i32) -> f64 {
    let used = (QUANTUM_INITIAL - quantum_remaining) as f64;
    (prio_prev + used / QUANTUM_INITIAL as f64) / 2.0
}
