//! A teaching-grade kernel for a simulated computer.
//!
//! `Kernel` is entered exclusively through [`kernel::hw::Irq`]-tagged traps;
//! everything it needs from the outside world — the CPU, the MMU, main and
//! secondary memory, the I/O controller, the console, and the program
//! loader — is supplied as a trait implementation (`kernel::hw`), so the
//! same dispatcher drives both the in-crate [`kernel::sim`] reference
//! machine and a real embedder's hardware.

pub mod config;
pub mod error;
pub mod kernel;

pub use error::{HwError, KernelError};
pub use kernel::Kernel;
