//! Error types for the hardware-collaborator boundary.
//!
//! Most of the kernel's error *behaviors* (kill the caller, return -1,
//! silently retry) are specified directly in §4/§7 of the design and are
//! implemented as control flow in the relevant handler, not as `Result`
//! propagation. `KernelError` exists only where a collaborator (CPU, MMU,
//! memory, I/O controller, loader) genuinely cannot service a request.

use thiserror::Error;

/// Failure reported by one of the §6 external collaborators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HwError {
    #[error("CPU register save area unreadable at offset {0}")]
    RegisterRead(&'static str),
    #[error("CPU register save area unwritable at offset {0}")]
    RegisterWrite(&'static str),
    #[error("memory access out of bounds at address {0}")]
    OutOfBounds(i32),
    #[error("device register {0:?} is not addressable")]
    BadRegister(crate::kernel::hw::DeviceRegister),
    #[error("program image '{0}' could not be opened")]
    ImageNotFound(String),
    #[error("program image '{0}' is malformed: {1}")]
    ImageMalformed(String, &'static str),
}

/// Top-level kernel error.
///
/// Per §7, an `InternalKernelFault` sets [`crate::kernel::Kernel::internal_error`]
/// and forces the dispatcher to return 1; it is never propagated out of
/// `handle_interrupt` as a `Result`, since the CPU trap contract (§6)
/// returns a plain `i32`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KernelError {
    #[error("internal kernel fault: {0}")]
    InternalKernelFault(&'static str),
    #[error(transparent)]
    Hardware(#[from] HwError),
}
