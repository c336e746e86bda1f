//! The five external collaborators of §6, expressed as traits.
//!
//! The kernel never touches real hardware, never allocates a byte of user
//! memory, and never opens a file: everything it needs from the outside
//! world is asked for through one of these traits. [`crate::kernel::sim`]
//! supplies a reference implementation backed by plain `Vec`s.

use crate::error::HwError;

/// One of the four IRQ causes routed to [`crate::kernel::Kernel::handle_interrupt`],
/// plus `Unknown` for anything the CPU raises that the kernel doesn't
/// recognize (§4.1, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Irq {
    Reset,
    Syscall,
    CpuErr,
    Timer,
    Unknown,
}

/// Access mode requested of the MMU, distinguishing a page fault on a write
/// (which must dirty the page once resolved) from one on a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    Read,
    Write,
}

/// The well-known CPU register save area (§6): `A`, `X`, `PC`, and the error
/// code from the last CPU error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuRegisters {
    pub a: i32,
    pub x: i32,
    pub pc: i32,
    pub erro: i32,
}

/// Opaque handle to an MMU-resident page table, bound with
/// [`Mmu::bind_page_table`]. The kernel never inspects its value; it is
/// whatever the embedding driver's MMU wants to identify one process's
/// table by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageTableId(pub u32);

/// A parsed program image, ready to be copied into secondary memory by the
/// loader (§4.6).
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub entry: i32,
    pub words: Vec<i32>,
}

/// Word-addressed device registers exposed by the I/O controller (§6).
/// Terminal registers are indexed by [`crate::kernel::process::TerminalId`];
/// the clock registers are global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceRegister {
    Keyboard(u8),
    KeyboardOk(u8),
    Screen(u8),
    ScreenOk(u8),
    Timer,
    IrqClear,
    RealTime,
}

/// The CPU's register save area and the auxiliary fault-address register
/// (§4.1, §6).
pub trait Cpu {
    fn read_save_area(&self) -> Result<CpuRegisters, HwError>;
    fn write_save_area(&mut self, regs: CpuRegisters) -> Result<(), HwError>;
    /// The address that faulted, valid only immediately after a page-fault
    /// `CpuErr` (the "auxiliary complement register" of §6).
    fn fault_address(&self) -> i32;
}

/// The MMU translation primitive (§6).
pub trait Mmu {
    /// Binds the table consulted for subsequent user-mode translations, or
    /// unbinds it if `table` is `None` (dispatcher step 5, no current
    /// process).
    fn bind_page_table(&mut self, table: Option<PageTableId>);
    fn translate(&self, virt: i32, mode: AccessMode) -> Result<i32, HwError>;
}

/// A byte/word-addressable memory: main memory or secondary memory (§6).
pub trait Memory {
    fn read(&self, addr: i32) -> Result<i32, HwError>;
    fn write(&mut self, addr: i32, value: i32) -> Result<(), HwError>;
}

/// The I/O controller exposing per-terminal and clock device registers
/// (§6).
pub trait IoController {
    fn read_register(&self, reg: DeviceRegister) -> Result<i32, HwError>;
    fn write_register(&mut self, reg: DeviceRegister, value: i32) -> Result<(), HwError>;
}

/// The console text sink, used only for kernel-level diagnostics, never for
/// a process's own WRITE syscall (that goes through [`IoController`]).
pub trait Console {
    fn printf(&mut self, line: core::fmt::Arguments<'_>);
}

/// The program-image byte source consulted by the loader (§4.6).
pub trait ProgramSource {
    fn open(&self, name: &str) -> Result<LoadedImage, HwError>;
}
