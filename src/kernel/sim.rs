//! A reference implementation of the §6 collaborator traits, backed by
//! plain `Vec`s. Used by the test suite and by the `simkernel-demo` binary;
//! a real embedder supplies its own CPU/MMU/IoController instead.

use std::collections::HashMap;

use crate::error::HwError;
use crate::kernel::hw::{
    AccessMode, Console, Cpu, CpuRegisters, DeviceRegister, IoController, LoadedImage, Memory,
    Mmu, PageTableId, ProgramSource,
};

/// A flat byte-addressed memory of fixed size, backing either main or
/// secondary memory in tests.
pub struct SimMemory {
    words: Vec<i32>,
}

impl SimMemory {
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            words: vec![0; size],
        }
    }
}

impl Memory for SimMemory {
    fn read(&self, addr: i32) -> Result<i32, HwError> {
        self.words
            .get(addr as usize)
            .copied()
            .ok_or(HwError::OutOfBounds(addr))
    }

    fn write(&mut self, addr: i32, value: i32) -> Result<(), HwError> {
        let slot = self
            .words
            .get_mut(addr as usize)
            .ok_or(HwError::OutOfBounds(addr))?;
        *slot = value;
        Ok(())
    }
}

/// The CPU register save area, at the well-known offsets §6 describes.
#[derive(Default)]
pub struct SimCpu {
    regs: CpuRegisters,
    fault_addr: i32,
}

impl SimCpu {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fault_address(&mut self, addr: i32) {
        self.fault_addr = addr;
    }
}

impl Cpu for SimCpu {
    fn read_save_area(&self) -> Result<CpuRegisters, HwError> {
        Ok(self.regs)
    }

    fn write_save_area(&mut self, regs: CpuRegisters) -> Result<(), HwError> {
        self.regs = regs;
        Ok(())
    }

    fn fault_address(&self) -> i32 {
        self.fault_addr
    }
}

/// A trivial identity-mapped MMU: sufficient for a reference/test
/// collaborator since the kernel's own [`crate::kernel::mm::page_table::PageTable`]
/// is the thing that actually enforces per-process mappings; this stand-in
/// only needs to track which table is bound.
#[derive(Default)]
pub struct SimMmu {
    bound: Option<PageTableId>,
}

impl SimMmu {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn bound_table(&self) -> Option<PageTableId> {
        self.bound
    }
}

impl Mmu for SimMmu {
    fn bind_page_table(&mut self, table: Option<PageTableId>) {
        self.bound = table;
    }

    fn translate(&self, virt: i32, _mode: AccessMode) -> Result<i32, HwError> {
        if self.bound.is_none() {
            return Err(HwError::OutOfBounds(virt));
        }
        Ok(virt)
    }
}

/// The I/O controller: four terminals' keyboard/screen registers plus the
/// clock device (§6).
pub struct SimIo {
    keyboard_ok: [bool; 4],
    keyboard: [i32; 4],
    screen_ok: [bool; 4],
    timer: i32,
    real_time: i32,
}

impl SimIo {
    #[must_use]
    pub fn new() -> Self {
        Self {
            keyboard_ok: [false; 4],
            keyboard: [0; 4],
            screen_ok: [true; 4],
            timer: 0,
            real_time: 0,
        }
    }

    /// Test/demo hook: makes terminal `t`'s keyboard ready with `word`.
    pub fn deliver_keypress(&mut self, terminal: u8, word: i32) {
        self.keyboard_ok[terminal as usize] = true;
        self.keyboard[terminal as usize] = word;
    }

    pub fn set_screen_ready(&mut self, terminal: u8, ready: bool) {
        self.screen_ok[terminal as usize] = ready;
    }

    pub fn advance_real_time(&mut self, ticks: i32) {
        self.real_time += ticks;
    }
}

impl Default for SimIo {
    fn default() -> Self {
        Self::new()
    }
}

impl IoController for SimIo {
    fn read_register(&self, reg: DeviceRegister) -> Result<i32, HwError> {
        match reg {
            DeviceRegister::Keyboard(t) => Ok(self.keyboard[t as usize]),
            DeviceRegister::KeyboardOk(t) => Ok(self.keyboard_ok[t as usize] as i32),
            DeviceRegister::Screen(_) => Ok(0),
            DeviceRegister::ScreenOk(t) => Ok(self.screen_ok[t as usize] as i32),
            DeviceRegister::Timer => Ok(self.timer),
            DeviceRegister::IrqClear => Ok(0),
            DeviceRegister::RealTime => Ok(self.real_time),
        }
    }

    fn write_register(&mut self, reg: DeviceRegister, value: i32) -> Result<(), HwError> {
        match reg {
            DeviceRegister::Keyboard(t) => self.keyboard[t as usize] = value,
            DeviceRegister::Screen(_) => {}
            DeviceRegister::Timer => self.timer = value,
            DeviceRegister::IrqClear => self.timer = 0,
            DeviceRegister::KeyboardOk(t) => self.keyboard_ok[t as usize] = value != 0,
            DeviceRegister::ScreenOk(t) => self.screen_ok[t as usize] = value != 0,
            DeviceRegister::RealTime => self.real_time = value,
        }
        Ok(())
    }
}

/// The console text sink: buffers lines for test inspection.
#[derive(Default)]
pub struct SimConsole {
    pub lines: Vec<String>,
}

impl SimConsole {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Console for SimConsole {
    fn printf(&mut self, line: core::fmt::Arguments<'_>) {
        self.lines.push(format!("{line}"));
    }
}

/// An in-memory catalog of program images, keyed by name.
#[derive(Default)]
pub struct SimProgramSource {
    images: HashMap<String, LoadedImage>,
}

impl SimProgramSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, image: LoadedImage) {
        self.images.insert(name.into(), image);
    }
}

impl ProgramSource for SimProgramSource {
    fn open(&self, name: &str) -> Result<LoadedImage, HwError> {
        self.images
            .get(name)
            .cloned()
            .ok_or_else(|| HwError::ImageNotFound(name.to_string()))
    }
}
