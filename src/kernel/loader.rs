//! `load(process, imageName)` (§4.6): parses a program image, copies it
//! into secondary memory, and primes the process's page table.

use crate::config::PAGE_SIZE;
use crate::error::HwError;
use crate::kernel::hw::{LoadedImage, Memory, ProgramSource};
use crate::kernel::process::Process;

/// Copies `image` into `secondary` starting at `secondary_base`, and wires
/// up `process`'s memory-layout fields accordingly. Returns the entry
/// address, or an error if the header's load address is not page-aligned
/// (§4.6: "requires the load address be page-aligned (else fail)").
pub fn load_into_process(
    process: &mut Process,
    image: &LoadedImage,
    secondary_base: i32,
    secondary: &mut dyn Memory,
) -> Result<i32, HwError> {
    if image.entry % PAGE_SIZE != 0 {
        return Err(HwError::ImageMalformed(
            String::new(),
            "entry address is not page-aligned",
        ));
    }

    for (i, &word) in image.words.iter().enumerate() {
        secondary.write(secondary_base + i as i32, word)?;
    }

    let page_count = (image.words.len() as i32).div_ceil(PAGE_SIZE) as u32;
    process.virt_base = image.entry;
    process.virt_size = image.words.len() as i32;
    process.secondary_base = secondary_base;
    process.page_count = page_count;
    process.page_table.reset(page_count as usize);
    process.page_table.invalidate_all();
    process.regs.pc = image.entry;

    Ok(image.entry)
}

/// Opens `name` via `source` and loads it into `process`, advancing
/// `next_free_secondary` by the image's page-rounded size (§4.6
/// "`nextFreeSecondary` bumps monotonically", §3).
pub fn load(
    process: &mut Process,
    name: &str,
    source: &dyn ProgramSource,
    secondary: &mut dyn Memory,
    next_free_secondary: &mut i32,
) -> Result<i32, HwError> {
    let image = source.open(name)?;
    let secondary_base = *next_free_secondary;
    let entry = load_into_process(process, &image, secondary_base, secondary)?;
    *next_free_secondary += process.page_count as i32 * PAGE_SIZE;
    Ok(entry)
}

/// The special `process = ⊥` mode (§4.6): loads the trap-handler image
/// directly into physical memory at its fixed load address, used only
/// during reset. Unlike `load`, this never touches secondary memory or a
/// page table.
pub fn load_trap_handler(
    image: &LoadedImage,
    main: &mut dyn Memory,
    load_address: i32,
) -> Result<i32, HwError> {
    for (i, &word) in image.words.iter().enumerate() {
        main.write(load_address + i as i32, word)?;
    }
    Ok(image.entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::process::ProcessTable;

    struct VecMemory(Vec<i32>);
    impl Memory for VecMemory {
        fn read(&self, addr: i32) -> Result<i32, HwError> {
            Ok(*self.0.get(addr as usize).unwrap_or(&0))
        }
        fn write(&mut self, addr: i32, value: i32) -> Result<(), HwError> {
            if let Some(slot) = self.0.get_mut(addr as usize) {
                *slot = value;
            }
            Ok(())
        }
    }

    struct StubSource;
    impl ProgramSource for StubSource {
        fn open(&self, name: &str) -> Result<LoadedImage, HwError> {
            if name == "missing" {
                return Err(HwError::ImageNotFound(name.to_string()));
            }
            Ok(LoadedImage {
                entry: 0,
                words: vec![1, 2, 3],
            })
        }
    }

    #[test]
    fn load_advances_next_free_secondary_by_rounded_size() {
        let mut table = ProcessTable::new();
        let pid = table.allocate().unwrap();
        let mut secondary = VecMemory(vec![0; 1024]);
        let mut next_free = 0;
        let entry = load(
            table.get_mut(pid).unwrap(),
            "prog",
            &StubSource,
            &mut secondary,
            &mut next_free,
        )
        .unwrap();
        assert_eq!(entry, 0);
        assert_eq!(next_free, PAGE_SIZE);
        assert_eq!(table.get(pid).unwrap().page_count, 1);
    }

    #[test]
    fn load_missing_image_fails() {
        let mut table = ProcessTable::new();
        let pid = table.allocate().unwrap();
        let mut secondary = VecMemory(vec![0; 1024]);
        let mut next_free = 0;
        let result = load(
            table.get_mut(pid).unwrap(),
            "missing",
            &StubSource,
            &mut secondary,
            &mut next_free,
        );
        assert!(result.is_err());
    }
}
