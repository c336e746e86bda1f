//! `simkernel-demo`: drives a [`simkernel::Kernel`] built from the `sim`
//! reference collaborators through a reset and a handful of timer ticks,
//! logging every transition. Meant as a worked example, not a product.

use log::info;

use simkernel::config::KernelConfig;
use simkernel::kernel::hw::{Irq, LoadedImage};
use simkernel::kernel::sim::{SimConsole, SimCpu, SimIo, SimMemory, SimMmu, SimProgramSource};
use simkernel::Kernel;

fn main() {
    env_logger::init();

    let mut source = SimProgramSource::new();
    source.register(
        "init",
        LoadedImage {
            entry: 0,
            words: vec![0; 8],
        },
    );

    let mut kernel = Kernel::new(
        KernelConfig::default(),
        SimCpu::new(),
        SimMmu::new(),
        SimMemory::new(8192),
        SimMemory::new(8192),
        SimIo::new(),
        SimConsole::new(),
        source,
        32,
    );

    info!("booting");
    kernel.handle_interrupt(Irq::Reset);
    info!("current pid after reset: {:?}", kernel.current_pid());

    for _ in 0..10 {
        kernel.handle_interrupt(Irq::Timer);
    }
    info!("current pid after 10 timer ticks: {:?}", kernel.current_pid());
}
