#![no_std]
#![no_main]

use cortex_m_rt::entry;
use flashboot::{
    Handover,
    boot::{
        cortex_m::CortexM,
        stm32f1::{INTERRUPT_LINES, Stm32f1Clocks},
    },
    image::Mmio,
    layout::STM32F103RB,
};

use {defmt_rtt as _, panic_halt as _};

/// Console output over RTT, one defmt frame per write.
#[cfg(feature = "selftest")]
struct Rtt;

#[cfg(feature = "selftest")]
impl core::fmt::Write for Rtt {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        defmt::print!("{=str}", s);
        Ok(())
    }
}

#[cfg(feature = "selftest")]
fn selftest() {
    use flashboot::{
        FlashController,
        storage::{selftest, stm32f1::Stm32f1Flash},
    };

    // Safety: the flash controller is only used from here.
    let regs = unsafe { Stm32f1Flash::new() };
    let mut flash = FlashController::new(regs, STM32F103RB.region);

    match selftest::run(&mut flash, &mut Rtt) {
        Ok(report) if report.passed() => defmt::info!("self-test passed"),
        Ok(_) => defmt::error!("self-test failed"),
        Err(_) => defmt::error!("self-test output failed"),
    }
}

#[entry]
fn main() -> ! {
    defmt::info!("flashboot, application at {:#x}", STM32F103RB.image_base());

    #[cfg(feature = "selftest")]
    selftest();

    let core = cortex_m::Peripherals::take().unwrap();

    // Safety: nothing else in this bootloader touches the RCC.
    let clocks = unsafe { Stm32f1Clocks::new() };
    let platform = CortexM::new(core.SYST, core.NVIC, core.SCB, clocks, INTERRUPT_LINES);
    let handover = Handover::new(platform, &STM32F103RB);

    // Safety: the image header lies in internal flash.
    let memory = unsafe { Mmio::new() };

    // Safety: whatever sits at the image base was linked for 0x08004000.
    let rejected = unsafe { handover.try_boot(&memory) };
    defmt::warn!("no application: {}", rejected.defect());

    loop {
        cortex_m::asm::wfi();
    }
}
