//! RCC clock gates of the STM32F1 family.

use core::ptr::{read_volatile, write_volatile};

use crate::boot::cortex_m::ClockGates;

const RCC: usize = 0x4002_1000;
const APB2RSTR: usize = RCC + 0x0C;
const APB1RSTR: usize = RCC + 0x10;
const AHBENR: usize = RCC + 0x14;
const APB2ENR: usize = RCC + 0x18;
const APB1ENR: usize = RCC + 0x1C;

/// SRAM and FLITF clocks stay enabled out of reset.
const AHBENR_RESET: u32 = 0x0000_0014;

/// Number of device interrupts on STM32F101/F102/F103 medium density parts.
pub const INTERRUPT_LINES: u16 = 43;

/// Reset and clock control block, owned exclusively.
pub struct Stm32f1Clocks(());

impl Stm32f1Clocks {
    /// # Safety
    /// Only one instance may exist, and no driver may use the RCC afterwards.
    pub const unsafe fn new() -> Self {
        Stm32f1Clocks(())
    }
}

/// Pulse the reset line of every enabled APB peripheral, then gate its clock.
unsafe fn reset_bus(enable: usize, reset: usize) {
    unsafe {
        let enabled = read_volatile(enable as *const u32);
        write_volatile(reset as *mut u32, enabled);
        write_volatile(reset as *mut u32, 0);
        write_volatile(enable as *mut u32, 0);
    }
}

impl ClockGates for Stm32f1Clocks {
    fn reset(&mut self) {
        // Safety: the RCC is owned by this instance.
        unsafe {
            reset_bus(APB1ENR, APB1RSTR);
            reset_bus(APB2ENR, APB2RSTR);
            write_volatile(AHBENR as *mut u32, AHBENR_RESET);
        }
    }
}
