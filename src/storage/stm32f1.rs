//! Flash program/erase controller of the STM32F1 family.

use core::ptr::{read_volatile, write_volatile};

use crate::{
    Address,
    storage::{Control, FlashRegisters, Status},
};

const FLASH: usize = 0x4002_2000;
const KEYR: usize = FLASH + 0x04;
const SR: usize = FLASH + 0x0C;
const CR: usize = FLASH + 0x10;
const AR: usize = FLASH + 0x14;

/// FPEC registers and the flash array, for low and medium density parts.
pub struct Stm32f1Flash(());

impl Stm32f1Flash {
    /// # Safety
    /// Only one instance may exist, and no other driver may use the FPEC.
    pub const unsafe fn new() -> Self {
        Stm32f1Flash(())
    }
}

impl FlashRegisters for Stm32f1Flash {
    const PAGE_SIZE: u32 = 1024;

    fn control(&self) -> Control {
        Control::from_bits_retain(unsafe { read_volatile(CR as *const u32) })
    }

    fn set_control(&mut self, control: Control) {
        unsafe { write_volatile(CR as *mut u32, control.bits()) }
    }

    fn status(&self) -> Status {
        Status::from_bits_retain(unsafe { read_volatile(SR as *const u32) })
    }

    fn clear_status(&mut self, flags: Status) {
        unsafe { write_volatile(SR as *mut u32, flags.bits()) }
    }

    fn write_key(&mut self, key: u32) {
        unsafe { write_volatile(KEYR as *mut u32, key) }
    }

    fn set_address(&mut self, addr: Address) {
        unsafe { write_volatile(AR as *mut u32, addr) }
    }

    fn store(&mut self, addr: Address, half_word: u16) {
        // The FPEC only accepts half-word accesses to the flash array.
        unsafe { write_volatile(addr as usize as *mut u16, half_word) }
    }

    fn load(&self, addr: Address) -> u16 {
        unsafe { read_volatile(addr as usize as *const u16) }
    }
}
