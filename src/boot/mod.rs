//! Hardware primitives the handover sequence is built from.
//!
//! The ordering of these primitives is owned by [`crate::handover`]; a platform only
//! provides each individual step.

use serde::{Deserialize, Serialize};

use crate::Address;

#[cfg(feature = "cortex_m")]
pub mod cortex_m;

#[cfg(feature = "stm32f1")]
pub mod stm32f1;

/// Interrupt mask state the application is started with.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum Interrupts {
    /// Leave interrupts disabled, the application enables them once its handlers are in place.
    #[default]
    Masked,
    /// Re-enable interrupts right after the stack pointer is set.
    Enabled,
}

/// Processor and peripheral control needed to leave the bootloader.
pub trait Platform {
    /// Mask all interrupts globally.
    fn disable_interrupts(&mut self);

    /// Disable the periodic system timer, its interrupt, reload and current value.
    fn stop_system_timer(&mut self);

    /// Number of lines of the interrupt controller.
    fn interrupt_lines(&self) -> u16;

    /// Clear both the enable and the pending bit of an interrupt line.
    fn clear_interrupt_line(&mut self, line: u16);

    /// Put every peripheral bus clock gate back to its reset value.
    fn gate_peripheral_clocks(&mut self);

    /// Point the vector table to `base`.
    ///
    /// # Safety
    /// `base` must hold a vector table and interrupts must be disabled.
    unsafe fn relocate_vector_table(&mut self, base: Address);

    /// Load the main stack pointer, optionally unmask interrupts, and branch to `entry`.
    ///
    /// # Safety
    /// `entry` must point to code that does not rely on anything on the current stack.
    unsafe fn transfer(self, stack_pointer: Address, entry: Address, interrupts: Interrupts) -> !;
}
