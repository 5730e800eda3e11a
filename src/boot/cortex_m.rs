use cortex_m::{
    asm,
    peripheral::{NVIC, SCB, SYST},
};

use crate::{
    Address,
    boot::{Interrupts, Platform},
};

/// Vendor specific peripheral clock control.
pub trait ClockGates {
    /// Disable every peripheral clock that is disabled after a cold reset.
    fn reset(&mut self);
}

/// Handover primitives for a Cortex-M core without TrustZone.
pub struct CortexM<C: ClockGates> {
    syst: SYST,
    nvic: NVIC,
    scb: SCB,
    clocks: C,
    lines: u16,
}

impl<C: ClockGates> CortexM<C> {
    /// `lines` is the number of device specific interrupts, as listed in the vector table.
    pub fn new(syst: SYST, nvic: NVIC, scb: SCB, clocks: C, lines: u16) -> Self {
        Self {
            syst,
            nvic,
            scb,
            clocks,
            lines,
        }
    }
}

impl<C: ClockGates> Platform for CortexM<C> {
    fn disable_interrupts(&mut self) {
        cortex_m::interrupt::disable();
    }

    fn stop_system_timer(&mut self) {
        self.syst.disable_interrupt();
        self.syst.disable_counter();
        self.syst.set_reload(0);
        self.syst.clear_current();
    }

    fn interrupt_lines(&self) -> u16 {
        self.lines
    }

    fn clear_interrupt_line(&mut self, line: u16) {
        let (word, bit) = ((line / 32) as usize, 1u32 << (line % 32));
        // Safety: ICER and ICPR are write-one-to-clear, other lines are unaffected.
        unsafe {
            self.nvic.icer[word].write(bit);
            self.nvic.icpr[word].write(bit);
        }
    }

    fn gate_peripheral_clocks(&mut self) {
        self.clocks.reset();
    }

    unsafe fn relocate_vector_table(&mut self, base: Address) {
        unsafe { self.scb.vtor.write(base) };
        asm::dsb();
        asm::isb();
    }

    unsafe fn transfer(self, stack_pointer: Address, entry: Address, interrupts: Interrupts) -> ! {
        match interrupts {
            Interrupts::Masked => unsafe { asm::bootstrap(as_ptr(stack_pointer), as_ptr(entry)) },
            Interrupts::Enabled => unsafe { enable_and_branch(stack_pointer, entry) },
        }
    }
}

fn as_ptr(addr: Address) -> *const u32 {
    addr as usize as *const u32
}

#[cfg(target_arch = "arm")]
unsafe fn enable_and_branch(stack_pointer: Address, entry: Address) -> ! {
    unsafe {
        core::arch::asm!(
            "msr msp, {sp}",
            "cpsie i",
            "bx {entry}",
            sp = in(reg) stack_pointer,
            entry = in(reg) entry,
            options(noreturn),
        )
    }
}

#[cfg(not(target_arch = "arm"))]
unsafe fn enable_and_branch(stack_pointer: Address, entry: Address) -> ! {
    unsafe {
        cortex_m::interrupt::enable();
        asm::bootstrap(as_ptr(stack_pointer), as_ptr(entry))
    }
}
