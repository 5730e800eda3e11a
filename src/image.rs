//! Plausibility check of the application image header.
//!
//! The header is the start of the Cortex-M vector table: the initial stack
//! pointer followed by the reset vector. Nothing else about the image is
//! inspected, so a corrupted image with a sane header passes.

use serde::{Deserialize, Serialize};

use crate::{
    Address, fmt,
    layout::{Layout, Window},
};

/// Word value of erased flash.
pub const ERASED_WORD: u32 = 0xFFFF_FFFF;

/// Raw word reads from the address space.
pub trait Memory {
    /// Read the word at a 4-byte aligned address, in native byte order.
    fn read_word(&self, addr: Address) -> u32;
}

/// Memory mapped address space of the running core.
pub struct Mmio(());

impl Mmio {
    /// # Safety
    /// Every address passed to [`Memory::read_word`] must be readable, word aligned memory.
    pub const unsafe fn new() -> Self {
        Mmio(())
    }
}

impl Memory for Mmio {
    fn read_word(&self, addr: Address) -> u32 {
        // Safety: guaranteed by the contract of `Mmio::new`.
        unsafe { core::ptr::read_volatile(addr as usize as *const u32) }
    }
}

/// First two words of the application image.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ImageHeader {
    /// Initial main stack pointer.
    pub stack_pointer: Address,
    /// Reset vector, the first instruction to execute (with the thumb bit set).
    pub entry: Address,
}

impl ImageHeader {
    pub fn read(memory: &impl Memory, base: Address) -> Self {
        Self {
            stack_pointer: memory.read_word(base),
            entry: memory.read_word(base.wrapping_add(4)),
        }
    }
}

/// Reason a header was rejected.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Defect {
    /// Stack pointer reads as erased flash, most likely no image was ever written.
    ErasedStackPointer,
    ErasedEntry,
    StackPointerOutsideRam,
    EntryOutsideImage,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Verdict {
    Valid,
    Invalid(Defect),
}

impl Verdict {
    pub const fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }
}

/// Checks headers against the RAM window and the application flash window.
#[derive(Clone, Copy, Debug)]
pub struct Validator {
    ram: Window,
    code: Window,
}

impl Validator {
    pub const fn new(ram: Window, code: Window) -> Self {
        Self { ram, code }
    }

    pub const fn for_layout(layout: &Layout) -> Self {
        Self::new(layout.ram, layout.region.window())
    }

    pub fn check(&self, header: &ImageHeader) -> Verdict {
        let defect = if header.stack_pointer == ERASED_WORD {
            Defect::ErasedStackPointer
        } else if header.entry == ERASED_WORD {
            Defect::ErasedEntry
        } else if !self.ram.contains(header.stack_pointer) {
            Defect::StackPointerOutsideRam
        } else if !self.code.contains(header.entry) {
            Defect::EntryOutsideImage
        } else {
            return Verdict::Valid;
        };
        Verdict::Invalid(defect)
    }

    /// Read the header at `base` and check it.
    pub fn is_valid(&self, memory: &impl Memory, base: Address) -> Verdict {
        let header = ImageHeader::read(memory, base);
        let verdict = self.check(&header);
        fmt::info!(
            "image at {:#x}: sp={:#x} entry={:#x} {:?}",
            base,
            header.stack_pointer,
            header.entry,
            verdict
        );
        verdict
    }
}
