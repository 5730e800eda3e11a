//! Bootloader building blocks: program the application into flash, check that
//! it looks bootable, and hand over to it without leaving bootloader state behind.
//!
//! * [`storage`] drives the flash peripheral through unlock, erase, program and lock.
//! * [`image`] checks the application header for plausibility.
//! * [`handover`] quiesces the core and its peripherals and jumps into the application,
//!   using the primitives of a [`boot::Platform`].
#![no_std]

pub(crate) mod fmt;

pub mod boot;
pub mod console;
pub mod handover;
pub mod image;
pub mod layout;
pub mod storage;

#[cfg(test)]
extern crate std;

#[cfg(test)]
mod mock;

/// Address in the 32-bit address space of the core.
pub type Address = u32;

pub use handover::{Armed, Handover, Rejected};
pub use image::{Validator, Verdict};
pub use storage::FlashController;
