//! Memory layout of the board: where the application lives and where RAM is.

use serde::{Deserialize, Serialize};

use crate::Address;

/// Closed address interval `[start, end]`.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Window {
    pub start: Address,
    pub end: Address,
}

impl Window {
    pub const fn new(start: Address, end: Address) -> Self {
        assert!(start <= end);
        Self { start, end }
    }

    pub const fn contains(&self, addr: Address) -> bool {
        self.start <= addr && addr <= self.end
    }
}

/// Flash region owned by the application image.
///
/// Everything below `start` belongs to the bootloader and is never erased or programmed.
/// The page size is a property of the flash peripheral, see [`crate::storage::FlashRegisters::PAGE_SIZE`].
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Region {
    window: Window,
}

impl Region {
    /// Region spanning `start..=end`.
    pub const fn new(start: Address, end: Address) -> Self {
        Self {
            window: Window::new(start, end),
        }
    }

    pub const fn start(&self) -> Address {
        self.window.start
    }

    /// Last byte of the region (inclusive).
    pub const fn end(&self) -> Address {
        self.window.end
    }

    pub const fn window(&self) -> Window {
        self.window
    }

    /// Number of bytes in the region.
    pub const fn len(&self) -> u32 {
        self.window.end - self.window.start + 1
    }

    pub const fn contains(&self, addr: Address) -> bool {
        self.window.contains(addr)
    }

    /// Whether `len` bytes starting at `addr` all lie inside the region.
    pub const fn contains_span(&self, addr: Address, len: u32) -> bool {
        if len == 0 {
            return self.contains(addr);
        }
        match addr.checked_add(len - 1) {
            Some(last) => self.contains(addr) && self.contains(last),
            None => false,
        }
    }

    /// Whether the region consists of whole pages of `page_size` bytes.
    pub const fn is_page_aligned(&self, page_size: u32) -> bool {
        page_size.is_power_of_two()
            && self.window.start % page_size == 0
            && self.len() % page_size == 0
    }

    /// Start addresses of every page in the region, ascending.
    pub fn pages(&self, page_size: u32) -> impl Iterator<Item = Address> + use<> {
        let start = self.window.start;
        (0..self.len() / page_size).map(move |page| start + page * page_size)
    }
}

/// Board memory map as seen by the bootloader.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Layout {
    /// Application flash. The image header is located at `region.start()`.
    pub region: Region,
    /// Working memory. The initial stack pointer usually equals the top of RAM,
    /// which is one past the last byte, hence the window includes that address.
    pub ram: Window,
}

impl Layout {
    /// Base address of the application image.
    pub const fn image_base(&self) -> Address {
        self.region.start()
    }
}

/// STM32F103RB: 128K flash of which the first 16K hold the bootloader, 20K SRAM.
pub const STM32F103RB: Layout = Layout {
    region: Region::new(0x0800_4000, 0x0801_FFFF),
    ram: Window::new(0x2000_0000, 0x2000_5000),
};
