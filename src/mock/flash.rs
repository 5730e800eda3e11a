use core::cell::Cell;
use std::{collections::BTreeSet, vec, vec::Vec};

use crate::{
    Address,
    image::Memory,
    layout::{self, Region},
    mock::WearTracker,
    storage::{Control, FlashRegisters, KEY1, KEY2, Status},
};

pub const FLASH_BASE: Address = 0x0800_0000;
pub const FLASH_SIZE: usize = 128 * 1024;
pub const REGION: Region = layout::STM32F103RB.region;

#[derive(Clone, Copy, PartialEq, Debug)]
enum Keys {
    Locked,
    FirstKeyWritten,
    Unlocked,
    /// Wrong key sequence, locked until reset.
    Faulted,
}

/// STM32F1 flash peripheral together with its flash array.
pub struct MockFlash {
    memory: Vec<u8>,
    control: Control,
    status: Cell<Status>,
    keys: Keys,
    key_writes: usize,
    address: Address,
    /// Status reads that still report busy for the current operation.
    busy: Cell<u32>,
    busy_polls: u32,
    stuck: bool,
    protected: BTreeSet<Address>,
    stores: Vec<(Address, u16)>,
    pub wear: WearTracker,
}

impl MockFlash {
    pub fn new() -> MockFlash {
        MockFlash {
            memory: vec![0xFF; FLASH_SIZE],
            control: Control::LOCK,
            status: Cell::new(Status::empty()),
            keys: Keys::Locked,
            key_writes: 0,
            address: 0,
            busy: Cell::new(0),
            busy_polls: 0,
            stuck: false,
            protected: BTreeSet::new(),
            stores: Vec::new(),
            wear: WearTracker::new(),
        }
    }

    fn offset(addr: Address) -> usize {
        assert!(
            (FLASH_BASE..FLASH_BASE + FLASH_SIZE as u32).contains(&addr),
            "{addr:#x} is not flash"
        );
        (addr - FLASH_BASE) as usize
    }

    fn page_of(addr: Address) -> Address {
        addr & !(Self::PAGE_SIZE - 1)
    }

    /// Overwrite the whole array, bypassing the peripheral.
    pub fn fill(&mut self, byte: u8) {
        self.memory.fill(byte);
    }

    /// Write raw bytes, bypassing the peripheral.
    pub fn write_bytes(&mut self, addr: Address, bytes: &[u8]) {
        let offset = Self::offset(addr);
        self.memory[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    pub fn protect(&mut self, addr: Address) {
        self.protected.insert(Self::page_of(addr));
    }

    /// Report busy for this many status reads after every operation.
    pub fn set_busy_polls(&mut self, polls: u32) {
        self.busy_polls = polls;
    }

    pub fn set_stuck(&mut self, stuck: bool) {
        self.stuck = stuck;
    }

    pub fn key_writes(&self) -> usize {
        self.key_writes
    }

    pub fn is_key_faulted(&self) -> bool {
        self.keys == Keys::Faulted
    }

    pub fn stores(&self) -> &[(Address, u16)] {
        &self.stores
    }

    fn complete(&mut self, flag: Status) {
        self.status.set(self.status.get() | flag);
        self.busy.set(self.busy_polls);
    }

    fn erase(&mut self) {
        let page = Self::page_of(self.address);
        if self.protected.contains(&page) {
            self.complete(Status::WRPRTERR);
            return;
        }

        let offset = Self::offset(page);
        self.memory[offset..offset + Self::PAGE_SIZE as usize].fill(0xFF);
        self.wear.increase(page);
        self.complete(Status::EOP);
    }
}

impl FlashRegisters for MockFlash {
    const PAGE_SIZE: u32 = 1024;

    fn control(&self) -> Control {
        self.control
    }

    fn set_control(&mut self, control: Control) {
        if self.control.contains(Control::LOCK) {
            // Only LOCK itself can be written while locked.
            return;
        }
        if control.contains(Control::LOCK) {
            self.control |= Control::LOCK;
            self.keys = Keys::Locked;
            return;
        }

        self.control = control - Control::STRT;
        if control.contains(Control::STRT | Control::PER) {
            self.erase();
        }
    }

    fn status(&self) -> Status {
        let status = self.status.get();
        if self.stuck {
            return status | Status::BSY;
        }
        match self.busy.get() {
            0 => status,
            n => {
                self.busy.set(n - 1);
                status | Status::BSY
            }
        }
    }

    fn clear_status(&mut self, flags: Status) {
        let clearable = flags & (Status::PGERR | Status::WRPRTERR | Status::EOP);
        self.status.set(self.status.get() - clearable);
    }

    fn write_key(&mut self, key: u32) {
        self.key_writes += 1;
        self.keys = match (self.keys, key) {
            (Keys::Locked, KEY1) => Keys::FirstKeyWritten,
            (Keys::FirstKeyWritten, KEY2) => {
                self.control -= Control::LOCK;
                Keys::Unlocked
            }
            _ => {
                self.control |= Control::LOCK;
                Keys::Faulted
            }
        };
    }

    fn set_address(&mut self, addr: Address) {
        self.address = addr;
    }

    fn store(&mut self, addr: Address, half_word: u16) {
        self.stores.push((addr, half_word));
        if !self.control.contains(Control::PG) || self.control.contains(Control::LOCK) {
            return;
        }

        if self.protected.contains(&Self::page_of(addr)) {
            self.complete(Status::WRPRTERR);
            return;
        }

        // Only erased locations can be programmed, except for writing all zeroes.
        if self.load(addr) != 0xFFFF && half_word != 0 {
            self.complete(Status::PGERR);
            return;
        }

        let offset = Self::offset(addr);
        self.memory[offset..offset + 2].copy_from_slice(&half_word.to_le_bytes());
        self.complete(Status::EOP);
    }

    fn load(&self, addr: Address) -> u16 {
        let offset = Self::offset(addr);
        u16::from_le_bytes([self.memory[offset], self.memory[offset + 1]])
    }
}

impl Memory for MockFlash {
    fn read_word(&self, addr: Address) -> u32 {
        let offset = Self::offset(addr);
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.memory[offset..offset + 4]);
        u32::from_le_bytes(word)
    }
}
