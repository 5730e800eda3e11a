//! Flash controller: unlock, erase, program and lock the application region.
//!
//! Every mutating operation runs inside an unlock guard, which puts the
//! peripheral back into the locked state when it goes out of scope.
//! Register access goes through [`FlashRegisters`], so the same sequencing
//! drives real hardware and the mock used in tests.

use bitflags::bitflags;

use crate::{Address, fmt, layout::Region};

mod nor_flash;
pub mod selftest;

#[cfg(feature = "stm32f1")]
pub mod stm32f1;

/// First key of the unlock sequence.
pub const KEY1: u32 = 0x4567_0123;
/// Second key of the unlock sequence.
pub const KEY2: u32 = 0xCDEF_89AB;

/// Size of the unit programmed in a single operation.
pub const WORD_SIZE: u32 = 2;

/// Value of a half-word after erasure.
pub const ERASED: u16 = 0xFFFF;

bitflags! {
    /// Control register (FLASH_CR).
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct Control: u32 {
        /// Programming mode.
        const PG = 1 << 0;
        /// Page erase mode.
        const PER = 1 << 1;
        /// Mass erase mode.
        const MER = 1 << 2;
        /// Start an erase operation.
        const STRT = 1 << 6;
        /// Locks CR until the key sequence is written again.
        const LOCK = 1 << 7;
        const ERRIE = 1 << 10;
        const EOPIE = 1 << 12;
    }
}

bitflags! {
    /// Status register (FLASH_SR). Error flags are cleared by writing 1.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct Status: u32 {
        const BSY = 1 << 0;
        /// Programming a location that was not erased.
        const PGERR = 1 << 2;
        /// Programming or erasing a write protected page.
        const WRPRTERR = 1 << 4;
        /// End of operation.
        const EOP = 1 << 5;
    }
}

/// Register level access to the flash peripheral and the flash array itself.
pub trait FlashRegisters {
    /// Size of an erase unit in bytes, a power of two.
    const PAGE_SIZE: u32;

    fn control(&self) -> Control;

    fn set_control(&mut self, control: Control);

    fn status(&self) -> Status;

    /// Write-one-to-clear the given status flags.
    fn clear_status(&mut self, flags: Status);

    fn write_key(&mut self, key: u32);

    /// Target address for a page erase (FLASH_AR).
    fn set_address(&mut self, addr: Address);

    /// Store a half-word into the flash array. Only takes effect when [`Control::PG`] is set.
    fn store(&mut self, addr: Address, half_word: u16);

    fn load(&self, addr: Address) -> u16;
}

/// Result of a flash operation as reported by the peripheral, or a rejected argument.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Error {
    /// The peripheral reported a programming error, or the address was not word aligned.
    Program,
    /// The target page is write protected.
    WriteProtect,
    /// The peripheral stayed busy for longer than the configured [`PollLimit`].
    Timeout,
    /// Address lies outside of the application region.
    OutOfBounds,
    /// Erase address is not the start of a page.
    NotAligned,
}

/// How long to spin on the busy flag before giving up.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PollLimit {
    /// Spin until the peripheral clears the busy flag, however long that takes.
    Unbounded,
    /// Give up after this many reads of the status register.
    Spins(u32),
}

impl PollLimit {
    /// Comfortably above the 40ms page erase time at 72MHz.
    pub const DEFAULT: PollLimit = PollLimit::Spins(1_000_000);
}

impl Default for PollLimit {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Spin until the busy flag clears, then collect and clear the error flags.
fn poll<R: FlashRegisters>(regs: &mut R, limit: PollLimit) -> Result<(), Error> {
    let mut spins = 0u32;
    while regs.status().contains(Status::BSY) {
        if let PollLimit::Spins(max) = limit {
            if spins >= max {
                fmt::warning!("flash busy after {} spins", spins);
                return Err(Error::Timeout);
            }
            spins += 1;
        }
        core::hint::spin_loop();
    }

    let status = regs.status();
    let mut result = Ok(());

    if status.contains(Status::PGERR) {
        regs.clear_status(Status::PGERR);
        result = Err(Error::Program);
    }

    if status.contains(Status::WRPRTERR) {
        regs.clear_status(Status::WRPRTERR);
        result = Err(Error::WriteProtect);
    }

    if status.contains(Status::EOP) {
        regs.clear_status(Status::EOP);
    }

    result
}

/// Scoped unlock of the flash peripheral. Locks again on drop.
struct Unlocked<'a, R: FlashRegisters> {
    regs: &'a mut R,
    limit: PollLimit,
}

impl<R: FlashRegisters> Unlocked<'_, R> {
    fn modify(&mut self, f: impl FnOnce(Control) -> Control) {
        let control = self.regs.control();
        self.regs.set_control(f(control));
    }

    fn wait(&mut self) -> Result<(), Error> {
        poll(&mut *self.regs, self.limit)
    }

    /// Flags left behind by an operation that timed out belong to that operation.
    fn clear_stale_flags(&mut self) {
        self.regs.clear_status(Status::PGERR | Status::WRPRTERR | Status::EOP);
    }

    fn erase_page(&mut self, page: Address) -> Result<(), Error> {
        self.clear_stale_flags();
        self.modify(|c| c - Control::PER);
        self.modify(|c| c | Control::PER);
        self.regs.set_address(page);
        self.modify(|c| c | Control::STRT);

        let result = self.wait();
        self.modify(|c| c - Control::PER);
        result
    }

    fn program(&mut self, addr: Address, data: u16) -> Result<(), Error> {
        self.clear_stale_flags();
        self.modify(|c| c | Control::PG);
        self.regs.store(addr, data);

        // PG must stay set until the peripheral reports completion.
        let result = self.wait();
        self.modify(|c| c - Control::PG);
        result
    }
}

impl<R: FlashRegisters> Drop for Unlocked<'_, R> {
    fn drop(&mut self) {
        let control = self.regs.control();
        self.regs.set_control(control | Control::LOCK);
        fmt::trace!("flash locked");
    }
}

/// Owner of the flash peripheral, restricted to a single application region.
pub struct FlashController<R: FlashRegisters> {
    regs: R,
    region: Region,
    limit: PollLimit,
}

impl<R: FlashRegisters> FlashController<R> {
    /// The region must consist of whole pages.
    pub fn new(regs: R, region: Region) -> Self {
        debug_assert!(region.is_page_aligned(R::PAGE_SIZE));
        Self {
            regs,
            region,
            limit: PollLimit::DEFAULT,
        }
    }

    /// Poll limit applied by every subsequent operation.
    pub fn with_poll_limit(mut self, limit: PollLimit) -> Self {
        self.limit = limit;
        self
    }

    pub fn set_poll_limit(&mut self, limit: PollLimit) {
        self.limit = limit;
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn is_locked(&self) -> bool {
        self.regs.control().contains(Control::LOCK)
    }

    pub fn registers(&self) -> &R {
        &self.regs
    }

    pub fn release(self) -> R {
        self.regs
    }

    /// Write the key sequence, unless the peripheral is already unlocked.
    ///
    /// Writing the keys to an unlocked peripheral would lock it until the next reset.
    pub fn unlock(&mut self) {
        if !self.is_locked() {
            return;
        }
        self.regs.write_key(KEY1);
        self.regs.write_key(KEY2);
        fmt::trace!("flash unlocked");
    }

    pub fn lock(&mut self) {
        let control = self.regs.control();
        self.regs.set_control(control | Control::LOCK);
    }

    /// Unlock for the lifetime of the returned guard.
    fn unlocked(&mut self) -> Unlocked<'_, R> {
        self.unlock();
        Unlocked {
            regs: &mut self.regs,
            limit: self.limit,
        }
    }

    /// Wait for the last operation using the configured poll limit.
    pub fn wait_for_completion(&mut self) -> Result<(), Error> {
        poll(&mut self.regs, self.limit)
    }

    pub fn wait_for_completion_within(&mut self, limit: PollLimit) -> Result<(), Error> {
        poll(&mut self.regs, limit)
    }

    /// Erase the page starting at `page`.
    ///
    /// All bytes of the page are destroyed, even if an error is reported.
    pub fn erase_page(&mut self, page: Address) -> Result<(), Error> {
        if !self.region.contains(page) {
            return Err(Error::OutOfBounds);
        }
        if page % R::PAGE_SIZE != 0 {
            return Err(Error::NotAligned);
        }

        fmt::debug!("erase page {:#x}", page);
        let result = self.unlocked().erase_page(page);
        if let Err(e) = result {
            fmt::warning!("erase page {:#x} failed: {:?}", page, e);
        }
        result
    }

    /// Erase every page of the region in ascending order, stopping at the first failure.
    ///
    /// Pages erased before the failure stay erased.
    pub fn erase_region(&mut self) -> Result<(), Error> {
        for page in self.region.pages(R::PAGE_SIZE) {
            self.erase_page(page)?;
        }
        Ok(())
    }

    /// Program a single half-word. The location must have been erased.
    pub fn program_word(&mut self, addr: Address, data: u16) -> Result<(), Error> {
        if addr % WORD_SIZE != 0 {
            return Err(Error::Program);
        }
        if !self.region.contains_span(addr, WORD_SIZE) {
            return Err(Error::OutOfBounds);
        }

        fmt::debug!("program {:#x} = {:#x}", addr, data);
        let result = self.unlocked().program(addr, data);
        if let Err(e) = result {
            fmt::warning!("program {:#x} failed: {:?}", addr, e);
        }
        result
    }

    /// Program consecutive half-words starting at `addr`, stopping at the first failure.
    pub fn program_words(&mut self, addr: Address, data: &[u16]) -> Result<(), Error> {
        let mut cursor = addr;
        for word in data {
            self.program_word(cursor, *word)?;
            cursor = cursor.checked_add(WORD_SIZE).ok_or(Error::OutOfBounds)?;
        }
        Ok(())
    }

    /// Compare the half-words at `start` with `expected`.
    ///
    /// Only reads the flash array, regardless of the lock state.
    pub fn verify_range(&self, start: Address, expected: &[u16]) -> bool {
        let mut cursor = start;
        for word in expected {
            if self.regs.load(cursor) != *word {
                return false;
            }
            match cursor.checked_add(WORD_SIZE) {
                Some(next) => cursor = next,
                None => return false,
            }
        }
        true
    }

    /// Whether every half-word of the region reads as erased.
    pub fn is_region_erased(&self) -> bool {
        (self.region.start()..=self.region.end())
            .step_by(WORD_SIZE as usize)
            .all(|addr| self.regs.load(addr) == ERASED)
    }
}
