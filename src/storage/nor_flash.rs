//! `embedded-storage` adapters, so that the controller can back partitions and
//! key-value stores. Offsets are relative to the start of the application region.

use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};
use embedded_storage_async::nor_flash as asynch;

use crate::{
    Address,
    storage::{Error, FlashController, FlashRegisters, WORD_SIZE},
};

impl NorFlashError for Error {
    fn kind(&self) -> NorFlashErrorKind {
        match self {
            Error::OutOfBounds => NorFlashErrorKind::OutOfBounds,
            Error::NotAligned => NorFlashErrorKind::NotAligned,
            Error::Program | Error::WriteProtect | Error::Timeout => NorFlashErrorKind::Other,
        }
    }
}

impl<R: FlashRegisters> FlashController<R> {
    /// Translate a region relative span into an absolute address.
    fn span(&self, offset: u32, len: usize) -> Result<Address, Error> {
        match (offset as usize).checked_add(len) {
            Some(end) if end <= self.region.len() as usize => Ok(self.region.start() + offset),
            _ => Err(Error::OutOfBounds),
        }
    }
}

impl<R: FlashRegisters> ErrorType for FlashController<R> {
    type Error = Error;
}

impl<R: FlashRegisters> ReadNorFlash for FlashController<R> {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Error> {
        let start = self.span(offset, bytes.len())?;
        for (addr, byte) in (start..).zip(bytes.iter_mut()) {
            let half_word = self.regs.load(addr & !1).to_le_bytes();
            *byte = half_word[(addr & 1) as usize];
        }
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.region.len() as usize
    }
}

impl<R: FlashRegisters> NorFlash for FlashController<R> {
    const WRITE_SIZE: usize = WORD_SIZE as usize;
    const ERASE_SIZE: usize = R::PAGE_SIZE as usize;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Error> {
        if from > to || to as usize > self.capacity() {
            return Err(Error::OutOfBounds);
        }
        if from % R::PAGE_SIZE != 0 || to % R::PAGE_SIZE != 0 {
            return Err(Error::NotAligned);
        }

        let start = self.region.start();
        for offset in (from..to).step_by(Self::ERASE_SIZE) {
            self.erase_page(start + offset)?;
        }
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Error> {
        let start = self.span(offset, bytes.len())?;
        if offset % WORD_SIZE != 0 || bytes.len() % Self::WRITE_SIZE != 0 {
            return Err(Error::NotAligned);
        }

        for (addr, chunk) in (start..)
            .step_by(Self::WRITE_SIZE)
            .zip(bytes.chunks_exact(Self::WRITE_SIZE))
        {
            self.program_word(addr, u16::from_le_bytes([chunk[0], chunk[1]]))?;
        }
        Ok(())
    }
}

impl<R: FlashRegisters> asynch::ReadNorFlash for FlashController<R> {
    const READ_SIZE: usize = <Self as ReadNorFlash>::READ_SIZE;

    async fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Error> {
        ReadNorFlash::read(self, offset, bytes)
    }

    fn capacity(&self) -> usize {
        ReadNorFlash::capacity(self)
    }
}

impl<R: FlashRegisters> asynch::NorFlash for FlashController<R> {
    const WRITE_SIZE: usize = <Self as NorFlash>::WRITE_SIZE;
    const ERASE_SIZE: usize = <Self as NorFlash>::ERASE_SIZE;

    async fn erase(&mut self, from: u32, to: u32) -> Result<(), Error> {
        NorFlash::erase(self, from, to)
    }

    async fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Error> {
        NorFlash::write(self, offset, bytes)
    }
}
