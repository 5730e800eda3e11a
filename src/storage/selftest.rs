//! Destructive program-and-verify check of the application region.
//!
//! Erases the whole region, programs two known half-words at its start and
//! reads them back, narrating every step to a text sink.

use core::fmt::Write;

use crate::storage::{Error, FlashController, FlashRegisters, WORD_SIZE};

pub const TEST_WORD1: u16 = 0x1234;
pub const TEST_WORD2: u16 = 0xABCD;

/// Outcome of every step. Later steps still run after an earlier failure.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Report {
    pub erase: Result<(), Error>,
    pub word1: Result<(), Error>,
    pub word2: Result<(), Error>,
    pub verified: bool,
}

impl Report {
    pub fn passed(&self) -> bool {
        self.erase.is_ok() && self.word1.is_ok() && self.word2.is_ok() && self.verified
    }
}

fn outcome(result: Result<(), Error>) -> &'static str {
    match result {
        Ok(()) => "OK",
        Err(Error::Program) => "FAILED (program error)",
        Err(Error::WriteProtect) => "FAILED (write protected)",
        Err(Error::Timeout) => "FAILED (timeout)",
        Err(Error::OutOfBounds) => "FAILED (out of bounds)",
        Err(Error::NotAligned) => "FAILED (not aligned)",
    }
}

pub fn run<R: FlashRegisters>(
    flash: &mut FlashController<R>,
    out: &mut impl Write,
) -> Result<Report, core::fmt::Error> {
    let start = flash.region().start();

    writeln!(out, "Flash program & verify test start...\r")?;

    flash.unlock();
    writeln!(out, "Flash unlocked.\r")?;

    let erase = flash.erase_region();
    writeln!(out, "App region erase: {}\r", outcome(erase))?;

    let word1 = flash.program_word(start, TEST_WORD1);
    writeln!(out, "TEST_WORD1 at {:#010x}: {}\r", start, outcome(word1))?;

    let word2 = flash.program_word(start + WORD_SIZE, TEST_WORD2);
    writeln!(
        out,
        "TEST_WORD2 at {:#010x}: {}\r",
        start + WORD_SIZE,
        outcome(word2)
    )?;

    writeln!(out, "Verifying flash content...\r")?;
    let verified = flash.verify_range(start, &[TEST_WORD1, TEST_WORD2]);
    writeln!(
        out,
        "Flash verification {}\r",
        if verified { "SUCCESS!" } else { "FAILED!" }
    )?;

    flash.lock();
    writeln!(out, "Flash locked.\r")?;

    Ok(Report {
        erase,
        word1,
        word2,
        verified,
    })
}
