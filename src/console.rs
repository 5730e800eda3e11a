//! Line oriented operator console: one character per command.

use core::fmt::{self, Write};

use crate::{
    boot::Platform,
    handover::Rejected,
    image::{Defect, ImageHeader, Verdict},
};

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Command {
    /// Validate the image and hand over to it.
    Boot,
    /// Print the image header and verdict.
    Info,
    /// Run the destructive flash self-test.
    SelfTest,
}

impl Command {
    pub const fn parse(byte: u8) -> Option<Command> {
        match byte {
            b'b' => Some(Command::Boot),
            b'i' => Some(Command::Info),
            b't' => Some(Command::SelfTest),
            _ => None,
        }
    }
}

fn describe(defect: Defect) -> &'static str {
    match defect {
        Defect::ErasedStackPointer | Defect::ErasedEntry => "no application present",
        Defect::StackPointerOutsideRam => "stack pointer outside RAM",
        Defect::EntryOutsideImage => "entry point outside application flash",
    }
}

pub struct Console<W: Write> {
    out: W,
}

impl<W: Write> Console<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn prompt(&mut self) -> fmt::Result {
        write!(self.out, "b: boot, i: image info, t: flash self-test\r\n> ")
    }

    /// Interpret a received byte. Line endings are ignored, anything unknown is reported.
    pub fn receive(&mut self, byte: u8) -> Result<Option<Command>, fmt::Error> {
        if matches!(byte, b'\r' | b'\n') {
            return Ok(None);
        }

        let command = Command::parse(byte);
        match command {
            Some(Command::Boot) => writeln!(self.out, "Booting application...\r")?,
            Some(_) => {}
            None if byte.is_ascii_graphic() => {
                writeln!(self.out, "Unknown command '{}'\r", byte as char)?
            }
            None => writeln!(self.out, "Unknown command {:#04x}\r", byte)?,
        }
        Ok(command)
    }

    pub fn report_image(&mut self, header: &ImageHeader, verdict: Verdict) -> fmt::Result {
        writeln!(
            self.out,
            "Stack pointer {:#010x}, entry {:#010x}\r",
            header.stack_pointer, header.entry
        )?;
        match verdict {
            Verdict::Valid => writeln!(self.out, "Image valid\r"),
            Verdict::Invalid(defect) => writeln!(self.out, "Image invalid: {}\r", describe(defect)),
        }
    }

    pub fn report_rejected<P: Platform>(&mut self, rejected: &Rejected<P>) -> fmt::Result {
        self.report_image(&rejected.header(), Verdict::Invalid(rejected.defect()))?;
        writeln!(self.out, "Staying in bootloader\r")
    }
}
