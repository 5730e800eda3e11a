//! One-way transfer of execution from the bootloader to the application image.
//!
//! ```text
//! Idle -> Validating -> Quiescing -> Relocating -> Transferred
//!   ^          |
//!   +----------+ (rejected)
//! ```
//!
//! [`Handover::validate`] yields an [`Armed`] handover only for a plausible
//! image. [`Armed::launch`] consumes it and never returns.

use serde::{Deserialize, Serialize};

use crate::{
    Address,
    boot::{Interrupts, Platform},
    fmt,
    image::{Defect, ImageHeader, Memory, Validator, Verdict},
    layout::Layout,
};

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Idle,
    Validating,
    Quiescing,
    Relocating,
    /// Terminal, execution has left the bootloader.
    Transferred,
}

impl Phase {
    /// The phase following this one on the way to the application.
    pub const fn next(self) -> Option<Phase> {
        match self {
            Phase::Idle => Some(Phase::Validating),
            Phase::Validating => Some(Phase::Quiescing),
            Phase::Quiescing => Some(Phase::Relocating),
            Phase::Relocating => Some(Phase::Transferred),
            Phase::Transferred => None,
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Options {
    /// Interrupt mask state at the application entry.
    pub interrupts: Interrupts,
}

pub struct Handover<P: Platform> {
    platform: P,
    validator: Validator,
    image_base: Address,
    options: Options,
    phase: Phase,
}

impl<P: Platform> Handover<P> {
    pub fn new(platform: P, layout: &Layout) -> Self {
        Self {
            platform,
            validator: Validator::for_layout(layout),
            image_base: layout.image_base(),
            options: Options::default(),
            phase: Phase::Idle,
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn image_base(&self) -> Address {
        self.image_base
    }

    fn advance(&mut self, to: Phase) {
        fmt::info!("handover: {:?} -> {:?}", self.phase, to);
        self.enter(to);
    }

    /// Phase change without a log line, for when logging output may be unpowered.
    fn enter(&mut self, to: Phase) {
        debug_assert_eq!(self.phase.next(), Some(to));
        self.phase = to;
    }

    /// Check the image header, arming the handover if it is plausible.
    ///
    /// A rejected image hands the controller back in [`Phase::Idle`].
    pub fn validate(mut self, memory: &impl Memory) -> Result<Armed<P>, Rejected<P>> {
        self.advance(Phase::Validating);

        let header = ImageHeader::read(memory, self.image_base);
        match self.validator.check(&header) {
            Verdict::Valid => Ok(Armed {
                handover: self,
                header,
            }),
            Verdict::Invalid(defect) => {
                fmt::warning!("no bootable image at {:#x}: {:?}", self.image_base, defect);
                self.phase = Phase::Idle;
                Err(Rejected {
                    handover: self,
                    header,
                    defect,
                })
            }
        }
    }

    /// Validate and launch. Only returns when the image is rejected.
    ///
    /// # Safety
    /// See [`Armed::launch`].
    pub unsafe fn try_boot(self, memory: &impl Memory) -> Rejected<P> {
        match self.validate(memory) {
            Ok(armed) => unsafe { armed.launch() },
            Err(rejected) => rejected,
        }
    }
}

/// Handover with a plausible image, ready to launch.
pub struct Armed<P: Platform> {
    handover: Handover<P>,
    header: ImageHeader,
}

impl<P: Platform> Armed<P> {
    pub fn header(&self) -> ImageHeader {
        self.header
    }

    /// Shut down the bootloader's runtime state and jump into the application.
    ///
    /// # Safety
    /// The image must be an application linked for this memory layout. A header
    /// that merely looks plausible still results in undefined behaviour.
    pub unsafe fn launch(self) -> ! {
        let Armed {
            mut handover,
            header,
        } = self;

        fmt::info!(
            "jump to {:#x} with sp {:#x}",
            header.entry,
            header.stack_pointer
        );
        handover.advance(Phase::Quiescing);

        // No logging from here on, the quiesce steps gate the logger's peripheral clock.
        let platform = &mut handover.platform;
        platform.disable_interrupts();
        platform.stop_system_timer();
        for line in 0..platform.interrupt_lines() {
            platform.clear_interrupt_line(line);
        }
        platform.gate_peripheral_clocks();

        // Interrupts stay masked until the vector table belongs to the application.
        handover.enter(Phase::Relocating);
        unsafe {
            handover
                .platform
                .relocate_vector_table(handover.image_base)
        };

        handover.enter(Phase::Transferred);
        unsafe {
            handover.platform.transfer(
                header.stack_pointer,
                header.entry,
                handover.options.interrupts,
            )
        }
    }
}

/// Handover that refused an image, still owning the platform.
pub struct Rejected<P: Platform> {
    handover: Handover<P>,
    header: ImageHeader,
    defect: Defect,
}

impl<P: Platform> Rejected<P> {
    pub fn header(&self) -> ImageHeader {
        self.header
    }

    pub fn defect(&self) -> Defect {
        self.defect
    }

    /// Take back the idle handover, for example to retry after an update.
    pub fn into_handover(self) -> Handover<P> {
        self.handover
    }
}
