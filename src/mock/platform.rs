use std::{
    boxed::Box,
    cell::RefCell,
    panic::{self, AssertUnwindSafe},
    rc::Rc,
    vec::Vec,
};

#[cfg(feature = "log")]
use std::string::String;

use crate::{
    Address,
    boot::{Interrupts, Platform},
};

/// Arguments of the final transfer, carried out of the mock by unwinding.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Jump {
    pub stack_pointer: Address,
    pub entry: Address,
    pub interrupts: Interrupts,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Event {
    DisableInterrupts,
    StopSystemTimer,
    ClearInterruptLine(u16),
    GatePeripheralClocks,
    RelocateVectorTable(Address),
    Transfer(Jump),
    /// A log line, interleaved while a [`crate::mock::logger::Capture`] is alive.
    #[cfg(feature = "log")]
    Log(String),
}

/// Platform that records every primitive in order.
pub struct MockPlatform {
    events: Rc<RefCell<Vec<Event>>>,
    lines: u16,
}

impl MockPlatform {
    pub fn new(lines: u16) -> Self {
        Self {
            events: Rc::new(RefCell::new(Vec::new())),
            lines,
        }
    }

    /// Shared handle to the event log, still readable after the platform is consumed.
    pub fn events(&self) -> Rc<RefCell<Vec<Event>>> {
        self.events.clone()
    }

    fn record(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }
}

impl Platform for MockPlatform {
    fn disable_interrupts(&mut self) {
        self.record(Event::DisableInterrupts);
    }

    fn stop_system_timer(&mut self) {
        self.record(Event::StopSystemTimer);
    }

    fn interrupt_lines(&self) -> u16 {
        self.lines
    }

    fn clear_interrupt_line(&mut self, line: u16) {
        self.record(Event::ClearInterruptLine(line));
    }

    fn gate_peripheral_clocks(&mut self) {
        self.record(Event::GatePeripheralClocks);
    }

    unsafe fn relocate_vector_table(&mut self, base: Address) {
        self.record(Event::RelocateVectorTable(base));
    }

    unsafe fn transfer(self, stack_pointer: Address, entry: Address, interrupts: Interrupts) -> ! {
        let jump = Jump {
            stack_pointer,
            entry,
            interrupts,
        };
        self.record(Event::Transfer(jump));
        panic::panic_any(jump)
    }
}

/// Run `f`, which is expected to end in [`MockPlatform::transfer`], and return the jump it made.
pub fn catch_jump(f: impl FnOnce()) -> Jump {
    let payload: Box<dyn core::any::Any + Send> = match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => panic!("returned without transferring control"),
        Err(payload) => payload,
    };
    match payload.downcast::<Jump>() {
        Ok(jump) => *jump,
        Err(payload) => panic::resume_unwind(payload),
    }
}
