use std::{cell::RefCell, format, rc::Rc, vec::Vec};

use log::{LevelFilter, Log, Metadata, Record};

use crate::mock::platform::Event;

std::thread_local! {
    static EVENTS: RefCell<Option<Rc<RefCell<Vec<Event>>>>> = const { RefCell::new(None) };
}

/// Appends every record to the event log of the thread that emitted it.
struct EventLogger;

impl Log for EventLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        EVENTS.with(|events| {
            if let Some(events) = &*events.borrow() {
                events
                    .borrow_mut()
                    .push(Event::Log(format!("{}", record.args())));
            }
        });
    }

    fn flush(&self) {}
}

static LOGGER: EventLogger = EventLogger;

/// Interleaves log lines of the current thread with platform events until dropped.
pub struct Capture(());

impl Drop for Capture {
    fn drop(&mut self) {
        EVENTS.with(|slot| *slot.borrow_mut() = None);
    }
}

pub fn capture(events: Rc<RefCell<Vec<Event>>>) -> Capture {
    // Another test thread may have installed it already.
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(LevelFilter::Trace);
    EVENTS.with(|slot| *slot.borrow_mut() = Some(events));
    Capture(())
}
