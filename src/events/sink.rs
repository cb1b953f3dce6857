//! Event sinks and the fan-out log

use crate::events::event::BuildEvent;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Receives build events
pub trait EventSink {
    fn send(&self, event: &BuildEvent);
}

/// Dispatches every event to all registered sinks and counts diagnostics
#[derive(Default)]
pub struct EventLog {
    sinks: Vec<Rc<dyn EventSink>>,
    warnings: Cell<usize>,
    errors: Cell<usize>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Rc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn add(&mut self, sink: Rc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn emit(&self, event: BuildEvent) {
        match &event {
            BuildEvent::Warning(_) => self.warnings.set(self.warnings.get() + 1),
            BuildEvent::Error(_) => self.errors.set(self.errors.get() + 1),
            _ => {}
        }
        for sink in &self.sinks {
            sink.send(&event);
        }
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.get()
    }

    pub fn error_count(&self) -> usize {
        self.errors.get()
    }
}

/// Keeps every event, for tests and programmatic consumers
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: RefCell<Vec<BuildEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BuildEvent> {
        self.events.borrow().clone()
    }

    /// Kinds of all recorded events, in order
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.borrow().iter().map(BuildEvent::kind).collect()
    }

    /// Text of all `Message` events
    pub fn messages(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                BuildEvent::Message { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl EventSink for RecordingSink {
    fn send(&self, event: &BuildEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}
