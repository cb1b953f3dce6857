//! The build event stream
//!
//! Every observable step of a build is reported as a [`BuildEvent`] through
//! an [`EventLog`], which fans out to the registered sinks.

pub mod console;
pub mod event;
pub mod sink;

pub use console::{ConsoleLogger, Verbosity};
pub use event::{BuildEvent, Diagnostic, EventOrigin, Importance};
pub use sink::{EventLog, EventSink, RecordingSink};
