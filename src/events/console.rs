//! Console output for build events

use crate::events::event::{BuildEvent, Importance};
use crate::events::sink::EventSink;
use colored::Colorize;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Silent = 0,
    Quiet = 1,
    Normal = 2,
    Verbose = 3,
}

/// Prints events to stderr, gated by verbosity
pub struct ConsoleLogger {
    pub verbosity: Verbosity,
}

impl ConsoleLogger {
    pub fn new(verbosity: Verbosity) -> Self {
        ConsoleLogger { verbosity }
    }

    /// Print info message (if not quiet)
    pub fn print_info(&self, message: &str) {
        if self.verbosity >= Verbosity::Normal {
            eprintln!("{} {}", "[INFO]".green(), message);
        }
    }

    /// Print warning message (if not silent)
    pub fn print_warning(&self, message: &str) {
        if self.verbosity >= Verbosity::Quiet {
            eprintln!("{} {}", "[WARN]".yellow(), message.yellow());
        }
    }

    /// Print error message (if not silent)
    pub fn print_error(&self, message: &str) {
        if self.verbosity >= Verbosity::Quiet {
            eprintln!("{} {}", "[ERROR]".red().bold(), message.red());
        }
    }

    /// Print debug message (if verbose)
    pub fn print_debug(&self, message: &str) {
        if self.verbosity >= Verbosity::Verbose {
            eprintln!("{} {}", "[DEBUG]".dimmed(), message);
        }
    }

    /// Lowest verbosity at which a message of this importance shows
    fn threshold(importance: Importance) -> Verbosity {
        match importance {
            Importance::High => Verbosity::Quiet,
            Importance::Normal => Verbosity::Normal,
            Importance::Low => Verbosity::Verbose,
        }
    }
}

impl EventSink for ConsoleLogger {
    fn send(&self, event: &BuildEvent) {
        match event {
            BuildEvent::Message { importance, text, .. } => {
                if self.verbosity >= Self::threshold(*importance) {
                    eprintln!("{}", text);
                }
            }
            BuildEvent::Warning(_) => self.print_warning(&event.to_string()),
            BuildEvent::Error(_) => self.print_error(&event.to_string()),
            BuildEvent::TargetStarted { .. } | BuildEvent::ProjectStarted { .. } => {
                self.print_info(&event.to_string())
            }
            BuildEvent::BuildFinished { succeeded } => {
                if *succeeded {
                    self.print_info(&event.to_string());
                } else {
                    self.print_error(&event.to_string());
                }
            }
            _ => self.print_debug(&event.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert!(Verbosity::Verbose > Verbosity::Normal);
        assert!(Verbosity::Normal > Verbosity::Quiet);
        assert!(Verbosity::Quiet > Verbosity::Silent);
    }

    #[test]
    fn test_importance_thresholds() {
        assert_eq!(ConsoleLogger::threshold(Importance::High), Verbosity::Quiet);
        assert_eq!(ConsoleLogger::threshold(Importance::Low), Verbosity::Verbose);
    }
}
