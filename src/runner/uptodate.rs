//! Timestamp based skip decision for targets

use crate::project::fs::FileSystem;
use std::path::PathBuf;

/// Outcome of comparing a target's inputs with its outputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    UpToDate,
    /// Reason the body has to run
    MustRun(String),
}

impl Decision {
    pub fn is_up_to_date(&self) -> bool {
        matches!(self, Decision::UpToDate)
    }
}

/// Decide whether a target body must run.
///
/// `inputs_text`/`outputs_text` are the declared (unevaluated) attributes;
/// `inputs`/`outputs` are the resolved file paths.
pub fn check(
    inputs_text: &str,
    outputs_text: &str,
    inputs: &[PathBuf],
    outputs: &[PathBuf],
    fs: &dyn FileSystem,
) -> Decision {
    if inputs_text.trim().is_empty() || outputs_text.trim().is_empty() {
        return Decision::MustRun("inputs or outputs not declared".to_string());
    }
    let (Some(first_input), Some(first_output)) = (inputs.first(), outputs.first()) else {
        return Decision::MustRun("inputs or outputs evaluate to no files".to_string());
    };
    if !fs.exists(first_input) {
        return Decision::MustRun(format!("input \"{}\" does not exist", first_input.display()));
    }
    if !fs.exists(first_output) {
        return Decision::MustRun(format!("output \"{}\" does not exist", first_output.display()));
    }

    let mut newest_input = None;
    for input in inputs {
        let Some(time) = fs.modified(input) else {
            return Decision::MustRun(format!("input \"{}\" does not exist", input.display()));
        };
        if newest_input.map_or(true, |newest| time > newest) {
            newest_input = Some(time);
        }
    }

    let mut oldest_output = None;
    for output in outputs {
        let Some(time) = fs.modified(output) else {
            return Decision::MustRun(format!("output \"{}\" does not exist", output.display()));
        };
        if oldest_output.map_or(true, |oldest| time < oldest) {
            oldest_output = Some(time);
        }
    }

    match (newest_input, oldest_output) {
        (Some(input), Some(output)) if input > output => {
            Decision::MustRun("an input is newer than the oldest output".to_string())
        }
        _ => Decision::UpToDate,
    }
}
