//! Target execution engine
//!
//! This module handles building targets: dependency ordering, cycle
//! detection, incremental skips, batching and task invocation.

pub mod session;
pub mod target;
pub mod task;
pub mod uptodate;

pub use session::{CacheKey, Session, TargetResult, TargetState};
pub use task::TaskOutcome;
pub use uptodate::Decision;

use crate::error::BuildResult;
use crate::events::{BuildEvent, Diagnostic, EventOrigin};
use crate::project::Project;

/// Outcome of a whole build
#[derive(Debug, Clone, PartialEq)]
pub struct BuildSummary {
    pub succeeded: bool,
    /// Results of the initial and requested targets, in build order
    pub results: Vec<(String, TargetResult)>,
}

impl BuildSummary {
    pub fn result(&self, target: &str) -> Option<&TargetResult> {
        self.results
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(target))
            .map(|(_, result)| result)
    }
}

impl Session {
    /// Build `targets` (or the project defaults), reporting the whole
    /// lifecycle through the event log.
    ///
    /// Fatal errors are reported as an error event and end the build.
    pub fn build(&mut self, project: &mut Project, targets: &[String]) -> BuildSummary {
        self.log.emit(BuildEvent::BuildStarted);

        let requested = if targets.is_empty() {
            project.default_targets()
        } else {
            targets.to_vec()
        };
        self.log.emit(BuildEvent::ProjectStarted {
            project: project.name(),
            targets: requested.clone(),
        });

        let (succeeded, results) = match self.build_requested(project, &requested) {
            Ok(results) => (results.iter().all(|(_, r)| r.succeeded), results),
            Err(err) => {
                tracing::debug!(error = %err, kind = ?err.kind(), "build aborted");
                let diagnostic = Diagnostic::new(EventOrigin::project(project.name()), err.to_string())
                    .with_code(err.code())
                    .with_file(project.path());
                self.log.emit(BuildEvent::Error(diagnostic));
                (false, Vec::new())
            }
        };

        self.log.emit(BuildEvent::ProjectFinished {
            project: project.name(),
            succeeded,
        });
        self.log.emit(BuildEvent::BuildFinished { succeeded });
        BuildSummary { succeeded, results }
    }

    /// Initial targets first, then the requested ones; stops at the first
    /// failure
    fn build_requested(
        &mut self,
        project: &mut Project,
        requested: &[String],
    ) -> BuildResult<Vec<(String, TargetResult)>> {
        let mut results = Vec::new();
        for name in project.initial_targets().iter().chain(requested) {
            let result = self.build_target(project, name)?;
            let failed = !result.succeeded;
            results.push((name.clone(), result));
            if failed {
                break;
            }
        }
        Ok(results)
    }

    /// Discard cached results and task outputs of `project` and evaluate it
    /// again
    pub fn reset_project(&mut self, project: &mut Project) -> BuildResult<()> {
        self.invalidate_project(project.path());
        project.reset()
    }
}
