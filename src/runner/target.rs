//! Building targets
//!
//! `build_target` walks one target through NotStarted -> Started -> Finished:
//! result cache, condition, dependencies, `before_targets` hooks, the body
//! (once per target-level bucket), `on_error` handlers, then `after_targets`
//! hooks. Failures of a target's own tasks are results, not errors; only
//! fatal errors propagate as `Err`.

use crate::batching::{batch, BatchOutcome, Bucket};
use crate::condition::evaluate_condition;
use crate::config::Target;
use crate::error::{BuildError, BuildResult, StructuralError};
use crate::events::{BuildEvent, EventOrigin, Importance};
use crate::expression::escape::unescape;
use crate::expression::eval::{expand_items, expand_string};
use crate::expression::reference::ParseOptions;
use crate::project::context::EvalContext;
use crate::project::definition::TargetDefinition;
use crate::project::item::TaskItem;
use crate::project::{split_names, Project};
use crate::runner::session::{CacheKey, Session, TargetResult, TargetState};
use crate::runner::task::TaskOutcome;
use crate::runner::uptodate;
use std::path::Path;

impl Session {
    /// Expression context over `project` with the active buckets
    pub(crate) fn context<'a>(&'a self, project: &'a Project, file: &'a Path) -> EvalContext<'a> {
        project
            .context()
            .with_buckets(self.buckets())
            .with_file(file)
    }

    pub(crate) fn emit_message(&self, project: &Project, target: &str, importance: Importance, text: String) {
        let origin = EventOrigin::project(project.name()).with_target(target);
        self.log.emit(BuildEvent::message(origin, importance, text));
    }

    /// Build one target and everything it requires
    pub fn build_target(&mut self, project: &mut Project, name: &str) -> BuildResult<TargetResult> {
        let definition = project
            .targets()
            .get(name)
            .cloned()
            .ok_or_else(|| StructuralError::TargetNotFound(name.to_string()))?;
        let target_name = definition.name().to_string();

        let key = CacheKey::new(project.path(), &target_name, project.global_snapshot());
        if let Some(result) = self.cached(&key).cloned() {
            self.emit_message(
                project,
                &target_name,
                Importance::Low,
                format!("Target \"{}\" skipped. Previously built {}.", target_name, outcome_word(&result)),
            );
            return Ok(result);
        }

        let run = {
            let ctx = self.context(project, &definition.file);
            evaluate_condition(definition.target.condition.as_deref(), ParseOptions::ITEMS, &ctx)?
        };
        if !run {
            self.emit_message(
                project,
                &target_name,
                Importance::Low,
                format!("Target \"{}\" skipped, due to false condition.", target_name),
            );
            return Ok(TargetResult::success(Vec::new()));
        }

        self.enter_target(project.path(), &target_name).map_err(BuildError::Cycle)?;
        let result = self.run_target(project, &definition, key);
        self.leave_target();
        result
    }

    fn run_target(
        &mut self,
        project: &mut Project,
        definition: &TargetDefinition,
        key: CacheKey,
    ) -> BuildResult<TargetResult> {
        let target = &definition.target;
        self.log.emit(BuildEvent::TargetStarted {
            project: project.name(),
            target: target.name.clone(),
        });

        let mut prerequisites = self.target_names(project, target.depends_on.as_deref(), &definition.file)?;
        prerequisites.extend(self.hooked_targets(project, &target.name, |t| t.before_targets.as_deref())?);
        for name in prerequisites {
            if !self.build_target(project, &name)?.succeeded {
                tracing::debug!(target = %target.name, dependency = %name, "dependency failed");
                return Ok(self.finish_target(project, definition, key, TargetResult::failure()));
            }
        }

        let (succeeded, outputs) = self.run_body(project, definition)?;
        if !succeeded {
            self.run_on_error(project, definition)?;
        }
        let result = if succeeded {
            TargetResult::success(outputs)
        } else {
            TargetResult::failure()
        };
        let result = self.finish_target(project, definition, key, result);

        if result.succeeded {
            for name in self.hooked_targets(project, &target.name, |t| t.after_targets.as_deref())? {
                if !self.build_target(project, &name)?.succeeded {
                    return Ok(TargetResult {
                        succeeded: false,
                        ..result
                    });
                }
            }
        }
        Ok(result)
    }

    fn finish_target(
        &mut self,
        project: &Project,
        definition: &TargetDefinition,
        key: CacheKey,
        result: TargetResult,
    ) -> TargetResult {
        self.set_state(project.path(), definition.name(), TargetState::Finished);
        self.remember(key, result.clone());
        self.log.emit(BuildEvent::TargetFinished {
            project: project.name(),
            target: definition.name().to_string(),
            succeeded: result.succeeded,
        });
        result
    }

    /// Run the body once per target-level bucket; returns success and the
    /// target's result items
    fn run_body(&mut self, project: &mut Project, definition: &TargetDefinition) -> BuildResult<(bool, Vec<TaskItem>)> {
        let target = &definition.target;
        let texts: Vec<&str> = [target.inputs.as_deref(), target.outputs.as_deref()]
            .into_iter()
            .flatten()
            .filter(|t| !t.trim().is_empty())
            .collect();

        let buckets: Vec<Option<Bucket>> = {
            let ctx = self.context(project, &definition.file);
            match batch(&texts, &ctx)? {
                BatchOutcome::NoBatching => vec![None],
                BatchOutcome::Buckets(buckets) => buckets.into_iter().map(Some).collect(),
            }
        };
        tracing::debug!(target = %target.name, buckets = buckets.len(), "running target body");

        let mut outputs = Vec::new();
        for bucket in buckets {
            let (succeeded, produced) =
                self.with_bucket(bucket, |session| session.run_bucket(project, definition))?;
            outputs.extend(produced);
            if !succeeded {
                return Ok((false, outputs));
            }
        }
        Ok((true, outputs))
    }

    fn run_bucket(&mut self, project: &mut Project, definition: &TargetDefinition) -> BuildResult<(bool, Vec<TaskItem>)> {
        let target = &definition.target;
        let decision = {
            let ctx = self.context(project, &definition.file);
            if !evaluate_condition(target.condition.as_deref(), ParseOptions::ALL, &ctx)? {
                return Ok((true, Vec::new()));
            }
            let inputs_text = target.inputs.as_deref().unwrap_or_default();
            let outputs_text = target.outputs.as_deref().unwrap_or_default();
            let inputs = resolve_files(inputs_text, &ctx)?;
            let outputs = resolve_files(outputs_text, &ctx)?;
            uptodate::check(inputs_text, outputs_text, &inputs, &outputs, ctx.fs)
        };

        if decision.is_up_to_date() {
            self.emit_message(
                project,
                &target.name,
                Importance::Normal,
                format!(
                    "Skipping target \"{}\" because all output files are up-to-date with respect to the input files.",
                    target.name
                ),
            );
            return Ok((true, self.bucket_outputs(project, definition)?));
        }
        if let uptodate::Decision::MustRun(reason) = &decision {
            tracing::debug!(target = %target.name, %reason, "target must run");
        }

        for task in &target.tasks {
            if self.run_task(project, definition, task)? == TaskOutcome::Failed {
                return Ok((false, Vec::new()));
            }
        }
        Ok((true, self.bucket_outputs(project, definition)?))
    }

    /// Items named by `returns` (or else `outputs`) in the current bucket
    fn bucket_outputs(&self, project: &Project, definition: &TargetDefinition) -> BuildResult<Vec<TaskItem>> {
        let target = &definition.target;
        match target.returns.as_deref().or(target.outputs.as_deref()) {
            Some(text) => {
                let ctx = self.context(project, &definition.file);
                expand_items(text, ParseOptions::ALL, &ctx)
            }
            None => Ok(Vec::new()),
        }
    }

    fn run_on_error(&mut self, project: &mut Project, definition: &TargetDefinition) -> BuildResult<()> {
        for handler in &definition.target.on_error {
            let names = {
                let ctx = self.context(project, &definition.file);
                if !evaluate_condition(handler.condition.as_deref(), ParseOptions::ITEMS, &ctx)? {
                    continue;
                }
                self.target_names(project, Some(&handler.execute_targets), &definition.file)?
            };
            for name in names {
                self.build_target(project, &name)?;
            }
        }
        Ok(())
    }

    /// Evaluate a `;` separated list of target names
    fn target_names(&self, project: &Project, text: Option<&str>, file: &Path) -> BuildResult<Vec<String>> {
        let Some(text) = text else {
            return Ok(Vec::new());
        };
        let ctx = self.context(project, file);
        let expanded = unescape(&expand_string(text, ParseOptions::PROPERTIES, &ctx)?);
        Ok(split_names(Some(&expanded)))
    }

    /// Targets whose `before_targets`/`after_targets` name `target`
    fn hooked_targets(
        &self,
        project: &Project,
        target: &str,
        hook: fn(&Target) -> Option<&str>,
    ) -> BuildResult<Vec<String>> {
        let mut hooked = Vec::new();
        for definition in project.targets().iter() {
            let names = self.target_names(project, hook(&definition.target), &definition.file)?;
            if names.iter().any(|n| n.eq_ignore_ascii_case(target)) {
                hooked.push(definition.name().to_string());
            }
        }
        Ok(hooked)
    }
}

fn outcome_word(result: &TargetResult) -> &'static str {
    if result.succeeded {
        "successfully"
    } else {
        "unsuccessfully"
    }
}

/// Evaluate an inputs/outputs attribute to file paths
fn resolve_files(text: &str, ctx: &EvalContext) -> BuildResult<Vec<std::path::PathBuf>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(expand_items(text, ParseOptions::ALL, ctx)?
        .iter()
        .map(|item| ctx.resolve_path(item.spec()))
        .collect())
}
