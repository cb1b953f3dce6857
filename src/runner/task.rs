//! Running one task invocation inside a target

use crate::batching::{batch, BatchOutcome, Bucket};
use crate::condition::evaluate_condition;
use crate::config::{OutputBinding, TaskElement};
use crate::error::{BuildResult, StructuralError};
use crate::events::{BuildEvent, Diagnostic, EventOrigin};
use crate::expression::reference::ParseOptions;
use crate::project::definition::TargetDefinition;
use crate::project::property::{Property, PropertyKind};
use crate::project::Project;
use crate::runner::session::Session;
use crate::tasks::{bind_parameters, ParameterValue, ParameterValues, Task, TaskHost};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    /// Failed with `continue_on_error`; reported as a warning
    ContinuedAfterError,
    /// Failed; the target stops running tasks
    Failed,
}

impl Session {
    /// Run a task once per task-level bucket
    pub(crate) fn run_task(
        &mut self,
        project: &mut Project,
        definition: &TargetDefinition,
        task: &TaskElement,
    ) -> BuildResult<TaskOutcome> {
        let implementation = self
            .registry
            .get(&task.name)
            .ok_or_else(|| StructuralError::UnknownTask(task.name.clone()))?;
        for binding in &task.outputs {
            let known = implementation
                .parameter(&binding.task_parameter)
                .is_some_and(|spec| spec.output);
            if !known {
                return Err(StructuralError::UnknownOutputParameter {
                    task: task.name.clone(),
                    parameter: binding.task_parameter.clone(),
                }
                .into());
            }
        }

        let mut texts: Vec<&str> = task.parameters.iter().map(|p| p.value.as_str()).collect();
        if let Some(condition) = &task.condition {
            texts.push(condition);
        }
        let buckets: Vec<Option<Bucket>> = {
            let ctx = self.context(project, &definition.file);
            match batch(&texts, &ctx)? {
                BatchOutcome::NoBatching => vec![None],
                BatchOutcome::Buckets(buckets) => buckets.into_iter().map(Some).collect(),
            }
        };

        let mut outcome = TaskOutcome::Succeeded;
        for bucket in buckets {
            let result = self.with_bucket(bucket, |session| {
                session.run_task_bucket(project, definition, task, &implementation)
            })?;
            match result {
                TaskOutcome::Failed => return Ok(TaskOutcome::Failed),
                TaskOutcome::ContinuedAfterError => outcome = TaskOutcome::ContinuedAfterError,
                TaskOutcome::Succeeded => {}
            }
        }
        Ok(outcome)
    }

    fn run_task_bucket(
        &mut self,
        project: &mut Project,
        definition: &TargetDefinition,
        task: &TaskElement,
        implementation: &Rc<dyn Task>,
    ) -> BuildResult<TaskOutcome> {
        let inputs = {
            let ctx = self.context(project, &definition.file);
            if !evaluate_condition(task.condition.as_deref(), ParseOptions::ALL, &ctx)? {
                tracing::debug!(task = %task.name, "task skipped, condition is false");
                return Ok(TaskOutcome::Succeeded);
            }
            let parameters: Vec<(String, String)> = task
                .parameters
                .iter()
                .map(|p| (p.name.clone(), p.value.clone()))
                .collect();
            bind_parameters(implementation.as_ref(), &parameters, &ctx)?
        };

        let project_name = project.name();
        let target_name = definition.name().to_string();
        let origin = EventOrigin::project(project_name.clone())
            .with_target(target_name.clone())
            .with_task(task.name.clone());
        self.log.emit(BuildEvent::TaskStarted {
            project: project_name.clone(),
            target: target_name.clone(),
            task: task.name.clone(),
        });

        let (result, logged_error) = {
            let mut host = TaskHost::new(project.directory(), project.file_system(), &self.log, origin.clone())
                .with_file(&definition.file);
            let result = implementation.execute(&inputs, &mut host);
            (result, host.has_logged_error())
        };

        let finished = |succeeded: bool| BuildEvent::TaskFinished {
            project: project_name.clone(),
            target: target_name.clone(),
            task: task.name.clone(),
            succeeded,
        };

        match result {
            Ok(outputs) => {
                self.apply_outputs(project, definition, task, &inputs, &outputs)?;
                self.log.emit(finished(true));
                Ok(TaskOutcome::Succeeded)
            }
            Err(err) if err.is_fatal() => {
                self.log.emit(finished(false));
                Err(err)
            }
            Err(err) => {
                let diagnostic = Diagnostic::new(origin, err.to_string())
                    .with_code(err.code())
                    .with_file(&definition.file);
                let outcome = if task.continue_on_error {
                    self.log.emit(BuildEvent::Warning(diagnostic));
                    TaskOutcome::ContinuedAfterError
                } else {
                    if !logged_error {
                        self.log.emit(BuildEvent::Error(diagnostic));
                    }
                    TaskOutcome::Failed
                };
                self.log.emit(finished(false));
                Ok(outcome)
            }
        }
    }

    /// Copy output parameter values into properties and items
    fn apply_outputs(
        &mut self,
        project: &mut Project,
        definition: &TargetDefinition,
        task: &TaskElement,
        inputs: &ParameterValues,
        outputs: &ParameterValues,
    ) -> BuildResult<()> {
        for binding in &task.outputs {
            let applies = {
                let ctx = self.context(project, &definition.file);
                evaluate_condition(binding.condition.as_deref(), ParseOptions::ALL, &ctx)?
            };
            if !applies {
                continue;
            }
            let Some(value) = outputs
                .get(&binding.task_parameter)
                .or_else(|| inputs.get(&binding.task_parameter))
            else {
                continue;
            };
            self.bind_output(project, binding, value)?;
        }
        Ok(())
    }

    fn bind_output(
        &mut self,
        project: &mut Project,
        binding: &OutputBinding,
        value: &ParameterValue,
    ) -> BuildResult<()> {
        if let Some(name) = &binding.property_name {
            let value = value.to_property_value();
            tracing::debug!(property = %name, %value, "task output to property");
            project
                .properties_mut()
                .set(Property::new(name.clone(), value, PropertyKind::Normal))?;
        }
        if let Some(item_type) = &binding.item_name {
            let items: Vec<_> = value
                .to_items()
                .into_iter()
                .map(|item| item.with_type(item_type.clone()))
                .collect();
            tracing::debug!(item_type = %item_type, count = items.len(), "task output to items");
            project.item_store_mut().add_task_items(item_type, &items);
            for bucket in self.buckets_mut() {
                bucket.append_items(item_type, &items);
            }
        }
        Ok(())
    }
}
