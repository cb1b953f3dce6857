//! Task parameter schemas and binding
//!
//! Every task declares a static list of [`ParameterSpec`]s. Binding walks the
//! invocation's `(name, expression)` pairs, looks each one up in the schema,
//! evaluates it and converts it to the declared [`ParameterKind`].

use crate::error::{BuildError, BuildResult, EvaluationError, StructuralError};
use crate::events::{BuildEvent, Diagnostic, EventLog, EventOrigin, Importance};
use crate::expression::coerce::{format_bool, to_bool, to_number};
use crate::expression::escape::{escape, unescape};
use crate::expression::eval::{expand_items, expand_string};
use crate::expression::reference::ParseOptions;
use crate::project::context::EvalContext;
use crate::project::fs::{resolve, FileSystem};
use crate::project::item::TaskItem;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    String,
    Bool,
    Int,
    /// A list of items; plain text entries become items without metadata
    Items,
}

impl ParameterKind {
    fn describe(self) -> &'static str {
        match self {
            ParameterKind::String => "a string",
            ParameterKind::Bool => "a boolean",
            ParameterKind::Int => "an integer",
            ParameterKind::Items => "an item list",
        }
    }
}

/// One declared task parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub kind: ParameterKind,
    pub required: bool,
    pub input: bool,
    pub output: bool,
}

impl ParameterSpec {
    pub const fn input(name: &'static str, kind: ParameterKind) -> Self {
        ParameterSpec {
            name,
            kind,
            required: false,
            input: true,
            output: false,
        }
    }

    pub const fn required(name: &'static str, kind: ParameterKind) -> Self {
        ParameterSpec {
            required: true,
            ..Self::input(name, kind)
        }
    }

    /// Output-only parameter
    pub const fn output(name: &'static str, kind: ParameterKind) -> Self {
        ParameterSpec {
            name,
            kind,
            required: false,
            input: false,
            output: true,
        }
    }

    /// Mark an input parameter as also readable after execution
    pub const fn and_output(self) -> Self {
        ParameterSpec {
            output: true,
            ..self
        }
    }
}

/// A converted parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    String(String),
    Bool(bool),
    Int(i64),
    Items(Vec<TaskItem>),
}

impl ParameterValue {
    /// Text form, used when an output is bound to a property.
    ///
    /// The result is escaped.
    pub fn to_property_value(&self) -> String {
        match self {
            ParameterValue::String(s) => escape(s),
            ParameterValue::Bool(b) => format_bool(*b),
            ParameterValue::Int(n) => n.to_string(),
            ParameterValue::Items(items) => items
                .iter()
                .map(TaskItem::spec)
                .collect::<Vec<_>>()
                .join(";"),
        }
    }

    /// Item form, used when an output is bound to an item type
    pub fn to_items(&self) -> Vec<TaskItem> {
        match self {
            ParameterValue::Items(items) => items.clone(),
            ParameterValue::String(s) => s
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(TaskItem::from_unescaped)
                .collect(),
            other => vec![TaskItem::new(other.to_property_value())],
        }
    }
}

/// Named parameter values, in binding order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterValues {
    values: Vec<(&'static str, ParameterValue)>,
}

impl ParameterValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &'static str, value: ParameterValue) {
        match self.values.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some(existing) => existing.1 = value,
            None => self.values.push((name, value)),
        }
    }

    pub fn with(mut self, name: &'static str, value: ParameterValue) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(ParameterValue::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn bool(&self, name: &str) -> bool {
        matches!(self.get(name), Some(ParameterValue::Bool(true)))
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(ParameterValue::Int(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn items(&self, name: &str) -> &[TaskItem] {
        match self.get(name) {
            Some(ParameterValue::Items(items)) => items,
            _ => &[],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ParameterValue)> {
        self.values.iter().map(|(n, v)| (*n, v))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// What a running task can reach: logging, the project directory and the
/// file system
pub struct TaskHost<'h> {
    pub project_dir: &'h Path,
    pub fs: &'h dyn FileSystem,
    pub origin: EventOrigin,
    /// Project file that declared the task
    pub file: Option<&'h Path>,
    log: &'h EventLog,
    logged_error: bool,
}

impl<'h> TaskHost<'h> {
    pub fn new(project_dir: &'h Path, fs: &'h dyn FileSystem, log: &'h EventLog, origin: EventOrigin) -> Self {
        TaskHost {
            project_dir,
            fs,
            origin,
            file: None,
            log,
            logged_error: false,
        }
    }

    pub fn with_file(mut self, file: &'h Path) -> Self {
        self.file = Some(file);
        self
    }

    pub fn message(&self, importance: Importance, text: impl Into<String>) {
        self.log
            .emit(BuildEvent::message(self.origin.clone(), importance, text));
    }

    pub fn warning(&self, diagnostic: Diagnostic) {
        self.log.emit(BuildEvent::Warning(diagnostic));
    }

    pub fn error(&mut self, diagnostic: Diagnostic) {
        self.logged_error = true;
        self.log.emit(BuildEvent::Error(diagnostic));
    }

    /// Did the task report its own error event?
    pub fn has_logged_error(&self) -> bool {
        self.logged_error
    }

    /// A diagnostic carrying this task's origin and file
    pub fn diagnostic(&self, message: impl Into<String>) -> Diagnostic {
        let diagnostic = Diagnostic::new(self.origin.clone(), message);
        match self.file {
            Some(file) => diagnostic.with_file(file),
            None => diagnostic,
        }
    }

    /// Resolve a task path argument against the project directory
    pub fn resolve(&self, path: &str) -> PathBuf {
        resolve(self.project_dir, path)
    }

    /// A task failure for the running task
    pub fn fail(&self, message: impl Into<String>) -> BuildError {
        BuildError::TaskExecution {
            task: self.origin.task.clone().unwrap_or_default(),
            message: message.into(),
        }
    }
}

/// A task type: a schema plus an action over bound values
pub trait Task {
    fn name(&self) -> &'static str;

    fn parameters(&self) -> &'static [ParameterSpec];

    /// Run with bound inputs; returns output parameter values
    fn execute(&self, inputs: &ParameterValues, host: &mut TaskHost) -> BuildResult<ParameterValues>;

    fn parameter(&self, name: &str) -> Option<&'static ParameterSpec> {
        self.parameters()
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

/// Options for task parameter expressions: everything, no splitting
const PARAMETER_OPTIONS: ParseOptions = ParseOptions::ALL;

/// Evaluate and convert an invocation's parameters against a task schema
pub fn bind_parameters(
    task: &dyn Task,
    parameters: &[(String, String)],
    ctx: &EvalContext,
) -> BuildResult<ParameterValues> {
    let mut values = ParameterValues::new();
    for (name, raw) in parameters {
        let spec = task
            .parameter(name)
            .filter(|spec| spec.input)
            .ok_or_else(|| StructuralError::UnknownParameter {
                task: task.name().to_string(),
                parameter: name.clone(),
            })?;
        if let Some(value) = convert(task.name(), spec, raw, ctx)? {
            values.set(spec.name, value);
        }
    }

    for spec in task.parameters().iter().filter(|p| p.required) {
        if values.get(spec.name).is_none() {
            return Err(StructuralError::MissingRequiredParameter {
                task: task.name().to_string(),
                parameter: spec.name.to_string(),
            }
            .into());
        }
    }
    Ok(values)
}

/// `None` when the expression evaluates to nothing
fn convert(
    task: &str,
    spec: &ParameterSpec,
    raw: &str,
    ctx: &EvalContext,
) -> BuildResult<Option<ParameterValue>> {
    if spec.kind == ParameterKind::Items {
        let items = expand_items(raw, PARAMETER_OPTIONS, ctx)?;
        return Ok((!items.is_empty()).then_some(ParameterValue::Items(items)));
    }

    let text = unescape(&expand_string(raw, PARAMETER_OPTIONS.with_split(false), ctx)?);
    if text.trim().is_empty() {
        return Ok(None);
    }
    let invalid = || -> BuildError {
        EvaluationError::InvalidParameterValue {
            task: task.to_string(),
            parameter: spec.name.to_string(),
            expected: spec.kind.describe(),
            value: text.clone(),
        }
        .into()
    };
    let value = match spec.kind {
        ParameterKind::Bool => ParameterValue::Bool(to_bool(&text).ok_or_else(invalid)?),
        ParameterKind::Int => {
            let n = to_number(&text).filter(|n| n.fract() == 0.0).ok_or_else(invalid)?;
            ParameterValue::Int(n as i64)
        }
        _ => ParameterValue::String(text.clone()),
    };
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::fs::DiskFileSystem;
    use crate::project::item::{ItemStore, NewItem};
    use crate::project::property::{Property, PropertyKind, PropertyTable};

    struct Probe;

    const PROBE_PARAMETERS: &[ParameterSpec] = &[
        ParameterSpec::required("Files", ParameterKind::Items),
        ParameterSpec::input("Retries", ParameterKind::Int),
        ParameterSpec::input("Force", ParameterKind::Bool),
        ParameterSpec::input("Label", ParameterKind::String).and_output(),
        ParameterSpec::output("Count", ParameterKind::Int),
    ];

    impl Task for Probe {
        fn name(&self) -> &'static str {
            "Probe"
        }

        fn parameters(&self) -> &'static [ParameterSpec] {
            PROBE_PARAMETERS
        }

        fn execute(&self, inputs: &ParameterValues, _host: &mut TaskHost) -> BuildResult<ParameterValues> {
            Ok(ParameterValues::new().with("Count", ParameterValue::Int(inputs.items("Files").len() as i64)))
        }
    }

    fn bind(parameters: &[(&str, &str)]) -> BuildResult<ParameterValues> {
        let mut properties = PropertyTable::new();
        properties
            .set(Property::new("Tries", "3", PropertyKind::Normal))
            .unwrap();
        let mut items = ItemStore::new();
        let group = items.new_group();
        for spec in ["a.cs", "b.cs"] {
            items.add(
                group,
                NewItem {
                    item_type: "Compile".to_string(),
                    spec: spec.to_string(),
                    ..NewItem::default()
                },
            );
        }
        let ctx = EvalContext::new(&properties, &items, Path::new("/p"), &DiskFileSystem);
        let parameters: Vec<(String, String)> = parameters
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect();
        bind_parameters(&Probe, &parameters, &ctx)
    }

    #[test]
    fn test_bind_converts_kinds() {
        let values = bind(&[
            ("files", "@(Compile);extra.txt"),
            ("Retries", "$(Tries)"),
            ("Force", "yes"),
            ("Label", "it%3bs"),
        ])
        .unwrap();
        assert_eq!(values.items("Files").len(), 3);
        assert_eq!(values.int("Retries"), Some(3));
        assert!(values.bool("Force"));
        assert_eq!(values.string("Label"), Some("it;s"));
    }

    #[test]
    fn test_missing_required_parameter() {
        let err = bind(&[("Files", "@(Nothing)")]).unwrap_err();
        assert!(matches!(
            err,
            BuildError::Structural(StructuralError::MissingRequiredParameter { .. })
        ));
    }

    #[test]
    fn test_unknown_and_output_only_parameters() {
        let err = bind(&[("Files", "a"), ("Bogus", "1")]).unwrap_err();
        assert!(matches!(
            err,
            BuildError::Structural(StructuralError::UnknownParameter { .. })
        ));
        let err = bind(&[("Files", "a"), ("Count", "1")]).unwrap_err();
        assert!(matches!(
            err,
            BuildError::Structural(StructuralError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn test_invalid_value() {
        let err = bind(&[("Files", "a"), ("Force", "maybe")]).unwrap_err();
        assert!(matches!(
            err,
            BuildError::Evaluation(EvaluationError::InvalidParameterValue { .. })
        ));
    }

    #[test]
    fn test_output_value_forms() {
        let items = ParameterValue::Items(vec![TaskItem::new("a.cs"), TaskItem::new("b.cs")]);
        assert_eq!(items.to_property_value(), "a.cs;b.cs");
        assert_eq!(ParameterValue::Bool(true).to_property_value(), "True");
        assert_eq!(ParameterValue::String("x;y".to_string()).to_items().len(), 2);
    }
}
