//! The evaluation model: properties, items and targets of one project
//!
//! A [`Project`] owns the flattened project description and the result of
//! evaluating it. Evaluation is repeatable: [`Project::reset`] discards task
//! outputs and evaluates again from the description.

pub mod context;
pub mod definition;
pub mod evaluate;
pub mod fs;
pub mod item;
pub mod metadata;
pub mod property;

use crate::config::{parse_project_file, validate_name, validate_project, ProjectDefinition};
use crate::error::{BuildResult, RbuildError};
use crate::expression::escape::{escape, unescape};
use context::EvalContext;
use definition::{ItemDefinitions, TargetTable};
use evaluate::Evaluator;
use fs::{DiskFileSystem, FileSystem};
use item::{ItemStore, TaskItem};
use property::{Property, PropertyKind, PropertyTable};
use std::path::{Path, PathBuf};

/// Name of the optional environment file next to the project file
pub const ENV_FILE_NAME: &str = ".env";

pub struct Project {
    definition: ProjectDefinition,
    directory: PathBuf,
    global_properties: Vec<(String, String)>,
    environment: Vec<(String, String)>,
    fs: Box<dyn FileSystem>,
    properties: PropertyTable,
    items: ItemStore,
    item_definitions: ItemDefinitions,
    targets: TargetTable,
}

impl Project {
    /// Wrap a parsed definition; call [`Project::evaluate`] before use
    pub fn new(definition: ProjectDefinition) -> Self {
        let directory = definition
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let targets = TargetTable::from_definition(&definition);
        Project {
            definition,
            directory,
            global_properties: Vec::new(),
            environment: Vec::new(),
            fs: Box::new(DiskFileSystem),
            properties: PropertyTable::new(),
            items: ItemStore::new(),
            item_definitions: ItemDefinitions::default(),
            targets,
        }
    }

    /// Load, validate and evaluate a project file.
    ///
    /// Environment properties come from the process environment and, for
    /// names it does not define, from a `.env` file beside the project.
    pub fn load(path: &Path, global_properties: Vec<(String, String)>) -> Result<Self, RbuildError> {
        let definition = parse_project_file(path)?;
        validate_project(&definition)?;

        let mut project = Project::new(definition)
            .with_environment(std::env::vars())
            .with_global_properties(global_properties);

        let env_file = project.directory.join(ENV_FILE_NAME);
        if env_file.is_file() {
            project.load_env_file(&env_file);
        }

        project.evaluate()?;
        Ok(project)
    }

    fn load_env_file(&mut self, path: &Path) {
        let entries = match dotenvy::from_path_iter(path) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(file = %path.display(), error = %err, "failed to read environment file");
                return;
            }
        };
        for entry in entries {
            match entry {
                Ok((name, value)) => {
                    if !self.environment.iter().any(|(n, _)| n.eq_ignore_ascii_case(&name)) {
                        self.environment.push((name, value));
                    }
                }
                Err(err) => {
                    tracing::warn!(file = %path.display(), error = %err, "skipping environment entry")
                }
            }
        }
    }

    pub fn with_global_properties(mut self, properties: Vec<(String, String)>) -> Self {
        self.global_properties = properties;
        self
    }

    pub fn with_environment(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.environment = vars.into_iter().collect();
        self
    }

    pub fn with_file_system(mut self, fs: Box<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    /// Run the property, item-definition and item passes
    pub fn evaluate(&mut self) -> BuildResult<()> {
        let base = self.initial_properties()?;
        let (properties, items, item_definitions) =
            Evaluator::new(&self.directory, self.fs.as_ref(), base)
                .run(&self.definition.elements)?
                .into_parts();
        self.properties = properties;
        self.items = items;
        self.item_definitions = item_definitions;
        self.targets = TargetTable::from_definition(&self.definition);
        tracing::info!(
            project = %self.definition.path.display(),
            properties = self.properties.len(),
            targets = self.targets.len(),
            "evaluated project"
        );
        Ok(())
    }

    /// Discard task outputs and evaluate again
    pub fn reset(&mut self) -> BuildResult<()> {
        self.evaluate()
    }

    fn initial_properties(&self) -> BuildResult<PropertyTable> {
        let mut table = PropertyTable::new();
        for (name, value) in &self.environment {
            if validate_name("property", name).is_err() {
                continue;
            }
            table.set(Property::new(name.clone(), escape(value), PropertyKind::Environment))?;
        }
        for (name, value) in &self.global_properties {
            table.set(Property::new(name.clone(), escape(value), PropertyKind::Global))?;
        }
        for (name, value) in self.reserved_properties() {
            table.set(Property::new(name, escape(&value), PropertyKind::Reserved))?;
        }
        Ok(table)
    }

    fn reserved_properties(&self) -> Vec<(&'static str, String)> {
        let path = &self.definition.path;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        vec![
            ("ProjectDirectory", self.directory.to_string_lossy().into_owned()),
            ("ProjectFile", file_name),
            ("ProjectFullPath", path.to_string_lossy().into_owned()),
            ("ProjectName", self.definition.name.clone().unwrap_or(stem)),
            ("ProjectExtension", extension),
            (
                "ProjectDefaultTargets",
                self.definition.default_targets.clone().unwrap_or_default(),
            ),
        ]
    }

    /// Unescaped property value
    pub fn property(&self, name: &str) -> Option<String> {
        self.properties.value(name).map(unescape)
    }

    pub fn properties(&self) -> &PropertyTable {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut PropertyTable {
        &mut self.properties
    }

    /// Evaluated items of one type, in definition order
    pub fn items(&self, item_type: &str) -> Vec<TaskItem> {
        self.items.task_items(item_type)
    }

    pub fn item_store(&self) -> &ItemStore {
        &self.items
    }

    pub fn item_store_mut(&mut self) -> &mut ItemStore {
        &mut self.items
    }

    pub fn item_definitions(&self) -> &ItemDefinitions {
        &self.item_definitions
    }

    pub fn targets(&self) -> &TargetTable {
        &self.targets
    }

    /// Targets to build when none are requested
    pub fn default_targets(&self) -> Vec<String> {
        let declared = split_names(self.definition.default_targets.as_deref());
        if !declared.is_empty() {
            return declared;
        }
        self.targets
            .first()
            .map(|t| vec![t.name().to_string()])
            .unwrap_or_default()
    }

    pub fn initial_targets(&self) -> Vec<String> {
        split_names(self.definition.initial_targets.as_deref())
    }

    /// A fresh expression context over the current state
    pub fn context(&self) -> EvalContext<'_> {
        EvalContext::new(&self.properties, &self.items, &self.directory, self.fs.as_ref())
    }

    pub fn file_system(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    pub fn path(&self) -> &Path {
        &self.definition.path
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn name(&self) -> String {
        self.property("ProjectName").unwrap_or_default()
    }

    /// Stable rendering of the global properties, part of the result cache key
    pub fn global_snapshot(&self) -> String {
        self.properties.global_snapshot()
    }
}

/// Split a `;` separated list of target names
pub fn split_names(text: Option<&str>) -> Vec<String> {
    text.unwrap_or_default()
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
