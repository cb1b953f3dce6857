//! Built-in tasks

use crate::error::BuildResult;
use crate::events::{Diagnostic, Importance};
use crate::expression::escape::has_wildcard;
use crate::project::item::TaskItem;
use crate::tasks::schema::{ParameterKind, ParameterSpec, ParameterValue, ParameterValues, Task, TaskHost};
use std::fs;
use std::path::Path;
use std::process::{Command as StdCommand, Stdio};
use std::time::SystemTime;

/// Logs a message
pub struct Message;

const MESSAGE_PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::input("Text", ParameterKind::String),
    ParameterSpec::input("Importance", ParameterKind::String),
];

impl Task for Message {
    fn name(&self) -> &'static str {
        "Message"
    }

    fn parameters(&self) -> &'static [ParameterSpec] {
        MESSAGE_PARAMETERS
    }

    fn execute(&self, inputs: &ParameterValues, host: &mut TaskHost) -> BuildResult<ParameterValues> {
        let importance = match inputs.string("Importance") {
            Some(text) => text.parse::<Importance>().map_err(|e| host.fail(e))?,
            None => Importance::Normal,
        };
        host.message(importance, inputs.string("Text").unwrap_or_default());
        Ok(ParameterValues::new())
    }
}

const DIAGNOSTIC_PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::input("Text", ParameterKind::String),
    ParameterSpec::input("Code", ParameterKind::String),
    ParameterSpec::input("File", ParameterKind::String),
    ParameterSpec::input("LineNumber", ParameterKind::Int),
    ParameterSpec::input("ColumnNumber", ParameterKind::Int),
];

fn diagnostic(inputs: &ParameterValues, host: &TaskHost) -> Diagnostic {
    let mut diagnostic = host.diagnostic(inputs.string("Text").unwrap_or_default());
    if let Some(code) = inputs.string("Code") {
        diagnostic = diagnostic.with_code(code);
    }
    if let Some(file) = inputs.string("File") {
        diagnostic = diagnostic.with_file(file);
    }
    let line = inputs.int("LineNumber").and_then(|n| u32::try_from(n).ok());
    let column = inputs.int("ColumnNumber").and_then(|n| u32::try_from(n).ok());
    if line.is_some() {
        diagnostic = diagnostic.with_location(line, column);
    }
    diagnostic
}

/// Logs a warning and succeeds
pub struct Warning;

impl Task for Warning {
    fn name(&self) -> &'static str {
        "Warning"
    }

    fn parameters(&self) -> &'static [ParameterSpec] {
        DIAGNOSTIC_PARAMETERS
    }

    fn execute(&self, inputs: &ParameterValues, host: &mut TaskHost) -> BuildResult<ParameterValues> {
        host.warning(diagnostic(inputs, host));
        Ok(ParameterValues::new())
    }
}

/// Logs an error and fails
pub struct Error;

impl Task for Error {
    fn name(&self) -> &'static str {
        "Error"
    }

    fn parameters(&self) -> &'static [ParameterSpec] {
        DIAGNOSTIC_PARAMETERS
    }

    fn execute(&self, inputs: &ParameterValues, host: &mut TaskHost) -> BuildResult<ParameterValues> {
        let diagnostic = diagnostic(inputs, host);
        let message = diagnostic.message.clone();
        host.error(diagnostic);
        Err(host.fail(message))
    }
}

/// Passes its input through, for binding to a property
pub struct CreateProperty;

const CREATE_PROPERTY_PARAMETERS: &[ParameterSpec] =
    &[ParameterSpec::input("Value", ParameterKind::String).and_output()];

impl Task for CreateProperty {
    fn name(&self) -> &'static str {
        "CreateProperty"
    }

    fn parameters(&self) -> &'static [ParameterSpec] {
        CREATE_PROPERTY_PARAMETERS
    }

    fn execute(&self, inputs: &ParameterValues, _host: &mut TaskHost) -> BuildResult<ParameterValues> {
        let value = inputs.string("Value").unwrap_or_default().to_string();
        Ok(ParameterValues::new().with("Value", ParameterValue::String(value)))
    }
}

/// Builds an item list from includes, wildcards and extra metadata
pub struct CreateItem;

const CREATE_ITEM_PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::required("Include", ParameterKind::Items).and_output(),
    ParameterSpec::input("Exclude", ParameterKind::Items),
    ParameterSpec::input("AdditionalMetadata", ParameterKind::String),
];

impl Task for CreateItem {
    fn name(&self) -> &'static str {
        "CreateItem"
    }

    fn parameters(&self) -> &'static [ParameterSpec] {
        CREATE_ITEM_PARAMETERS
    }

    fn execute(&self, inputs: &ParameterValues, host: &mut TaskHost) -> BuildResult<ParameterValues> {
        let mut items = Vec::new();
        for item in inputs.items("Include") {
            if item.item_type().is_empty() && has_wildcard(item.spec()) {
                for matched in host.fs.expand_wildcard(host.project_dir, &item.item_spec()) {
                    items.push(TaskItem::from_unescaped(&matched.path).with_recursive_dir(matched.recursive_dir));
                }
            } else {
                items.push(item.clone());
            }
        }

        let excluded: Vec<String> = inputs.items("Exclude").iter().map(TaskItem::item_spec).collect();
        items.retain(|item| !excluded.iter().any(|e| e.eq_ignore_ascii_case(&item.item_spec())));

        if let Some(extra) = inputs.string("AdditionalMetadata") {
            for pair in extra.split(';').map(str::trim).filter(|p| !p.is_empty()) {
                let (name, value) = pair
                    .split_once('=')
                    .ok_or_else(|| host.fail(format!("invalid metadata '{}', expected Name=Value", pair)))?;
                for item in &mut items {
                    item.set_metadata(name.trim(), value.trim())?;
                }
            }
        }

        Ok(ParameterValues::new().with("Include", ParameterValue::Items(items)))
    }
}

/// Runs a shell command
pub struct Exec;

const EXEC_PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::required("Command", ParameterKind::String),
    ParameterSpec::input("WorkingDirectory", ParameterKind::String),
    ParameterSpec::input("IgnoreExitCode", ParameterKind::Bool),
    ParameterSpec::output("ExitCode", ParameterKind::Int),
];

impl Task for Exec {
    fn name(&self) -> &'static str {
        "Exec"
    }

    fn parameters(&self) -> &'static [ParameterSpec] {
        EXEC_PARAMETERS
    }

    fn execute(&self, inputs: &ParameterValues, host: &mut TaskHost) -> BuildResult<ParameterValues> {
        let command_text = inputs.string("Command").unwrap_or_default();
        host.message(Importance::Normal, command_text);

        let working_dir = match inputs.string("WorkingDirectory") {
            Some(dir) => host.resolve(dir),
            None => host.project_dir.to_path_buf(),
        };

        let mut command = StdCommand::new("sh");
        command.arg("-c");
        command.arg(command_text);
        command.current_dir(&working_dir);
        command.stdin(Stdio::inherit());
        command.stdout(Stdio::inherit());
        command.stderr(Stdio::inherit());

        let status = command
            .status()
            .map_err(|e| host.fail(format!("failed to start command: {}", e)))?;
        let code = status.code().unwrap_or(-1);

        if !status.success() && !inputs.bool("IgnoreExitCode") {
            return Err(host.fail(format!(
                "command \"{}\" exited with code {}",
                command_text, code
            )));
        }
        Ok(ParameterValues::new().with("ExitCode", ParameterValue::Int(i64::from(code))))
    }
}

/// Updates file timestamps, optionally creating missing files
pub struct Touch;

const TOUCH_PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::required("Files", ParameterKind::Items),
    ParameterSpec::input("AlwaysCreate", ParameterKind::Bool),
    ParameterSpec::output("TouchedFiles", ParameterKind::Items),
];

impl Task for Touch {
    fn name(&self) -> &'static str {
        "Touch"
    }

    fn parameters(&self) -> &'static [ParameterSpec] {
        TOUCH_PARAMETERS
    }

    fn execute(&self, inputs: &ParameterValues, host: &mut TaskHost) -> BuildResult<ParameterValues> {
        let mut touched = Vec::new();
        for item in inputs.items("Files") {
            let path = host.resolve(&item.item_spec());
            if !path.exists() && !inputs.bool("AlwaysCreate") {
                return Err(host.fail(format!("file '{}' does not exist", path.display())));
            }
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .and_then(|f| f.set_modified(SystemTime::now()).map(|_| f));
            if let Err(e) = file {
                return Err(host.fail(format!("cannot touch '{}': {}", path.display(), e)));
            }
            host.message(Importance::Low, format!("Touching \"{}\"", path.display()));
            touched.push(item.clone());
        }
        Ok(ParameterValues::new().with("TouchedFiles", ParameterValue::Items(touched)))
    }
}

/// Creates directories
pub struct MakeDir;

const MAKE_DIR_PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::required("Directories", ParameterKind::Items),
    ParameterSpec::output("DirectoriesCreated", ParameterKind::Items),
];

impl Task for MakeDir {
    fn name(&self) -> &'static str {
        "MakeDir"
    }

    fn parameters(&self) -> &'static [ParameterSpec] {
        MAKE_DIR_PARAMETERS
    }

    fn execute(&self, inputs: &ParameterValues, host: &mut TaskHost) -> BuildResult<ParameterValues> {
        let mut created = Vec::new();
        for item in inputs.items("Directories") {
            let path = host.resolve(&item.item_spec());
            if path.is_dir() {
                continue;
            }
            fs::create_dir_all(&path)
                .map_err(|e| host.fail(format!("cannot create '{}': {}", path.display(), e)))?;
            host.message(Importance::Low, format!("Creating directory \"{}\"", path.display()));
            created.push(item.clone());
        }
        Ok(ParameterValues::new().with("DirectoriesCreated", ParameterValue::Items(created)))
    }
}

/// Copies files to a folder or to matching destination paths
pub struct Copy;

const COPY_PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::required("SourceFiles", ParameterKind::Items),
    ParameterSpec::input("DestinationFiles", ParameterKind::Items),
    ParameterSpec::input("DestinationFolder", ParameterKind::String),
    ParameterSpec::input("SkipUnchangedFiles", ParameterKind::Bool),
    ParameterSpec::output("CopiedFiles", ParameterKind::Items),
];

impl Task for Copy {
    fn name(&self) -> &'static str {
        "Copy"
    }

    fn parameters(&self) -> &'static [ParameterSpec] {
        COPY_PARAMETERS
    }

    fn execute(&self, inputs: &ParameterValues, host: &mut TaskHost) -> BuildResult<ParameterValues> {
        let sources = inputs.items("SourceFiles");
        let destinations: Vec<TaskItem> = match (inputs.items("DestinationFiles"), inputs.string("DestinationFolder")) {
            (files, None) if !files.is_empty() => {
                if files.len() != sources.len() {
                    return Err(host.fail(format!(
                        "{} source files but {} destination files",
                        sources.len(),
                        files.len()
                    )));
                }
                files.to_vec()
            }
            (files, Some(folder)) if files.is_empty() => sources
                .iter()
                .map(|source| {
                    let name = Path::new(&source.item_spec())
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    let dest = Path::new(folder).join(name);
                    TaskItem::from_unescaped(&dest.to_string_lossy())
                })
                .collect(),
            _ => {
                return Err(host.fail(
                    "exactly one of DestinationFiles or DestinationFolder is required",
                ))
            }
        };

        let mut copied = Vec::new();
        for (source, destination) in sources.iter().zip(destinations) {
            let from = host.resolve(&source.item_spec());
            let to = host.resolve(&destination.item_spec());
            if inputs.bool("SkipUnchangedFiles") && unchanged(&from, &to) {
                host.message(
                    Importance::Low,
                    format!("Skipping unchanged file \"{}\"", to.display()),
                );
                continue;
            }
            if let Some(parent) = to.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| host.fail(format!("cannot create '{}': {}", parent.display(), e)))?;
            }
            fs::copy(&from, &to).map_err(|e| {
                host.fail(format!("cannot copy '{}' to '{}': {}", from.display(), to.display(), e))
            })?;
            host.message(
                Importance::Normal,
                format!("Copying \"{}\" to \"{}\"", from.display(), to.display()),
            );
            copied.push(destination.with_metadata_table(source.metadata().clone()));
        }
        Ok(ParameterValues::new().with("CopiedFiles", ParameterValue::Items(copied)))
    }
}

/// Same size and timestamp
fn unchanged(from: &Path, to: &Path) -> bool {
    match (fs::metadata(from), fs::metadata(to)) {
        (Ok(a), Ok(b)) => {
            a.len() == b.len() && a.modified().ok().is_some() && a.modified().ok() == b.modified().ok()
        }
        _ => false,
    }
}

/// Deletes files
pub struct Delete;

const DELETE_PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::required("Files", ParameterKind::Items),
    ParameterSpec::output("DeletedFiles", ParameterKind::Items),
];

impl Task for Delete {
    fn name(&self) -> &'static str {
        "Delete"
    }

    fn parameters(&self) -> &'static [ParameterSpec] {
        DELETE_PARAMETERS
    }

    fn execute(&self, inputs: &ParameterValues, host: &mut TaskHost) -> BuildResult<ParameterValues> {
        let mut deleted = Vec::new();
        for item in inputs.items("Files") {
            let path = host.resolve(&item.item_spec());
            if !path.is_file() {
                continue;
            }
            fs::remove_file(&path)
                .map_err(|e| host.fail(format!("cannot delete '{}': {}", path.display(), e)))?;
            host.message(Importance::Low, format!("Deleting file \"{}\"", path.display()));
            deleted.push(item.clone());
        }
        Ok(ParameterValues::new().with("DeletedFiles", ParameterValue::Items(deleted)))
    }
}
