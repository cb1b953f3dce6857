//! Build lifecycle events

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Where an event came from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventOrigin {
    pub project: String,
    pub target: Option<String>,
    pub task: Option<String>,
}

impl EventOrigin {
    pub fn project(project: impl Into<String>) -> Self {
        EventOrigin {
            project: project.into(),
            ..Self::default()
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }
}

/// Message importance; lower importance needs higher verbosity to show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Importance {
    High,
    #[default]
    Normal,
    Low,
}

impl FromStr for Importance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Importance::High),
            "" | "normal" => Ok(Importance::Normal),
            "low" => Ok(Importance::Low),
            other => Err(format!("unknown importance '{}'", other)),
        }
    }
}

/// A warning or error with optional source location
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostic {
    pub origin: EventOrigin,
    pub subcategory: Option<String>,
    pub code: Option<String>,
    pub file: Option<PathBuf>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(origin: EventOrigin, message: impl Into<String>) -> Self {
        Diagnostic {
            origin,
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = Some(subcategory.into());
        self
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_location(mut self, line: Option<u32>, column: Option<u32>) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    /// Render in `file(line,column): subcategory kind CODE: message` form
    pub fn render(&self, kind: &str) -> String {
        let mut out = String::new();
        if let Some(file) = &self.file {
            out.push_str(&file.display().to_string());
            match (self.line, self.column) {
                (Some(line), Some(column)) => out.push_str(&format!("({},{})", line, column)),
                (Some(line), None) => out.push_str(&format!("({})", line)),
                _ => {}
            }
            out.push_str(": ");
        }
        if let Some(subcategory) = &self.subcategory {
            out.push_str(subcategory);
            out.push(' ');
        }
        out.push_str(kind);
        if let Some(code) = &self.code {
            out.push(' ');
            out.push_str(code);
        }
        out.push_str(": ");
        out.push_str(&self.message);
        out
    }
}

/// Events emitted during a build, in the order they happen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    BuildStarted,
    ProjectStarted {
        project: String,
        targets: Vec<String>,
    },
    TargetStarted {
        project: String,
        target: String,
    },
    TaskStarted {
        project: String,
        target: String,
        task: String,
    },
    Message {
        origin: EventOrigin,
        importance: Importance,
        text: String,
    },
    Warning(Diagnostic),
    Error(Diagnostic),
    TaskFinished {
        project: String,
        target: String,
        task: String,
        succeeded: bool,
    },
    TargetFinished {
        project: String,
        target: String,
        succeeded: bool,
    },
    ProjectFinished {
        project: String,
        succeeded: bool,
    },
    BuildFinished {
        succeeded: bool,
    },
}

impl BuildEvent {
    pub fn message(origin: EventOrigin, importance: Importance, text: impl Into<String>) -> Self {
        BuildEvent::Message {
            origin,
            importance,
            text: text.into(),
        }
    }

    /// Short name of the event kind
    pub fn kind(&self) -> &'static str {
        match self {
            BuildEvent::BuildStarted => "BuildStarted",
            BuildEvent::ProjectStarted { .. } => "ProjectStarted",
            BuildEvent::TargetStarted { .. } => "TargetStarted",
            BuildEvent::TaskStarted { .. } => "TaskStarted",
            BuildEvent::Message { .. } => "Message",
            BuildEvent::Warning(_) => "Warning",
            BuildEvent::Error(_) => "Error",
            BuildEvent::TaskFinished { .. } => "TaskFinished",
            BuildEvent::TargetFinished { .. } => "TargetFinished",
            BuildEvent::ProjectFinished { .. } => "ProjectFinished",
            BuildEvent::BuildFinished { .. } => "BuildFinished",
        }
    }
}

impl fmt::Display for BuildEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildEvent::BuildStarted => write!(f, "Build started"),
            BuildEvent::ProjectStarted { project, targets } => {
                write!(f, "Project \"{}\" ({})", project, targets.join(";"))
            }
            BuildEvent::TargetStarted { target, .. } => write!(f, "Target \"{}\"", target),
            BuildEvent::TaskStarted { task, .. } => write!(f, "Task \"{}\"", task),
            BuildEvent::Message { text, .. } => write!(f, "{}", text),
            BuildEvent::Warning(diagnostic) => write!(f, "{}", diagnostic.render("warning")),
            BuildEvent::Error(diagnostic) => write!(f, "{}", diagnostic.render("error")),
            BuildEvent::TaskFinished { task, succeeded, .. } => {
                write!(f, "Done task \"{}\"{}", task, failed_suffix(*succeeded))
            }
            BuildEvent::TargetFinished { target, succeeded, .. } => {
                write!(f, "Done target \"{}\"{}", target, failed_suffix(*succeeded))
            }
            BuildEvent::ProjectFinished { project, succeeded } => {
                write!(f, "Done project \"{}\"{}", project, failed_suffix(*succeeded))
            }
            BuildEvent::BuildFinished { succeeded } => {
                if *succeeded {
                    write!(f, "Build succeeded")
                } else {
                    write!(f, "Build FAILED")
                }
            }
        }
    }
}

fn failed_suffix(succeeded: bool) -> &'static str {
    if succeeded {
        ""
    } else {
        " -- FAILED"
    }
}
