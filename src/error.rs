//! Error types for rbuild

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for top-level rbuild operations
pub type Result<T> = std::result::Result<T, RbuildError>;

/// Main error type for rbuild
#[derive(Error, Debug)]
pub enum RbuildError {
    /// Project file loading and validation errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Evaluation and build errors
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// YAML parsing errors
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Project file discovery, import and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to find project file (searched: {0})")]
    NotFound(String),

    #[error("Invalid project: {0}")]
    Invalid(String),

    #[error("Invalid name '{name}' for {kind}")]
    InvalidName { kind: &'static str, name: String },

    #[error("Output binding for '{0}' must name exactly one of property_name or item_name")]
    InvalidOutputBinding(String),

    #[error("Failed to import file '{path}': {error}")]
    Import { path: PathBuf, error: String },

    #[error("Circular import detected: {0}")]
    CircularImport(String),
}

/// The class of a build failure, as reported to event consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Structural,
    Evaluation,
    Cycle,
    TaskExecution,
}

/// Errors raised while evaluating a project or building its targets
#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error("Circular dependency detected: {0}")]
    Cycle(String),

    #[error("Task '{task}' failed: {message}")]
    TaskExecution { task: String, message: String },
}

impl BuildError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BuildError::Structural(_) => ErrorKind::Structural,
            BuildError::Evaluation(_) => ErrorKind::Evaluation,
            BuildError::Cycle(_) => ErrorKind::Cycle,
            BuildError::TaskExecution { .. } => ErrorKind::TaskExecution,
        }
    }

    /// Everything except a task failure aborts the whole build
    pub fn is_fatal(&self) -> bool {
        !matches!(self, BuildError::TaskExecution { .. })
    }

    /// Short diagnostic code attached to error events
    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Structural => "RB1001",
            ErrorKind::Evaluation => "RB2001",
            ErrorKind::Cycle => "RB3001",
            ErrorKind::TaskExecution => "RB4001",
        }
    }
}

/// Malformed input: always fatal to the enclosing evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructuralError {
    #[error("Malformed expression \"{expression}\": {message}")]
    MalformedExpression { expression: String, message: String },

    #[error("Malformed condition \"{condition}\": {message}")]
    MalformedCondition { condition: String, message: String },

    #[error("Cannot concatenate an item list with a {with} in \"{expression}\"")]
    ItemConcatenation {
        expression: String,
        with: &'static str,
    },

    #[error("Task '{task}' is missing required parameter '{parameter}'")]
    MissingRequiredParameter { task: String, parameter: String },

    #[error("Task '{task}' does not have a parameter named '{parameter}'")]
    UnknownParameter { task: String, parameter: String },

    #[error("Task '{task}' has no output parameter named '{parameter}'")]
    UnknownOutputParameter { task: String, parameter: String },

    #[error("Task '{0}' is not registered")]
    UnknownTask(String),

    #[error("Metadata '%({0})' must be referenced via an item name, e.g. %(Item.{0})")]
    UnqualifiedMetadata(String),

    #[error("Item '{item}' in item list '{item_type}' does not define a value for metadata '{metadata}'")]
    MetadataMissingOnItem {
        item: String,
        item_type: String,
        metadata: String,
    },

    #[error("Reserved metadata '{0}' cannot be modified")]
    ReservedMetadata(String),

    #[error("Reserved property '{0}' cannot be modified")]
    ReservedProperty(String),

    #[error("Target '{0}' does not exist in the project")]
    TargetNotFound(String),
}

/// Well-formed input that cannot be evaluated
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("Condition \"{condition}\": \"{value}\" does not evaluate to a boolean")]
    NotBoolean { condition: String, value: String },

    #[error("Function '{0}' is not defined")]
    UndefinedFunction(String),

    #[error("Method '{method}' is not allowed on type '{type_name}'")]
    MethodNotAllowed { type_name: String, method: String },

    #[error("Invalid argument to '{function}': {message}")]
    InvalidArgument { function: String, message: String },

    #[error("Parameter '{parameter}' of task '{task}' expects {expected}, got \"{value}\"")]
    InvalidParameterValue {
        task: String,
        parameter: String,
        expected: &'static str,
        value: String,
    },
}

/// Specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized result type for evaluation and build operations
pub type BuildResult<T> = std::result::Result<T, BuildError>;

/// Shorthand for a malformed-expression error
pub fn malformed(expression: &str, message: impl Into<String>) -> BuildError {
    BuildError::Structural(StructuralError::MalformedExpression {
        expression: expression.to_string(),
        message: message.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = BuildError::Cycle("a -> b -> a".to_string());
        assert_eq!(err.kind(), ErrorKind::Cycle);
        assert!(err.is_fatal());

        let err = BuildError::TaskExecution {
            task: "Exec".to_string(),
            message: "exit code 1".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::TaskExecution);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_structural_message() {
        let err: BuildError = StructuralError::UnqualifiedMetadata("Culture".to_string()).into();
        assert!(err.to_string().contains("%(Item.Culture)"));
        assert_eq!(err.code(), "RB1001");
    }
}
