//! Boolean conditions gating properties, items, groups, targets and tasks

pub mod eval;
pub mod parser;
pub mod tokenizer;

use crate::error::BuildResult;
use crate::expression::reference::ParseOptions;
use crate::project::context::EvalContext;
use eval::ConditionEvaluator;
use parser::{parse_condition, ConditionNode};

/// A parsed condition; blank text is always true
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    text: String,
    root: Option<ConditionNode>,
}

impl Condition {
    pub fn parse(text: &str) -> BuildResult<Self> {
        Ok(Condition {
            text: text.to_string(),
            root: parse_condition(text)?,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Evaluate with operands expanded according to `options`
    pub fn evaluate(&self, options: ParseOptions, ctx: &EvalContext) -> BuildResult<bool> {
        let Some(root) = &self.root else {
            return Ok(true);
        };
        let evaluator = ConditionEvaluator {
            condition: &self.text,
            options,
            ctx,
        };
        let result = evaluator.evaluate(root)?;
        tracing::trace!(condition = %self.text, result, "evaluated condition");
        Ok(result)
    }
}

/// Parse and evaluate an optional condition
pub fn evaluate_condition(
    condition: Option<&str>,
    options: ParseOptions,
    ctx: &EvalContext,
) -> BuildResult<bool> {
    match condition {
        Some(text) => Condition::parse(text)?.evaluate(options, ctx),
        None => Ok(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BuildError, EvaluationError, StructuralError};
    use crate::project::fs::DiskFileSystem;
    use crate::project::item::ItemStore;
    use crate::project::property::{Property, PropertyKind, PropertyTable};
    use std::path::Path;
    use tempfile::TempDir;

    fn eval_in(dir: &Path, text: &str) -> Result<bool, BuildError> {
        let mut properties = PropertyTable::new();
        for (name, value) in [("X", "1"), ("Config", "Debug"), ("Flag", "true"), ("Out", "bin/")] {
            properties
                .set(Property::new(name, value, PropertyKind::Normal))
                .unwrap();
        }
        let items = ItemStore::new();
        let ctx = EvalContext::new(&properties, &items, dir, &DiskFileSystem);
        Condition::parse(text)?.evaluate(ParseOptions::PROPERTIES, &ctx)
    }

    fn eval(text: &str) -> Result<bool, BuildError> {
        eval_in(Path::new("/nonexistent"), text)
    }

    #[test]
    fn test_empty_condition_is_true() {
        assert!(eval("").unwrap());

        let properties = PropertyTable::new();
        let items = ItemStore::new();
        let ctx = EvalContext::new(&properties, &items, Path::new("/"), &DiskFileSystem);
        assert!(evaluate_condition(None, ParseOptions::PROPERTIES, &ctx).unwrap());
        assert!(evaluate_condition(Some("  "), ParseOptions::PROPERTIES, &ctx).unwrap());
    }

    #[test]
    fn test_property_equals_number() {
        assert!(eval("'$(X)' == '1'").unwrap());
        assert!(eval("$(X) == 1.0").unwrap());
        assert!(!eval("'$(X)' != '1'").unwrap());
    }

    #[test]
    fn test_string_and_logic() {
        assert!(eval("'$(Config)' == 'debug' and '$(Undefined)' == ''").unwrap());
        assert!(eval("'$(Config)' == 'Release' or $(Flag)").unwrap());
        assert!(eval("!('$(Config)' == 'Release')").unwrap());
        assert!(eval("$(Flag) AND !false").unwrap());
    }

    #[test]
    fn test_and_short_circuits() {
        // The right side would not be boolean
        assert!(!eval("false and 'not a bool'").unwrap());
    }

    #[test]
    fn test_or_does_not_short_circuit() {
        let err = eval("true or 'not a bool'").unwrap_err();
        assert!(matches!(
            err,
            BuildError::Evaluation(EvaluationError::NotBoolean { .. })
        ));
    }

    #[test]
    fn test_non_boolean_is_an_error() {
        let err = eval("'$(Config)'").unwrap_err();
        match err {
            BuildError::Evaluation(EvaluationError::NotBoolean { value, .. }) => {
                assert_eq!(value, "Debug")
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_malformed_condition_is_structural() {
        let err = eval("'$(X)' ==").unwrap_err();
        assert!(matches!(
            err,
            BuildError::Structural(StructuralError::MalformedCondition { .. })
        ));
    }

    #[test]
    fn test_exists_and_trailing_slash() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("present.txt"), "").unwrap();

        assert!(eval_in(temp_dir.path(), "Exists('present.txt')").unwrap());
        assert!(!eval_in(temp_dir.path(), "Exists('absent.txt')").unwrap());
        assert!(!eval_in(temp_dir.path(), "Exists('')").unwrap());
        assert!(eval("HasTrailingSlash('$(Out)')").unwrap());
        assert!(!eval("HasTrailingSlash('$(Config)')").unwrap());
    }

    #[test]
    fn test_unknown_condition_function() {
        let err = eval("IsWindows()").unwrap_err();
        assert!(matches!(
            err,
            BuildError::Evaluation(EvaluationError::UndefinedFunction(_))
        ));
    }
}
