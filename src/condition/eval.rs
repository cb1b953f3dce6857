//! Condition evaluation

use crate::condition::parser::{CompareOp, ConditionNode};
use crate::error::{BuildResult, EvaluationError};
use crate::expression::coerce::{format_bool, to_bool, to_number};
use crate::expression::escape::unescape;
use crate::expression::eval::expand_string;
use crate::expression::reference::ParseOptions;
use crate::project::context::EvalContext;
use std::cmp::Ordering;

/// Evaluates parsed condition nodes against a context
pub struct ConditionEvaluator<'c, 'a> {
    pub condition: &'c str,
    pub options: ParseOptions,
    pub ctx: &'c EvalContext<'a>,
}

impl ConditionEvaluator<'_, '_> {
    pub fn evaluate(&self, node: &ConditionNode) -> BuildResult<bool> {
        match node {
            ConditionNode::And(left, right) => {
                if !self.evaluate(left)? {
                    return Ok(false);
                }
                self.evaluate(right)
            }
            ConditionNode::Or(left, right) => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                Ok(left || right)
            }
            ConditionNode::Not(inner) => Ok(!self.evaluate(inner)?),
            ConditionNode::Compare { op, left, right } => {
                let left = self.text(left)?;
                let right = self.text(right)?;
                Ok(compare(*op, &left, &right))
            }
            ConditionNode::Function { name, args } => self.call(name, args),
            ConditionNode::Value { .. } => {
                let value = self.text(node)?;
                to_bool(&value).ok_or_else(|| {
                    EvaluationError::NotBoolean {
                        condition: self.condition.to_string(),
                        value,
                    }
                    .into()
                })
            }
        }
    }

    /// Expanded, unescaped text of an operand
    fn text(&self, node: &ConditionNode) -> BuildResult<String> {
        match node {
            ConditionNode::Value { text, .. } => {
                let expanded = expand_string(text, self.options.with_split(false), self.ctx)?;
                Ok(unescape(&expanded))
            }
            other => Ok(format_bool(self.evaluate(other)?)),
        }
    }

    fn call(&self, name: &str, args: &[ConditionNode]) -> BuildResult<bool> {
        let single_arg = || -> BuildResult<String> {
            match args {
                [arg] => self.text(arg),
                _ => Err(EvaluationError::InvalidArgument {
                    function: name.to_string(),
                    message: format!("expected 1 argument, got {}", args.len()),
                }
                .into()),
            }
        };

        if name.eq_ignore_ascii_case("Exists") {
            let path = single_arg()?;
            let path = path.trim();
            if path.is_empty() {
                return Ok(false);
            }
            return Ok(self.ctx.fs.exists(&self.ctx.resolve_path(path)));
        }
        if name.eq_ignore_ascii_case("HasTrailingSlash") {
            let text = single_arg()?;
            return Ok(text.ends_with('/') || text.ends_with('\\'));
        }
        Err(EvaluationError::UndefinedFunction(name.to_string()).into())
    }
}

/// Numbers first, then booleans, then case-insensitive text
pub fn compare(op: CompareOp, left: &str, right: &str) -> bool {
    let ordering = match (to_number(left), to_number(right)) {
        (Some(l), Some(r)) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
        _ => match (to_bool(left), to_bool(right)) {
            (Some(l), Some(r)) => l.cmp(&r),
            _ => left.to_lowercase().cmp(&right.to_lowercase()),
        },
    };
    match op {
        CompareOp::Equal => ordering == Ordering::Equal,
        CompareOp::NotEqual => ordering != Ordering::Equal,
        CompareOp::Less => ordering == Ordering::Less,
        CompareOp::LessOrEqual => ordering != Ordering::Greater,
        CompareOp::Greater => ordering == Ordering::Greater,
        CompareOp::GreaterOrEqual => ordering != Ordering::Less,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_comparison() {
        assert!(compare(CompareOp::Equal, "1", "1.0"));
        assert!(compare(CompareOp::Equal, "0x10", "16"));
        assert!(compare(CompareOp::Less, "9", "10"));
        assert!(compare(CompareOp::GreaterOrEqual, "10", "10"));
    }

    #[test]
    fn test_boolean_comparison() {
        assert!(compare(CompareOp::Equal, "true", "YES"));
        assert!(compare(CompareOp::Equal, "off", "false"));
        assert!(compare(CompareOp::NotEqual, "on", "no"));
    }

    #[test]
    fn test_string_comparison_is_case_insensitive() {
        assert!(compare(CompareOp::Equal, "Debug", "DEBUG"));
        assert!(compare(CompareOp::NotEqual, "Debug", "Release"));
        assert!(compare(CompareOp::Less, "alpha", "Beta"));
        assert!(compare(CompareOp::Equal, "", ""));
        // Text and numbers do not mix
        assert!(compare(CompareOp::NotEqual, "1", "one"));
    }
}
