//! Property functions
//!
//! `$(Name.Method(...))` calls string methods on a property value and
//! `$([Type]::Method(...))` calls a static function. Only the methods listed
//! here can be called; anything else is an evaluation error.

use crate::error::{BuildError, BuildResult, EvaluationError};
use crate::expression::coerce::{format_bool, format_number, to_number};
use crate::expression::escape::{escape, unescape};
use crate::expression::eval::expand_string;
use crate::expression::reference::{FunctionInvocation, MethodCall, ParseOptions, Receiver};
use crate::project::context::EvalContext;
use crate::project::fs::resolve;
use std::path::Path;

/// String methods callable on any value
pub const STRING_METHODS: &[&str] = &[
    "Length",
    "ToUpper",
    "ToLower",
    "ToUpperInvariant",
    "ToLowerInvariant",
    "Trim",
    "TrimStart",
    "TrimEnd",
    "Substring",
    "Replace",
    "Contains",
    "StartsWith",
    "EndsWith",
    "IndexOf",
    "LastIndexOf",
    "PadLeft",
    "PadRight",
    "Remove",
    "Insert",
    "Equals",
    "Split",
];

/// Static types and the functions each allows
pub const STATIC_FUNCTIONS: &[(&str, &[&str])] = &[
    (
        "Path",
        &[
            "Combine",
            "GetFileName",
            "GetFileNameWithoutExtension",
            "GetExtension",
            "GetDirectoryName",
            "ChangeExtension",
            "HasExtension",
            "IsPathRooted",
            "GetFullPath",
        ],
    ),
    (
        "String",
        &["IsNullOrEmpty", "IsNullOrWhiteSpace", "Concat", "Join"],
    ),
    ("Math", &["Max", "Min", "Abs", "Floor", "Ceiling"]),
    (
        "Build",
        &[
            "Add",
            "Subtract",
            "Multiply",
            "Divide",
            "Modulo",
            "Escape",
            "Unescape",
            "ValueOrDefault",
            "EnsureTrailingSlash",
        ],
    ),
    ("Environment", &["GetEnvironmentVariable"]),
];

/// Intermediate result of a call
#[derive(Debug, Clone, PartialEq)]
enum Value {
    /// Plain text, escaped on output
    Str(String),
    Number(f64),
    Bool(bool),
    Array(Vec<String>),
    /// Already-escaped text, emitted verbatim
    Escaped(String),
}

impl Value {
    fn into_text(self) -> String {
        match self {
            Value::Str(s) => s,
            Value::Number(n) => format_number(n),
            Value::Bool(b) => format_bool(b),
            Value::Array(items) => items.join(";"),
            Value::Escaped(s) => unescape(&s),
        }
    }

    fn into_escaped(self) -> String {
        match self {
            Value::Str(s) => escape(&s),
            Value::Number(n) => format_number(n),
            Value::Bool(b) => format_bool(b),
            Value::Array(items) => items
                .iter()
                .map(|s| escape(s))
                .collect::<Vec<_>>()
                .join(";"),
            Value::Escaped(s) => s,
        }
    }
}

/// Evaluate a function invocation to escaped text
pub fn invoke(invocation: &FunctionInvocation, ctx: &EvalContext) -> BuildResult<String> {
    let (mut value, rest) = match &invocation.receiver {
        Receiver::Property(name) => (
            Value::Str(unescape(&ctx.property(name).unwrap_or_default())),
            invocation.calls.as_slice(),
        ),
        Receiver::Static(type_name) => {
            let Some((first, rest)) = invocation.calls.split_first() else {
                return Err(EvaluationError::UndefinedFunction(format!("[{}]", type_name)).into());
            };
            let args = evaluate_arguments(first, ctx)?;
            (call_static(type_name, &first.name, &args, ctx)?, rest)
        }
    };

    for call in rest {
        let args = evaluate_arguments(call, ctx)?;
        value = call_string_method(&value.into_text(), &call.name, call.arguments.is_some(), &args)?;
    }

    tracing::trace!(?invocation, "evaluated property function");
    Ok(value.into_escaped())
}

/// Expand each argument; quotes are stripped and the result unescaped
fn evaluate_arguments(call: &MethodCall, ctx: &EvalContext) -> BuildResult<Vec<String>> {
    let Some(arguments) = &call.arguments else {
        return Ok(Vec::new());
    };
    arguments
        .iter()
        .map(|raw| {
            let raw = raw.trim();
            let inner = strip_quotes(raw).unwrap_or(raw);
            let expanded = expand_string(inner, ParseOptions::PROPERTIES, ctx)?;
            Ok(unescape(&expanded))
        })
        .collect()
}

fn strip_quotes(s: &str) -> Option<&str> {
    for quote in ['\'', '"', '`'] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return Some(&s[1..s.len() - 1]);
        }
    }
    None
}

fn invalid(function: &str, message: impl Into<String>) -> BuildError {
    EvaluationError::InvalidArgument {
        function: function.to_string(),
        message: message.into(),
    }
    .into()
}

fn expect_args(function: &str, args: &[String], min: usize, max: usize) -> BuildResult<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("{}", min)
        } else {
            format!("{} to {}", min, max)
        };
        return Err(invalid(
            function,
            format!("expected {} argument(s), got {}", expected, args.len()),
        ));
    }
    Ok(())
}

fn number_arg(function: &str, arg: &str) -> BuildResult<f64> {
    to_number(arg).ok_or_else(|| invalid(function, format!("'{}' is not a number", arg)))
}

fn index_arg(function: &str, arg: &str) -> BuildResult<usize> {
    let n = number_arg(function, arg)?;
    if n < 0.0 || n.fract() != 0.0 || n > f64::from(i32::MAX) {
        return Err(invalid(function, format!("'{}' is not a valid index", arg)));
    }
    Ok(n as usize)
}

fn canonical<'a>(allowed: &'a [&'a str], name: &str) -> Option<&'a str> {
    allowed
        .iter()
        .find(|m| m.eq_ignore_ascii_case(name))
        .copied()
}

fn call_string_method(s: &str, method: &str, has_parens: bool, args: &[String]) -> BuildResult<Value> {
    let name = canonical(STRING_METHODS, method).ok_or_else(|| EvaluationError::MethodNotAllowed {
        type_name: "String".to_string(),
        method: method.to_string(),
    })?;
    if name != "Length" && !has_parens {
        return Err(invalid(name, "method call requires parentheses"));
    }

    let chars: Vec<char> = s.chars().collect();
    let slice = |from: usize, to: usize| chars[from..to].iter().collect::<String>();

    let value = match name {
        "Length" => {
            expect_args(name, args, 0, 0)?;
            Value::Number(chars.len() as f64)
        }
        "ToUpper" | "ToUpperInvariant" => {
            expect_args(name, args, 0, 0)?;
            Value::Str(s.to_uppercase())
        }
        "ToLower" | "ToLowerInvariant" => {
            expect_args(name, args, 0, 0)?;
            Value::Str(s.to_lowercase())
        }
        "Trim" | "TrimStart" | "TrimEnd" => {
            expect_args(name, args, 0, 1)?;
            let set: Option<Vec<char>> = args.first().map(|a| a.chars().collect());
            let trim_char = |c: char| match &set {
                Some(set) => set.contains(&c),
                None => c.is_whitespace(),
            };
            Value::Str(match name {
                "Trim" => s.trim_matches(trim_char),
                "TrimStart" => s.trim_start_matches(trim_char),
                _ => s.trim_end_matches(trim_char),
            }
            .to_string())
        }
        "Substring" => {
            expect_args(name, args, 1, 2)?;
            let start = index_arg(name, &args[0])?;
            let len = match args.get(1) {
                Some(arg) => index_arg(name, arg)?,
                None => chars.len().saturating_sub(start),
            };
            let end = start.checked_add(len).filter(|&end| end <= chars.len());
            let Some(end) = end else {
                return Err(invalid(name, "index and length must refer to a location within the string"));
            };
            Value::Str(slice(start, end))
        }
        "Replace" => {
            expect_args(name, args, 2, 2)?;
            if args[0].is_empty() {
                return Err(invalid(name, "old value cannot be empty"));
            }
            Value::Str(s.replace(&args[0], &args[1]))
        }
        "Contains" => {
            expect_args(name, args, 1, 1)?;
            Value::Bool(s.contains(args[0].as_str()))
        }
        "StartsWith" => {
            expect_args(name, args, 1, 1)?;
            Value::Bool(s.starts_with(args[0].as_str()))
        }
        "EndsWith" => {
            expect_args(name, args, 1, 1)?;
            Value::Bool(s.ends_with(args[0].as_str()))
        }
        "IndexOf" | "LastIndexOf" => {
            expect_args(name, args, 1, 1)?;
            let found = if name == "IndexOf" {
                s.find(args[0].as_str())
            } else {
                s.rfind(args[0].as_str())
            };
            Value::Number(match found {
                Some(byte_idx) => s[..byte_idx].chars().count() as f64,
                None => -1.0,
            })
        }
        "PadLeft" | "PadRight" => {
            expect_args(name, args, 1, 2)?;
            let width = index_arg(name, &args[0])?;
            let pad = match args.get(1) {
                Some(arg) => {
                    let mut it = arg.chars();
                    match (it.next(), it.next()) {
                        (Some(c), None) => c,
                        _ => return Err(invalid(name, "padding must be a single character")),
                    }
                }
                None => ' ',
            };
            let padding: String = std::iter::repeat(pad)
                .take(width.saturating_sub(chars.len()))
                .collect();
            Value::Str(if name == "PadLeft" {
                format!("{}{}", padding, s)
            } else {
                format!("{}{}", s, padding)
            })
        }
        "Remove" => {
            expect_args(name, args, 1, 2)?;
            let start = index_arg(name, &args[0])?;
            let count = match args.get(1) {
                Some(arg) => index_arg(name, arg)?,
                None => chars.len().saturating_sub(start),
            };
            let end = start.checked_add(count).filter(|&end| end <= chars.len());
            let Some(end) = end else {
                return Err(invalid(name, "index and count must refer to a location within the string"));
            };
            Value::Str(format!("{}{}", slice(0, start), slice(end, chars.len())))
        }
        "Insert" => {
            expect_args(name, args, 2, 2)?;
            let at = index_arg(name, &args[0])?;
            if at > chars.len() {
                return Err(invalid(name, "index is outside the string"));
            }
            Value::Str(format!("{}{}{}", slice(0, at), args[1], slice(at, chars.len())))
        }
        "Equals" => {
            expect_args(name, args, 1, 1)?;
            Value::Bool(s == args[0])
        }
        _ => {
            expect_args(name, args, 1, 1)?;
            let separators: Vec<char> = args[0].chars().collect();
            if separators.is_empty() {
                Value::Array(vec![s.to_string()])
            } else {
                Value::Array(s.split(separators.as_slice()).map(str::to_string).collect())
            }
        }
    };
    Ok(value)
}

fn call_static(type_name: &str, method: &str, args: &[String], ctx: &EvalContext) -> BuildResult<Value> {
    let (type_name, allowed) = STATIC_FUNCTIONS
        .iter()
        .find(|(t, _)| t.eq_ignore_ascii_case(type_name))
        .copied()
        .ok_or_else(|| EvaluationError::UndefinedFunction(format!("[{}]::{}", type_name, method)))?;
    let name = canonical(allowed, method).ok_or_else(|| EvaluationError::MethodNotAllowed {
        type_name: type_name.to_string(),
        method: method.to_string(),
    })?;

    match type_name {
        "Path" => path_function(name, args, ctx),
        "String" => string_function(name, args),
        "Math" => math_function(name, args),
        "Build" => build_function(name, args),
        _ => environment_function(name, args),
    }
}

fn path_function(name: &str, args: &[String], ctx: &EvalContext) -> BuildResult<Value> {
    if name == "Combine" {
        if args.is_empty() {
            return Err(invalid(name, "expected at least one path"));
        }
        let mut combined = std::path::PathBuf::new();
        for part in args {
            combined.push(part);
        }
        return Ok(Value::Str(combined.to_string_lossy().into_owned()));
    }

    let arity = if name == "ChangeExtension" { 2 } else { 1 };
    expect_args(name, args, arity, arity)?;
    let path = Path::new(&args[0]);
    let text = |s: Option<&std::ffi::OsStr>| {
        s.map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    };

    Ok(match name {
        "GetFileName" => Value::Str(text(path.file_name())),
        "GetFileNameWithoutExtension" => Value::Str(text(path.file_stem())),
        "GetExtension" => Value::Str(
            path.extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default(),
        ),
        "GetDirectoryName" => Value::Str(text(path.parent().map(Path::as_os_str))),
        "ChangeExtension" => {
            let extension = args[1].trim_start_matches('.');
            Value::Str(path.with_extension(extension).to_string_lossy().into_owned())
        }
        "HasExtension" => Value::Bool(path.extension().is_some()),
        "IsPathRooted" => Value::Bool(path.has_root()),
        _ => Value::Str(resolve(ctx.project_dir, &args[0]).to_string_lossy().into_owned()),
    })
}

fn string_function(name: &str, args: &[String]) -> BuildResult<Value> {
    Ok(match name {
        "IsNullOrEmpty" => {
            expect_args(name, args, 1, 1)?;
            Value::Bool(args[0].is_empty())
        }
        "IsNullOrWhiteSpace" => {
            expect_args(name, args, 1, 1)?;
            Value::Bool(args[0].trim().is_empty())
        }
        "Concat" => Value::Str(args.concat()),
        _ => {
            if args.is_empty() {
                return Err(invalid(name, "expected a separator"));
            }
            Value::Str(args[1..].join(&args[0]))
        }
    })
}

fn math_function(name: &str, args: &[String]) -> BuildResult<Value> {
    let binary = matches!(name, "Max" | "Min");
    let arity = if binary { 2 } else { 1 };
    expect_args(name, args, arity, arity)?;
    let a = number_arg(name, &args[0])?;
    Ok(Value::Number(match name {
        "Max" => a.max(number_arg(name, &args[1])?),
        "Min" => a.min(number_arg(name, &args[1])?),
        "Abs" => a.abs(),
        "Floor" => a.floor(),
        _ => a.ceil(),
    }))
}

fn build_function(name: &str, args: &[String]) -> BuildResult<Value> {
    match name {
        "Escape" => {
            expect_args(name, args, 1, 1)?;
            Ok(Value::Escaped(escape(&args[0])))
        }
        "Unescape" => {
            expect_args(name, args, 1, 1)?;
            Ok(Value::Escaped(args[0].clone()))
        }
        "ValueOrDefault" => {
            expect_args(name, args, 2, 2)?;
            Ok(Value::Str(if args[0].is_empty() {
                args[1].clone()
            } else {
                args[0].clone()
            }))
        }
        "EnsureTrailingSlash" => {
            expect_args(name, args, 1, 1)?;
            let path = &args[0];
            Ok(Value::Str(if path.is_empty() || path.ends_with('/') || path.ends_with('\\') {
                path.clone()
            } else {
                format!("{}/", path)
            }))
        }
        _ => {
            expect_args(name, args, 2, 2)?;
            let a = number_arg(name, &args[0])?;
            let b = number_arg(name, &args[1])?;
            if matches!(name, "Divide" | "Modulo") && b == 0.0 {
                return Err(invalid(name, "division by zero"));
            }
            Ok(Value::Number(match name {
                "Add" => a + b,
                "Subtract" => a - b,
                "Multiply" => a * b,
                "Divide" => a / b,
                _ => a % b,
            }))
        }
    }
}

fn environment_function(name: &str, args: &[String]) -> BuildResult<Value> {
    expect_args(name, args, 1, 1)?;
    Ok(Value::Str(std::env::var(&args[0]).unwrap_or_default()))
}

#[cfg(test)]
mod tests {
    use crate::error::{BuildError, EvaluationError};
    use crate::expression::eval::expand_string;
    use crate::expression::reference::ParseOptions;
    use crate::project::context::EvalContext;
    use crate::project::fs::DiskFileSystem;
    use crate::project::item::ItemStore;
    use crate::project::property::{Property, PropertyKind, PropertyTable};
    use std::path::Path;

    fn eval(text: &str) -> Result<String, BuildError> {
        let mut properties = PropertyTable::new();
        for (name, value) in [("Name", "  Hello World  "), ("Root", "/src"), ("Count", "4")] {
            properties
                .set(Property::new(name, value, PropertyKind::Normal))
                .unwrap();
        }
        let items = ItemStore::new();
        let ctx = EvalContext::new(&properties, &items, Path::new("/work"), &DiskFileSystem);
        expand_string(text, ParseOptions::PROPERTIES, &ctx)
    }

    #[test]
    fn test_string_methods() {
        assert_eq!(eval("$(Name.Trim())").unwrap(), "Hello World");
        assert_eq!(eval("$(Name.Trim().ToUpper())").unwrap(), "HELLO WORLD");
        assert_eq!(eval("$(Name.Length)").unwrap(), "15");
        assert_eq!(eval("$(Name.Trim().Substring(6))").unwrap(), "World");
        assert_eq!(eval("$(Name.Trim().Substring(0, 5))").unwrap(), "Hello");
        assert_eq!(eval("$(Name.Trim().Replace('World', 'There'))").unwrap(), "Hello There");
        assert_eq!(eval("$(Name.Contains('World'))").unwrap(), "True");
        assert_eq!(eval("$(Name.Trim().IndexOf('o'))").unwrap(), "4");
        assert_eq!(eval("$(Name.Trim().LastIndexOf('o'))").unwrap(), "7");
        assert_eq!(eval("$(Count.PadLeft(3, '0'))").unwrap(), "004");
        assert_eq!(eval("$(Name.Trim().Remove(5))").unwrap(), "Hello");
        assert_eq!(eval("$(Count.Insert(0, 'x'))").unwrap(), "x4");
    }

    #[test]
    fn test_oversized_index_is_an_error() {
        for text in [
            "$(Count.Substring(1, 1e30))",
            "$(Count.Substring(1, 18446744073709551615))",
            "$(Count.Remove(0, 1e30))",
            "$(Count.PadLeft(1e30))",
            "$(Count.Substring(5))",
        ] {
            assert!(
                matches!(
                    eval(text),
                    Err(BuildError::Evaluation(EvaluationError::InvalidArgument { .. }))
                ),
                "{}",
                text
            );
        }
    }

    #[test]
    fn test_split_returns_escaped_array() {
        assert_eq!(eval("$(Root.Split('/'))").unwrap(), ";src");
        assert_eq!(eval("$(Name.Trim().Split(' '))").unwrap(), "Hello;World");
    }

    #[test]
    fn test_static_functions() {
        assert_eq!(eval("$([Path]::Combine($(Root), 'obj', 'a.o'))").unwrap(), "/src/obj/a.o");
        assert_eq!(eval("$([Path]::GetExtension('a/b.txt'))").unwrap(), ".txt");
        assert_eq!(eval("$([Path]::GetFileNameWithoutExtension('a/b.txt'))").unwrap(), "b");
        assert_eq!(eval("$([Path]::ChangeExtension('a/b.txt', '.md'))").unwrap(), "a/b.md");
        assert_eq!(eval("$([Path]::GetFullPath('x/../y'))").unwrap(), "/work/y");
        assert_eq!(eval("$([Math]::Max(3, $(Count)))").unwrap(), "4");
        assert_eq!(eval("$([Build]::Add($(Count), 1.5))").unwrap(), "5.5");
        assert_eq!(eval("$([String]::IsNullOrEmpty('$(Missing)'))").unwrap(), "True");
        assert_eq!(eval("$([String]::Join('-', 'a', 'b'))").unwrap(), "a-b");
        assert_eq!(eval("$([Build]::ValueOrDefault('', 'fallback'))").unwrap(), "fallback");
        assert_eq!(eval("$([Build]::EnsureTrailingSlash('out'))").unwrap(), "out/");
    }

    #[test]
    fn test_escape_and_unescape_functions() {
        assert_eq!(eval("$([Build]::Escape('a;b'))").unwrap(), "a%3bb");
        assert_eq!(eval("$([Build]::Unescape('a%3bb'))").unwrap(), "a;b");
        // Ordinary string results are escaped
        assert_eq!(eval("$([String]::Concat('a', ';', 'b'))").unwrap(), "a%3bb");
    }

    #[test]
    fn test_disallowed_and_undefined_functions() {
        assert!(matches!(
            eval("$(Name.GetType())").unwrap_err(),
            BuildError::Evaluation(EvaluationError::MethodNotAllowed { .. })
        ));
        assert!(matches!(
            eval("$([Path]::Delete('x'))").unwrap_err(),
            BuildError::Evaluation(EvaluationError::MethodNotAllowed { .. })
        ));
        assert!(matches!(
            eval("$([System.IO.File]::ReadAllText('x'))").unwrap_err(),
            BuildError::Evaluation(EvaluationError::UndefinedFunction(_))
        ));
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(matches!(
            eval("$(Name.Substring(100))").unwrap_err(),
            BuildError::Evaluation(EvaluationError::InvalidArgument { .. })
        ));
        assert!(matches!(
            eval("$([Build]::Divide(1, 0))").unwrap_err(),
            BuildError::Evaluation(EvaluationError::InvalidArgument { .. })
        ));
        assert!(matches!(
            eval("$([Math]::Abs('abc'))").unwrap_err(),
            BuildError::Evaluation(EvaluationError::InvalidArgument { .. })
        ));
    }
}
