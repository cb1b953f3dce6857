//! Expression parsing
//!
//! Splits raw attribute text into literal and reference fragments. The
//! parser is purely syntactic; nothing is looked up here.

use crate::error::{malformed, BuildResult};
use crate::expression::reference::{
    Fragment, FunctionInvocation, ItemReference, MetadataReference, MethodCall, ParseOptions,
    PropertyReference, Receiver,
};

/// A parsed expression
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    text: String,
    fragments: Vec<Fragment>,
}

impl Expression {
    /// Parse raw text according to `options`
    pub fn parse(text: &str, options: ParseOptions) -> BuildResult<Self> {
        let fragments = Parser::new(text, options).run()?;
        Ok(Expression {
            text: text.to_string(),
            fragments,
        })
    }

    /// The raw text this expression was parsed from
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Top-level item references, in source order
    pub fn item_references(&self) -> impl Iterator<Item = &ItemReference> {
        self.fragments.iter().filter_map(|f| match f {
            Fragment::Item(r) => Some(r),
            _ => None,
        })
    }

    /// Top-level metadata references, in source order.
    ///
    /// References inside item transforms are not included.
    pub fn metadata_references(&self) -> impl Iterator<Item = &MetadataReference> {
        self.fragments.iter().filter_map(|f| match f {
            Fragment::Metadata(r) => Some(r),
            _ => None,
        })
    }

    pub fn has_references(&self) -> bool {
        self.fragments
            .iter()
            .any(|f| !matches!(f, Fragment::Literal(_)))
    }
}

struct Parser<'a> {
    text: &'a str,
    options: ParseOptions,
    fragments: Vec<Fragment>,
    literal: String,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str, options: ParseOptions) -> Self {
        Parser {
            text,
            options,
            fragments: Vec::new(),
            literal: String::new(),
        }
    }

    fn run(mut self) -> BuildResult<Vec<Fragment>> {
        let text = self.text;
        let mut pos = 0;

        while pos < text.len() {
            let rest = &text[pos..];
            let ch = match rest.chars().next() {
                Some(c) => c,
                None => break,
            };

            let opens_reference = rest[ch.len_utf8()..].starts_with('(')
                && match ch {
                    '$' => true,
                    '@' => self.options.allow_items,
                    '%' => self.options.allow_metadata,
                    _ => false,
                };

            if opens_reference {
                let body_start = pos + 2;
                let close = find_closing_paren(text, body_start).ok_or_else(|| {
                    malformed(text, format!("unterminated reference starting at '{}('", ch))
                })?;
                let body = &text[body_start..close];
                let fragment = match ch {
                    '$' => parse_property_body(text, body)?,
                    '@' => Fragment::Item(parse_item_body(text, body)?),
                    _ => Fragment::Metadata(parse_metadata_body(text, body)?),
                };
                self.flush_literal();
                self.fragments.push(fragment);
                pos = close + 1;
                continue;
            }

            if ch == ';' && self.options.split {
                self.flush_literal();
                self.fragments.push(Fragment::Literal(";".to_string()));
            } else {
                self.literal.push(ch);
            }
            pos += ch.len_utf8();
        }

        self.flush_literal();
        Ok(self.fragments)
    }

    fn flush_literal(&mut self) {
        if !self.literal.is_empty() {
            self.fragments
                .push(Fragment::Literal(std::mem::take(&mut self.literal)));
        }
    }
}

/// Find the `)` closing a reference whose body starts at `start`.
///
/// Nested parentheses and quoted text are skipped.
pub(crate) fn find_closing_paren(text: &str, start: usize) -> Option<usize> {
    let mut depth = 1usize;
    let mut quote: Option<char> = None;

    for (offset, c) in text[start..].char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Split a leading name off `s`; a `-` that starts `->` ends the name
fn take_name(s: &str) -> Option<(&str, &str)> {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if is_name_start(c) => {}
        _ => return None,
    }
    let end = s
        .char_indices()
        .find(|&(i, c)| !is_name_char(c) || s[i..].starts_with("->"))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    Some((&s[..end], &s[end..]))
}

fn parse_property_body(expression: &str, body: &str) -> BuildResult<Fragment> {
    let body = body.trim();
    if body.is_empty() {
        return Err(malformed(expression, "empty property reference"));
    }

    if let Some(after_bracket) = body.strip_prefix('[') {
        let close = after_bracket
            .find(']')
            .ok_or_else(|| malformed(expression, "unterminated type name in static function"))?;
        let type_name = after_bracket[..close].trim();
        if type_name.is_empty() {
            return Err(malformed(expression, "empty type name in static function"));
        }
        let rest = after_bracket[close + 1..].trim_start();
        let rest = rest
            .strip_prefix("::")
            .ok_or_else(|| malformed(expression, "expected '::' after static type name"))?;

        let (first, rest) = parse_call(expression, rest.trim_start())?;
        let mut calls = vec![first];
        calls.extend(parse_chain(expression, rest)?);
        return Ok(Fragment::Function(FunctionInvocation {
            receiver: Receiver::Static(type_name.to_string()),
            calls,
        }));
    }

    let (name, rest) = take_name(body)
        .ok_or_else(|| malformed(expression, format!("invalid property name in '$({})'", body)))?;

    if rest.is_empty() {
        return Ok(Fragment::Property(PropertyReference {
            name: name.to_string(),
        }));
    }

    if !rest.starts_with('.') {
        return Err(malformed(
            expression,
            format!("unexpected text '{}' in property reference", rest),
        ));
    }

    Ok(Fragment::Function(FunctionInvocation {
        receiver: Receiver::Property(name.to_string()),
        calls: parse_chain(expression, rest)?,
    }))
}

/// Parse `Name` or `Name(args)` at the start of `s`
fn parse_call<'s>(expression: &str, s: &'s str) -> BuildResult<(MethodCall, &'s str)> {
    let (name, rest) =
        take_name(s).ok_or_else(|| malformed(expression, "expected a method name"))?;

    if let Some(after_paren) = rest.strip_prefix('(') {
        let close = find_closing_paren(after_paren, 0)
            .ok_or_else(|| malformed(expression, format!("unterminated call to '{}'", name)))?;
        let arguments = split_arguments(&after_paren[..close]);
        Ok((
            MethodCall {
                name: name.to_string(),
                arguments: Some(arguments),
            },
            &after_paren[close + 1..],
        ))
    } else {
        Ok((
            MethodCall {
                name: name.to_string(),
                arguments: None,
            },
            rest,
        ))
    }
}

/// Parse a sequence of `.Method(...)` steps
fn parse_chain(expression: &str, mut rest: &str) -> BuildResult<Vec<MethodCall>> {
    let mut calls = Vec::new();
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return Ok(calls);
        }
        let after_dot = rest
            .strip_prefix('.')
            .ok_or_else(|| malformed(expression, format!("unexpected text '{}'", rest)))?;
        let (call, remaining) = parse_call(expression, after_dot.trim_start())?;
        calls.push(call);
        rest = remaining;
    }
}

/// Split raw argument text on top-level commas
fn split_arguments(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for c in text.chars() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            current.push(c);
            continue;
        }
        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                current.push(c);
            }
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => args.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    args.push(current.trim().to_string());
    args
}

fn parse_item_body(expression: &str, body: &str) -> BuildResult<ItemReference> {
    let body = body.trim();
    let (name, mut rest) = take_name(body)
        .ok_or_else(|| malformed(expression, format!("invalid item name in '@({})'", body)))?;

    let mut transform = None;
    let mut separator = None;

    rest = rest.trim_start();
    if let Some(after_arrow) = rest.strip_prefix("->") {
        let (text, remaining) = take_quoted(expression, after_arrow.trim_start())?;
        transform = Some(text.to_string());
        rest = remaining.trim_start();
    }
    if let Some(after_comma) = rest.strip_prefix(',') {
        let (text, remaining) = take_quoted(expression, after_comma.trim_start())?;
        separator = Some(text.to_string());
        rest = remaining.trim_start();
    }
    if !rest.is_empty() {
        return Err(malformed(
            expression,
            format!("unexpected text '{}' in item reference", rest),
        ));
    }

    Ok(ItemReference {
        item_type: name.to_string(),
        transform,
        separator,
    })
}

/// Read a `'...'` string at the start of `s`
fn take_quoted<'s>(expression: &str, s: &'s str) -> BuildResult<(&'s str, &'s str)> {
    let inner = s
        .strip_prefix('\'')
        .ok_or_else(|| malformed(expression, "expected a quoted string in item reference"))?;
    let end = inner
        .find('\'')
        .ok_or_else(|| malformed(expression, "unterminated quoted string in item reference"))?;
    Ok((&inner[..end], &inner[end + 1..]))
}

fn parse_metadata_body(expression: &str, body: &str) -> BuildResult<MetadataReference> {
    let body = body.trim();
    let invalid = || malformed(expression, format!("invalid metadata reference '%({})'", body));

    let (first, rest) = take_name(body).ok_or_else(invalid)?;
    if rest.is_empty() {
        return Ok(MetadataReference {
            item_type: None,
            name: first.to_string(),
        });
    }

    let after_dot = rest.strip_prefix('.').ok_or_else(invalid)?;
    let (second, rest) = take_name(after_dot).ok_or_else(invalid)?;
    if !rest.is_empty() {
        return Err(invalid());
    }

    Ok(MetadataReference {
        item_type: Some(first.to_string()),
        name: second.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BuildError, StructuralError};

    fn lit(s: &str) -> Fragment {
        Fragment::Literal(s.to_string())
    }

    #[test]
    fn test_parse_literal_and_property() {
        let expr = Expression::parse("bin/$(Configuration)/", ParseOptions::PROPERTIES).unwrap();
        assert_eq!(
            expr.fragments(),
            &[
                lit("bin/"),
                Fragment::Property(PropertyReference {
                    name: "Configuration".to_string()
                }),
                lit("/"),
            ]
        );
    }

    #[test]
    fn test_items_disabled_stay_literal() {
        let expr = Expression::parse("@(Compile);x", ParseOptions::PROPERTIES).unwrap();
        assert_eq!(expr.fragments(), &[lit("@(Compile);x")]);
    }

    #[test]
    fn test_parse_split_on_semicolon() {
        let expr = Expression::parse("a;@(Compile);b", ParseOptions::ITEMS).unwrap();
        assert_eq!(expr.fragments().len(), 5);
        assert!(expr.fragments()[1].is_separator());
        assert!(matches!(expr.fragments()[2], Fragment::Item(_)));
    }

    #[test]
    fn test_parse_item_transform_and_separator() {
        let expr = Expression::parse(
            "@(Compile->'%(Filename).obj', ' ')",
            ParseOptions::ALL,
        )
        .unwrap();
        let item = expr.item_references().next().unwrap();
        assert_eq!(item.item_type, "Compile");
        assert_eq!(item.transform.as_deref(), Some("%(Filename).obj"));
        assert_eq!(item.separator.as_deref(), Some(" "));
        // Metadata inside the transform is not a top-level reference
        assert_eq!(expr.metadata_references().count(), 0);
    }

    #[test]
    fn test_arrow_ends_hyphenated_item_name() {
        let expr = Expression::parse("@(Content-Files->'%(Extension)')", ParseOptions::ALL).unwrap();
        let item = expr.item_references().next().unwrap();
        assert_eq!(item.item_type, "Content-Files");
        assert_eq!(item.transform.as_deref(), Some("%(Extension)"));

        let expr = Expression::parse("@(Compile-Extra)", ParseOptions::ALL).unwrap();
        assert_eq!(expr.item_references().next().unwrap().item_type, "Compile-Extra");
    }

    #[test]
    fn test_parse_metadata_qualified_and_unqualified() {
        let expr = Expression::parse("%(Culture) %(Compile.Link)", ParseOptions::ALL).unwrap();
        let refs: Vec<_> = expr.metadata_references().collect();
        assert_eq!(refs.len(), 2);
        assert!(!refs[0].is_qualified());
        assert_eq!(refs[1].item_type.as_deref(), Some("Compile"));
        assert_eq!(refs[1].name, "Link");
    }

    #[test]
    fn test_parse_instance_function_chain() {
        let expr =
            Expression::parse("$(Name.Replace('a', 'b').ToUpper())", ParseOptions::PROPERTIES)
                .unwrap();
        match &expr.fragments()[0] {
            Fragment::Function(f) => {
                assert_eq!(f.receiver, Receiver::Property("Name".to_string()));
                assert_eq!(f.calls.len(), 2);
                assert_eq!(
                    f.calls[0].arguments,
                    Some(vec!["'a'".to_string(), "'b'".to_string()])
                );
                assert_eq!(f.calls[1].arguments, Some(vec![]));
            }
            other => panic!("unexpected fragment {:?}", other),
        }
    }

    #[test]
    fn test_parse_static_function_with_nested_property() {
        let expr = Expression::parse(
            "$([Path]::Combine($(Root), 'obj')).Length",
            ParseOptions::PROPERTIES,
        )
        .unwrap();
        // `.Length` after the closing paren is literal text
        assert_eq!(expr.fragments().len(), 2);
        match &expr.fragments()[0] {
            Fragment::Function(f) => {
                assert_eq!(f.receiver, Receiver::Static("Path".to_string()));
                assert_eq!(f.calls[0].name, "Combine");
                assert_eq!(
                    f.calls[0].arguments,
                    Some(vec!["$(Root)".to_string(), "'obj'".to_string()])
                );
            }
            other => panic!("unexpected fragment {:?}", other),
        }
    }

    #[test]
    fn test_unterminated_reference_is_structural() {
        let err = Expression::parse("$(Foo", ParseOptions::PROPERTIES).unwrap_err();
        assert!(matches!(
            err,
            BuildError::Structural(StructuralError::MalformedExpression { .. })
        ));
    }

    #[test]
    fn test_invalid_names_rejected() {
        assert!(Expression::parse("$()", ParseOptions::PROPERTIES).is_err());
        assert!(Expression::parse("@(1abc)", ParseOptions::ITEMS).is_err());
        assert!(Expression::parse("%(a.b.c)", ParseOptions::ALL).is_err());
        assert!(Expression::parse("$(Foo Bar)", ParseOptions::PROPERTIES).is_err());
    }

    #[test]
    fn test_escaped_text_is_literal() {
        let expr = Expression::parse("50%25 %3b", ParseOptions::ALL).unwrap();
        assert_eq!(expr.fragments(), &[lit("50%25 %3b")]);
    }
}
