//! Condition tokenizer

use crate::error::{BuildError, BuildResult, StructuralError};
use crate::expression::parser::find_closing_paren;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    LeftParen,
    RightParen,
    Comma,
    Not,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    And,
    Or,
    /// A name directly followed by `(`
    Function(String),
    /// A quoted string (quotes removed) or a bare word, number or reference
    Value { text: String, quoted: bool },
}

pub(crate) fn malformed_condition(condition: &str, message: impl Into<String>) -> BuildError {
    StructuralError::MalformedCondition {
        condition: condition.to_string(),
        message: message.into(),
    }
    .into()
}

/// Split a condition into tokens
pub fn tokenize(condition: &str) -> BuildResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let bytes = condition.as_bytes();
    let mut pos = 0;

    while pos < condition.len() {
        let rest = &condition[pos..];
        let Some(c) = rest.chars().next() else {
            break;
        };

        if c.is_whitespace() {
            pos += c.len_utf8();
            continue;
        }

        let two = rest.get(..2).unwrap_or("");
        let (token, len) = match (c, two) {
            (_, "==") => (Token::Equal, 2),
            (_, "!=") => (Token::NotEqual, 2),
            (_, "<=") => (Token::LessOrEqual, 2),
            (_, ">=") => (Token::GreaterOrEqual, 2),
            ('<', _) => (Token::Less, 1),
            ('>', _) => (Token::Greater, 1),
            ('!', _) => (Token::Not, 1),
            ('(', _) => (Token::LeftParen, 1),
            (')', _) => (Token::RightParen, 1),
            (',', _) => (Token::Comma, 1),
            ('\'', _) => {
                let end = quoted_end(condition, pos + 1)
                    .ok_or_else(|| malformed_condition(condition, "unterminated quoted string"))?;
                tokens.push(Token::Value {
                    text: condition[pos + 1..end].to_string(),
                    quoted: true,
                });
                pos = end + 1;
                continue;
            }
            ('$' | '@' | '%', _) if bytes.get(pos + 1) == Some(&b'(') => {
                let close = find_closing_paren(condition, pos + 2)
                    .ok_or_else(|| malformed_condition(condition, "unterminated reference"))?;
                tokens.push(Token::Value {
                    text: condition[pos..=close].to_string(),
                    quoted: false,
                });
                pos = close + 1;
                continue;
            }
            _ => {
                let len = rest
                    .char_indices()
                    .find(|(_, ch)| !is_word_char(*ch))
                    .map(|(i, _)| i)
                    .unwrap_or(rest.len());
                if len == 0 {
                    return Err(malformed_condition(
                        condition,
                        format!("unexpected character '{}' at position {}", c, pos),
                    ));
                }
                let word = &rest[..len];
                let token = if word.eq_ignore_ascii_case("and") {
                    Token::And
                } else if word.eq_ignore_ascii_case("or") {
                    Token::Or
                } else if rest[len..].trim_start().starts_with('(') {
                    Token::Function(word.to_string())
                } else {
                    Token::Value {
                        text: word.to_string(),
                        quoted: false,
                    }
                };
                (token, len)
            }
        };
        tokens.push(token);
        pos += len;
    }

    Ok(tokens)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '-' | '+' | '/' | '\\' | ':')
}

/// Position of the quote closing a string that starts at `start`.
///
/// Quotes inside `$(...)`, `@(...)` and `%(...)` do not end the string.
fn quoted_end(condition: &str, start: usize) -> Option<usize> {
    let bytes = condition.as_bytes();
    let mut pos = start;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\'' => return Some(pos),
            b'$' | b'@' | b'%' if bytes.get(pos + 1) == Some(&b'(') => {
                pos = find_closing_paren(condition, pos + 2)? + 1;
            }
            _ => pos += 1,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(text: &str, quoted: bool) -> Token {
        Token::Value {
            text: text.to_string(),
            quoted,
        }
    }

    #[test]
    fn test_tokenize_comparison() {
        let tokens = tokenize("'$(X)' == '1'").unwrap();
        assert_eq!(
            tokens,
            vec![value("$(X)", true), Token::Equal, value("1", true)]
        );
    }

    #[test]
    fn test_tokenize_operators_and_keywords() {
        let tokens = tokenize("!(a<=b) AND c >= 2 or $(D)!=''").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Not,
                Token::LeftParen,
                value("a", false),
                Token::LessOrEqual,
                value("b", false),
                Token::RightParen,
                Token::And,
                value("c", false),
                Token::GreaterOrEqual,
                value("2", false),
                Token::Or,
                value("$(D)", false),
                Token::NotEqual,
                value("", true),
            ]
        );
    }

    #[test]
    fn test_tokenize_function() {
        let tokens = tokenize("Exists('out/a.txt')").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Function("Exists".to_string()),
                Token::LeftParen,
                value("out/a.txt", true),
                Token::RightParen,
            ]
        );
    }

    #[test]
    fn test_quotes_inside_reference_do_not_end_string() {
        let tokens = tokenize("'$(Name.Replace('a', 'b'))' == 'b'").unwrap();
        assert_eq!(tokens[0], value("$(Name.Replace('a', 'b'))", true));
    }

    #[test]
    fn test_unterminated_string() {
        assert!(tokenize("'abc").is_err());
        assert!(tokenize("$(abc").is_err());
        assert!(tokenize("a == #").is_err());
    }
}
