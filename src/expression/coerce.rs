//! Scalar, boolean and array coercion of evaluated text

use crate::expression::escape::unescape;

/// Parse the boolean literal set: true/on/yes and false/off/no (any case).
///
/// A leading `!` negates the literal.
pub fn to_bool(s: &str) -> Option<bool> {
    let s = s.trim();
    if let Some(rest) = s.strip_prefix('!') {
        return to_bool(rest).map(|b| !b);
    }
    match s.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" => Some(true),
        "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

/// Parse a decimal, floating point or `0x` hexadecimal number
pub fn to_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let value = if let Some(hex) = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16).ok()? as f64
    } else {
        if !body
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || c == '-' || c == '+')
            || !body.starts_with(|c: char| c.is_ascii_digit() || c == '.')
        {
            return None;
        }
        body.parse::<f64>().ok()?
    };

    Some(if negative { -value } else { value })
}

/// Render a number the way expressions print it (no trailing `.0`)
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Render a boolean result of a function
pub fn format_bool(b: bool) -> String {
    if b { "True" } else { "False" }.to_string()
}

/// Split escaped text into an array on unescaped `;`.
///
/// Entries are trimmed and unescaped; whitespace-only entries are dropped.
pub fn to_array(escaped: &str) -> Vec<String> {
    escaped
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(unescape)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_bool() {
        assert_eq!(to_bool("TRUE"), Some(true));
        assert_eq!(to_bool(" on "), Some(true));
        assert_eq!(to_bool("Yes"), Some(true));
        assert_eq!(to_bool("false"), Some(false));
        assert_eq!(to_bool("Off"), Some(false));
        assert_eq!(to_bool("no"), Some(false));
        assert_eq!(to_bool("!true"), Some(false));
        assert_eq!(to_bool("1"), None);
        assert_eq!(to_bool(""), None);
    }

    #[test]
    fn test_to_number() {
        assert_eq!(to_number("1"), Some(1.0));
        assert_eq!(to_number("-2.5"), Some(-2.5));
        assert_eq!(to_number("0x1F"), Some(31.0));
        assert_eq!(to_number(" 10 "), Some(10.0));
        assert_eq!(to_number("1.0.0"), None);
        assert_eq!(to_number("abc"), None);
        assert_eq!(to_number("e5"), None);
        assert_eq!(to_number(""), None);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-1.5), "-1.5");
    }

    #[test]
    fn test_to_array_drops_blank_entries() {
        assert_eq!(to_array("a; b ;;  ;c%3bd"), vec!["a", "b", "c;d"]);
        assert!(to_array("  ").is_empty());
    }
}
