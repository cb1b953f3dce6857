//! `%XX` escaping of reserved expression characters

/// Characters with special meaning in expressions
pub const RESERVED_CHARS: &[char] = &['%', '*', '?', '@', '$', '(', ')', ';', '\''];

/// Escape every reserved character as `%XX` (lowercase hex)
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if RESERVED_CHARS.contains(&c) {
            out.push_str(&format!("%{:02x}", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}

/// Replace `%XX` sequences with the bytes they encode.
///
/// Decoded bytes are read as UTF-8, so `%c3%a9` is `é`; byte runs that are
/// not valid UTF-8 become U+FFFD. Malformed sequences are kept verbatim.
pub fn unescape(s: &str) -> String {
    if !s.contains('%') {
        return s.to_string();
    }

    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push(hi * 16 + lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    match String::from_utf8(out) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// True when the text contains an unescaped wildcard
pub fn has_wildcard(s: &str) -> bool {
    s.contains('*') || s.contains('?')
}
