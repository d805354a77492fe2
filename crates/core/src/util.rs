//! String helpers shared by the request parser and the argument lists.

use base64::prelude::{BASE64_STANDARD, Engine as _};

/// Decode a URL-encoded component.
///
/// `+` becomes a space and `%XX` becomes the byte `0xXX`. A malformed escape
/// (non-hex digit or truncated sequence) ends the output at that point, so
/// `"ab%zzcd"` decodes to `"ab"`. Decoded bytes that are not valid UTF-8 are
/// replaced with U+FFFD.
///
/// ```
/// use svchttp::util::deescape;
///
/// assert_eq!(deescape("%41%2B%20"), "A+ ");
/// assert_eq!(deescape("a+b"), "a b");
/// ```
pub fn deescape(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let hi = bytes.get(i + 1).copied().and_then(hex_value);
                let lo = bytes.get(i + 2).copied().and_then(hex_value);
                match (hi, lo) {
                    (Some(hi), Some(lo)) => out.push((hi << 4) | lo),
                    _ => break,
                }
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Split `input` into at most `max` non-empty fields.
///
/// With `delim == None` fields are separated by runs of whitespace; with
/// `Some(c)` they are separated by `c` and each field is trimmed. Input
/// beyond the `max`-th field is dropped.
///
/// ```
/// use svchttp::util::tokenize;
///
/// assert_eq!(tokenize("Basic  dXNlcg==", 2, None), vec!["Basic", "dXNlcg=="]);
/// assert_eq!(tokenize("text/html; charset=UTF-8", 2, Some(';')), vec!["text/html", "charset=UTF-8"]);
/// ```
pub fn tokenize(input: &str, max: usize, delim: Option<char>) -> Vec<&str> {
    match delim {
        None => input.split_whitespace().take(max).collect(),
        Some(c) => input
            .split(c)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .take(max)
            .collect(),
    }
}

/// Decode standard (padded) base64. Returns `None` on malformed input.
pub fn base64_decode(input: &str) -> Option<Vec<u8>> {
    BASE64_STANDARD.decode(input.trim()).ok()
}
