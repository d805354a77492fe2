//! Ordered, case-insensitive multimap used for request headers, query
//! arguments and extra response headers.

use crate::util::deescape;

/// Ordered list of `(key, value)` pairs with case-insensitive lookup.
///
/// Insertion order is preserved and duplicate keys are allowed: [`set`](Self::set)
/// always appends, and [`get`](Self::get) returns the first match. This mirrors
/// how headers arrive on the wire, where e.g. several `Set-Cookie` lines may
/// legitimately repeat.
#[derive(Debug, Clone, Default)]
pub struct ArgList {
    entries: Vec<(String, String)>,
}

impl ArgList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Release all entries.
    pub fn flush(&mut self) {
        self.entries.clear();
    }

    /// First value whose key matches `name` (ASCII case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// First value for `name` parsed as an integer, or `default` when the key
    /// is absent or its value does not parse.
    pub fn get_int(&self, name: &str, default: i64) -> i64 {
        self.get(name)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Append an entry at the tail. Never replaces an existing key.
    pub fn set(&mut self, key: &str, value: &str) {
        self.entries.push((key.to_string(), value.to_string()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parse a URL query string (`a=1&b=two`) and append each pair.
    ///
    /// Keys and values are percent-decoded. Parsing stops at the first
    /// segment without `=`; a trailing `&` is ignored. Malformed input never
    /// fails, it just yields fewer entries.
    pub fn parse_query(&mut self, query: &str) {
        let mut rest = query;
        loop {
            let Some((key, after)) = rest.split_once('=') else {
                break;
            };
            let (value, next) = match after.split_once('&') {
                Some((value, next)) => (value, Some(next)),
                None => (after, None),
            };
            self.set(&deescape(key), &deescape(value));
            match next {
                Some(next) => rest = next,
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_is_case_insensitive() {
        let mut args = ArgList::new();
        args.set("Content-Length", "42");
        assert_eq!(args.get("content-length"), Some("42"));
        assert_eq!(args.get("CONTENT-LENGTH"), Some("42"));
        assert_eq!(args.get("Content-Type"), None);
    }

    #[test]
    fn set_appends_duplicates_and_get_returns_first() {
        let mut args = ArgList::new();
        args.set("X-Tag", "one");
        args.set("x-tag", "two");
        assert_eq!(args.len(), 2);
        assert_eq!(args.get("X-TAG"), Some("one"));
        let order: Vec<_> = args.iter().map(|(_, v)| v).collect();
        assert_eq!(order, vec!["one", "two"]);
    }

    #[test]
    fn get_int_parses_or_defaults() {
        let mut args = ArgList::new();
        args.set("n", " 17 ");
        args.set("bad", "seventeen");
        assert_eq!(args.get_int("n", 0), 17);
        assert_eq!(args.get_int("bad", -1), -1);
        assert_eq!(args.get_int("missing", 5), 5);
    }

    #[test]
    fn flush_releases_everything() {
        let mut args = ArgList::new();
        args.set("a", "1");
        args.flush();
        assert!(args.is_empty());
        assert_eq!(args.get("a"), None);
    }

    #[test]
    fn parse_query_decodes_pairs() {
        let mut args = ArgList::new();
        args.parse_query("a=1&b=two&name=John+Doe&sym=%2B");
        assert_eq!(args.get("a"), Some("1"));
        assert_eq!(args.get("b"), Some("two"));
        assert_eq!(args.get("name"), Some("John Doe"));
        assert_eq!(args.get("sym"), Some("+"));
    }

    #[test]
    fn parse_query_stops_at_segment_without_equals() {
        let mut args = ArgList::new();
        args.parse_query("a=1&flag");
        assert_eq!(args.len(), 1);

        let mut args = ArgList::new();
        args.parse_query("novalue");
        assert!(args.is_empty());
    }

    #[test]
    fn parse_query_keeps_empty_values() {
        let mut args = ArgList::new();
        args.parse_query("a=&b=2&");
        assert_eq!(args.get("a"), Some(""));
        assert_eq!(args.get("b"), Some("2"));
        assert_eq!(args.len(), 2);
    }
}
