//! The `KEY=VALUE` line grammar shared by the config file and project `.env`
//! files.
//!
//! - surrounding whitespace is ignored, blank lines and `#` lines are skipped
//! - an optional `export ` prefix is accepted
//! - lines without `=` are ignored; the first `=` separates key and value
//! - values are trimmed and lose one layer of matching `"` or `'` quotes

use std::sync::OnceLock;

use regex::Regex;

/// Parse one line into `(key, value)`. The value may be empty.
pub fn parse_line(line: &str) -> Option<(&str, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, unquote(value.trim()).to_string()))
}

/// All entries of a file in order. Duplicate keys keep their first value.
pub fn parse_entries(content: &str) -> Vec<(String, String)> {
    let mut entries: Vec<(String, String)> = Vec::new();
    for line in content.lines() {
        if let Some((key, value)) = parse_line(line)
            && !entries.iter().any(|(k, _)| k == key)
        {
            entries.push((key.to_string(), value));
        }
    }
    entries
}

/// Value of the first line defining `key`. An empty value counts as absent.
pub fn lookup(content: &str, key: &str) -> Option<String> {
    content
        .lines()
        .filter_map(parse_line)
        .find(|(k, _)| *k == key)
        .and_then(|(_, v)| if v.is_empty() { None } else { Some(v) })
}

/// Whether `content` holds at least one `KEY=VALUE` pair.
pub fn has_entries(content: &str) -> bool {
    content.lines().any(|line| parse_line(line).is_some())
}

/// Render a single entry so that [`parse_line`] reads back the same value.
pub fn format_entry(key: &str, value: &str) -> String {
    if needs_quotes(value) {
        format!("{}=\"{}\"", key, value)
    } else {
        format!("{}={}", key, value)
    }
}

/// Whether `key` is acceptable as a config key.
pub fn is_valid_key(key: &str) -> bool {
    static KEY_RE: OnceLock<Regex> = OnceLock::new();
    KEY_RE
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.-]*$").expect("static regex"))
        .is_match(key)
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        if (first == b'"' || first == b'\'') && bytes[bytes.len() - 1] == first {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn needs_quotes(value: &str) -> bool {
    value != value.trim() || unquote(value) != value
}
