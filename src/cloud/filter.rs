//! Client-side matching of resource lists
//!
//! The Networking API is listed in full and narrowed here, so name and
//! filter semantics are identical whatever the server supports.

use super::Filters;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Keep the items matching `name_or_id` and `filters`.
///
/// `name_or_id` matches an item whose `id` or `name` equals it, or matches
/// it as a shell-style glob. An empty `name_or_id` does not filter. Every
/// key of `filters` must match; nested mappings are matched recursively as
/// subsets.
pub fn filter_list(
    items: Vec<Value>,
    name_or_id: Option<&str>,
    filters: Option<&Filters>,
) -> Vec<Value> {
    let name_or_id = name_or_id.filter(|name| !name.is_empty());
    let glob = name_or_id.and_then(glob_to_regex);

    items
        .into_iter()
        .filter(|item| match name_or_id {
            Some(pattern) => matches_name_or_id(item, pattern, glob.as_ref()),
            None => true,
        })
        .filter(|item| match filters {
            Some(filters) => matches_filters(item, filters),
            None => true,
        })
        .collect()
}

fn matches_name_or_id(item: &Value, pattern: &str, glob: Option<&Regex>) -> bool {
    ["id", "name"].iter().any(|key| match item.get(key) {
        Some(Value::String(value)) => {
            value == pattern || glob.is_some_and(|re| re.is_match(value))
        }
        _ => false,
    })
}

/// Recursive subset match of `filters` against `item`.
///
/// A nested filter never matches an empty or missing mapping, even when the
/// filter itself is empty.
fn matches_filters(item: &Value, filters: &Filters) -> bool {
    filters.iter().all(|(key, expected)| match expected {
        Value::Object(nested) => match item.get(key) {
            Some(actual @ Value::Object(fields)) if !fields.is_empty() => {
                matches_filters(actual, nested)
            }
            _ => false,
        },
        _ => item.get(key).unwrap_or(&Value::Null) == expected,
    })
}

/// Translate an fnmatch pattern into an anchored regex.
///
/// Returns `None` when the pattern holds no wildcard, so plain names only
/// match exactly.
fn glob_to_regex(pattern: &str) -> Option<Regex> {
    if !pattern.contains(['*', '?', '[']) {
        return None;
    }

    let chars: Vec<char> = pattern.chars().collect();
    let mut re = String::from("^");
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            '[' => {
                // `]` directly after `[` or `[!` is a literal member
                let mut j = i + 1;
                if chars.get(j) == Some(&'!') {
                    j += 1;
                }
                if chars.get(j) == Some(&']') {
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    j += 1;
                }
                if j >= chars.len() {
                    re.push_str(r"\[");
                } else {
                    let members: String = chars[i + 1..j].iter().collect();
                    re.push('[');
                    match members.strip_prefix('!') {
                        Some(rest) => {
                            re.push('^');
                            re.push_str(&escape_class(rest));
                        }
                        None => re.push_str(&escape_class(&members)),
                    }
                    re.push(']');
                    i = j;
                }
            }
            c => re.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    re.push('$');

    match Regex::new(&re) {
        Ok(regex) => Some(regex),
        Err(e) => {
            debug!("Ignoring unusable glob pattern {:?}: {}", pattern, e);
            None
        }
    }
}

/// Escape class members so they keep their fnmatch meaning: `^` is never
/// negation, and `&&`, `--`, `~~` are never class set operators.
fn escape_class(members: &str) -> String {
    let mut escaped = String::with_capacity(members.len());
    let mut previous = None;
    for c in members.chars() {
        match c {
            '\\' | '[' | ']' | '^' | '&' | '~' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '-' if previous == Some('-') => escaped.push_str(r"\-"),
            _ => escaped.push(c),
        }
        previous = Some(c);
    }
    escaped
}
