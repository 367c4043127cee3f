//! Argument normalization for identity comparison.
//!
//! Two tool calls that differ only in key casing, stray whitespace, or
//! argument insertion order must dedupe to one backend call. Normalization
//! runs once at the dispatcher boundary; everything downstream (dedup,
//! cache keys) operates on normalized arguments.

use crate::types::Arguments;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value as JsonValue;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("valid whitespace regex");
}

/// Normalize a capability or argument key: trim, lowercase.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Normalize a scalar string value: trim, collapse runs of whitespace,
/// case-fold.
///
/// "  New   York " and "new york" must hit the same cache entry.
fn normalize_string(value: &str) -> String {
    WHITESPACE
        .replace_all(value.trim(), " ")
        .to_lowercase()
}

/// Normalize one argument value.
///
/// Strings are case/whitespace-folded; other scalars pass through.
/// Arguments are scalar-valued per the tool-call contract, so nested
/// structures pass through untouched.
fn normalize_value(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::String(s) => JsonValue::String(normalize_string(s)),
        other => other.clone(),
    }
}

/// Normalize an argument mapping: keys trimmed/lowercased, string values
/// folded, key order canonical via `BTreeMap`.
pub fn normalize_arguments(arguments: &Arguments) -> Arguments {
    arguments
        .iter()
        .map(|(k, v)| (normalize_name(k), normalize_value(v)))
        .collect()
}

/// Backslash-escape the key separators so a `|` or `=` inside a
/// capability name, argument key, or rendered value cannot shift a
/// component boundary and collide two distinct identities.
fn escape_component(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '|' | '=') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Derive the identity/cache key for `(capability, normalized arguments)`.
///
/// The caller is expected to pass already-normalized arguments; keys built
/// from un-normalized arguments will not collide with their normalized
/// twins, defeating dedup.
pub fn identity_key(capability: &str, arguments: &Arguments) -> String {
    let mut key = String::with_capacity(capability.len() + arguments.len() * 16);
    key.push_str(&escape_component(capability));
    for (name, value) in arguments {
        key.push('|');
        key.push_str(&escape_component(name));
        key.push('=');
        // serde_json renders scalars deterministically
        key.push_str(&escape_component(&value.to_string()));
    }
    key
}
