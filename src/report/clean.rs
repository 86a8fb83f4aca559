//! Cleanup of brief section text before it goes into a report.
//!
//! Stored sections are normally plain prose, but some rows hold a JSON object or a
//! JSON-escaped string instead. Cleanup runs one fallback chain:
//!
//! 1. text starting with `{` or `"` is parsed as JSON and flattened to prose;
//! 2. if that parse fails, an escape-stripping pass removes wrapping quotes, literal
//!    `\n`/`\"` sequences, braces and `"key":` prefixes;
//! 3. anything else passes through.
//!
//! Every branch then gets the same whitespace normalization, so cleaning clean prose
//! is a no-op.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

pub const EMPTY_SECTION: &str = "No information available for this section.";

struct Patterns {
    key_prefix: Regex,
    pair_separator: Regex,
    blank_runs: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        key_prefix: Regex::new(r#""[A-Za-z_][A-Za-z0-9_ ]*"\s*:\s*"#).expect("static regex"),
        pair_separator: Regex::new(r#""\s*,\s*""#).expect("static regex"),
        blank_runs: Regex::new(r"\n\s*\n\s*\n").expect("static regex"),
    })
}

pub fn clean_brief_text(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return EMPTY_SECTION.to_string();
    }
    let text = if trimmed.starts_with('{') || trimmed.starts_with('"') {
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => flatten(value),
            Err(_) => strip_escapes(trimmed),
        }
    } else {
        trimmed.to_string()
    };
    let cleaned = normalize(&text);
    if cleaned.is_empty() {
        EMPTY_SECTION.to_string()
    } else {
        cleaned
    }
}

fn flatten(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Object(map) => join_blocks(map.into_iter().map(|(_, v)| flatten(v))),
        Value::Array(items) => join_blocks(items.into_iter().map(flatten)),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn join_blocks(blocks: impl Iterator<Item = String>) -> String {
    blocks
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn strip_escapes(text: &str) -> String {
    let p = patterns();
    let text = text.replace("\\n", "\n").replace("\\\"", "\"");
    let text = text.trim();
    let text = text.strip_prefix('{').unwrap_or(text);
    let text = text.strip_suffix('}').unwrap_or(text);
    let text = p.key_prefix.replace_all(text, "");
    let text = p.pair_separator.replace_all(&text, "\n\n");
    text.replace('"', "")
}

fn normalize(text: &str) -> String {
    let text = text.replace("\\n", "\n").replace("\\\"", "\"");
    patterns()
        .blank_runs
        .replace_all(&text, "\n\n")
        .trim()
        .to_string()
}
