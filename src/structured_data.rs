//! Machine-readable availability signals embedded in a product page.
//!
//! Three sources are consulted in order: JSON-LD blocks, microdata
//! attributes and JSON fragments inside ordinary inline scripts. Each one
//! answers `Some(true)` for in stock, `Some(false)` for out of stock and
//! `None` when it has nothing to say.

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use std::sync::LazyLock;

static JSONLD_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("valid JSON-LD selector")
});

static MICRODATA_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"[itemprop="availability"]"#).expect("valid microdata selector")
});

static INLINE_SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script[^>]*>(.*?)</script>").expect("valid inline script pattern")
});

/// Scripts are only searched when they mention one of these quoted keys.
const INLINE_SCRIPT_HINTS: &[&str] = &[r#""availability""#, r#""inStock""#, r#""available""#, r#""inventory""#];

const AVAILABILITY_KEY_TOKENS: &[&str] = &["availability", "avail", "stock", "inventory", "instock"];

// Checked before the positive family: "unavailable" contains "available".
const NEGATIVE_VALUE_TOKENS: &[&str] = &["outofstock", "out of stock", "unavailable", "false"];
const POSITIVE_VALUE_TOKENS: &[&str] = &["instock", "in stock", "available", "sellable", "true"];

/// Run every strategy in priority order. `html` must be the text `document`
/// was parsed from.
pub fn extract_availability(document: &Html, html: &str) -> Option<bool> {
    jsonld_availability(document)
        .or_else(|| microdata_availability(document))
        .or_else(|| inline_json_availability(html))
}

/// First classifiable `availability` field of the first JSON-LD block that
/// has one.
pub fn jsonld_availability(document: &Html) -> Option<bool> {
    for script in document.select(&JSONLD_SELECTOR) {
        let raw: String = script.text().collect();
        if raw.trim().is_empty() {
            continue;
        }
        let Ok(data) = serde_json::from_str::<Value>(&raw) else {
            tracing::debug!("Skipping unparsable JSON-LD block ({} bytes)", raw.len());
            continue;
        };
        if let Some(found) = first_schema_availability(&data) {
            return Some(found);
        }
    }
    None
}

fn first_schema_availability(node: &Value) -> Option<bool> {
    match node {
        Value::Object(map) => {
            if let Some(found) = map.get("availability").and_then(classify_schema_value) {
                return Some(found);
            }
            map.iter()
                .filter(|(key, _)| key.as_str() != "availability")
                .find_map(|(_, child)| first_schema_availability(child))
        }
        Value::Array(items) => items.iter().find_map(first_schema_availability),
        _ => None,
    }
}

fn classify_schema_value(value: &Value) -> Option<bool> {
    let text = match value {
        Value::String(s) => s.to_lowercase(),
        other => other.to_string().to_lowercase(),
    };
    classify_schema_token(&text)
}

fn classify_schema_token(lower: &str) -> Option<bool> {
    if lower.contains("instock") {
        Some(true)
    } else if lower.contains("outofstock") {
        Some(false)
    } else {
        None
    }
}

pub fn microdata_availability(document: &Html) -> Option<bool> {
    document.select(&MICRODATA_SELECTOR).find_map(|el| {
        let attrs = el.value();
        let value = attrs
            .attr("href")
            .filter(|v| !v.is_empty())
            .or_else(|| attrs.attr("content").filter(|v| !v.is_empty()))
            .map(str::to_string)
            .unwrap_or_else(|| el.text().collect());
        classify_schema_token(&value.to_lowercase())
    })
}

/// Scan inline scripts for JSON fragments carrying stock keys.
pub fn inline_json_availability(html: &str) -> Option<bool> {
    for capture in INLINE_SCRIPT.captures_iter(html) {
        let Some(body) = capture.get(1).map(|m| m.as_str()) else {
            continue;
        };
        if !INLINE_SCRIPT_HINTS.iter().any(|hint| body.contains(hint)) {
            continue;
        }
        if let Some(found) = scan_json_fragments(body) {
            return Some(found);
        }
    }
    None
}

fn scan_json_fragments(body: &str) -> Option<bool> {
    let bytes = body.as_bytes();
    let mut start = 0;
    while start < bytes.len() {
        if matches!(bytes[start], b'{' | b'[') {
            if let Some(end) = balanced_end(bytes, start) {
                if let Ok(value) = serde_json::from_str::<Value>(&body[start..=end]) {
                    if let Some(found) = scan_availability_keys(&value) {
                        return Some(found);
                    }
                    start = end + 1;
                    continue;
                }
            }
        }
        start += 1;
    }
    None
}

/// Index of the bracket closing the one at `start`, skipping over string
/// literals. `None` when the brackets are unbalanced or mismatched.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut stack: Vec<u8> = Vec::new();
    let mut in_string: Option<u8> = None;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if let Some(quote) = in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == quote {
                in_string = None;
            }
            continue;
        }
        match byte {
            b'"' | b'\'' => in_string = Some(byte),
            b'{' => stack.push(b'}'),
            b'[' => stack.push(b']'),
            b'}' | b']' => {
                if stack.pop() != Some(byte) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Depth-first search for a stock-like key with a classifiable scalar value.
pub fn scan_availability_keys(node: &Value) -> Option<bool> {
    match node {
        Value::Object(map) => {
            for (key, value) in map {
                let key = key.to_lowercase();
                if AVAILABILITY_KEY_TOKENS.iter().any(|t| key.contains(t)) {
                    if let Some(found) = classify_scalar(value) {
                        return Some(found);
                    }
                }
                if let Some(found) = scan_availability_keys(value) {
                    return Some(found);
                }
            }
            None
        }
        Value::Array(items) => items.iter().find_map(scan_availability_keys),
        _ => None,
    }
}

fn classify_scalar(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => {
            let lower = s.to_lowercase();
            if NEGATIVE_VALUE_TOKENS.iter().any(|t| lower.contains(t)) {
                Some(false)
            } else if POSITIVE_VALUE_TOKENS.iter().any(|t| lower.contains(t)) {
                Some(true)
            } else {
                None
            }
        }
        _ => None,
    }
}
