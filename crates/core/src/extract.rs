//! Loose-structure extraction: pulls the page list and config object out of
//! a generated document using a layered strategy chain. No strategy failure
//! is fatal; a slot that survives every strategy unfilled stays `Missing`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::literal;
use crate::model::{ExtractedValue, BOOK_CONFIG_KEY, CONFIG_BINDING, PAGES_BINDING};

#[derive(Debug)]
pub struct Extraction {
    pub pages: ExtractedValue,
    pub config: ExtractedValue,
}

/// Assignment heads for the capture strategy. The optional `window.` prefix
/// is matched explicitly so other receiver objects never bind.
static PAGES_ASSIGN_RE: Lazy<Regex> = Lazy::new(|| assignment_head(PAGES_BINDING));
static CONFIG_ASSIGN_RE: Lazy<Regex> = Lazy::new(|| assignment_head(CONFIG_BINDING));

/// Literal declarations for the fallback strategy, first non-greedy match.
static PAGES_LITERAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?s)var\s+{PAGES_BINDING}\s*=\s*(\[.*?\]);")).unwrap()
});
static CONFIG_LITERAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?s)var\s+{CONFIG_BINDING}\s*=\s*(\{{.*?\}});")).unwrap()
});

/// Narrow quoted-field fallback for documents whose config object is too
/// malformed for the other strategies.
static BOOK_CONFIG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r#""{BOOK_CONFIG_KEY}"\s*:\s*"([^"]+)""#)).unwrap()
});

fn assignment_head(binding: &str) -> Regex {
    Regex::new(&format!(
        r"(?P<prefix>var\s+|window\s*\.\s*)?(?P<name>{binding})\s*="
    ))
    .unwrap()
}

pub fn extract(doc: &str) -> Extraction {
    let mut pages = finalize(capture_assignments(doc, &PAGES_ASSIGN_RE));
    let mut config = finalize(capture_assignments(doc, &CONFIG_ASSIGN_RE));
    if !pages.is_missing() {
        tracing::debug!(slot = "pages", strategy = "capture", "slot filled");
    }
    if !config.is_missing() {
        tracing::debug!(slot = "config", strategy = "capture", "slot filled");
    }

    if pages.is_missing() {
        if let Some(value) = literal_match(doc, &PAGES_LITERAL_RE) {
            tracing::debug!(slot = "pages", strategy = "literal", "slot filled");
            pages = finalize(Some(value));
        }
    }
    if config.is_missing() {
        if let Some(value) = literal_match(doc, &CONFIG_LITERAL_RE) {
            tracing::debug!(slot = "config", strategy = "literal", "slot filled");
            config = finalize(Some(value));
        }
    }

    if needs_book_config(&config) {
        if let Some(found) = BOOK_CONFIG_RE.captures(doc) {
            tracing::debug!(slot = "config", strategy = "book-config", "field injected");
            let ciphertext = Value::String(found[1].to_string());
            config = match config {
                ExtractedValue::Structured(Value::Object(mut map)) => {
                    map.insert(BOOK_CONFIG_KEY.to_string(), ciphertext);
                    ExtractedValue::Structured(Value::Object(map))
                }
                _ => {
                    let mut map = serde_json::Map::new();
                    map.insert(BOOK_CONFIG_KEY.to_string(), ciphertext);
                    ExtractedValue::Structured(Value::Object(map))
                }
            };
        }
    }

    Extraction { pages, config }
}

/// Capture strategy: scan for assignments to the known binding in any of
/// the observed source forms and evaluate each right-hand side without
/// executing anything. Later assignments overwrite earlier ones, the way a
/// live script run would leave the binding. A right-hand side that fails
/// both parses is swallowed; bindings made before it are kept.
fn capture_assignments(doc: &str, head: &Regex) -> Option<Value> {
    let bytes = doc.as_bytes();
    let mut captured = None;
    for found in head.captures_iter(doc) {
        // Reject property assignments on unrelated receivers: the boundary
        // byte is the one before the whole match when a `var`/`window.`
        // prefix participated (so `mywindow.` or `x.window.` cannot bind),
        // otherwise the one before the bare name.
        let boundary = match found.name("prefix") {
            Some(prefix) => prefix.start(),
            None => found.name("name").unwrap().start(),
        };
        if let Some(prev) = boundary.checked_sub(1).map(|i| bytes[i]) {
            if is_ident_byte(prev) || prev == b'.' {
                continue;
            }
        }
        let after = found.get(0).unwrap().end();
        // `==`, `===` and `=>` are not assignments.
        if matches!(bytes.get(after), Some(b'=') | Some(b'>')) {
            continue;
        }
        if let Some(value) = evaluate_rhs(doc, after) {
            captured = Some(value);
        }
    }
    captured
}

fn evaluate_rhs(doc: &str, mut pos: usize) -> Option<Value> {
    let bytes = doc.as_bytes();
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    let literal = match bytes.get(pos)? {
        b'[' | b'{' => slice_balanced(doc, pos)?,
        b'"' | b'\'' => slice_string_literal(doc, pos)?,
        _ => return None,
    };
    parse_literal(literal)
}

fn parse_literal(literal: &str) -> Option<Value> {
    match serde_json::from_str(literal) {
        Ok(value) => Some(value),
        Err(strict_err) => match literal::parse_loose(literal) {
            Ok(value) => Some(value),
            Err(loose_err) => {
                tracing::debug!(%strict_err, %loose_err, "literal rejected by both parsers");
                None
            }
        },
    }
}

/// Slice a `{...}`/`[...]` literal by balanced-delimiter scan, skipping
/// delimiters inside string literals.
fn slice_balanced(doc: &str, open: usize) -> Option<&str> {
    let bytes = doc.as_bytes();
    let mut depth = 0usize;
    let mut in_string: Option<u8> = None;
    let mut i = open;
    while i < bytes.len() {
        let byte = bytes[i];
        if let Some(quote) = in_string {
            match byte {
                b'\\' => i += 1,
                _ if byte == quote => in_string = None,
                _ => {}
            }
        } else {
            match byte {
                b'"' | b'\'' => in_string = Some(byte),
                b'{' | b'[' => depth += 1,
                b'}' | b']' => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(&doc[open..=i]);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Slice a quoted string literal including its quotes.
fn slice_string_literal(doc: &str, open: usize) -> Option<&str> {
    let bytes = doc.as_bytes();
    let quote = bytes[open];
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            byte if byte == quote => return Some(&doc[open..=i]),
            _ => {}
        }
        i += 1;
    }
    None
}

fn literal_match(doc: &str, pattern: &Regex) -> Option<Value> {
    let found = pattern.captures(doc)?;
    parse_literal(found.get(1).unwrap().as_str())
}

/// An empty container counts as an unfilled slot, matching the empty
/// pre-declared bindings the capture strategy starts from.
fn finalize(value: Option<Value>) -> ExtractedValue {
    match value {
        None | Some(Value::Null) => ExtractedValue::Missing,
        Some(Value::Array(items)) if items.is_empty() => ExtractedValue::Missing,
        Some(Value::Object(map)) if map.is_empty() => ExtractedValue::Missing,
        Some(Value::String(text)) => ExtractedValue::Plain(text),
        Some(other) => ExtractedValue::Structured(other),
    }
}

fn needs_book_config(config: &ExtractedValue) -> bool {
    match config {
        ExtractedValue::Structured(Value::Object(map)) => !matches!(
            map.get(BOOK_CONFIG_KEY),
            Some(Value::String(text)) if !text.is_empty()
        ),
        ExtractedValue::Structured(_) => true,
        ExtractedValue::Missing => true,
        // A whole-value string capture feeds the encoded-config path as-is.
        ExtractedValue::Encoded(_) | ExtractedValue::Plain(_) => false,
    }
}

fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'$'
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn captures_var_assignments() {
        let doc = r#"
            var fliphtml5_pages = [{"n": ["p1.webp"]}];
            var htmlConfig = {"meta": {"title": "Book"}};
        "#;
        let out = extract(doc);
        assert_eq!(
            out.pages,
            ExtractedValue::Structured(json!([{"n": ["p1.webp"]}]))
        );
        assert_eq!(
            out.config,
            ExtractedValue::Structured(json!({"meta": {"title": "Book"}}))
        );
    }

    #[test]
    fn captures_bare_and_window_assignments() {
        let doc = r#"
            htmlConfig={"a":1};
            window.fliphtml5_pages = [{"id": 7}];
        "#;
        let out = extract(doc);
        assert_eq!(out.pages, ExtractedValue::Structured(json!([{"id": 7}])));
        assert_eq!(out.config, ExtractedValue::Structured(json!({"a": 1})));
    }

    #[test]
    fn last_assignment_wins() {
        let doc = r#"
            var fliphtml5_pages = [{"id": 1}];
            fliphtml5_pages = [{"id": 2}];
        "#;
        let out = extract(doc);
        assert_eq!(out.pages, ExtractedValue::Structured(json!([{"id": 2}])));
    }

    #[test]
    fn other_receivers_do_not_bind() {
        let doc = r#"app.htmlConfig = {"a": 1}; if (htmlConfig == null) {}"#;
        let out = extract(doc);
        assert!(out.config.is_missing());
    }

    #[test]
    fn window_suffixed_receivers_do_not_bind() {
        let doc = r#"mywindow.htmlConfig = {"hijacked": true};"#;
        let out = extract(doc);
        assert!(out.config.is_missing());
    }

    #[test]
    fn chained_window_receivers_do_not_bind() {
        let doc = r#"frames.window.fliphtml5_pages = [{"id": 1}];"#;
        let out = extract(doc);
        assert!(out.pages.is_missing());
    }

    #[test]
    fn bad_rhs_is_swallowed_earlier_binding_kept() {
        let doc = r#"
            var fliphtml5_pages = [{"id": 1}];
            fliphtml5_pages = [function() {}];
        "#;
        let out = extract(doc);
        assert_eq!(out.pages, ExtractedValue::Structured(json!([{"id": 1}])));
    }

    #[test]
    fn loose_object_literal_is_accepted() {
        let doc = "var htmlConfig = {bookConfig: 'vAbC', pageCount: 12};";
        let out = extract(doc);
        assert_eq!(
            out.config,
            ExtractedValue::Structured(json!({"bookConfig": "vAbC", "pageCount": 12}))
        );
    }

    #[test]
    fn string_rhs_captures_as_plain() {
        let doc = r#"var fliphtml5_pages = "v0102";"#;
        let out = extract(doc);
        assert_eq!(out.pages, ExtractedValue::Plain("v0102".to_string()));
    }

    #[test]
    fn empty_containers_leave_slot_missing() {
        let doc = "var fliphtml5_pages = []; var htmlConfig = {};";
        let out = extract(doc);
        assert!(out.pages.is_missing());
        // The empty config object falls through to the narrow fallback,
        // which finds nothing here.
        assert!(out.config.is_missing());
    }

    #[test]
    fn capture_skips_delimiters_inside_strings() {
        let doc = r#"var htmlConfig = {"t": "a}b", "n": 3};"#;
        let out = extract(doc);
        assert_eq!(
            out.config,
            ExtractedValue::Structured(json!({"t": "a}b", "n": 3}))
        );
    }

    #[test]
    fn literal_strategy_fills_after_capture_misses() {
        // A bracket hidden in a comment derails the balanced scan; the
        // non-greedy declaration match still lands on the real terminator
        // and the tolerant parser strips the comment.
        let doc = "var fliphtml5_pages = [1, 2 /* ] */ ];";
        let out = extract(doc);
        assert_eq!(out.pages, ExtractedValue::Structured(json!([1, 2])));
    }

    #[test]
    fn narrow_fallback_builds_minimal_config() {
        let doc = r#"<script>load({"bookConfig":"vSECRET","junk":})</script>"#;
        let out = extract(doc);
        assert_eq!(
            out.config,
            ExtractedValue::Structured(json!({"bookConfig": "vSECRET"}))
        );
    }

    #[test]
    fn narrow_fallback_injects_into_existing_config() {
        let doc = r#"
            var htmlConfig = {"meta": 1};
            other = {"bookConfig":"vKEY"};
        "#;
        let out = extract(doc);
        assert_eq!(
            out.config,
            ExtractedValue::Structured(json!({"meta": 1, "bookConfig": "vKEY"}))
        );
    }

    #[test]
    fn nothing_extractable_stays_missing() {
        let out = extract("<html><body>no payload here</body></html>");
        assert!(out.pages.is_missing());
        assert!(out.config.is_missing());
    }
}
