//! `${...}` expression markers
//!
//! A string that is exactly one `${...}` is a full expression and keeps the
//! type of its result. A string with embedded markers is a template: each
//! marker is replaced by the string form of its result.

use serde_json::Value;

const OPEN: &str = "${";

/// Byte span of one marker: `start` at `$`, `end` one past the closing `}`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
}

fn next_span(text: &str, from: usize) -> Option<Span> {
    let start = from + text[from..].find(OPEN)?;
    let mut depth = 0usize;
    for (offset, ch) in text[start + OPEN.len()..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' if depth == 0 => {
                return Some(Span {
                    start,
                    end: start + OPEN.len() + offset + 1,
                })
            }
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// True when the whole (trimmed) string is a single marker
pub fn is_expression(text: &str) -> bool {
    let trimmed = text.trim();
    matches!(next_span(trimmed, 0), Some(span) if span.start == 0 && span.end == trimmed.len())
}

/// True when the string holds at least one complete marker
pub fn contains_expression(text: &str) -> bool {
    next_span(text, 0).is_some()
}

/// Inner source of a full expression, or the text itself otherwise
pub fn extract_expression(text: &str) -> &str {
    let trimmed = text.trim();
    if is_expression(trimmed) {
        trimmed[OPEN.len()..trimmed.len() - 1].trim()
    } else {
        text
    }
}

/// Replace every marker with the string form of its evaluated result
pub fn resolve_template<E, F>(text: &str, mut eval: F) -> Result<String, E>
where
    F: FnMut(&str) -> Result<Value, E>,
{
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    while let Some(span) = next_span(text, cursor) {
        out.push_str(&text[cursor..span.start]);
        let source = text[span.start + OPEN.len()..span.end - 1].trim();
        out.push_str(&stringify(&eval(source)?));
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    Ok(out)
}

/// Template coercion of a JSON value
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_expression_detection() {
        assert!(is_expression("${document('/counter') + 1}"));
        assert!(is_expression("  ${steps.Calc.total}  "));
        assert!(is_expression("${ {a = 1} }"));
        assert!(!is_expression("Total: ${x}"));
        assert!(!is_expression("${a} and ${b}"));
        assert!(!is_expression("plain"));
    }

    #[test]
    fn test_extract() {
        assert_eq!(extract_expression("${ event.amount }"), "event.amount");
        assert_eq!(extract_expression("no marker"), "no marker");
    }

    #[test]
    fn test_template_resolution() {
        let out: Result<String, ()> = resolve_template("Hello ${name}, you owe ${amount}!", |src| {
            Ok(match src {
                "name" => json!("Alice"),
                _ => json!(42),
            })
        });
        assert_eq!(out.unwrap(), "Hello Alice, you owe 42!");
    }

    #[test]
    fn test_template_propagates_errors() {
        let out: Result<String, String> =
            resolve_template("a ${bad} b", |src| Err(format!("cannot eval {src}")));
        assert_eq!(out.unwrap_err(), "cannot eval bad");
    }

    #[test]
    fn test_unterminated_marker_is_literal() {
        assert!(!contains_expression("price ${oops"));
        let out: Result<String, ()> = resolve_template("price ${oops", |_| Ok(json!(1)));
        assert_eq!(out.unwrap(), "price ${oops");
    }
}
