//! JSON Canonicalization Scheme ([RFC 8785]) serialization.
//!
//! Object keys are sorted lexicographically by their UTF-16 code unit
//! sequence, numbers use the shortest round-trip representation, strings use
//! minimal JSON escaping, and there is no insignificant whitespace. `NaN` and
//! `±Infinity` are rejected rather than silently coerced to `null`, since a
//! receipt claim set containing either is malformed by construction.
//!
//! [RFC 8785]: https://www.rfc-editor.org/rfc/rfc8785

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while canonicalizing a value.
#[derive(Error, Debug)]
pub enum CanonError {
    /// The value could not be turned into a `serde_json::Value` at all.
    #[error("failed to serialize value: {0}")]
    Serialize(#[from] serde_json::Error),
    /// The value contained a non-finite number (`NaN` or `±Infinity`).
    #[error("non-finite numbers cannot be canonicalized")]
    NonFiniteNumber,
}

/// Serialize `value` to its JCS canonical form.
///
/// # Errors
///
/// Returns [`CanonError::Serialize`] if `value` cannot be represented as
/// JSON, or [`CanonError::NonFiniteNumber`] if it contains `NaN`/`Infinity`.
pub fn canonicalize<T: Serialize>(value: &T) -> Result<String, CanonError> {
    let v = serde_json::to_value(value)?;
    canonicalize_value(&v)
}

/// Serialize an already-parsed [`Value`] to its JCS canonical form.
///
/// # Errors
///
/// Returns [`CanonError::NonFiniteNumber`] if `value` contains a non-finite
/// float (this can only happen if the `Value` was built programmatically,
/// since `serde_json` itself cannot parse `NaN`/`Infinity`).
pub fn canonicalize_value(value: &Value) -> Result<String, CanonError> {
    let mut out = String::new();
    write_value(value, &mut out)?;
    Ok(out)
}

fn write_value(value: &Value, out: &mut String) -> Result<(), CanonError> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => write_number(n, out)?,
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| a.encode_utf16().cmp(b.encode_utf16()));
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_value(&map[*key], out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn write_number(n: &serde_json::Number, out: &mut String) -> Result<(), CanonError> {
    if let Some(i) = n.as_i64() {
        let _ = write!(out, "{i}");
    } else if let Some(u) = n.as_u64() {
        let _ = write!(out, "{u}");
    } else {
        let f = n.as_f64().ok_or(CanonError::NonFiniteNumber)?;
        if !f.is_finite() {
            return Err(CanonError::NonFiniteNumber);
        }
        // `f64::to_string` already produces the shortest round-trip decimal
        // representation, matching RFC 8785's "shortest IEEE-754 string"
        // requirement for the receipt-sized numbers this crate deals with.
        let _ = write!(out, "{f}");
    }
    Ok(())
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn sorts_object_keys() {
        let v = json!({"b": 1, "a": 2});
        assert_eq!(canonicalize_value(&v).unwrap(), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn nested_objects_sort_recursively() {
        let v = json!({"z": {"b": 1, "a": 2}, "a": 1});
        assert_eq!(canonicalize_value(&v).unwrap(), r#"{"a":1,"z":{"a":2,"b":1}}"#);
    }

    #[test]
    fn arrays_preserve_order() {
        let v = json!([3, 1, 2]);
        assert_eq!(canonicalize_value(&v).unwrap(), "[3,1,2]");
    }

    #[test]
    fn no_insignificant_whitespace() {
        let v = json!({"a": [1, 2], "b": "x"});
        let s = canonicalize_value(&v).unwrap();
        assert!(!s.contains(' '));
        assert!(!s.contains('\n'));
    }

    #[test]
    fn identical_semantic_content_is_byte_identical_regardless_of_key_order() {
        let v1 = json!({"iss": "https://p.example", "aud": "https://a.example", "iat": 1});
        let v2 = json!({"aud": "https://a.example", "iat": 1, "iss": "https://p.example"});
        assert_eq!(canonicalize_value(&v1).unwrap(), canonicalize_value(&v2).unwrap());
    }

    #[test]
    fn escapes_control_characters() {
        let v = json!({"a": "line1\nline2\ttab"});
        assert_eq!(canonicalize_value(&v).unwrap(), r#"{"a":"line1\nline2\ttab"}"#);
    }
}
