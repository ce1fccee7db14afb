//! Canonical JSON bytes: the single serialization-for-hashing path.
//!
//! All digest flows that involve JSON route through this module. Rules:
//! object keys sorted by byte order, compact separators, RFC 8259 string
//! escaping, integers only. Floats are rejected so that digests never
//! depend on platform float formatting; float-bearing search state is
//! serialized through plain `serde_json` and never hashed.

use std::io::Write;

/// Failure while canonicalizing a JSON value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonError {
    /// A number was not representable as `i64` or `u64`.
    NonIntegerNumber { raw: String },
}

impl std::fmt::Display for CanonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonIntegerNumber { raw } => {
                write!(f, "canonical JSON rejects non-integer number: {raw}")
            }
        }
    }
}

impl std::error::Error for CanonError {}

/// Produce canonical JSON bytes from a `serde_json::Value`.
///
/// # Errors
///
/// Returns [`CanonError::NonIntegerNumber`] on any float, NaN, or
/// Infinity anywhere in the value.
pub fn canonical_json_bytes(value: &serde_json::Value) -> Result<Vec<u8>, CanonError> {
    let mut out = Vec::new();
    emit(&mut out, value)?;
    Ok(out)
}

fn emit(out: &mut Vec<u8>, value: &serde_json::Value) -> Result<(), CanonError> {
    match value {
        serde_json::Value::Null => out.extend_from_slice(b"null"),
        serde_json::Value::Bool(true) => out.extend_from_slice(b"true"),
        serde_json::Value::Bool(false) => out.extend_from_slice(b"false"),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                let _ = write!(out, "{i}");
            } else if let Some(u) = n.as_u64() {
                let _ = write!(out, "{u}");
            } else {
                return Err(CanonError::NonIntegerNumber { raw: n.to_string() });
            }
        }
        serde_json::Value::String(s) => emit_string(out, s),
        serde_json::Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                emit(out, item)?;
            }
            out.push(b']');
        }
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                emit_string(out, key);
                out.push(b':');
                emit(out, &map[key.as_str()])?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

fn emit_string(out: &mut Vec<u8>, s: &str) {
    out.push(b'"');
    for ch in s.chars() {
        match ch {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            c if c < '\u{0020}' => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => {
                let mut utf8 = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
            }
        }
    }
    out.push(b'"');
}
