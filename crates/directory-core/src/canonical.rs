//! Canonical encoding for signed directory objects
//!
//! Everything that is signed or verified goes through [`canonical_bytes`]:
//! - JSON, UTF-8, no insignificant whitespace
//! - Object keys sorted lexicographically at every depth
//! - Arrays keep their order; a record's neighbors are signed as listed
//!
//! Implementations in other languages MUST produce identical bytes.

use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::{Map, Value};

/// Serialize a value to canonical bytes.
///
/// This is the normative encoding for all signing operations.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let value = serde_json::to_value(value)?;
    serde_json::to_vec(&sort_keys(value)).map_err(Error::from)
}

/// Canonical form as a string (handy for logs and test vectors).
pub fn canonical_string<T: Serialize>(value: &T) -> Result<String> {
    let bytes = canonical_bytes(value)?;
    // serde_json only ever emits UTF-8
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Rebuild every object with its keys in lexicographic order.
///
/// serde_json's map type keeps insertion order when `preserve_order` is
/// enabled anywhere in the build, so ordering is imposed explicitly.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sort_keys(v)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}
