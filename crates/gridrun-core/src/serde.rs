use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::{ErrorInfo, GridError};

/// Encodes a serializable payload as canonical JSON bytes.
///
/// Canonical means object keys are sorted lexicographically at every nesting
/// level and no insignificant whitespace is emitted, so the same logical
/// value always produces the same bytes regardless of how its fields were
/// assembled. All stable hashing and every persisted artifact go through
/// this encoding.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, GridError> {
    let value = serde_json::to_value(value)
        .map_err(|err| GridError::Serde(ErrorInfo::new("serde.encode", err.to_string())))?;
    serde_json::to_vec(&canonicalize(value))
        .map_err(|err| GridError::Serde(ErrorInfo::new("serde.encode", err.to_string())))
}

/// Decodes a payload previously produced by [`to_canonical_json_bytes`] or
/// any other JSON writer.
pub fn from_json_slice<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, GridError> {
    serde_json::from_slice(bytes)
        .map_err(|err| GridError::Serde(ErrorInfo::new("serde.decode", err.to_string())))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut out = Map::new();
            for (key, value) in entries {
                out.insert(key, value);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
