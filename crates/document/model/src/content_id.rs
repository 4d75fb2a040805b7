//! Content ids: BLAKE3 over the canonical JSON form of a node

use crate::Node;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Content-addressed identity of a node (BLAKE3, 32 bytes).
///
/// Two nodes with the same canonical structure always share an id,
/// independent of how they were built.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentId(pub [u8; 32]);

impl ContentId {
    /// Compute the id of a node
    pub fn of(node: &Node) -> Self {
        Self::of_json(&node.to_json())
    }

    /// Compute the id of an arbitrary JSON value
    pub fn of_json(value: &Value) -> Self {
        let canonical = canonicalize(value);
        // serde_json maps are key-ordered, so the encoding is stable
        let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
        Self(*blake3::hash(&bytes).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encode for display.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// First 12 hex characters, for logs
    pub fn short(&self) -> String {
        self.to_hex()[..12].to_string()
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", self.short())
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for ContentId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        if hex.len() != 64 {
            return Err(serde::de::Error::custom(format!(
                "content id must be 64 hex chars, got {}",
                hex.len()
            )));
        }
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| serde::de::Error::custom("invalid hex in content id"))?;
        }
        Ok(Self(bytes))
    }
}

/// Canonical JSON: whole-valued floats collapse to integers so `1.0` and
/// `1` hash alike. Object key order is already canonical in serde_json.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Number(n) => normalize_number(n),
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn normalize_number(n: &serde_json::Number) -> Value {
    if n.is_f64() {
        if let Some(f) = n.as_f64() {
            if f.fract() == 0.0 && f.abs() < 9.0e15 {
                return Value::from(f as i64);
            }
        }
    }
    Value::Number(n.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_is_structural() {
        let a = Node::from_json(&json!({ "x": 1, "y": [1, 2] })).unwrap();
        let b = Node::from_json(&json!({ "y": [1, 2], "x": 1.0 })).unwrap();
        assert_eq!(ContentId::of(&a), ContentId::of(&b));

        let c = Node::from_json(&json!({ "x": 2, "y": [1, 2] })).unwrap();
        assert_ne!(ContentId::of(&a), ContentId::of(&c));
    }

    #[test]
    fn test_hex_and_serde() {
        let id = ContentId::of(&Node::scalar("hello"));
        assert_eq!(id.to_hex().len(), 64);
        assert_eq!(id.short().len(), 12);
        let text = serde_json::to_string(&id).unwrap();
        let back: ContentId = serde_json::from_str(&text).unwrap();
        assert_eq!(back, id);
    }
}
