//! Document nodes
//!
//! A [`Node`] is a plain value: cloning it yields an independent tree. The
//! engine freezes snapshots by wrapping them in `Arc<Node>` and only ever
//! produces new snapshots through [`crate::apply_patch`].
//!
//! The JSON bridge uses the "simple" form. Inside an object the keys
//! `name`, `description`, `type`, `value`, `items` and `contracts` are
//! structural; every other key is a property.

use crate::{path, ModelError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

pub const KEY_NAME: &str = "name";
pub const KEY_DESCRIPTION: &str = "description";
pub const KEY_TYPE: &str = "type";
pub const KEY_VALUE: &str = "value";
pub const KEY_ITEMS: &str = "items";
pub const KEY_CONTRACTS: &str = "contracts";
pub const KEY_CONTENT_REF: &str = "blueId";

/// Reference to a type by its identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeRef(pub String);

impl TypeRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }

    fn from_json(value: &Value) -> Result<Self, ModelError> {
        match value {
            Value::String(id) => Ok(Self(id.clone())),
            Value::Object(map) => map
                .get(KEY_CONTENT_REF)
                .or_else(|| map.get(KEY_NAME))
                .and_then(Value::as_str)
                .map(|id| Self(id.to_string()))
                .ok_or_else(|| ModelError::InvalidType(value.to_string())),
            other => Err(ModelError::InvalidType(other.to_string())),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node of a document tree
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Node {
    pub name: Option<String>,
    pub description: Option<String>,
    pub type_ref: Option<TypeRef>,
    /// JSON scalar (never an object or array)
    pub value: Option<Value>,
    pub items: Option<Vec<Node>>,
    pub properties: BTreeMap<String, Node>,
    pub contracts: BTreeMap<String, Node>,
}

impl Node {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scalar(value: impl Into<Value>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn list(items: Vec<Node>) -> Self {
        Self {
            items: Some(items),
            ..Self::default()
        }
    }

    pub fn typed(type_id: impl Into<String>) -> Self {
        Self {
            type_ref: Some(TypeRef::new(type_id)),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, type_id: impl Into<String>) -> Self {
        self.type_ref = Some(TypeRef::new(type_id));
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, node: Node) -> Self {
        self.properties.insert(key.into(), node);
        self
    }

    pub fn with_contract(mut self, key: impl Into<String>, node: Node) -> Self {
        self.contracts.insert(key.into(), node);
        self
    }

    pub fn type_id(&self) -> Option<&str> {
        self.type_ref.as_ref().map(TypeRef::id)
    }

    pub fn property(&self, key: &str) -> Option<&Node> {
        self.properties.get(key)
    }

    pub fn contract(&self, key: &str) -> Option<&Node> {
        self.contracts.get(key)
    }

    /// Scalar string stored directly on this node
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_ref().and_then(Value::as_str)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.value.as_ref().and_then(Value::as_i64)
    }

    /// String value of a direct property
    pub fn str_property(&self, key: &str) -> Option<&str> {
        self.property(key).and_then(Node::as_str)
    }

    /// True for a node carrying only a scalar value
    pub fn is_scalar(&self) -> bool {
        self.value.is_some()
            && self.name.is_none()
            && self.description.is_none()
            && self.type_ref.is_none()
            && self.items.is_none()
            && self.properties.is_empty()
            && self.contracts.is_empty()
    }

    fn is_bare_list(&self) -> bool {
        self.items.is_some()
            && self.value.is_none()
            && self.name.is_none()
            && self.description.is_none()
            && self.type_ref.is_none()
            && self.properties.is_empty()
            && self.contracts.is_empty()
    }

    // ── Navigation ───────────────────────────────────────────────────

    /// Look up the node at `pointer`.
    ///
    /// `contracts/<name>` steps into the contract map and numeric
    /// segments index into items. Structural scalar fields (`name`,
    /// `value`, ...) are not nodes; use [`Node::read`] for those.
    pub fn get(&self, pointer: &str) -> Option<&Node> {
        let segments = path::segments(pointer).ok()?;
        self.get_segments(&segments)
    }

    pub(crate) fn get_segments(&self, segments: &[String]) -> Option<&Node> {
        let mut current = self;
        let mut idx = 0;
        while idx < segments.len() {
            let segment = segments[idx].as_str();
            if segment == KEY_CONTRACTS && idx + 1 < segments.len() {
                current = current.contracts.get(&segments[idx + 1])?;
                idx += 2;
                continue;
            }
            current = current.child(segment)?;
            idx += 1;
        }
        Some(current)
    }

    pub(crate) fn get_segments_mut(&mut self, segments: &[String]) -> Option<&mut Node> {
        let mut current = self;
        let mut idx = 0;
        while idx < segments.len() {
            let segment = segments[idx].as_str();
            if segment == KEY_CONTRACTS && idx + 1 < segments.len() {
                current = current.contracts.get_mut(&segments[idx + 1])?;
                idx += 2;
                continue;
            }
            current = current.child_mut(segment)?;
            idx += 1;
        }
        Some(current)
    }

    fn child(&self, segment: &str) -> Option<&Node> {
        if let Some(node) = self.properties.get(segment) {
            return Some(node);
        }
        let index = segment.parse::<usize>().ok()?;
        self.items.as_ref()?.get(index)
    }

    fn child_mut(&mut self, segment: &str) -> Option<&mut Node> {
        if self.properties.contains_key(segment) {
            return self.properties.get_mut(segment);
        }
        let index = segment.parse::<usize>().ok()?;
        self.items.as_mut()?.get_mut(index)
    }

    /// Read the JSON form of whatever `pointer` addresses, including the
    /// structural scalar fields of a node.
    pub fn read(&self, pointer: &str) -> Option<Value> {
        if let Some(node) = self.get(pointer) {
            return Some(node.to_json());
        }
        let segments = path::segments(pointer).ok()?;
        let (last, parent) = segments.split_last()?;
        let owner = self.get_segments(parent)?;
        match last.as_str() {
            KEY_NAME => owner.name.clone().map(Value::String),
            KEY_DESCRIPTION => owner.description.clone().map(Value::String),
            KEY_VALUE => owner.value.clone(),
            KEY_TYPE => owner.type_ref.as_ref().map(|t| Value::String(t.0.clone())),
            KEY_CONTRACTS => Some(Value::Object(
                owner
                    .contracts
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            )),
            _ => None,
        }
    }

    /// Structural containment: every field present in `pattern` is present
    /// and equal here. Properties and items are compared recursively.
    pub fn contains(&self, pattern: &Node) -> bool {
        if pattern.type_ref.is_some() && pattern.type_ref != self.type_ref {
            return false;
        }
        if pattern.name.is_some() && pattern.name != self.name {
            return false;
        }
        if pattern.value.is_some() && pattern.value != self.value {
            return false;
        }
        for (key, expected) in &pattern.properties {
            match self.properties.get(key) {
                Some(actual) if actual.contains(expected) => {}
                _ => return false,
            }
        }
        if let Some(expected_items) = &pattern.items {
            let Some(items) = &self.items else {
                return false;
            };
            if expected_items.len() > items.len() {
                return false;
            }
            for (actual, expected) in items.iter().zip(expected_items) {
                if !actual.contains(expected) {
                    return false;
                }
            }
        }
        true
    }

    // ── JSON bridge ──────────────────────────────────────────────────

    pub fn from_json(value: &Value) -> Result<Self, ModelError> {
        match value {
            Value::Array(items) => Ok(Self::list(
                items
                    .iter()
                    .map(Self::from_json)
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            Value::Object(map) => Self::from_object(map),
            scalar => Ok(Self::scalar(scalar.clone())),
        }
    }

    fn from_object(map: &Map<String, Value>) -> Result<Self, ModelError> {
        let mut node = Node::new();
        for (key, value) in map {
            match key.as_str() {
                KEY_NAME => node.name = Some(expect_string(key, value)?),
                KEY_DESCRIPTION => node.description = Some(expect_string(key, value)?),
                KEY_TYPE => node.type_ref = Some(TypeRef::from_json(value)?),
                KEY_VALUE => match value {
                    Value::Array(_) | Value::Object(_) => {
                        return Err(ModelError::InvalidStructure {
                            key: key.clone(),
                            reason: "value must be a scalar".to_string(),
                        })
                    }
                    scalar => node.value = Some(scalar.clone()),
                },
                KEY_ITEMS => match value {
                    Value::Array(items) => {
                        node.items = Some(
                            items
                                .iter()
                                .map(Self::from_json)
                                .collect::<Result<Vec<_>, _>>()?,
                        )
                    }
                    _ => {
                        return Err(ModelError::InvalidStructure {
                            key: key.clone(),
                            reason: "items must be an array".to_string(),
                        })
                    }
                },
                KEY_CONTRACTS => match value {
                    Value::Object(contracts) => {
                        for (name, contract) in contracts {
                            node.contracts.insert(name.clone(), Self::from_json(contract)?);
                        }
                    }
                    _ => {
                        return Err(ModelError::InvalidStructure {
                            key: key.clone(),
                            reason: "contracts must be an object".to_string(),
                        })
                    }
                },
                _ => {
                    node.properties.insert(key.clone(), Self::from_json(value)?);
                }
            }
        }
        Ok(node)
    }

    pub fn to_json(&self) -> Value {
        if self.is_scalar() {
            return self.value.clone().unwrap_or(Value::Null);
        }
        if self.is_bare_list() {
            let items = self.items.as_deref().unwrap_or_default();
            return Value::Array(items.iter().map(Node::to_json).collect());
        }
        let mut map = Map::new();
        if let Some(name) = &self.name {
            map.insert(KEY_NAME.to_string(), Value::String(name.clone()));
        }
        if let Some(description) = &self.description {
            map.insert(KEY_DESCRIPTION.to_string(), Value::String(description.clone()));
        }
        if let Some(type_ref) = &self.type_ref {
            map.insert(KEY_TYPE.to_string(), Value::String(type_ref.0.clone()));
        }
        if let Some(value) = &self.value {
            map.insert(KEY_VALUE.to_string(), value.clone());
        }
        if let Some(items) = &self.items {
            map.insert(
                KEY_ITEMS.to_string(),
                Value::Array(items.iter().map(Node::to_json).collect()),
            );
        }
        for (key, node) in &self.properties {
            map.insert(key.clone(), node.to_json());
        }
        if !self.contracts.is_empty() {
            let contracts = self
                .contracts
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect();
            map.insert(KEY_CONTRACTS.to_string(), Value::Object(contracts));
        }
        Value::Object(map)
    }
}

fn expect_string(key: &str, value: &Value) -> Result<String, ModelError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ModelError::InvalidStructure {
            key: key.to_string(),
            reason: "expected a string".to_string(),
        })
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Node::from_json(&value).map_err(serde::de::Error::custom)
    }
}

impl TryFrom<Value> for Node {
    type Error = ModelError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Node::from_json(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Node {
        Node::from_json(&json!({
            "counter": 0,
            "profile": { "name": "Bob", "tags": ["a", "b"] },
            "contracts": {
                "timelineCh": { "type": "Timeline Channel", "timelineId": "t-1" }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_json_bridge_keeps_shape() {
        let doc = sample();
        assert_eq!(doc.property("counter").unwrap().as_i64(), Some(0));
        assert_eq!(doc.property("profile").unwrap().name.as_deref(), Some("Bob"));
        assert_eq!(
            doc.contract("timelineCh").unwrap().type_id(),
            Some("Timeline Channel")
        );
        let back = doc.to_json();
        assert_eq!(back["profile"]["tags"], json!(["a", "b"]));
        assert_eq!(back["contracts"]["timelineCh"]["timelineId"], json!("t-1"));
    }

    #[test]
    fn test_type_accepts_reference_object() {
        let node = Node::from_json(&json!({ "type": { "blueId": "abc" } })).unwrap();
        assert_eq!(node.type_id(), Some("abc"));
        assert!(Node::from_json(&json!({ "type": 3 })).is_err());
    }

    #[test]
    fn test_get_navigates_contracts_and_items() {
        let doc = sample();
        assert!(doc.get("/contracts/timelineCh").is_some());
        assert_eq!(doc.get("/profile/tags/1").unwrap().as_str(), Some("b"));
        assert!(doc.get("/profile/tags/9").is_none());
        assert!(doc.get("/missing").is_none());
        assert_eq!(doc.get("/").unwrap(), &doc);
    }

    #[test]
    fn test_read_structural_fields() {
        let doc = sample();
        assert_eq!(doc.read("/profile/name"), Some(json!("Bob")));
        assert_eq!(doc.read("/counter"), Some(json!(0)));
        assert_eq!(
            doc.read("/contracts/timelineCh/type"),
            Some(json!("Timeline Channel"))
        );
        assert_eq!(doc.read("/nothing/here"), None);
    }

    #[test]
    fn test_contains_pattern() {
        let event = Node::from_json(&json!({
            "type": "Document Processing Initiated",
            "documentId": "x",
            "meta": { "a": 1, "b": 2 }
        }))
        .unwrap();
        let pattern = Node::from_json(&json!({
            "type": "Document Processing Initiated",
            "meta": { "a": 1 }
        }))
        .unwrap();
        assert!(event.contains(&pattern));
        assert!(event.contains(&Node::new()));
        let mismatch = Node::from_json(&json!({ "meta": { "a": 2 } })).unwrap();
        assert!(!event.contains(&mismatch));
    }

    #[test]
    fn test_serde_roundtrip_through_bridge() {
        let doc = sample();
        let text = serde_json::to_string(&doc).unwrap();
        let back: Node = serde_json::from_str(&text).unwrap();
        assert_eq!(back, doc);
    }
}
