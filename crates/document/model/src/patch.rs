//! Structural patches over document nodes

use crate::node::{KEY_CONTRACTS, KEY_DESCRIPTION, KEY_NAME, KEY_TYPE, KEY_VALUE};
use crate::{path, Node, PatchError, TypeRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Patch operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
    Move,
    Copy,
}

impl fmt::Display for PatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PatchOp::Add => "add",
            PatchOp::Remove => "remove",
            PatchOp::Replace => "replace",
            PatchOp::Move => "move",
            PatchOp::Copy => "copy",
        };
        write!(f, "{}", s)
    }
}

/// A single structural change to a document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodePatch {
    pub op: PatchOp,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val: Option<Node>,
}

impl NodePatch {
    pub fn add(path: impl Into<String>, val: Node) -> Self {
        Self {
            op: PatchOp::Add,
            path: path.into(),
            from: None,
            val: Some(val),
        }
    }

    pub fn replace(path: impl Into<String>, val: Node) -> Self {
        Self {
            op: PatchOp::Replace,
            path: path.into(),
            from: None,
            val: Some(val),
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: PatchOp::Remove,
            path: path.into(),
            from: None,
            val: None,
        }
    }

    pub fn move_from(from: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            op: PatchOp::Move,
            path: path.into(),
            from: Some(from.into()),
            val: None,
        }
    }

    pub fn copy_from(from: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            op: PatchOp::Copy,
            path: path.into(),
            from: Some(from.into()),
            val: None,
        }
    }

    /// Every path this patch reads from or writes to
    pub fn touched_paths(&self) -> Vec<&str> {
        let mut paths = vec![self.path.as_str()];
        if matches!(self.op, PatchOp::Move | PatchOp::Copy) {
            if let Some(from) = &self.from {
                paths.push(from.as_str());
            }
        }
        paths
    }

    fn value(&self) -> Result<Node, PatchError> {
        self.val.clone().ok_or_else(|| PatchError::MissingValue {
            op: self.op.to_string(),
            path: self.path.clone(),
        })
    }

    fn source(&self) -> Result<&str, PatchError> {
        self.from.as_deref().ok_or_else(|| PatchError::MissingFrom {
            op: self.op.to_string(),
            path: self.path.clone(),
        })
    }
}

impl fmt::Display for NodePatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.from {
            Some(from) => write!(f, "{} {} -> {}", self.op, from, self.path),
            None => write!(f, "{} {}", self.op, self.path),
        }
    }
}

/// Apply `patch` to a clone of `root` and return the result.
///
/// `root` itself is never modified, so a failed patch leaves the caller's
/// snapshot intact.
pub fn apply_patch(root: &Node, patch: &NodePatch) -> Result<Node, PatchError> {
    let mut working = root.clone();
    apply_in_place(&mut working, patch)?;
    Ok(working)
}

/// Apply a sequence of patches, stopping at the first failure
pub fn apply_patches(root: &Node, patches: &[NodePatch]) -> Result<Node, PatchError> {
    let mut working = root.clone();
    for patch in patches {
        apply_in_place(&mut working, patch)?;
    }
    Ok(working)
}

fn apply_in_place(root: &mut Node, patch: &NodePatch) -> Result<(), PatchError> {
    match patch.op {
        PatchOp::Add => write(root, &patch.path, patch.value()?, WriteMode::Add),
        PatchOp::Replace => write(root, &patch.path, patch.value()?, WriteMode::Replace),
        PatchOp::Remove => take(root, &patch.path).map(|_| ()),
        PatchOp::Move => {
            let from = patch.source()?;
            if path::normalize(from) != path::normalize(&patch.path)
                && path::is_inside(&patch.path, from)
            {
                return Err(PatchError::MoveIntoDescendant {
                    from: from.to_string(),
                    path: patch.path.clone(),
                });
            }
            let node = take(root, from)?;
            write(root, &patch.path, node, WriteMode::Add)
        }
        PatchOp::Copy => {
            let from = patch.source()?;
            let node = root
                .get(from)
                .cloned()
                .ok_or_else(|| PatchError::PathNotFound(from.to_string()))?;
            write(root, &patch.path, node, WriteMode::Add)
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum WriteMode {
    Add,
    Replace,
}

/// Where the final segment of a path lives inside its owner
enum Slot {
    Contract(String),
    Contracts,
    Field(String),
    Child(String),
}

fn split_target(pointer: &str) -> Result<(Vec<String>, Slot), PatchError> {
    let mut segments = path::segments(pointer)?;
    let last = segments
        .pop()
        .ok_or_else(|| PatchError::InvalidPath(pointer.to_string()))?;
    if segments.last().map(String::as_str) == Some(KEY_CONTRACTS) {
        segments.pop();
        return Ok((segments, Slot::Contract(last)));
    }
    let slot = match last.as_str() {
        KEY_CONTRACTS => Slot::Contracts,
        KEY_NAME | KEY_DESCRIPTION | KEY_VALUE | KEY_TYPE => Slot::Field(last),
        _ => Slot::Child(last),
    };
    Ok((segments, slot))
}

fn owner_mut<'a>(
    root: &'a mut Node,
    segments: &[String],
    pointer: &str,
) -> Result<&'a mut Node, PatchError> {
    root.get_segments_mut(segments).ok_or_else(|| {
        let parent = path::parent(pointer).unwrap_or_else(|| path::ROOT.to_string());
        PatchError::PathNotFound(parent)
    })
}

fn write(root: &mut Node, pointer: &str, node: Node, mode: WriteMode) -> Result<(), PatchError> {
    if path::segments(pointer)?.is_empty() {
        *root = node;
        return Ok(());
    }
    let (segments, slot) = split_target(pointer)?;
    let owner = owner_mut(root, &segments, pointer)?;
    match slot {
        Slot::Contract(name) => {
            owner.contracts.insert(name, node);
        }
        Slot::Contracts => {
            owner.contracts = node.properties.into_iter().chain(node.contracts).collect();
        }
        Slot::Field(field) => set_field(owner, &field, node, pointer)?,
        Slot::Child(key) => {
            if owner.properties.contains_key(&key) || owner.items.is_none() {
                owner.properties.insert(key, node);
                return Ok(());
            }
            let items = owner.items.get_or_insert_with(Vec::new);
            if key == "-" {
                items.push(node);
                return Ok(());
            }
            let index = parse_index(&key, pointer)?;
            match mode {
                WriteMode::Add if index <= items.len() => items.insert(index, node),
                WriteMode::Replace if index < items.len() => items[index] = node,
                _ => {
                    return Err(PatchError::IndexOutOfBounds {
                        path: pointer.to_string(),
                        index,
                    })
                }
            }
        }
    }
    Ok(())
}

fn take(root: &mut Node, pointer: &str) -> Result<Node, PatchError> {
    if path::segments(pointer)?.is_empty() {
        return Err(PatchError::RemoveRoot);
    }
    let not_found = || PatchError::PathNotFound(pointer.to_string());
    let (segments, slot) = split_target(pointer)?;
    let owner = owner_mut(root, &segments, pointer).map_err(|_| not_found())?;
    match slot {
        Slot::Contract(name) => owner.contracts.remove(&name).ok_or_else(not_found),
        Slot::Contracts => {
            if owner.contracts.is_empty() {
                return Err(not_found());
            }
            Ok(Node {
                contracts: std::mem::take(&mut owner.contracts),
                ..Node::default()
            })
        }
        Slot::Field(field) => {
            let taken = match field.as_str() {
                KEY_NAME => owner.name.take().map(Node::scalar),
                KEY_DESCRIPTION => owner.description.take().map(Node::scalar),
                KEY_VALUE => owner.value.take().map(Node::scalar),
                _ => owner.type_ref.take().map(|t| Node::scalar(t.0)),
            };
            taken.ok_or_else(not_found)
        }
        Slot::Child(key) => {
            if let Some(node) = owner.properties.remove(&key) {
                return Ok(node);
            }
            let index = key.parse::<usize>().map_err(|_| not_found())?;
            match owner.items.as_mut() {
                Some(items) if index < items.len() => Ok(items.remove(index)),
                _ => Err(not_found()),
            }
        }
    }
}

fn set_field(owner: &mut Node, field: &str, node: Node, pointer: &str) -> Result<(), PatchError> {
    if field == KEY_VALUE {
        owner.value = node.value;
        return Ok(());
    }
    let text = node
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| PatchError::InvalidField {
            field: field.to_string(),
            path: pointer.to_string(),
        })?;
    match field {
        KEY_NAME => owner.name = Some(text),
        KEY_DESCRIPTION => owner.description = Some(text),
        _ => owner.type_ref = Some(TypeRef(text)),
    }
    Ok(())
}

fn parse_index(key: &str, pointer: &str) -> Result<usize, PatchError> {
    key.parse::<usize>()
        .map_err(|_| PatchError::InvalidPath(pointer.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Node {
        Node::from_json(&json!({
            "counter": 0,
            "list": [1, 2, 3],
            "nested": { "deep": { "x": 1 } },
            "contracts": { "wf": { "type": "Sequential Workflow" } }
        }))
        .unwrap()
    }

    #[test]
    fn test_replace_and_add_property() {
        let base = doc();
        let next = apply_patch(&base, &NodePatch::replace("/counter", Node::scalar(5))).unwrap();
        assert_eq!(next.get("/counter").unwrap().as_i64(), Some(5));
        // the input snapshot is untouched
        assert_eq!(base.get("/counter").unwrap().as_i64(), Some(0));

        let next = apply_patch(&next, &NodePatch::add("/fresh", Node::scalar("x"))).unwrap();
        assert_eq!(next.get("/fresh").unwrap().as_str(), Some("x"));
    }

    #[test]
    fn test_replace_creates_missing_property() {
        let next = apply_patch(&Node::new(), &NodePatch::replace("/gameState", Node::scalar(1)))
            .unwrap();
        assert_eq!(next.to_json(), json!({ "gameState": 1 }));
    }

    #[test]
    fn test_add_requires_parent() {
        let err = apply_patch(&doc(), &NodePatch::add("/a/b/c", Node::scalar(1))).unwrap_err();
        assert_eq!(err, PatchError::PathNotFound("/a/b".to_string()));
    }

    #[test]
    fn test_remove_missing_path_fails() {
        let err = apply_patch(&doc(), &NodePatch::remove("/nope")).unwrap_err();
        assert!(matches!(err, PatchError::PathNotFound(p) if p == "/nope"));
        assert_eq!(
            apply_patch(&doc(), &NodePatch::remove("/")).unwrap_err(),
            PatchError::RemoveRoot
        );
    }

    #[test]
    fn test_item_operations() {
        let next = apply_patch(&doc(), &NodePatch::add("/list/-", Node::scalar(4))).unwrap();
        assert_eq!(next.to_json()["list"], json!([1, 2, 3, 4]));
        let next = apply_patch(&next, &NodePatch::add("/list/0", Node::scalar(0))).unwrap();
        assert_eq!(next.to_json()["list"], json!([0, 1, 2, 3, 4]));
        let next = apply_patch(&next, &NodePatch::remove("/list/1")).unwrap();
        assert_eq!(next.to_json()["list"], json!([0, 2, 3, 4]));
        let err = apply_patch(&next, &NodePatch::replace("/list/9", Node::scalar(1))).unwrap_err();
        assert!(matches!(err, PatchError::IndexOutOfBounds { index: 9, .. }));
    }

    #[test]
    fn test_contract_add_and_remove() {
        let next = apply_patch(
            &doc(),
            &NodePatch::add("/contracts/extra", Node::typed("Timeline Channel")),
        )
        .unwrap();
        assert!(next.contract("extra").is_some());
        let next = apply_patch(&next, &NodePatch::remove("/contracts/wf")).unwrap();
        assert!(next.contract("wf").is_none());
    }

    #[test]
    fn test_move_and_copy() {
        let next = apply_patch(&doc(), &NodePatch::copy_from("/nested/deep", "/copy")).unwrap();
        assert_eq!(next.to_json()["copy"], json!({ "x": 1 }));
        assert!(next.get("/nested/deep").is_some());

        let next = apply_patch(&next, &NodePatch::move_from("/nested/deep", "/moved")).unwrap();
        assert!(next.get("/nested/deep").is_none());
        assert_eq!(next.get("/moved/x").unwrap().as_i64(), Some(1));

        let err = apply_patch(&doc(), &NodePatch::move_from("/nested", "/nested/deep/y"))
            .unwrap_err();
        assert!(matches!(err, PatchError::MoveIntoDescendant { .. }));
    }

    #[test]
    fn test_touched_paths() {
        let patch = NodePatch::move_from("/a", "/b");
        assert_eq!(patch.touched_paths(), vec!["/b", "/a"]);
        assert_eq!(NodePatch::remove("/c").touched_paths(), vec!["/c"]);
    }

    #[test]
    fn test_field_write() {
        let base = Node::from_json(&json!({ "profile": { "name": "Bob" } })).unwrap();
        let next =
            apply_patch(&base, &NodePatch::replace("/profile/name", Node::scalar("Alice")))
                .unwrap();
        assert_eq!(next.to_json(), json!({ "profile": { "name": "Alice" } }));
    }

    #[test]
    fn test_patch_serde_shape() {
        let patch: NodePatch =
            serde_json::from_value(json!({ "op": "replace", "path": "/counter", "val": 2 }))
                .unwrap();
        assert_eq!(patch.op, PatchOp::Replace);
        assert_eq!(patch.val.unwrap().as_i64(), Some(2));
    }
}
