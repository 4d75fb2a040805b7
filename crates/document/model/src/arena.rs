//! Index-addressed view of a document tree
//!
//! Tree walks that need a "seen" set key it by [`NodeIndex`], a stable
//! integer handed out on insertion, rather than by node identity.

use crate::{path, Node};

/// Stable index of a node inside a [`NodeArena`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub usize);

/// One arena slot
#[derive(Debug)]
pub struct ArenaEntry<'a> {
    pub path: String,
    pub node: &'a Node,
    pub parent: Option<NodeIndex>,
}

/// Flattened, pre-order view of a tree. Contract values are not descended
/// into: they configure a node rather than being part of its content.
#[derive(Debug)]
pub struct NodeArena<'a> {
    entries: Vec<ArenaEntry<'a>>,
}

impl<'a> NodeArena<'a> {
    pub fn build(root: &'a Node) -> Self {
        let mut arena = Self {
            entries: Vec::new(),
        };
        arena.insert(root, path::ROOT.to_string(), None);
        arena
    }

    fn insert(&mut self, node: &'a Node, pointer: String, parent: Option<NodeIndex>) {
        let index = NodeIndex(self.entries.len());
        self.entries.push(ArenaEntry {
            path: pointer.clone(),
            node,
            parent,
        });
        for (key, child) in &node.properties {
            let child_path = child_pointer(&pointer, key);
            self.insert(child, child_path, Some(index));
        }
        if let Some(items) = &node.items {
            for (i, child) in items.iter().enumerate() {
                let child_path = child_pointer(&pointer, &i.to_string());
                self.insert(child, child_path, Some(index));
            }
        }
    }

    pub fn get(&self, index: NodeIndex) -> Option<&ArenaEntry<'a>> {
        self.entries.get(index.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &ArenaEntry<'a>)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (NodeIndex(i), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn child_pointer(parent: &str, key: &str) -> String {
    if parent == path::ROOT {
        format!("/{}", path::encode(key))
    } else {
        format!("{}/{}", parent, path::encode(key))
    }
}
