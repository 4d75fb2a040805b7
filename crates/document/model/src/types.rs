//! Type queries over nodes
//!
//! The engine only needs a narrow view of the type model: the type id of a
//! node, subtype checks, and the minimal form of a node used for content
//! ids. Hosts with a richer resolver plug it in through [`TypeSystem`].

use crate::{ContentId, Node};
use std::collections::HashMap;

/// Type collaborator used by contract processors and the checkpoint handler
pub trait TypeSystem: Send + Sync {
    /// Type id of `node`, if it declares one
    fn type_id<'a>(&self, node: &'a Node) -> Option<&'a str> {
        node.type_id()
    }

    /// True when `sub` equals `sup` or inherits from it
    fn is_subtype(&self, sub: &str, sup: &str) -> bool;

    /// True when `node` is typed as `type_id` or one of its subtypes
    fn is_type_of(&self, node: &Node, type_id: &str) -> bool {
        self.type_id(node)
            .map(|id| self.is_subtype(id, type_id))
            .unwrap_or(false)
    }

    /// Strip inherited/merged structure, leaving what the author wrote
    fn minimize(&self, node: &Node) -> Node;

    /// Content id over the minimal form
    fn content_id(&self, node: &Node) -> ContentId {
        ContentId::of(&self.minimize(node))
    }
}

/// Default type system: exact-id matching plus a declared supertype table.
///
/// Nodes carry no merged structure here, so minimization is the identity.
#[derive(Clone, Debug, Default)]
pub struct StructuralTypes {
    supertypes: HashMap<String, String>,
}

impl StructuralTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `sub` as a direct subtype of `sup`
    pub fn declare(mut self, sub: impl Into<String>, sup: impl Into<String>) -> Self {
        self.supertypes.insert(sub.into(), sup.into());
        self
    }
}

impl TypeSystem for StructuralTypes {
    fn is_subtype(&self, sub: &str, sup: &str) -> bool {
        let mut current = sub;
        // bounded walk, so a cyclic table cannot hang
        for _ in 0..=self.supertypes.len() {
            if current == sup {
                return true;
            }
            match self.supertypes.get(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
        false
    }

    fn minimize(&self, node: &Node) -> Node {
        node.clone()
    }
}
