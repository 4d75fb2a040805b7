//! Embedded document scopes and the write boundary around them
//!
//! A `Process Embedded` contract declares child paths that are documents
//! in their own right. Writers outside such a subtree may not touch it;
//! the set of roots is recomputed from the live snapshot for every patch,
//! so adding or removing the contract takes effect immediately.

use crate::contract_types::PROCESS_EMBEDDED;
use crate::error::{ProcessingError, ProcessorResult};
use document_model::{path, Node, NodeArena, NodePatch, TypeSystem};

const PATHS: &str = "paths";

/// Relative child paths declared by a `Process Embedded` contract
pub fn declared_paths(contract: &Node) -> Vec<&str> {
    contract
        .property(PATHS)
        .and_then(|paths| paths.items.as_deref())
        .map(|items| items.iter().filter_map(Node::as_str).collect())
        .unwrap_or_default()
}

/// Absolute root of every embedded document in `document`, sorted
pub fn embedded_roots(document: &Node, types: &dyn TypeSystem) -> Vec<String> {
    let arena = NodeArena::build(document);
    let mut roots: Vec<String> = arena
        .iter()
        .flat_map(|(_, entry)| {
            entry
                .node
                .contracts
                .values()
                .filter(|contract| types.is_type_of(contract, PROCESS_EMBEDDED))
                .flat_map(declared_paths)
                .map(|relative| path::join(&entry.path, relative))
                .collect::<Vec<_>>()
        })
        .collect();
    roots.sort();
    roots.dedup();
    roots
}

/// Reject `patch` when it reaches into an embedded document that `writer`
/// does not itself live in.
pub fn check_boundary(roots: &[String], writer: &str, patch: &NodePatch) -> ProcessorResult<()> {
    for touched in patch.touched_paths() {
        for root in roots {
            if path::is_inside(touched, root) && !path::is_inside(writer, root) {
                return Err(ProcessingError::BoundaryViolation {
                    patch: patch.to_string(),
                    offending_path: touched.to_string(),
                    embedded_root: root.clone(),
                    writer_path: writer.to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use document_model::StructuralTypes;

    fn embedding(paths: &[&str]) -> Node {
        Node::typed(PROCESS_EMBEDDED).with_property(
            PATHS,
            Node::list(paths.iter().map(|p| Node::scalar(*p)).collect()),
        )
    }

    #[test]
    fn test_roots_are_relative_to_their_node() {
        let doc = Node::new()
            .with_contract("embedded", embedding(&["/a"]))
            .with_property(
                "a",
                Node::new()
                    .with_contract("embedded", embedding(&["/b"]))
                    .with_property("b", Node::new()),
            );
        let roots = embedded_roots(&doc, &StructuralTypes::new());
        assert_eq!(roots, vec!["/a".to_string(), "/a/b".to_string()]);
    }

    #[test]
    fn test_boundary() {
        let roots = vec!["/child".to_string()];
        let patch = NodePatch::replace("/child/counter", Node::scalar(1));

        assert!(check_boundary(&roots, "/child", &patch).is_ok());
        assert!(check_boundary(&roots, "/child/deeper", &patch).is_ok());
        let err = check_boundary(&roots, "/", &patch).unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::BoundaryViolation { ref offending_path, .. } if offending_path == "/child/counter"
        ));

        let outside = NodePatch::replace("/children", Node::scalar(1));
        assert!(check_boundary(&roots, "/", &outside).is_ok());
    }

    #[test]
    fn test_move_source_is_checked() {
        let roots = vec!["/child".to_string()];
        let patch = NodePatch::move_from("/child/secret", "/stolen");
        assert!(check_boundary(&roots, "/", &patch).is_err());
    }
}
