//! Document validation and scaffolding run before any event is routed

use crate::checkpoint;
use crate::contract_types::{
    reserved_type, CHANNEL_EVENT_CHECKPOINT, KEY_CHECKPOINT, KEY_INITIALIZED, KEY_TERMINATED,
    PROCESSING_INITIALIZED_MARKER, PROCESSING_TERMINATED_MARKER, PROCESS_EMBEDDED,
};
use crate::embedded;
use crate::error::{ProcessingError, ProcessorResult};
use crate::registry::ContractRegistry;
use document_model::{apply_patch, path, Node, NodeArena, NodePatch, TypeSystem};

/// Types that may only appear under their reserved key
const KEY_BOUND_TYPES: &[(&str, &str)] = &[
    (CHANNEL_EVENT_CHECKPOINT, KEY_CHECKPOINT),
    (PROCESSING_INITIALIZED_MARKER, KEY_INITIALIZED),
    (PROCESSING_TERMINATED_MARKER, KEY_TERMINATED),
];

fn contract_path(node_path: &str, name: &str) -> String {
    path::join(node_path, &format!("/contracts/{}", path::encode(name)))
}

/// Fatal structural checks: reserved keys hold the right types, every
/// contract is typed, and each scope has at most one `Process Embedded`
/// contract with a well-formed `paths` list.
pub fn validate_contracts(document: &Node, types: &dyn TypeSystem) -> ProcessorResult<()> {
    let arena = NodeArena::build(document);
    for (_, entry) in arena.iter() {
        let mut embedding_contracts = 0usize;
        for (name, contract) in &entry.node.contracts {
            let type_id = contract.type_id();

            if let Some(expected) = reserved_type(name) {
                if !type_id.map_or(false, |t| types.is_subtype(t, expected)) {
                    return Err(ProcessingError::ReservedContract {
                        path: entry.path.clone(),
                        name: name.clone(),
                        expected: expected.to_string(),
                    });
                }
            }
            let Some(type_id) = type_id else {
                return Err(ProcessingError::InvalidContract {
                    path: entry.path.clone(),
                    name: name.clone(),
                    reason: "contract has no type".to_string(),
                });
            };

            for (bound_type, key) in KEY_BOUND_TYPES {
                if types.is_subtype(type_id, bound_type) && name != key {
                    return Err(ProcessingError::InvalidContract {
                        path: entry.path.clone(),
                        name: name.clone(),
                        reason: format!("{} contracts must use the key '{}'", bound_type, key),
                    });
                }
            }

            if types.is_subtype(type_id, PROCESS_EMBEDDED) {
                embedding_contracts += 1;
                let paths = contract.property("paths");
                let well_formed = paths.map_or(false, |paths| {
                    paths
                        .items
                        .as_ref()
                        .map_or(false, |items| items.iter().all(|item| item.as_str().is_some()))
                });
                if !well_formed {
                    return Err(ProcessingError::InvalidContract {
                        path: entry.path.clone(),
                        name: name.clone(),
                        reason: "'paths' must be a list of node paths".to_string(),
                    });
                }
            }
        }
        if embedding_contracts > 1 {
            return Err(ProcessingError::InvalidContract {
                path: entry.path.clone(),
                name: PROCESS_EMBEDDED.to_string(),
                reason: "a scope may declare only one Process Embedded contract".to_string(),
            });
        }
    }
    Ok(())
}

/// First contract whose type has no registered processor, as a
/// capability-failure reason
pub fn capability_gap(document: &Node, registry: &ContractRegistry) -> Option<String> {
    let arena = NodeArena::build(document);
    let gap = arena.iter().find_map(|(_, entry)| {
        entry.node.contracts.iter().find_map(|(name, contract)| {
            let type_id = contract.type_id()?;
            (!registry.contains(type_id)).then(|| {
                format!(
                    "unsupported contract type {} at {}",
                    type_id,
                    contract_path(&entry.path, name)
                )
            })
        })
    });
    gap
}

pub fn is_initialized(document: &Node) -> bool {
    document.contract(KEY_INITIALIZED).is_some()
}

pub fn is_terminated(document: &Node) -> bool {
    document.contract(KEY_TERMINATED).is_some()
}

/// Give the root and every embedded scope a `checkpoint` contract
pub fn ensure_checkpoints(document: &Node, types: &dyn TypeSystem) -> ProcessorResult<Node> {
    let mut scopes = vec![path::ROOT.to_string()];
    scopes.extend(embedded::embedded_roots(document, types));

    let mut current = document.clone();
    for scope in scopes {
        let needs_scaffold = current
            .get(&scope)
            .map_or(false, |node| node.contract(KEY_CHECKPOINT).is_none());
        if needs_scaffold {
            let patch = NodePatch::add(contract_path(&scope, KEY_CHECKPOINT), checkpoint::scaffold());
            current = apply_patch(&current, &patch).map_err(|e| ProcessingError::patch(&patch, e))?;
        }
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProcessorConfig;
    use crate::processors::canonical_registry;
    use crate::steps::StepRegistry;
    use document_model::StructuralTypes;
    use serde_json::json;
    use std::sync::Arc;

    fn doc(value: serde_json::Value) -> Node {
        Node::from_json(&value).unwrap()
    }

    #[test]
    fn test_reserved_key_with_wrong_type() {
        let document = doc(json!({
            "contracts": { "checkpoint": { "type": "Sequential Workflow" } }
        }));
        let err = validate_contracts(&document, &StructuralTypes::new()).unwrap_err();
        assert!(matches!(err, ProcessingError::ReservedContract { ref name, .. } if name == "checkpoint"));
    }

    #[test]
    fn test_untyped_contract() {
        let document = doc(json!({ "contracts": { "broken": { "channel": "x" } } }));
        let err = validate_contracts(&document, &StructuralTypes::new()).unwrap_err();
        assert!(matches!(err, ProcessingError::InvalidContract { .. }));
    }

    #[test]
    fn test_checkpoint_under_other_key() {
        let document = doc(json!({
            "contracts": {
                "checkpoint": { "type": "Channel Event Checkpoint" },
                "another": { "type": "Channel Event Checkpoint" }
            }
        }));
        assert!(validate_contracts(&document, &StructuralTypes::new()).is_err());
    }

    #[test]
    fn test_single_process_embedded_per_scope() {
        let document = doc(json!({
            "contracts": {
                "embedded": { "type": "Process Embedded", "paths": ["/a"] },
                "more": { "type": "Process Embedded", "paths": ["/b"] }
            }
        }));
        assert!(validate_contracts(&document, &StructuralTypes::new()).is_err());
    }

    #[test]
    fn test_capability_gap_names_the_contract() {
        let registry = canonical_registry(
            &ProcessorConfig::default(),
            Arc::new(StepRegistry::with_defaults()),
        );
        let document = doc(json!({
            "child": { "contracts": { "custom": { "type": "Custom Channel" } } }
        }));
        assert_eq!(
            capability_gap(&document, &registry).as_deref(),
            Some("unsupported contract type Custom Channel at /child/contracts/custom")
        );
        assert!(capability_gap(&doc(json!({ "a": 1 })), &registry).is_none());
    }

    #[test]
    fn test_checkpoint_scaffolding() {
        let document = doc(json!({
            "contracts": { "embedded": { "type": "Process Embedded", "paths": ["/child", "/missing"] } },
            "child": { "name": "Child" }
        }));
        let scaffolded = ensure_checkpoints(&document, &StructuralTypes::new()).unwrap();
        assert!(scaffolded.get("/contracts/checkpoint/lastEvents").is_some());
        assert!(scaffolded.get("/child/contracts/checkpoint/lastEvents").is_some());
        assert!(scaffolded.get("/missing").is_none());
    }
}
