//! Shared fixtures for the processor integration tests

#![allow(dead_code)]

use document_model::{Node, StructuralTypes, TypeSystem};
use document_processor::{DocumentProcessor, ProcessOptions, ProcessingResult, ProcessorResult};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub const TIMELINE: &str = "alice";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn doc(value: Value) -> Node {
    Node::from_json(&value).expect("fixture must be a valid document")
}

/// Timeline entry on [`TIMELINE`] carrying `message`
pub fn entry(message: Value) -> Node {
    doc(json!({
        "type": "Timeline Entry",
        "timeline": { "timelineId": TIMELINE },
        "message": message
    }))
}

pub fn timeline_channel() -> Value {
    json!({ "type": "Timeline Channel", "timelineId": TIMELINE })
}

/// Sequential workflow on `channel` running `steps`
pub fn workflow(channel: &str, steps: Value) -> Value {
    json!({ "type": "Sequential Workflow", "channel": channel, "steps": steps })
}

/// A single `Update Document` step
pub fn update(op: &str, path: &str, val: Value) -> Value {
    json!({
        "type": "Update Document",
        "changeset": [{ "op": op, "path": path, "val": val }]
    })
}

/// Step adding one to the integer at `path`
pub fn increment(path: &str) -> Value {
    update("replace", path, json!(format!("${{document('{}') + 1}}", path)))
}

pub fn initialize(processor: &DocumentProcessor, value: Value) -> Arc<Node> {
    let result = processor
        .initialize(&doc(value))
        .expect("initialization must succeed");
    assert!(!result.capability_failure, "{:?}", result.failure_reason);
    result.state
}

pub fn process(
    processor: &DocumentProcessor,
    state: &Node,
    events: &[Node],
) -> ProcessorResult<ProcessingResult> {
    processor.process_events(state, events, &ProcessOptions::default())
}

pub fn int_at(state: &Node, path: &str) -> Option<i64> {
    state.get(path).and_then(Node::as_i64)
}

pub fn content_id_hex(node: &Node) -> String {
    StructuralTypes::new().content_id(node).to_hex()
}

/// Checkpointed content id for `channel` in the scope at `scope`
pub fn checkpoint(state: &Node, scope: &str, channel: &str) -> Option<String> {
    let prefix = if scope == "/" { "" } else { scope };
    state
        .get(&format!(
            "{}/contracts/checkpoint/lastEvents/{}/blueId",
            prefix, channel
        ))
        .and_then(Node::as_str)
        .map(str::to_string)
}
