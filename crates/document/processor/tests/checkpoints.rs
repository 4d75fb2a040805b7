//! Channel event checkpoints

mod common;

use common::*;
use document_processor::{DocumentProcessor, ProcessingError};
use serde_json::{json, Value};

fn counting_document() -> Value {
    json!({
        "counter": 0,
        "contracts": {
            "timeline": timeline_channel(),
            "count": workflow("timeline", json!([increment("/counter")])),
            "explode": {
                "type": "Sequential Workflow",
                "channel": "timeline",
                "event": { "message": { "kind": "boom" } },
                "steps": [{
                    "type": "Update Document",
                    "changeset": [{ "op": "remove", "path": "/missing" }]
                }]
            }
        }
    })
}

#[test]
fn records_the_last_external_event() {
    init_tracing();
    let processor = DocumentProcessor::default();
    let state = initialize(&processor, counting_document());
    assert_eq!(checkpoint(&state, "/", "timeline"), None);

    let first = entry(json!({ "n": 1 }));
    let second = entry(json!({ "n": 2 }));
    let result = process(&processor, &state, &[first, second.clone()]).unwrap();

    assert_eq!(
        checkpoint(&result.state, "/", "timeline"),
        Some(content_id_hex(&second))
    );
}

#[test]
fn internal_events_are_not_checkpointed() {
    let processor = DocumentProcessor::default();
    let state = initialize(
        &processor,
        json!({
            "contracts": {
                "lifecycle": { "type": "Lifecycle Event Channel" },
                "setup": workflow("lifecycle", json!([update("add", "/ready", json!(true))]))
            }
        }),
    );
    assert!(state.get("/ready").is_some());
    assert_eq!(checkpoint(&state, "/", "lifecycle"), None);
}

#[test]
fn failed_event_writes_no_checkpoint() {
    let processor = DocumentProcessor::default();
    let state = initialize(&processor, counting_document());

    let good = entry(json!({ "kind": "fine" }));
    let bad = entry(json!({ "kind": "boom" }));
    let err = process(&processor, &state, &[good.clone(), bad]).unwrap_err();
    assert!(matches!(err, ProcessingError::Patch { .. }), "{err}");

    // The caller's snapshot is untouched and can be driven again.
    assert_eq!(checkpoint(&state, "/", "timeline"), None);
    assert_eq!(int_at(&state, "/counter"), Some(0));

    let result = process(&processor, &state, &[good.clone()]).unwrap();
    assert_eq!(int_at(&result.state, "/counter"), Some(1));
    assert_eq!(
        checkpoint(&result.state, "/", "timeline"),
        Some(content_id_hex(&good))
    );
}

#[test]
fn cleared_last_events_are_rebuilt() {
    let processor = DocumentProcessor::default();
    let mut document = counting_document();
    document["contracts"]["forget"] = workflow(
        "timeline",
        json!([{
            "type": "Update Document",
            "changeset": [{ "op": "remove", "path": "/contracts/checkpoint/lastEvents" }]
        }]),
    );
    let state = initialize(&processor, document);

    let event = entry(json!({}));
    let result = process(&processor, &state, &[event.clone()]).unwrap();
    assert_eq!(
        checkpoint(&result.state, "/", "timeline"),
        Some(content_id_hex(&event))
    );
}
