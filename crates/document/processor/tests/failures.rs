//! Rejected calls, capability gaps and limits

mod common;

use common::*;
use document_model::{apply_patch, Node, NodePatch};
use document_processor::{
    DocumentProcessor, ProcessOptions, ProcessingError, ProcessorConfig,
};
use document_sandbox::GasError;
use serde_json::{json, Value};

fn scripted_counter() -> Value {
    json!({
        "counter": 0,
        "contracts": {
            "timeline": timeline_channel(),
            "count": workflow("timeline", json!([increment("/counter")]))
        }
    })
}

#[test]
fn exact_gas_budget_succeeds() {
    init_tracing();
    let processor = DocumentProcessor::default();
    let state = initialize(&processor, scripted_counter());
    let events = [entry(json!({})), entry(json!({}))];

    let unmetered = process(&processor, &state, &events).unwrap();
    let used = unmetered.gas_used.unwrap();
    assert!(used > 0);
    assert_eq!(unmetered.gas_remaining, None);

    let exact = processor
        .process_events(&state, &events, &ProcessOptions::with_gas_budget(used))
        .unwrap();
    assert_eq!(exact.gas_used, Some(used));
    assert_eq!(exact.gas_remaining, Some(0));
    assert_eq!(exact.state, unmetered.state);

    let err = processor
        .process_events(&state, &events, &ProcessOptions::with_gas_budget(used - 1))
        .unwrap_err();
    assert!(
        matches!(err, ProcessingError::Gas(GasError::BudgetExceeded { budget, .. }) if budget == used - 1),
        "{err}"
    );
}

#[test]
fn ping_pong_is_a_loop() {
    let processor = DocumentProcessor::default();
    let ping = json!({ "type": "Trigger Event", "event": { "type": "Ping" } });
    let state = initialize(
        &processor,
        json!({
            "contracts": {
                "timeline": timeline_channel(),
                "triggered": { "type": "Triggered Event Channel" },
                "start": workflow("timeline", json!([ping.clone()])),
                "pong": workflow("triggered", json!([ping]))
            }
        }),
    );

    let err = process(&processor, &state, &[entry(json!({}))]).unwrap_err();
    match err {
        ProcessingError::LoopDetected { hop, trace } => {
            assert_eq!(hop, "/#triggered");
            assert!(trace.contains("/#pong"), "{trace}");
        }
        other => panic!("expected a loop, got {other}"),
    }
}

#[test]
fn step_limit_stops_the_drain() {
    let processor = DocumentProcessor::new(ProcessorConfig::default().with_max_steps(1));
    let state = initialize(&processor, scripted_counter());

    let err = process(&processor, &state, &[entry(json!({}))]).unwrap_err();
    assert_eq!(err, ProcessingError::StepLimitExceeded { limit: 1 });
}

#[test]
fn step_limit_applies_to_each_event() {
    // A timeline entry runs two tasks here: the workflow and the checkpoint.
    let processor = DocumentProcessor::new(ProcessorConfig::default().with_max_steps(2));
    let state = initialize(&processor, scripted_counter());

    let single = process(&processor, &state, &[entry(json!({}))]).unwrap();
    assert_eq!(int_at(&single.state, "/counter"), Some(1));

    let events = [entry(json!({})), entry(json!({})), entry(json!({}))];
    let batch = process(&processor, &state, &events).unwrap();
    assert_eq!(int_at(&batch.state, "/counter"), Some(3));
}

#[test]
fn removing_a_missing_path_fails() {
    let processor = DocumentProcessor::default();
    let state = initialize(
        &processor,
        json!({
            "contracts": {
                "timeline": timeline_channel(),
                "clean": workflow("timeline", json!([{
                    "type": "Update Document",
                    "changeset": [{ "op": "remove", "path": "/nothing/here" }]
                }]))
            }
        }),
    );

    let err = process(&processor, &state, &[entry(json!({}))]).unwrap_err();
    assert!(matches!(err, ProcessingError::Patch { ref patch, .. } if patch.contains("/nothing/here")));
}

#[test]
fn unknown_contract_type_is_a_capability_failure() {
    let processor = DocumentProcessor::default();
    let document = doc(json!({
        "child": {
            "contracts": { "custom": { "type": "Custom Channel" } }
        }
    }));

    let result = processor.initialize(&document).unwrap();
    assert!(result.capability_failure);
    assert_eq!(*result.state, document);
    assert!(result.emitted.is_empty());
    assert_eq!(
        result.failure_reason.as_deref(),
        Some("unsupported contract type Custom Channel at /child/contracts/custom")
    );
}

#[test]
fn reserved_keys_must_hold_their_types() {
    let processor = DocumentProcessor::default();
    let document = doc(json!({
        "contracts": { "initialized": { "type": "Timeline Channel", "timelineId": "x" } }
    }));
    let err = processor.initialize(&document).unwrap_err();
    assert!(matches!(err, ProcessingError::ReservedContract { ref name, .. } if name == "initialized"));

    let document = doc(json!({
        "contracts": { "embedded": { "type": "Lifecycle Event Channel" } }
    }));
    let err = processor.initialize(&document).unwrap_err();
    assert!(matches!(err, ProcessingError::ReservedContract { ref name, .. } if name == "embedded"));
}

#[test]
fn initialization_is_required_once() {
    let processor = DocumentProcessor::default();
    let document = doc(scripted_counter());

    let err = process(&processor, &document, &[entry(json!({}))]).unwrap_err();
    assert_eq!(err, ProcessingError::NotInitialized);

    let state = initialize(&processor, scripted_counter());
    assert_eq!(
        processor.initialize(&state).unwrap_err(),
        ProcessingError::AlreadyInitialized
    );
}

#[test]
fn terminated_documents_ignore_events() {
    let processor = DocumentProcessor::default();
    let state = initialize(&processor, scripted_counter());
    let terminated = apply_patch(
        &state,
        &NodePatch::add(
            "/contracts/terminated",
            Node::typed("Processing Terminated Marker"),
        ),
    )
    .unwrap();

    let result = process(&processor, &terminated, &[entry(json!({}))]).unwrap();
    assert_eq!(*result.state, terminated);
    assert!(result.emitted.is_empty());
    assert_eq!(int_at(&result.state, "/counter"), Some(0));
}
