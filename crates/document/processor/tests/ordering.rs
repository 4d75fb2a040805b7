//! Task ordering within one external event

mod common;

use common::*;
use document_processor::DocumentProcessor;
use serde_json::json;

fn logged(state: &document_model::Node) -> Vec<String> {
    state
        .get("/log")
        .and_then(|log| log.items.as_ref())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn handlers_run_in_name_order() {
    init_tracing();
    let processor = DocumentProcessor::default();
    let state = initialize(
        &processor,
        json!({
            "log": [],
            "contracts": {
                "timeline": timeline_channel(),
                "b": workflow("timeline", json!([update("add", "/log/-", json!("b"))])),
                "a": workflow("timeline", json!([update("add", "/log/-", json!("a"))]))
            }
        }),
    );

    let result = process(&processor, &state, &[entry(json!({}))]).unwrap();
    assert_eq!(logged(&result.state), vec!["a", "b"]);
}

#[test]
fn explicit_order_beats_name() {
    let processor = DocumentProcessor::default();
    let mut late = workflow("timeline", json!([update("add", "/log/-", json!("a"))]));
    late["order"] = json!(1);
    let state = initialize(
        &processor,
        json!({
            "log": [],
            "contracts": {
                "timeline": timeline_channel(),
                "a": late,
                "b": workflow("timeline", json!([update("add", "/log/-", json!("b"))]))
            }
        }),
    );

    let result = process(&processor, &state, &[entry(json!({}))]).unwrap();
    assert_eq!(logged(&result.state), vec!["b", "a"]);
}

#[test]
fn explicit_order_runs_lower_first() {
    let processor = DocumentProcessor::default();
    let mut contract1 = workflow(
        "timeline",
        json!([update("replace", "/counter", json!("${document('/counter') + 1}"))]),
    );
    contract1["order"] = json!(2);
    let mut contract2 = workflow(
        "timeline",
        json!([update("replace", "/counter", json!("${document('/counter') * 3}"))]),
    );
    contract2["order"] = json!(1);
    let state = initialize(
        &processor,
        json!({
            "counter": 0,
            "contracts": {
                "timeline": timeline_channel(),
                "contract1": contract1,
                "contract2": contract2
            }
        }),
    );

    // contract2 multiplies zero, then contract1 adds one
    let result = process(&processor, &state, &[entry(json!({}))]).unwrap();
    assert_eq!(int_at(&result.state, "/counter"), Some(1));
}

#[test]
fn removed_contract_is_skipped() {
    let processor = DocumentProcessor::default();
    let state = initialize(
        &processor,
        json!({
            "contracts": {
                "timeline": timeline_channel(),
                "a": workflow("timeline", json!([{
                    "type": "Update Document",
                    "changeset": [{ "op": "remove", "path": "/contracts/b" }]
                }])),
                "b": workflow("timeline", json!([update("add", "/touched", json!(true))]))
            }
        }),
    );

    let result = process(&processor, &state, &[entry(json!({}))]).unwrap();
    assert!(result.state.contract("b").is_none());
    assert!(result.state.get("/touched").is_none());
}

#[test]
fn events_are_processed_in_input_order() {
    let processor = DocumentProcessor::default();
    let state = initialize(
        &processor,
        json!({
            "last": 0,
            "contracts": {
                "timeline": timeline_channel(),
                "record": workflow("timeline", json!([
                    update("replace", "/last", json!("${event.message.n}"))
                ]))
            }
        }),
    );

    let events: Vec<_> = (1..=3).map(|n| entry(json!({ "n": n }))).collect();
    let result = process(&processor, &state, &events).unwrap();
    assert_eq!(int_at(&result.state, "/last"), Some(3));

    let written: Vec<i64> = result
        .emitted_of_type("Document Update")
        .filter_map(|event| event.payload.get("/val").and_then(|v| v.as_i64()))
        .collect();
    assert_eq!(written, vec![1, 2, 3]);
}

#[test]
fn retyped_contract_is_skipped() {
    let processor = DocumentProcessor::default();
    let state = initialize(
        &processor,
        json!({
            "contracts": {
                "timeline": timeline_channel(),
                "a": workflow("timeline", json!([
                    update("replace", "/contracts/b", timeline_channel())
                ])),
                "b": workflow("timeline", json!([update("add", "/touched", json!(true))])),
                "c": workflow("b", json!([update("add", "/leaked", json!(true))]))
            }
        }),
    );

    let result = process(&processor, &state, &[entry(json!({}))]).unwrap();
    assert_eq!(
        result.state.contract("b").and_then(|b| b.type_id()),
        Some("Timeline Channel")
    );
    assert!(result.state.get("/touched").is_none());
    assert!(result.state.get("/leaked").is_none());
}
