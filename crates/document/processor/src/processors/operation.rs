//! Operation adapter
//!
//! An `Operation` contract turns timeline entries whose message names the
//! operation into channel events named after the contract. It can be
//! narrowed to a channel (another contract on the same node that must
//! also accept the entry) and to a request shape.

use super::channels::emit_on_channel;
use crate::context::ProcessingContext;
use crate::contract_types::{OPERATION, TIMELINE_ENTRY};
use crate::error::ProcessorResult;
use crate::event::Event;
use crate::registry::{ContractProcessor, ContractRole};
use document_model::Node;
use serde_json::Value;

#[derive(Clone, Copy, Debug, Default)]
pub struct OperationProcessor;

/// Check a request against the contract's `request` pattern. Bare basic
/// types (`Text`, `Integer`, ...) match scalars of that kind; anything
/// else is a structural pattern.
fn request_matches(pattern: &Node, request: Option<&Node>) -> bool {
    let Some(request) = request else {
        return false;
    };
    let is_bare_type = pattern.properties.is_empty()
        && pattern.items.is_none()
        && pattern.value.is_none();
    if is_bare_type {
        let scalar = request.value.as_ref();
        let kind_matches = match pattern.type_id() {
            Some("Text") => scalar.map_or(false, Value::is_string),
            Some("Integer") => scalar.map_or(false, |v| v.is_i64() || v.is_u64()),
            Some("Double") | Some("Number") => scalar.map_or(false, Value::is_number),
            Some("Boolean") => scalar.map_or(false, Value::is_boolean),
            Some("List") => request.items.is_some(),
            _ => return request.contains(pattern),
        };
        return kind_matches;
    }
    request.contains(pattern)
}

impl OperationProcessor {
    fn channel_accepts(
        &self,
        event: &Event,
        contract: &Node,
        ctx: &ProcessingContext<'_>,
    ) -> ProcessorResult<bool> {
        let Some(channel_name) = contract.str_property("channel") else {
            return Ok(true);
        };
        let Some(channel) = ctx.get(&format!("/contracts/{}", channel_name)) else {
            return Ok(false);
        };
        let Some(processor) = channel.type_id().and_then(|t| ctx.registry().get(t)) else {
            return Ok(false);
        };
        processor.supports(event, channel, channel_name, ctx)
    }
}

impl ContractProcessor for OperationProcessor {
    fn contract_type(&self) -> &str {
        OPERATION
    }

    fn role(&self) -> ContractRole {
        ContractRole::Adapter
    }

    fn supports(
        &self,
        event: &Event,
        contract: &Node,
        name: &str,
        ctx: &ProcessingContext<'_>,
    ) -> ProcessorResult<bool> {
        if event.is_channel() || !ctx.types().is_type_of(&event.payload, TIMELINE_ENTRY) {
            return Ok(false);
        }
        let operation = event
            .payload
            .get("/message/operation")
            .and_then(Node::as_str);
        if operation != Some(name) {
            return Ok(false);
        }
        if let Some(pattern) = contract.property("request") {
            if !request_matches(pattern, event.payload.get("/message/request")) {
                return Ok(false);
            }
        }
        self.channel_accepts(event, contract, ctx)
    }

    fn handle(
        &self,
        event: &Event,
        _contract: &Node,
        name: &str,
        ctx: &mut ProcessingContext<'_>,
    ) -> ProcessorResult<()> {
        emit_on_channel(event, name, ctx);
        Ok(())
    }
}
