//! Channel adapters
//!
//! Each adapter recognises a family of non-channel events and re-emits
//! them as channel events named after the adapter's contract. The payload
//! object is passed through unchanged.

use crate::context::ProcessingContext;
use crate::contract_types::{
    DOCUMENT_PROCESSING_INITIATED, DOCUMENT_UPDATE, DOCUMENT_UPDATE_CHANNEL,
    EMBEDDED_NODE_CHANNEL, LIFECYCLE_EVENT_CHANNEL, TIMELINE_CHANNEL, TIMELINE_ENTRY,
    TRIGGERED_EVENT_CHANNEL,
};
use crate::error::ProcessorResult;
use crate::event::{EmissionKind, Event, EventSource};
use crate::registry::{ContractProcessor, ContractRole};
use document_model::Node;

/// Re-emit `event` on channel `name`
pub(crate) fn emit_on_channel(event: &Event, name: &str, ctx: &mut ProcessingContext<'_>) {
    ctx.emit_event(Event::channel(&event.payload, name));
}

/// True when the contract has no `key` pattern or the payload contains it
pub(crate) fn pattern_matches(contract: &Node, key: &str, payload: &Node) -> bool {
    contract
        .property(key)
        .map_or(true, |pattern| payload.contains(pattern))
}

macro_rules! channel_adapter {
    ($ty:ident, $type_id:expr) => {
        impl ContractProcessor for $ty {
            fn contract_type(&self) -> &str {
                $type_id
            }

            fn role(&self) -> ContractRole {
                ContractRole::Adapter
            }

            fn supports(
                &self,
                event: &Event,
                contract: &Node,
                _name: &str,
                ctx: &ProcessingContext<'_>,
            ) -> ProcessorResult<bool> {
                Ok(!event.is_channel() && self.accepts(event, contract, ctx))
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
    };
}

// ── Timeline ────────────────────────────────────────────────────────

/// Timeline entries whose `timeline.timelineId` equals the contract's
/// `timelineId`
#[derive(Clone, Copy, Debug, Default)]
pub struct TimelineChannel;

impl TimelineChannel {
    fn accepts(&self, event: &Event, contract: &Node, ctx: &ProcessingContext<'_>) -> bool {
        if !ctx.types().is_type_of(&event.payload, TIMELINE_ENTRY) {
            return false;
        }
        let entry_timeline = event
            .payload
            .get("/timeline/timelineId")
            .and_then(Node::as_str);
        match (entry_timeline, contract.str_property("timelineId")) {
            (Some(entry), Some(expected)) => entry == expected,
            _ => false,
        }
    }
}

channel_adapter!(TimelineChannel, TIMELINE_CHANNEL);

// ── Lifecycle ───────────────────────────────────────────────────────

/// Engine lifecycle events, optionally filtered by an `event` pattern
#[derive(Clone, Copy, Debug, Default)]
pub struct LifecycleEventChannel;

impl LifecycleEventChannel {
    fn accepts(&self, event: &Event, contract: &Node, ctx: &ProcessingContext<'_>) -> bool {
        ctx.types()
            .is_type_of(&event.payload, DOCUMENT_PROCESSING_INITIATED)
            && pattern_matches(contract, "event", &event.payload)
    }
}

channel_adapter!(LifecycleEventChannel, LIFECYCLE_EVENT_CHANNEL);

// ── Document updates ────────────────────────────────────────────────

/// `Document Update` events for exactly the contract's `path`.
///
/// Accepts updates emitted by workflow steps and externally supplied
/// update payloads.
#[derive(Clone, Copy, Debug, Default)]
pub struct DocumentUpdateChannel;

impl DocumentUpdateChannel {
    fn accepts(&self, event: &Event, contract: &Node, ctx: &ProcessingContext<'_>) -> bool {
        let is_update = event.emission == Some(EmissionKind::Update)
            || event.source == EventSource::External;
        if !is_update || !ctx.types().is_type_of(&event.payload, DOCUMENT_UPDATE) {
            return false;
        }
        match (event.payload.str_property("path"), contract.str_property("path")) {
            (Some(updated), Some(watched)) => updated == ctx.resolve_path(watched),
            _ => false,
        }
    }
}

channel_adapter!(DocumentUpdateChannel, DOCUMENT_UPDATE_CHANNEL);

// ── Triggered events ────────────────────────────────────────────────

/// Internal events emitted by contracts of the same node
#[derive(Clone, Copy, Debug, Default)]
pub struct TriggeredEventChannel;

impl TriggeredEventChannel {
    fn accepts(&self, event: &Event, contract: &Node, ctx: &ProcessingContext<'_>) -> bool {
        event.source == EventSource::Internal
            && event.origin_node_path.as_deref() == Some(ctx.node_path())
            && pattern_matches(contract, "event", &event.payload)
    }
}

channel_adapter!(TriggeredEventChannel, TRIGGERED_EVENT_CHANNEL);

// ── Embedded nodes ──────────────────────────────────────────────────

/// Events emitted by contracts of the embedded node at `path`
#[derive(Clone, Copy, Debug, Default)]
pub struct EmbeddedNodeChannel;

impl EmbeddedNodeChannel {
    fn accepts(&self, event: &Event, contract: &Node, ctx: &ProcessingContext<'_>) -> bool {
        match (&event.origin_node_path, contract.str_property("path")) {
            (Some(origin), Some(watched)) => *origin == ctx.resolve_path(watched),
            _ => false,
        }
    }
}

channel_adapter!(EmbeddedNodeChannel, EMBEDDED_NODE_CHANNEL);
