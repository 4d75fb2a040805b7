//! `Process Embedded`: forwards batch-level events into embedded documents
//!
//! Events without an origin (external events and engine lifecycle events)
//! are re-dispatched to each declared child path, so every embedded
//! document runs its own contracts against them. Events emitted by
//! contracts are never forwarded; they already route along their origin.

use crate::context::ProcessingContext;
use crate::contract_types::PROCESS_EMBEDDED;
use crate::embedded::declared_paths;
use crate::error::ProcessorResult;
use crate::event::Event;
use crate::registry::{ContractProcessor, ContractRole};
use document_model::Node;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEmbeddedProcessor;

impl ContractProcessor for ProcessEmbeddedProcessor {
    fn contract_type(&self) -> &str {
        PROCESS_EMBEDDED
    }

    fn role(&self) -> ContractRole {
        ContractRole::Adapter
    }

    fn supports(
        &self,
        event: &Event,
        contract: &Node,
        _name: &str,
        _ctx: &ProcessingContext<'_>,
    ) -> ProcessorResult<bool> {
        Ok(!event.is_channel()
            && event.origin_node_path.is_none()
            && !declared_paths(contract).is_empty())
    }

    fn handle(
        &self,
        event: &Event,
        contract: &Node,
        _name: &str,
        ctx: &mut ProcessingContext<'_>,
    ) -> ProcessorResult<()> {
        for relative in declared_paths(contract) {
            let target = ctx.resolve_path(relative);
            let mut forwarded =
                Event::new(Arc::clone(&event.payload), event.source).with_dispatch_path(target);
            forwarded.emission = event.emission;
            ctx.emit_event(forwarded);
        }
        Ok(())
    }
}
