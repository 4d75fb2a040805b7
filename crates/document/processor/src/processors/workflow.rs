//! Sequential workflow handlers

use super::channels::pattern_matches;
use crate::context::ProcessingContext;
use crate::contract_types::{SEQUENTIAL_WORKFLOW, SEQUENTIAL_WORKFLOW_OPERATION};
use crate::error::ProcessorResult;
use crate::event::Event;
use crate::registry::{ContractProcessor, ContractRole};
use crate::steps::{run_workflow, StepRegistry};
use document_model::Node;
use std::sync::Arc;

/// Runs `steps` for channel events on the contract's `channel`,
/// optionally narrowed by an `event` pattern
#[derive(Clone, Debug)]
pub struct SequentialWorkflowProcessor {
    steps: Arc<StepRegistry>,
}

impl SequentialWorkflowProcessor {
    pub fn new(steps: Arc<StepRegistry>) -> Self {
        Self { steps }
    }
}

impl Default for SequentialWorkflowProcessor {
    fn default() -> Self {
        Self::new(Arc::new(StepRegistry::with_defaults()))
    }
}

impl ContractProcessor for SequentialWorkflowProcessor {
    fn contract_type(&self) -> &str {
        SEQUENTIAL_WORKFLOW
    }

    fn role(&self) -> ContractRole {
        ContractRole::Handler
    }

    fn supports(
        &self,
        event: &Event,
        contract: &Node,
        _name: &str,
        _ctx: &ProcessingContext<'_>,
    ) -> ProcessorResult<bool> {
        Ok(event.is_channel()
            && contract.str_property("channel").is_some()
            && event.channel_name.as_deref() == contract.str_property("channel")
            && pattern_matches(contract, "event", &event.payload))
    }

    fn handle(
        &self,
        event: &Event,
        contract: &Node,
        name: &str,
        ctx: &mut ProcessingContext<'_>,
    ) -> ProcessorResult<()> {
        run_workflow(&self.steps, event, contract, name, ctx)
    }
}

/// Runs `steps` for channel events produced by the `Operation` contract
/// named in `operation`
#[derive(Clone, Debug)]
pub struct SequentialWorkflowOperationProcessor {
    steps: Arc<StepRegistry>,
}

impl SequentialWorkflowOperationProcessor {
    pub fn new(steps: Arc<StepRegistry>) -> Self {
        Self { steps }
    }
}

impl Default for SequentialWorkflowOperationProcessor {
    fn default() -> Self {
        Self::new(Arc::new(StepRegistry::with_defaults()))
    }
}

impl ContractProcessor for SequentialWorkflowOperationProcessor {
    fn contract_type(&self) -> &str {
        SEQUENTIAL_WORKFLOW_OPERATION
    }

    fn role(&self) -> ContractRole {
        ContractRole::Handler
    }

    fn supports(
        &self,
        event: &Event,
        contract: &Node,
        _name: &str,
        _ctx: &ProcessingContext<'_>,
    ) -> ProcessorResult<bool> {
        Ok(event.is_channel()
            && contract.str_property("operation").is_some()
            && event.channel_name.as_deref() == contract.str_property("operation"))
    }

    fn handle(
        &self,
        event: &Event,
        contract: &Node,
        name: &str,
        ctx: &mut ProcessingContext<'_>,
    ) -> ProcessorResult<()> {
        run_workflow(&self.steps, event, contract, name, ctx)
    }
}
