use super::{StepExecutor, WorkflowRun};
use crate::context::ProcessingContext;
use crate::contract_types::TRIGGER_EVENT;
use crate::error::ProcessorResult;
use crate::event::Event;
use document_model::Node;
use serde_json::Value;

/// Emits the step's `event`, with any expressions in it resolved
#[derive(Clone, Copy, Debug, Default)]
pub struct TriggerEventStep;

impl StepExecutor for TriggerEventStep {
    fn step_type(&self) -> &str {
        TRIGGER_EVENT
    }

    fn execute(
        &self,
        step: &Node,
        run: &mut WorkflowRun,
        ctx: &mut ProcessingContext<'_>,
    ) -> ProcessorResult<Value> {
        let template = step
            .property("event")
            .ok_or_else(|| run.invalid("Trigger Event step requires an event"))?;
        let payload = run.resolve_node(template, ctx)?;
        let output = payload.to_json();
        ctx.emit_event(Event::internal(payload));
        Ok(output)
    }
}
