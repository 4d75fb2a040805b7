use super::{StepExecutor, WorkflowRun};
use crate::context::ProcessingContext;
use crate::contract_types::SCRIPT_CODE;
use crate::error::ProcessorResult;
use crate::event::Event;
use document_model::Node;
use serde_json::Value;

/// Runs a sandboxed code block. Entries of an `events` list in the
/// returned table are emitted as internal events.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScriptCodeStep;

impl StepExecutor for ScriptCodeStep {
    fn step_type(&self) -> &str {
        SCRIPT_CODE
    }

    fn execute(
        &self,
        step: &Node,
        run: &mut WorkflowRun,
        ctx: &mut ProcessingContext<'_>,
    ) -> ProcessorResult<Value> {
        let code = step
            .str_property("code")
            .ok_or_else(|| run.invalid("Script Code step requires code"))?;
        let result = run.evaluate(code, true, ctx)?;

        if let Some(events) = result.get("events").and_then(Value::as_array) {
            for event in events {
                let payload = Node::from_json(event).map_err(|e| run.invalid(e.to_string()))?;
                ctx.emit_event(Event::internal(payload));
            }
        }
        Ok(result)
    }
}
