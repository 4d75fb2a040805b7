use super::{StepExecutor, WorkflowRun};
use crate::context::ProcessingContext;
use crate::contract_types::{DOCUMENT_UPDATE, UPDATE_DOCUMENT};
use crate::error::ProcessorResult;
use crate::event::{EmissionKind, Event};
use document_model::{Node, NodePatch, PatchOp};
use document_sandbox::expression::{extract_expression, is_expression};
use serde_json::{json, Value};

/// Applies a changeset of patches and emits a `Document Update` event for
/// each of them.
///
/// `changeset` is either a list of `{op, path, val?, from?}` entries or a
/// full expression producing one. Entry fields may themselves hold
/// expressions.
#[derive(Clone, Copy, Debug, Default)]
pub struct UpdateDocumentStep;

impl UpdateDocumentStep {
    fn changeset(
        &self,
        step: &Node,
        run: &WorkflowRun,
        ctx: &mut ProcessingContext<'_>,
    ) -> ProcessorResult<Vec<Node>> {
        let changeset = step
            .property("changeset")
            .ok_or_else(|| run.invalid("Update Document step requires a changeset"))?;
        if let Some(text) = changeset.as_str().filter(|text| is_expression(text)) {
            let value = run.evaluate(extract_expression(text), false, ctx)?;
            let node = Node::from_json(&value).map_err(|e| run.invalid(e.to_string()))?;
            return node
                .items
                .ok_or_else(|| run.invalid("changeset expression must produce a list"));
        }
        changeset
            .items
            .clone()
            .ok_or_else(|| run.invalid("changeset must be a list"))
    }
}

impl StepExecutor for UpdateDocumentStep {
    fn step_type(&self) -> &str {
        UPDATE_DOCUMENT
    }

    fn execute(
        &self,
        step: &Node,
        run: &mut WorkflowRun,
        ctx: &mut ProcessingContext<'_>,
    ) -> ProcessorResult<Value> {
        let entries = self.changeset(step, run, ctx)?;
        let mut applied = Vec::with_capacity(entries.len());

        for entry in &entries {
            let op_text = entry
                .str_property("op")
                .ok_or_else(|| run.invalid("changeset entry requires an op"))?;
            let op_text = run.resolve_string(op_text, ctx)?;
            let op: PatchOp = serde_json::from_value(Value::String(op_text.clone()))
                .map_err(|_| run.invalid(format!("unknown patch op '{}'", op_text)))?;

            let path = entry
                .str_property("path")
                .ok_or_else(|| run.invalid("changeset entry requires a path"))?;
            let path = run.resolve_string(path, ctx)?;
            let val = entry
                .property("val")
                .map(|val| run.resolve_node(val, ctx))
                .transpose()?;
            let from = entry
                .str_property("from")
                .map(|from| run.resolve_string(from, ctx))
                .transpose()?;

            let absolute = ctx.resolve_path(&path);
            let mut payload = Node::typed(DOCUMENT_UPDATE)
                .with_property("op", Node::scalar(op.to_string()))
                .with_property("path", Node::scalar(absolute.clone()));
            if let Some(val) = &val {
                payload = payload.with_property("val", val.clone());
            }
            if let Some(from) = &from {
                payload = payload.with_property("from", Node::scalar(ctx.resolve_path(from)));
            }

            ctx.add_patch(NodePatch {
                op,
                path,
                from,
                val,
            })?;
            ctx.emit_event(Event::internal(payload).with_emission(EmissionKind::Update));
            applied.push(json!({ "op": op, "path": absolute }));
        }
        Ok(Value::Array(applied))
    }
}
