//! Workflow steps
//!
//! A sequential workflow runs its `steps` list in order. Each step is
//! dispatched by type to a [`StepExecutor`]; its output is stored under
//! the step's name (or `Step<n>`, 1-based) and is visible to later steps
//! as `steps.<name>`. The context is flushed after every step, so a step
//! sees the document changes of the steps before it.

mod script_code;
mod trigger_event;
mod update_document;

pub use script_code::ScriptCodeStep;
pub use trigger_event::TriggerEventStep;
pub use update_document::UpdateDocumentStep;

use crate::context::ProcessingContext;
use crate::error::{ProcessingError, ProcessorResult};
use crate::event::Event;
use document_model::Node;
use document_sandbox::expression::{
    contains_expression, extract_expression, is_expression, resolve_template, stringify,
};
use document_sandbox::Bindings;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

const STEPS: &str = "steps";

/// Executes one step type
pub trait StepExecutor: Send + Sync {
    fn step_type(&self) -> &str;

    /// Run `step` and return its output
    fn execute(
        &self,
        step: &Node,
        run: &mut WorkflowRun,
        ctx: &mut ProcessingContext<'_>,
    ) -> ProcessorResult<Value>;
}

/// Step executors keyed by step type id
#[derive(Clone, Default)]
pub struct StepRegistry {
    executors: HashMap<String, Arc<dyn StepExecutor>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `Update Document`, `Script Code` and
    /// `Trigger Event` steps
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(UpdateDocumentStep));
        registry.register(Arc::new(ScriptCodeStep));
        registry.register(Arc::new(TriggerEventStep));
        registry
    }

    pub fn register(&mut self, executor: Arc<dyn StepExecutor>) {
        self.executors
            .insert(executor.step_type().to_string(), executor);
    }

    pub fn get(&self, step_type: &str) -> Option<&Arc<dyn StepExecutor>> {
        self.executors.get(step_type)
    }

    pub fn contains(&self, step_type: &str) -> bool {
        self.executors.contains_key(step_type)
    }
}

impl fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&String> = self.executors.keys().collect();
        types.sort();
        f.debug_struct("StepRegistry").field("types", &types).finish()
    }
}

/// State of one workflow execution
#[derive(Clone, Debug)]
pub struct WorkflowRun {
    pub contract_name: String,
    /// Channel event that triggered the workflow
    pub event: Event,
    /// Outputs of the steps run so far
    pub steps: Map<String, Value>,
}

impl WorkflowRun {
    pub fn new(contract_name: impl Into<String>, event: Event) -> Self {
        Self {
            contract_name: contract_name.into(),
            event,
            steps: Map::new(),
        }
    }

    /// `document`, `event` and `steps` bindings for a script
    pub fn bindings(&self, ctx: &ProcessingContext<'_>) -> Bindings {
        ctx.bindings()
            .with_event(self.event.payload.to_json())
            .with_steps(Value::Object(self.steps.clone()))
    }

    /// Evaluate an expression (`is_block = false`) or a code block
    pub fn evaluate(
        &self,
        source: &str,
        is_block: bool,
        ctx: &mut ProcessingContext<'_>,
    ) -> ProcessorResult<Value> {
        let bindings = self.bindings(ctx);
        let limits = ctx.config().eval_limits(is_block);
        Ok(ctx.evaluate(source, &bindings, &limits)?)
    }

    /// Resolve `${...}` markers in a string. A full expression is
    /// stringified; a template interpolates each marker.
    pub fn resolve_string(
        &self,
        text: &str,
        ctx: &mut ProcessingContext<'_>,
    ) -> ProcessorResult<String> {
        if is_expression(text) {
            let value = self.evaluate(extract_expression(text), false, ctx)?;
            return Ok(stringify(&value));
        }
        if contains_expression(text) {
            return resolve_template(text, |source| self.evaluate(source, false, ctx));
        }
        Ok(text.to_string())
    }

    /// Resolve `${...}` markers throughout a node. A string value that is
    /// a full expression takes the type of its result.
    pub fn resolve_node(&self, node: &Node, ctx: &mut ProcessingContext<'_>) -> ProcessorResult<Node> {
        if let Some(text) = node.as_str() {
            if node.is_scalar() && is_expression(text) {
                let value = self.evaluate(extract_expression(text), false, ctx)?;
                return Node::from_json(&value).map_err(|e| self.invalid(e.to_string()));
            }
            if contains_expression(text) {
                let mut resolved = node.clone();
                resolved.value = Some(Value::String(self.resolve_string(text, ctx)?));
                return Ok(resolved);
            }
        }

        let mut resolved = node.clone();
        for (key, child) in &node.properties {
            resolved
                .properties
                .insert(key.clone(), self.resolve_node(child, ctx)?);
        }
        if let Some(items) = &node.items {
            resolved.items = Some(
                items
                    .iter()
                    .map(|item| self.resolve_node(item, ctx))
                    .collect::<ProcessorResult<Vec<_>>>()?,
            );
        }
        Ok(resolved)
    }

    pub(crate) fn invalid(&self, reason: impl Into<String>) -> ProcessingError {
        ProcessingError::InvalidStep {
            contract: self.contract_name.clone(),
            reason: reason.into(),
        }
    }
}

/// Run every step of a workflow contract against `event`
pub fn run_workflow(
    registry: &StepRegistry,
    event: &Event,
    contract: &Node,
    name: &str,
    ctx: &mut ProcessingContext<'_>,
) -> ProcessorResult<()> {
    let steps = contract
        .property(STEPS)
        .and_then(|steps| steps.items.as_deref())
        .unwrap_or_default();
    let mut run = WorkflowRun::new(name, event.clone());

    for (index, step) in steps.iter().enumerate() {
        let step_type = step
            .type_id()
            .ok_or_else(|| run.invalid(format!("step {} has no type", index + 1)))?;
        let executor = registry
            .get(step_type)
            .cloned()
            .ok_or_else(|| ProcessingError::UnsupportedStep {
                contract: name.to_string(),
                step_type: step_type.to_string(),
            })?;

        let output = executor.execute(step, &mut run, ctx)?;
        let key = step
            .name
            .clone()
            .unwrap_or_else(|| format!("Step{}", index + 1));
        run.steps.insert(key, output);
        ctx.flush()?;
    }
    Ok(())
}
