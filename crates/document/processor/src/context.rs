//! Processing context handed to contract processors
//!
//! A context is scoped to one contract on one node for one event. Paths
//! given to it are resolved against that node. Patches and events are
//! staged and only take effect on [`ProcessingContext::flush`], which the
//! engine also calls after every `handle`.

use crate::checkpoint::CheckpointCache;
use crate::config::ProcessorConfig;
use crate::engine::Batch;
use crate::error::{ProcessingError, ProcessorResult};
use crate::event::Event;
use crate::registry::ContractRegistry;
use document_model::{path, Node, NodePatch, TypeSystem};
use document_sandbox::module::{self, CONTENT_SCHEME};
use document_sandbox::{Bindings, DocumentReader, EvalError, EvalLimits, GasMeter, ModuleError};
use serde_json::Value;
use std::sync::Arc;

/// Identity of the task a context belongs to
#[derive(Clone, Debug)]
pub(crate) struct TaskInfo {
    pub node_path: String,
    pub contract_name: String,
    pub event: Event,
    /// `Some` while an adapter runs inline during routing
    pub inline_depth: Option<usize>,
}

impl TaskInfo {
    pub(crate) fn handler(node_path: String, contract_name: String, event: Event) -> Self {
        Self {
            node_path,
            contract_name,
            event,
            inline_depth: None,
        }
    }

    pub(crate) fn adapter(
        node_path: String,
        contract_name: String,
        event: Event,
        inline_depth: usize,
    ) -> Self {
        Self {
            inline_depth: Some(inline_depth),
            ..Self::handler(node_path, contract_name, event)
        }
    }
}

/// Scoped view of the batch for one contract invocation
pub struct ProcessingContext<'a> {
    batch: &'a mut Batch,
    task: TaskInfo,
    patches: Vec<NodePatch>,
    events: Vec<Event>,
}

impl<'a> ProcessingContext<'a> {
    pub(crate) fn new(batch: &'a mut Batch, task: TaskInfo) -> Self {
        Self {
            batch,
            task,
            patches: Vec::new(),
            events: Vec::new(),
        }
    }

    // ── Identity ────────────────────────────────────────────────────

    /// Absolute path of the node owning the contract
    pub fn node_path(&self) -> &str {
        &self.task.node_path
    }

    pub fn contract_name(&self) -> &str {
        &self.task.contract_name
    }

    /// Event being processed
    pub fn event(&self) -> &Event {
        &self.task.event
    }

    /// True for adapters running inline during routing
    pub fn is_adapter(&self) -> bool {
        self.task.inline_depth.is_some()
    }

    // ── Reading ─────────────────────────────────────────────────────

    /// Absolute form of a node-relative path
    pub fn resolve_path(&self, relative: &str) -> String {
        path::join(&self.task.node_path, relative)
    }

    /// Current document snapshot (reflects every flushed patch)
    pub fn document(&self) -> &Arc<Node> {
        &self.batch.current
    }

    /// Node at a node-relative path
    pub fn get(&self, relative: &str) -> Option<&Node> {
        self.batch.current.get(&self.resolve_path(relative))
    }

    /// JSON form of whatever a node-relative path addresses
    pub fn read(&self, relative: &str) -> Option<Value> {
        self.batch.current.read(&self.resolve_path(relative))
    }

    /// Reader over the current snapshot for sandboxed scripts
    pub fn document_reader(&self) -> DocumentReader {
        let snapshot = Arc::clone(&self.batch.current);
        let base = self.task.node_path.clone();
        Arc::new(move |pointer: &str| snapshot.read(&path::join(&base, pointer)))
    }

    // ── Collaborators ───────────────────────────────────────────────

    pub fn registry(&self) -> &ContractRegistry {
        &self.batch.services.registry
    }

    pub fn types(&self) -> &dyn TypeSystem {
        self.batch.services.types.as_ref()
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.batch.services.config
    }

    pub fn gas_meter(&mut self) -> &mut GasMeter {
        &mut self.batch.gas
    }

    /// Checkpoint entries recorded for the current external event
    pub fn checkpoints(&mut self) -> &mut CheckpointCache {
        &mut self.batch.checkpoints
    }

    /// Base bindings for a script run from this context: the scoped
    /// document reader and the host's module loader
    pub fn bindings(&self) -> Bindings {
        Bindings::new()
            .with_document(self.document_reader())
            .with_modules(Arc::clone(&self.batch.services.modules))
    }

    /// Run the sandboxed evaluator against this batch's gas meter
    pub fn evaluate(
        &mut self,
        source: &str,
        bindings: &Bindings,
        limits: &EvalLimits,
    ) -> Result<Value, EvalError> {
        let evaluator = Arc::clone(&self.batch.services.evaluator);
        evaluator.evaluate(source, bindings, limits, &mut self.batch.gas)
    }

    /// Source text stored under a content id; accepts a bare id or a
    /// `content:` specifier
    pub fn load_external_content(&self, id: &str) -> Result<String, ModuleError> {
        let id = id.strip_prefix(CONTENT_SCHEME).unwrap_or(id);
        self.batch.services.modules.load_content(id)
    }

    /// Source text behind an `http`/`https` url
    pub fn load_external_module(&self, url: &str) -> Result<String, ModuleError> {
        if !module::is_remote(url) {
            return Err(ModuleError::UnsupportedScheme(url.to_string()));
        }
        self.batch.services.modules.load_module(url)
    }

    // ── Staging ─────────────────────────────────────────────────────

    /// Stage a patch. Paths are node-relative.
    pub fn add_patch(&mut self, mut patch: NodePatch) -> ProcessorResult<()> {
        if self.is_adapter() {
            return Err(ProcessingError::AdapterPatch {
                path: self.task.node_path.clone(),
                contract: self.task.contract_name.clone(),
            });
        }
        patch.path = self.resolve_path(&patch.path);
        patch.from = patch.from.map(|from| self.resolve_path(&from));
        self.patches.push(patch);
        Ok(())
    }

    /// Stage an event.
    ///
    /// Unless the event is dispatched to an explicit node it is stamped
    /// with this node as its origin. It inherits the root event and the
    /// hop trace of the event being processed.
    pub fn emit_event(&mut self, mut event: Event) {
        if event.origin_node_path.is_none() && event.dispatch_path.is_none() {
            event.origin_node_path = Some(self.task.node_path.clone());
        }
        if event.root_event.is_none() {
            let root = match &self.task.event.root_event {
                Some(root) => Arc::clone(root),
                None => Arc::new(self.task.event.clone()),
            };
            event.root_event = Some(root);
        }
        if event.trace.is_empty() {
            event.trace = self.task.event.trace.clone();
        }
        self.events.push(event);
    }

    /// Apply staged patches, then route staged events
    pub fn flush(&mut self) -> ProcessorResult<()> {
        if self.patches.is_empty() && self.events.is_empty() {
            return Ok(());
        }
        let patches = std::mem::take(&mut self.patches);
        let events = std::mem::take(&mut self.events);
        self.batch.apply(&self.task, patches, events)
    }
}
