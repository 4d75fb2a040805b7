//! The document processor
//!
//! [`DocumentProcessor`] is the public face of the engine. It owns the
//! contract registry and the host collaborators, and runs each
//! `initialize` / `process_events` call as one batch against a private
//! copy of the caller's document. A failed call leaves nothing behind:
//! the caller keeps the document it passed in.

use crate::config::ProcessorConfig;
use crate::contract_types::{
    DOCUMENT_PROCESSING_INITIATED, KEY_INITIALIZED, PROCESSING_INITIALIZED_MARKER,
};
use crate::engine::{Batch, BatchOutcome, Services};
use crate::error::{ProcessingError, ProcessorResult};
use crate::event::Event;
use crate::preflight;
use crate::processors::canonical_registry;
use crate::registry::{ContractProcessor, ContractRegistry};
use crate::steps::StepRegistry;
use document_model::{Node, NodePatch, StructuralTypes, TypeSystem};
use document_sandbox::{GasMeter, LuaEvaluator, ModuleLoader, NoModules, ScriptEvaluator};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

const DOCUMENT_ID: &str = "documentId";

/// Per-call options
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessOptions {
    /// Gas budget for the whole call; `None` never fails on gas
    pub gas_budget: Option<u64>,
}

impl ProcessOptions {
    pub fn with_gas_budget(budget: u64) -> Self {
        Self {
            gas_budget: Some(budget),
        }
    }
}

/// Outcome of a successful call
#[derive(Clone, Debug)]
pub struct ProcessingResult {
    /// Final document snapshot
    pub state: Arc<Node>,
    /// The lifecycle event (on initialization) followed by every event
    /// staged by handlers, in emission order. Channel events produced by
    /// adapters are not included.
    pub emitted: Vec<Event>,
    /// True when the document uses a contract type nobody processes; the
    /// state is then the input, untouched
    pub capability_failure: bool,
    pub failure_reason: Option<String>,
    pub gas_used: Option<u64>,
    pub gas_remaining: Option<u64>,
}

impl ProcessingResult {
    fn from_outcome(outcome: BatchOutcome) -> Self {
        Self {
            state: outcome.state,
            emitted: outcome.emitted,
            capability_failure: false,
            failure_reason: None,
            gas_used: Some(outcome.gas.consumed()),
            gas_remaining: outcome.gas.remaining(),
        }
    }

    fn capability_failure(document: &Node, reason: String) -> Self {
        Self {
            state: Arc::new(document.clone()),
            emitted: Vec::new(),
            capability_failure: true,
            failure_reason: Some(reason),
            gas_used: None,
            gas_remaining: None,
        }
    }

    fn unchanged(document: &Node) -> Self {
        Self {
            state: Arc::new(document.clone()),
            emitted: Vec::new(),
            capability_failure: false,
            failure_reason: None,
            gas_used: Some(0),
            gas_remaining: None,
        }
    }

    /// Emitted events whose payload is typed `type_id`
    pub fn emitted_of_type<'a>(&'a self, type_id: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.emitted
            .iter()
            .filter(move |event| event.payload_type() == Some(type_id))
    }
}

/// Deterministic processor for contract-carrying documents
#[derive(Clone)]
pub struct DocumentProcessor {
    services: Services,
}

impl DocumentProcessor {
    /// Processor with the canonical contracts, the Lua evaluator, no
    /// module source and structural typing
    pub fn new(config: ProcessorConfig) -> Self {
        Self::with_step_registry(config, StepRegistry::with_defaults())
    }

    /// Like [`DocumentProcessor::new`], with a custom set of workflow steps
    pub fn with_step_registry(config: ProcessorConfig, steps: StepRegistry) -> Self {
        let registry = canonical_registry(&config, Arc::new(steps));
        let evaluator = LuaEvaluator::new(config.gas.clone());
        Self {
            services: Services {
                registry: Arc::new(registry),
                evaluator: Arc::new(evaluator),
                modules: Arc::new(NoModules),
                types: Arc::new(StructuralTypes::new()),
                config: Arc::new(config),
            },
        }
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn ScriptEvaluator>) -> Self {
        self.services.evaluator = evaluator;
        self
    }

    pub fn with_module_loader(mut self, modules: Arc<dyn ModuleLoader>) -> Self {
        self.services.modules = modules;
        self
    }

    pub fn with_type_system(mut self, types: Arc<dyn TypeSystem>) -> Self {
        self.services.types = types;
        self
    }

    /// Register (or replace) the processor for a contract type
    pub fn register(&mut self, processor: Arc<dyn ContractProcessor>, priority: Option<i64>) {
        Arc::make_mut(&mut self.services.registry).register(processor, priority);
    }

    pub fn registry(&self) -> &ContractRegistry {
        &self.services.registry
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.services.config
    }

    // ── Operations ──────────────────────────────────────────────────

    pub fn initialize(&self, document: &Node) -> ProcessorResult<ProcessingResult> {
        self.initialize_with(document, &ProcessOptions::default())
    }

    /// Validate the document, scaffold checkpoints, drain the
    /// `Document Processing Initiated` lifecycle event and mark the root
    /// initialized.
    pub fn initialize_with(
        &self,
        document: &Node,
        options: &ProcessOptions,
    ) -> ProcessorResult<ProcessingResult> {
        let types = self.services.types.as_ref();
        preflight::validate_contracts(document, types)?;
        if preflight::is_initialized(document) {
            return Err(ProcessingError::AlreadyInitialized);
        }
        if let Some(reason) = preflight::capability_gap(document, &self.services.registry) {
            warn!(%reason, "Capability failure during initialization");
            return Ok(ProcessingResult::capability_failure(document, reason));
        }

        let content_id = types.content_id(document);
        let document_id = content_id.to_hex();
        let scaffolded = preflight::ensure_checkpoints(document, types)?;
        let mut batch = Batch::new(
            self.services.clone(),
            Arc::new(scaffolded),
            GasMeter::new(options.gas_budget),
        );

        let lifecycle = Node::typed(DOCUMENT_PROCESSING_INITIATED)
            .with_property(DOCUMENT_ID, Node::scalar(document_id.clone()));
        let lifecycle = Event::internal(lifecycle);
        batch.record(&lifecycle);
        batch.run_event(lifecycle)?;

        let marker = Node::typed(PROCESSING_INITIALIZED_MARKER)
            .with_property(DOCUMENT_ID, Node::scalar(document_id));
        let marker_path = format!("/contracts/{}", KEY_INITIALIZED);
        batch.apply_system(&NodePatch::add(marker_path, marker))?;

        let steps = batch.steps();
        let result = ProcessingResult::from_outcome(batch.finish());
        info!(
            document_id = %content_id.short(),
            steps,
            emitted = result.emitted.len(),
            gas_used = result.gas_used.unwrap_or_default(),
            "Document initialized"
        );
        Ok(result)
    }

    /// Run `events`, in order, against an initialized document.
    ///
    /// Each event is routed and drained to quiescence before the next one
    /// starts; its checkpoint entries land together with its patches.
    pub fn process_events(
        &self,
        document: &Node,
        events: &[Node],
        options: &ProcessOptions,
    ) -> ProcessorResult<ProcessingResult> {
        let types = self.services.types.as_ref();
        preflight::validate_contracts(document, types)?;
        if !preflight::is_initialized(document) {
            return Err(ProcessingError::NotInitialized);
        }
        if let Some(reason) = preflight::capability_gap(document, &self.services.registry) {
            warn!(%reason, "Capability failure");
            return Ok(ProcessingResult::capability_failure(document, reason));
        }
        if preflight::is_terminated(document) {
            info!(events = events.len(), "Document is terminated; events ignored");
            return Ok(ProcessingResult::unchanged(document));
        }

        let scaffolded = preflight::ensure_checkpoints(document, types)?;
        let mut batch = Batch::new(
            self.services.clone(),
            Arc::new(scaffolded),
            GasMeter::new(options.gas_budget),
        );
        for payload in events {
            batch.run_event(Event::external(payload.clone()))?;
        }

        let steps = batch.steps();
        let result = ProcessingResult::from_outcome(batch.finish());
        info!(
            events = events.len(),
            steps,
            emitted = result.emitted.len(),
            gas_used = result.gas_used.unwrap_or_default(),
            "Events processed"
        );
        Ok(result)
    }
}

impl Default for DocumentProcessor {
    fn default() -> Self {
        Self::new(ProcessorConfig::default())
    }
}

impl fmt::Debug for DocumentProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentProcessor")
            .field("registry", &self.services.registry)
            .field("config", &self.services.config)
            .finish_non_exhaustive()
    }
}
