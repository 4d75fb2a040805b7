//! Batch state and the drain loop
//!
//! A [`Batch`] owns everything that changes during one `initialize` or
//! `process_events` call: the current snapshot, the task queue, the gas
//! meter, the checkpoint cache and the list of emitted events. Routing
//! lives in `router.rs`; this module executes tasks and applies what they
//! stage.

use crate::checkpoint::CheckpointCache;
use crate::config::ProcessorConfig;
use crate::context::{ProcessingContext, TaskInfo};
use crate::embedded;
use crate::error::{ProcessingError, ProcessorResult};
use crate::event::Event;
use crate::queue::TaskQueue;
use crate::registry::ContractRegistry;
use document_model::{apply_patch, Node, NodePatch, TypeSystem};
use document_sandbox::{GasMeter, ModuleLoader, ScriptEvaluator};
use std::sync::Arc;
use tracing::{debug, warn};

/// Collaborators shared by every batch of one processor
#[derive(Clone)]
pub(crate) struct Services {
    pub registry: Arc<ContractRegistry>,
    pub evaluator: Arc<dyn ScriptEvaluator>,
    pub modules: Arc<dyn ModuleLoader>,
    pub types: Arc<dyn TypeSystem>,
    pub config: Arc<ProcessorConfig>,
}

/// Mutable state of one processing call
pub(crate) struct Batch {
    pub(crate) services: Services,
    pub(crate) current: Arc<Node>,
    pub(crate) queue: TaskQueue,
    pub(crate) gas: GasMeter,
    pub(crate) checkpoints: CheckpointCache,
    /// Events staged by handlers and lifecycle events, across the whole
    /// batch; adapter output is routed but not recorded
    emitted: Vec<Event>,
    next_seq: u64,
    next_task_id: u64,
    /// Tasks executed across the whole batch, for reporting; the step
    /// limit is enforced per external event by `drain`
    steps: usize,
}

/// What a finished batch hands back to the orchestrator
pub(crate) struct BatchOutcome {
    pub state: Arc<Node>,
    pub emitted: Vec<Event>,
    pub gas: GasMeter,
}

impl Batch {
    pub(crate) fn new(services: Services, document: Arc<Node>, gas: GasMeter) -> Self {
        Self {
            services,
            current: document,
            queue: TaskQueue::new(),
            gas,
            checkpoints: CheckpointCache::new(),
            emitted: Vec::new(),
            next_seq: 0,
            next_task_id: 0,
            steps: 0,
        }
    }

    pub(crate) fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub(crate) fn next_task_id(&mut self) -> u64 {
        let id = self.next_task_id;
        self.next_task_id += 1;
        id
    }

    /// Route `event`, drain to quiescence and write checkpoints.
    ///
    /// The checkpoint cache is cleared whatever the outcome, so a failed
    /// event never leaks entries into the next one.
    pub(crate) fn run_event(&mut self, event: Event) -> ProcessorResult<()> {
        let outcome = self.run_to_quiescence(event);
        self.checkpoints.clear();
        if outcome.is_err() {
            self.queue.clear();
        }
        outcome
    }

    fn run_to_quiescence(&mut self, event: Event) -> ProcessorResult<()> {
        self.route(event, 0)?;
        self.drain()?;
        self.commit_checkpoints()
    }

    // ── Drain ───────────────────────────────────────────────────────

    /// Run queued tasks until the queue is empty. At most `max_steps`
    /// tasks run per call.
    pub(crate) fn drain(&mut self) -> ProcessorResult<()> {
        let limit = self.services.config.max_steps;
        let mut executed = 0usize;
        while let Some(task) = self.queue.pop() {
            executed += 1;
            if executed > limit {
                return Err(ProcessingError::StepLimitExceeded { limit });
            }
            self.steps += 1;

            // The contract may have been removed or replaced by an
            // earlier task.
            let Some(contract) = self
                .current
                .get(&task.node_path)
                .and_then(|node| node.contract(&task.contract_name))
                .cloned()
            else {
                debug!(
                    node_path = %task.node_path,
                    contract = %task.contract_name,
                    "Skipping task for removed contract"
                );
                continue;
            };
            let Some(type_id) = contract.type_id() else {
                continue;
            };
            if task.contract.type_id() != Some(type_id) {
                debug!(
                    node_path = %task.node_path,
                    contract = %task.contract_name,
                    contract_type = %type_id,
                    "Skipping task for retyped contract"
                );
                continue;
            }
            let Some(processor) = self.services.registry.get(type_id).cloned() else {
                warn!(
                    node_path = %task.node_path,
                    contract = %task.contract_name,
                    contract_type = %type_id,
                    "No processor registered; task skipped"
                );
                continue;
            };

            self.gas.charge(self.services.config.gas.handler_overhead)?;
            debug!(
                node_path = %task.node_path,
                contract = %task.contract_name,
                seq = task.key.seq,
                "Executing task"
            );

            let info = TaskInfo::handler(
                task.node_path.clone(),
                task.contract_name.clone(),
                task.event.clone(),
            );
            let mut ctx = ProcessingContext::new(self, info);
            processor.handle(&task.event, &contract, &task.contract_name, &mut ctx)?;
            ctx.flush()?;
        }
        Ok(())
    }

    // ── Applying staged work ────────────────────────────────────────

    /// Apply patches staged by `task`, then route the events it emitted.
    /// Only handler output is recorded in `emitted`.
    pub(crate) fn apply(
        &mut self,
        task: &TaskInfo,
        patches: Vec<NodePatch>,
        events: Vec<Event>,
    ) -> ProcessorResult<()> {
        for patch in patches {
            self.apply_guarded(&task.node_path, &patch)?;
        }
        let inline_depth = task.inline_depth.map_or(0, |depth| depth + 1);
        for event in events {
            if task.inline_depth.is_none() {
                self.emitted.push(event.clone());
            }
            self.route(event, inline_depth)?;
        }
        Ok(())
    }

    fn apply_guarded(&mut self, writer: &str, patch: &NodePatch) -> ProcessorResult<()> {
        let roots = embedded::embedded_roots(&self.current, self.services.types.as_ref());
        embedded::check_boundary(&roots, writer, patch)?;
        self.apply_system(patch)
    }

    /// Apply an engine-owned patch; no boundary check
    pub(crate) fn apply_system(&mut self, patch: &NodePatch) -> ProcessorResult<()> {
        let next =
            apply_patch(&self.current, patch).map_err(|e| ProcessingError::patch(patch, e))?;
        self.current = Arc::new(next);
        Ok(())
    }

    fn commit_checkpoints(&mut self) -> ProcessorResult<()> {
        if self.checkpoints.is_empty() {
            return Ok(());
        }
        for entry in self.checkpoints.entries() {
            self.gas.charge(self.services.config.gas.checkpoint_update)?;
            debug!(
                scope = %entry.scope,
                channel = %entry.channel,
                content_id = %entry.content_id.short(),
                "Writing checkpoint"
            );
        }
        let patches = self.checkpoints.flush(&self.current);
        for patch in &patches {
            self.apply_system(patch)?;
        }
        Ok(())
    }

    /// Record an event the engine itself raises
    pub(crate) fn record(&mut self, event: &Event) {
        self.emitted.push(event.clone());
    }

    pub(crate) fn steps(&self) -> usize {
        self.steps
    }

    pub(crate) fn finish(self) -> BatchOutcome {
        BatchOutcome {
            state: self.current,
            emitted: self.emitted,
            gas: self.gas,
        }
    }
}
