//! Canonical contract processors

mod channels;
mod checkpoint;
mod markers;
mod operation;
mod process_embedded;
mod workflow;

pub use channels::{
    DocumentUpdateChannel, EmbeddedNodeChannel, LifecycleEventChannel, TimelineChannel,
    TriggeredEventChannel,
};
pub use checkpoint::ChannelEventCheckpointProcessor;
pub use markers::MarkerProcessor;
pub use operation::OperationProcessor;
pub use process_embedded::ProcessEmbeddedProcessor;
pub use workflow::{SequentialWorkflowOperationProcessor, SequentialWorkflowProcessor};

use crate::config::ProcessorConfig;
use crate::registry::ContractRegistry;
use crate::steps::StepRegistry;
use std::sync::Arc;

/// Registry holding every canonical processor.
///
/// Adapters are registered first, then workflow handlers and markers; the
/// checkpoint handler gets `config.checkpoint_priority` so it runs after
/// every other handler of the same channel event.
pub fn canonical_registry(config: &ProcessorConfig, steps: Arc<StepRegistry>) -> ContractRegistry {
    let mut registry = ContractRegistry::new();
    registry.register(Arc::new(TimelineChannel), None);
    registry.register(Arc::new(LifecycleEventChannel), None);
    registry.register(Arc::new(DocumentUpdateChannel), None);
    registry.register(Arc::new(TriggeredEventChannel), None);
    registry.register(Arc::new(EmbeddedNodeChannel), None);
    registry.register(Arc::new(OperationProcessor), None);
    registry.register(Arc::new(ProcessEmbeddedProcessor), None);
    registry.register(
        Arc::new(SequentialWorkflowProcessor::new(Arc::clone(&steps))),
        None,
    );
    registry.register(Arc::new(SequentialWorkflowOperationProcessor::new(steps)), None);
    registry.register(Arc::new(MarkerProcessor::initialized()), None);
    registry.register(Arc::new(MarkerProcessor::terminated()), None);
    registry.register(
        Arc::new(ChannelEventCheckpointProcessor),
        Some(config.checkpoint_priority),
    );
    registry
}
