use crate::checkpoint::is_eligible;
use crate::context::ProcessingContext;
use crate::contract_types::CHANNEL_EVENT_CHECKPOINT;
use crate::error::ProcessorResult;
use crate::event::Event;
use crate::registry::{ContractProcessor, ContractRole};
use document_model::Node;

/// Records the content id of each eligible channel event in the batch's
/// checkpoint cache, keyed by this node and the channel name
#[derive(Clone, Copy, Debug, Default)]
pub struct ChannelEventCheckpointProcessor;

impl ContractProcessor for ChannelEventCheckpointProcessor {
    fn contract_type(&self) -> &str {
        CHANNEL_EVENT_CHECKPOINT
    }

    fn role(&self) -> ContractRole {
        ContractRole::Handler
    }

    fn supports(
        &self,
        event: &Event,
        _contract: &Node,
        _name: &str,
        _ctx: &ProcessingContext<'_>,
    ) -> ProcessorResult<bool> {
        Ok(is_eligible(event))
    }

    fn handle(
        &self,
        event: &Event,
        _contract: &Node,
        _name: &str,
        ctx: &mut ProcessingContext<'_>,
    ) -> ProcessorResult<()> {
        let Some(channel) = event.channel_name.clone() else {
            return Ok(());
        };
        let content_id = ctx.types().content_id(&event.payload);
        let scope = ctx.node_path().to_string();
        ctx.checkpoints().record(scope, channel, content_id);
        Ok(())
    }
}
