use crate::context::ProcessingContext;
use crate::contract_types::{PROCESSING_INITIALIZED_MARKER, PROCESSING_TERMINATED_MARKER};
use crate::error::ProcessorResult;
use crate::event::Event;
use crate::registry::{ContractProcessor, ContractRole};
use document_model::Node;

/// Inert contract that only records state
#[derive(Clone, Copy, Debug)]
pub struct MarkerProcessor {
    contract_type: &'static str,
}

impl MarkerProcessor {
    pub const fn new(contract_type: &'static str) -> Self {
        Self { contract_type }
    }

    pub const fn initialized() -> Self {
        Self::new(PROCESSING_INITIALIZED_MARKER)
    }

    pub const fn terminated() -> Self {
        Self::new(PROCESSING_TERMINATED_MARKER)
    }
}

impl ContractProcessor for MarkerProcessor {
    fn contract_type(&self) -> &str {
        self.contract_type
    }

    fn role(&self) -> ContractRole {
        ContractRole::Marker
    }

    fn supports(
        &self,
        _event: &Event,
        _contract: &Node,
        _name: &str,
        _ctx: &ProcessingContext<'_>,
    ) -> ProcessorResult<bool> {
        Ok(false)
    }

    fn handle(
        &self,
        _event: &Event,
        _contract: &Node,
        _name: &str,
        _ctx: &mut ProcessingContext<'_>,
    ) -> ProcessorResult<()> {
        Ok(())
    }
}
