//! Contract registry: maps contract type ids to processors
//!
//! Each registration carries a processor priority used as the third key of
//! the task ordering. Without an explicit hint, the priority is the
//! registration index, so earlier registrations run first.

use crate::context::ProcessingContext;
use crate::error::ProcessorResult;
use crate::event::Event;
use document_model::Node;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// How the router treats a processor's contracts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContractRole {
    /// Runs inline during routing and turns matching events into channel
    /// events. May emit, may not patch.
    Adapter,
    /// Enqueued as a task and run by the drain loop
    Handler,
    /// Inert state (markers); never routed
    Marker,
    /// Checked at preflight; never routed
    Validator,
}

/// Behaviour attached to one contract type
pub trait ContractProcessor: Send + Sync {
    /// Type id this processor handles
    fn contract_type(&self) -> &str;

    fn role(&self) -> ContractRole;

    /// Does `contract` (named `name` at `ctx.node_path()`) accept `event`?
    fn supports(
        &self,
        event: &Event,
        contract: &Node,
        name: &str,
        ctx: &ProcessingContext<'_>,
    ) -> ProcessorResult<bool>;

    /// Act on a matched event through `ctx`
    fn handle(
        &self,
        event: &Event,
        contract: &Node,
        name: &str,
        ctx: &mut ProcessingContext<'_>,
    ) -> ProcessorResult<()>;
}

/// A registered processor and its priority
#[derive(Clone)]
pub struct Registration {
    pub processor: Arc<dyn ContractProcessor>,
    pub priority: i64,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("contract_type", &self.processor.contract_type())
            .field("role", &self.processor.role())
            .field("priority", &self.priority)
            .finish()
    }
}

/// Registry of contract processors, keyed by type id
#[derive(Clone, Debug, Default)]
pub struct ContractRegistry {
    processors: HashMap<String, Registration>,
    registered: usize,
}

impl ContractRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `processor`, replacing any earlier one for the same type
    pub fn register(&mut self, processor: Arc<dyn ContractProcessor>, priority: Option<i64>) {
        let priority = priority.unwrap_or(self.registered as i64);
        self.registered += 1;
        let type_id = processor.contract_type().to_string();
        let role = processor.role();
        if self
            .processors
            .insert(type_id.clone(), Registration { processor, priority })
            .is_some()
        {
            tracing::debug!(contract_type = %type_id, "Contract processor replaced");
        }
        tracing::debug!(contract_type = %type_id, ?role, priority, "Contract processor registered");
    }

    pub fn get(&self, type_id: &str) -> Option<&Arc<dyn ContractProcessor>> {
        self.processors.get(type_id).map(|r| &r.processor)
    }

    pub fn registration(&self, type_id: &str) -> Option<&Registration> {
        self.processors.get(type_id)
    }

    pub fn priority(&self, type_id: &str) -> Option<i64> {
        self.processors.get(type_id).map(|r| r.priority)
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.processors.contains_key(type_id)
    }

    pub fn count(&self) -> usize {
        self.processors.len()
    }

    /// Registered type ids in sorted order
    pub fn type_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.processors.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}
