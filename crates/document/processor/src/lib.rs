//! Deterministic reactive document processor
//!
//! A document carries its own behaviour: named contracts under `contracts`
//! on any node. Feeding events to the document routes each one to the
//! contracts that accept it, runs the resulting work in a fixed order and
//! returns the next immutable snapshot together with the events its
//! handlers emitted on the way.
//!
//! # Architecture
//!
//! [`DocumentProcessor`] composes the pieces below for each call:
//!
//! - [`ContractRegistry`]: contract type id to [`ContractProcessor`]
//! - [`router`]: picks target nodes, runs channel adapters inline and
//!   enqueues handlers, detecting loops through the hop trace
//! - [`TaskQueue`]: orders handler work by depth, sequence, priority,
//!   explicit order and name
//! - [`ProcessingContext`]: what a processor sees and stages
//! - [`embedded`]: boundaries between a document and the documents it
//!   embeds
//! - [`CheckpointCache`]: last-seen external event per scope and channel
//! - [`steps`]: `Update Document`, `Script Code` and `Trigger Event`
//!   workflow steps, scripted through `document-sandbox`
//!
//! # Example
//!
//! ```rust
//! use document_model::Node;
//! use document_processor::{DocumentProcessor, ProcessOptions};
//! use serde_json::json;
//!
//! let document = Node::from_json(&json!({
//!     "counter": 0,
//!     "contracts": {
//!         "timeline": { "type": "Timeline Channel", "timelineId": "alice" },
//!         "increment": {
//!             "type": "Sequential Workflow",
//!             "channel": "timeline",
//!             "steps": [{
//!                 "type": "Update Document",
//!                 "changeset": [{
//!                     "op": "replace",
//!                     "path": "/counter",
//!                     "val": "${document('/counter') + event.message.amount}"
//!                 }]
//!             }]
//!         }
//!     }
//! }))
//! .unwrap();
//!
//! let processor = DocumentProcessor::default();
//! let initialized = processor.initialize(&document).unwrap();
//!
//! let entry = Node::from_json(&json!({
//!     "type": "Timeline Entry",
//!     "timeline": { "timelineId": "alice" },
//!     "message": { "amount": 5 }
//! }))
//! .unwrap();
//! let result = processor
//!     .process_events(&initialized.state, &[entry], &ProcessOptions::default())
//!     .unwrap();
//!
//! assert_eq!(result.state.get("/counter").unwrap().as_i64(), Some(5));
//! assert_eq!(result.emitted_of_type("Document Update").count(), 1);
//! ```

#![deny(unsafe_code)]

pub mod checkpoint;
pub mod config;
pub mod context;
pub mod contract_types;
pub mod embedded;
mod engine;
pub mod error;
pub mod event;
pub mod preflight;
pub mod processor;
pub mod processors;
pub mod queue;
pub mod registry;
pub mod router;
pub mod steps;

// Re-export main types
pub use checkpoint::{CheckpointCache, CheckpointEntry};
pub use config::ProcessorConfig;
pub use context::ProcessingContext;
pub use error::{ProcessingError, ProcessorResult};
pub use event::{EmissionKind, Event, EventSource};
pub use processor::{DocumentProcessor, ProcessOptions, ProcessingResult};
pub use processors::canonical_registry;
pub use queue::{Task, TaskKey, TaskQueue};
pub use registry::{ContractProcessor, ContractRegistry, ContractRole, Registration};
pub use steps::{StepExecutor, StepRegistry, WorkflowRun};
