//! Document model for the reactive document processor
//!
//! Documents are immutable trees of [`Node`]s. Every transition produces a
//! new tree through [`apply_patch`]; the engine wraps each result in an
//! `Arc` and never mutates it afterwards.
//!
//! # Example
//!
//! ```rust
//! use document_model::{apply_patch, Node, NodePatch};
//! use serde_json::json;
//!
//! let doc = Node::from_json(&json!({ "counter": 0 })).unwrap();
//! let next = apply_patch(&doc, &NodePatch::replace("/counter", Node::scalar(1))).unwrap();
//!
//! assert_eq!(next.get("/counter").unwrap().as_i64(), Some(1));
//! assert_eq!(doc.get("/counter").unwrap().as_i64(), Some(0));
//! ```

#![deny(unsafe_code)]

pub mod arena;
pub mod content_id;
pub mod error;
pub mod node;
pub mod patch;
pub mod path;
pub mod types;

pub use arena::{ArenaEntry, NodeArena, NodeIndex};
pub use content_id::ContentId;
pub use error::{ModelError, PatchError};
pub use node::{Node, TypeRef};
pub use patch::{apply_patch, apply_patches, NodePatch, PatchOp};
pub use types::{StructuralTypes, TypeSystem};
