//! Error types for the document model

use thiserror::Error;

/// Errors raised while converting between JSON and nodes
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("invalid type reference: {0}")]
    InvalidType(String),

    #[error("invalid '{key}' entry: {reason}")]
    InvalidStructure { key: String, reason: String },

    #[error("invalid path '{0}': paths must start with '/'")]
    InvalidPath(String),
}

/// Errors raised while applying a [`crate::NodePatch`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatchError {
    #[error("invalid path '{0}'")]
    InvalidPath(String),

    #[error("path not found: {0}")]
    PathNotFound(String),

    #[error("{op} at {path} requires a value")]
    MissingValue { op: String, path: String },

    #[error("{op} at {path} requires a source path")]
    MissingFrom { op: String, path: String },

    #[error("index {index} out of bounds at {path}")]
    IndexOutOfBounds { path: String, index: usize },

    #[error("cannot move {from} into its own descendant {path}")]
    MoveIntoDescendant { from: String, path: String },

    #[error("cannot remove the document root")]
    RemoveRoot,

    #[error("field '{field}' at {path} expects a scalar string")]
    InvalidField { field: String, path: String },
}

impl From<ModelError> for PatchError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::InvalidPath(path) => PatchError::InvalidPath(path),
            other => PatchError::InvalidPath(other.to_string()),
        }
    }
}
