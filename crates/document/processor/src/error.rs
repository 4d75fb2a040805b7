//! Error types for document processing

use document_model::PatchError;
use document_sandbox::{EvalError, GasError, ModuleError};
use thiserror::Error;

/// Errors that abort an `initialize` or `process_events` call.
///
/// Any of these rejects the whole call: the caller's document is left as
/// it was and no checkpoint is written.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessingError {
    #[error("reserved contract key '{name}' at {path} must hold a {expected}")]
    ReservedContract {
        path: String,
        name: String,
        expected: String,
    },

    #[error("invalid contract '{name}' at {path}: {reason}")]
    InvalidContract {
        path: String,
        name: String,
        reason: String,
    },

    #[error("failed to apply {patch}: {source}")]
    Patch {
        patch: String,
        #[source]
        source: PatchError,
    },

    #[error(
        "boundary violation: {patch} from {writer_path} touches {offending_path} \
         inside embedded document {embedded_root}"
    )]
    BoundaryViolation {
        patch: String,
        offending_path: String,
        embedded_root: String,
        writer_path: String,
    },

    #[error("Loop detected at {hop}; trace: [{trace}]")]
    LoopDetected { hop: String, trace: String },

    #[error("step limit of {limit} tasks exceeded")]
    StepLimitExceeded { limit: usize },

    #[error(transparent)]
    Gas(#[from] GasError),

    #[error(transparent)]
    Evaluation(EvalError),

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error("channel adapter '{contract}' at {path} cannot change the document")]
    AdapterPatch { path: String, contract: String },

    #[error("unsupported workflow step type '{step_type}' in '{contract}'")]
    UnsupportedStep { contract: String, step_type: String },

    #[error("invalid workflow step in '{contract}': {reason}")]
    InvalidStep { contract: String, reason: String },

    #[error("contract '{contract}' failed: {reason}")]
    Processor { contract: String, reason: String },

    #[error("document is not initialized")]
    NotInitialized,

    #[error("document is already initialized")]
    AlreadyInitialized,
}

impl From<EvalError> for ProcessingError {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::Gas(gas) => ProcessingError::Gas(gas),
            other => ProcessingError::Evaluation(other),
        }
    }
}

impl ProcessingError {
    pub(crate) fn patch(patch: &document_model::NodePatch, source: PatchError) -> Self {
        ProcessingError::Patch {
            patch: patch.to_string(),
            source,
        }
    }
}

/// Result alias for processing operations
pub type ProcessorResult<T> = Result<T, ProcessingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_failures_stay_distinct() {
        let gas = GasError::BudgetExceeded {
            budget: 10,
            consumed: 8,
            requested: 5,
        };
        let err: ProcessingError = EvalError::Gas(gas.clone()).into();
        assert_eq!(err, ProcessingError::Gas(gas));

        let err: ProcessingError = EvalError::classify(false, "x.y", "nil").into();
        assert!(matches!(err, ProcessingError::Evaluation(_)));
    }

    #[test]
    fn test_loop_message() {
        let err = ProcessingError::LoopDetected {
            hop: "/#ping".to_string(),
            trace: "/#ping, /#pong".to_string(),
        };
        assert!(err.to_string().starts_with("Loop detected"));
    }
}
