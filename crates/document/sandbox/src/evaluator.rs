//! Evaluator interface
//!
//! An evaluator is a pure function from source text and a whitelisted set
//! of bindings to a JSON value. Implementations must bound time and memory
//! and must not expose ambient I/O.

use crate::{GasError, GasMeter, ModuleLoader};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Reads the JSON form of a document path, scoped to the calling node
pub type DocumentReader = Arc<dyn Fn(&str) -> Option<Value> + Send + Sync>;

/// Evaluation failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("failed to evaluate expression '{code}': {cause}")]
    Expression { code: String, cause: String },

    #[error("failed to evaluate code block: {cause}")]
    CodeBlock { code: String, cause: String },

    #[error(transparent)]
    Gas(#[from] GasError),
}

impl EvalError {
    /// Classify a failure by the kind of source that produced it
    pub fn classify(is_block: bool, code: &str, cause: impl Into<String>) -> Self {
        if is_block {
            EvalError::CodeBlock {
                code: code.to_string(),
                cause: cause.into(),
            }
        } else {
            EvalError::Expression {
                code: code.to_string(),
                cause: cause.into(),
            }
        }
    }

    /// Offending source, when the failure came from the script itself
    pub fn code(&self) -> Option<&str> {
        match self {
            EvalError::Expression { code, .. } | EvalError::CodeBlock { code, .. } => Some(code),
            EvalError::Gas(_) => None,
        }
    }
}

/// Resource bounds for one evaluation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalLimits {
    /// Run as a statement block rather than a single expression
    pub is_block: bool,
    pub timeout: Duration,
    pub memory_limit_bytes: usize,
    /// VM instructions between deadline polls
    pub poll_interval: u32,
}

impl Default for EvalLimits {
    fn default() -> Self {
        Self {
            is_block: false,
            timeout: Duration::from_millis(500),
            memory_limit_bytes: 32 * 1024 * 1024,
            poll_interval: 1_000,
        }
    }
}

impl EvalLimits {
    pub fn expression() -> Self {
        Self::default()
    }

    pub fn block() -> Self {
        Self {
            is_block: true,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit_bytes = bytes;
        self
    }
}

/// Values exposed to a script
#[derive(Clone, Default)]
pub struct Bindings {
    document: Option<DocumentReader>,
    event: Option<Value>,
    steps: Option<Value>,
    extra: BTreeMap<String, Value>,
    modules: Option<Arc<dyn ModuleLoader>>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, reader: DocumentReader) -> Self {
        self.document = Some(reader);
        self
    }

    pub fn with_event(mut self, event: Value) -> Self {
        self.event = Some(event);
        self
    }

    pub fn with_steps(mut self, steps: Value) -> Self {
        self.steps = Some(steps);
        self
    }

    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    /// Loader backing `import(...)`; not counted as a binding
    pub fn with_modules(mut self, modules: Arc<dyn ModuleLoader>) -> Self {
        self.modules = Some(modules);
        self
    }

    pub fn document(&self) -> Option<&DocumentReader> {
        self.document.as_ref()
    }

    pub fn modules(&self) -> Option<&Arc<dyn ModuleLoader>> {
        self.modules.as_ref()
    }

    /// Plain JSON bindings in exposure order
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.event
            .iter()
            .map(|v| ("event", v))
            .chain(self.steps.iter().map(|v| ("steps", v)))
            .chain(self.extra.iter().map(|(k, v)| (k.as_str(), v)))
    }

    pub fn binding_count(&self) -> usize {
        usize::from(self.document.is_some())
            + usize::from(self.event.is_some())
            + usize::from(self.steps.is_some())
            + self.extra.len()
    }
}

impl fmt::Debug for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bindings")
            .field("document", &self.document.is_some())
            .field("event", &self.event)
            .field("steps", &self.steps)
            .field("extra", &self.extra)
            .field("modules", &self.modules.is_some())
            .finish()
    }
}

/// Pluggable sandboxed evaluator
pub trait ScriptEvaluator: Send + Sync {
    /// Evaluate `source` and return its JSON result.
    ///
    /// Implementations charge `gas` before running and fail with
    /// [`EvalError::Gas`] as soon as the budget is exhausted.
    fn evaluate(
        &self,
        source: &str,
        bindings: &Bindings,
        limits: &EvalLimits,
        gas: &mut GasMeter,
    ) -> Result<Value, EvalError>;
}
