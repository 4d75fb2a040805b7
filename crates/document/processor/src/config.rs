//! Processor configuration

use document_sandbox::{EvalLimits, GasSchedule};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for one [`crate::DocumentProcessor`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Tasks executed per call before the drain gives up
    pub max_steps: usize,
    /// How deep adapters may re-emit into other adapters within one route
    pub max_inline_adapter_depth: usize,
    /// Wall-clock limit for a single evaluation
    pub eval_timeout_ms: u64,
    pub eval_memory_limit_bytes: usize,
    /// Processor priority of the checkpoint handler; sorts after every
    /// other processor on the same channel event
    pub checkpoint_priority: i64,
    pub gas: GasSchedule,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_steps: 10_000,
            max_inline_adapter_depth: 64,
            eval_timeout_ms: 500,
            eval_memory_limit_bytes: 32 * 1024 * 1024,
            checkpoint_priority: 9_999,
            gas: GasSchedule::default(),
        }
    }
}

impl ProcessorConfig {
    /// Parse a (possibly partial) JSON config; missing fields keep defaults
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Limits for an expression (`is_block = false`) or a code block
    pub fn eval_limits(&self, is_block: bool) -> EvalLimits {
        let base = if is_block {
            EvalLimits::block()
        } else {
            EvalLimits::expression()
        };
        base.with_timeout(Duration::from_millis(self.eval_timeout_ms))
            .with_memory_limit(self.eval_memory_limit_bytes)
    }
}
