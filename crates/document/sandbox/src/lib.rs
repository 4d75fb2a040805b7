//! Sandboxed evaluation for document workflows
//!
//! Workflow steps run short, side-effect-free expressions and code blocks.
//! This crate provides:
//!
//! - [`GasMeter`] / [`GasSchedule`]: cost accounting against an optional budget
//! - [`ScriptEvaluator`]: the pluggable evaluator interface
//! - [`LuaEvaluator`]: a Lua 5.4 sandbox with a wall-clock deadline, a memory
//!   ceiling and a whitelist-only environment
//! - [`expression`]: `${...}` marker helpers shared by workflow steps
//! - [`ModuleLoader`]: host interface for scripts that import other sources
//!
//! # Example
//!
//! ```rust
//! use document_sandbox::{Bindings, EvalLimits, GasMeter, LuaEvaluator, ScriptEvaluator};
//! use serde_json::json;
//!
//! let evaluator = LuaEvaluator::default();
//! let mut gas = GasMeter::unlimited();
//! let bindings = Bindings::new().with_event(json!({ "amount": 20 }));
//!
//! let total = evaluator
//!     .evaluate("event.amount * 2", &bindings, &EvalLimits::expression(), &mut gas)
//!     .unwrap();
//! assert_eq!(total, json!(40));
//! assert!(gas.consumed() > 0);
//! ```

#![deny(unsafe_code)]

pub mod evaluator;
pub mod expression;
pub mod gas;
pub mod lua;
pub mod module;

pub use evaluator::{Bindings, DocumentReader, EvalError, EvalLimits, ScriptEvaluator};
pub use gas::{GasError, GasMeter, GasSchedule};
pub use lua::LuaEvaluator;
pub use module::{ModuleError, ModuleLoader, NoModules, StaticModules};
