//! Lua-backed sandbox
//!
//! Each evaluation gets a fresh interpreter with only the `math`, `string`,
//! `table` and `utf8` libraries loaded. Scripts run against a whitelist-only
//! environment table, so base functions like `load`, `dofile`, `print` and
//! `collectgarbage` are unreachable, as are `math.random` and
//! `math.randomseed`.
//!
//! The wall-clock deadline is enforced by an instruction-count hook that
//! polls [`Instant`]; scripts cannot yield their way past it. Memory is
//! capped with `Lua::set_memory_limit`.

use crate::evaluator::{Bindings, EvalError, EvalLimits, ScriptEvaluator};
use crate::module::{self, ModuleLoader, NoModules};
use crate::{GasError, GasMeter, GasSchedule};
use mlua::{
    DeserializeOptions, HookTriggers, Lua, LuaOptions, LuaSerdeExt, Result as LuaResult,
    SerializeOptions, StdLib, Table, Value as LuaValue, VmState,
};
use serde_json::Value;
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Globals copied into the sandbox environment
const SAFE_GLOBALS: &[&str] = &[
    "assert",
    "error",
    "ipairs",
    "next",
    "pairs",
    "pcall",
    "rawequal",
    "rawget",
    "rawlen",
    "select",
    "tonumber",
    "tostring",
    "type",
    "xpcall",
    "string",
    "table",
    "utf8",
];

const REMOVED_MATH: &[&str] = &["random", "randomseed"];

/// Sandboxed Lua evaluator
#[derive(Clone, Debug, Default)]
pub struct LuaEvaluator {
    schedule: GasSchedule,
}

impl LuaEvaluator {
    pub fn new(schedule: GasSchedule) -> Self {
        Self { schedule }
    }

    pub fn schedule(&self) -> &GasSchedule {
        &self.schedule
    }

    fn sandbox_env(&self, lua: &Lua) -> LuaResult<Table> {
        let globals = lua.globals();
        let env = lua.create_table()?;
        for name in SAFE_GLOBALS {
            env.set(*name, globals.get::<LuaValue>(*name)?)?;
        }
        let math = lua.create_table()?;
        let stock_math: Table = globals.get("math")?;
        for pair in stock_math.pairs::<String, LuaValue>() {
            let (key, value) = pair?;
            if !REMOVED_MATH.contains(&key.as_str()) {
                math.set(key, value)?;
            }
        }
        env.set("math", math)?;
        Ok(env)
    }
}

fn to_lua_options() -> SerializeOptions {
    SerializeOptions::new()
        .serialize_none_to_null(false)
        .serialize_unit_to_null(false)
}

fn from_lua_options() -> DeserializeOptions {
    DeserializeOptions::new().deny_unsupported_types(false)
}

impl ScriptEvaluator for LuaEvaluator {
    fn evaluate(
        &self,
        source: &str,
        bindings: &Bindings,
        limits: &EvalLimits,
        gas: &mut GasMeter,
    ) -> Result<Value, EvalError> {
        gas.charge(
            self.schedule
                .evaluation_cost(source.len(), bindings.binding_count()),
        )?;

        let fail = |cause: String| EvalError::classify(limits.is_block, source, cause);

        let lua = Lua::new_with(
            StdLib::MATH | StdLib::STRING | StdLib::TABLE | StdLib::UTF8,
            LuaOptions::default(),
        )
        .map_err(|e| fail(e.to_string()))?;
        lua.set_memory_limit(limits.memory_limit_bytes)
            .map_err(|e| fail(e.to_string()))?;

        let deadline = Instant::now() + limits.timeout;
        let timed_out = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&timed_out);
        lua.set_hook(
            HookTriggers::new().every_nth_instruction(limits.poll_interval.max(1)),
            move |_lua, _debug| {
                if Instant::now() >= deadline {
                    flag.store(true, Ordering::Relaxed);
                    return Err(mlua::Error::RuntimeError(
                        "evaluation deadline exceeded".to_string(),
                    ));
                }
                Ok(VmState::Continue)
            },
        );

        let chunk_source = if limits.is_block {
            source.to_string()
        } else {
            format!("return ({})", source)
        };

        // Set by the import callback so gas failures are not reported as
        // ordinary script errors.
        let gas_failure: RefCell<Option<GasError>> = RefCell::new(None);
        let module_cost = self.schedule.module_resolution;
        let loader: Arc<dyn ModuleLoader> = bindings
            .modules()
            .cloned()
            .unwrap_or_else(|| Arc::new(NoModules));

        let outcome = lua.scope(|scope| {
            let env = self.sandbox_env(&lua)?;

            if let Some(reader) = bindings.document() {
                let reader = Arc::clone(reader);
                let document = scope.create_function(move |lua, pointer: String| {
                    let value = reader(&pointer).unwrap_or(Value::Null);
                    lua.to_value_with(&value, to_lua_options())
                })?;
                env.set("document", document)?;
            }
            for (name, value) in bindings.values() {
                env.set(name, lua.to_value_with(value, to_lua_options())?)?;
            }

            let import_env = env.clone();
            let gas = &mut *gas;
            let gas_failure = &gas_failure;
            let loader = &loader;
            let import = scope.create_function_mut(move |lua, specifier: String| {
                if let Err(err) = gas.charge(module_cost) {
                    let message = err.to_string();
                    *gas_failure.borrow_mut() = Some(err);
                    return Err(mlua::Error::RuntimeError(message));
                }
                let text = module::resolve(loader.as_ref(), &specifier)
                    .map_err(|e| mlua::Error::RuntimeError(e.to_string()))?;
                lua.load(text.as_str())
                    .set_name(format!("={}", specifier))
                    .set_environment(import_env.clone())
                    .eval::<LuaValue>()
            })?;
            env.set("import", import)?;

            let result: LuaValue = lua
                .load(chunk_source.as_str())
                .set_name("=sandbox")
                .set_environment(env)
                .eval()?;
            lua.from_value_with::<Value>(result, from_lua_options())
        });

        lua.remove_hook();

        if let Some(err) = gas_failure.into_inner() {
            return Err(EvalError::Gas(err));
        }
        match outcome {
            Ok(value) => {
                debug!(
                    is_block = limits.is_block,
                    source_len = source.len(),
                    consumed = gas.consumed(),
                    "Script evaluated"
                );
                Ok(normalize_numbers(value))
            }
            Err(_) if timed_out.load(Ordering::Relaxed) => {
                warn!(
                    timeout_ms = limits.timeout.as_millis() as u64,
                    "Script evaluation timed out"
                );
                Err(fail(format!(
                    "timed out after {}ms",
                    limits.timeout.as_millis()
                )))
            }
            Err(e) => Err(fail(e.to_string())),
        }
    }
}

/// Collapse whole-valued floats into integers (`2.0` becomes `2`)
pub fn normalize_numbers(value: Value) -> Value {
    match value {
        Value::Number(n) if n.is_f64() => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Value::from(f as i64),
            _ => Value::Number(n),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_numbers).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, normalize_numbers(v)))
                .collect(),
        ),
        other => other,
    }
}
