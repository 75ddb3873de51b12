use rhai::{Dynamic, Engine, AST};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

pub mod evaluator;
pub mod functions;
pub mod parser;

pub use evaluator::RhaiEvaluator;
pub use functions::ContextMap;
pub use parser::{lower_and, normalize_condition, parse_rules};

/// Default cap on operations per script run.
pub const DEFAULT_MAX_OPERATIONS: u64 = 100_000;

/// Whether a cached AST came from a condition or an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    Condition,
    Action,
}

pub struct ScriptEngine {
    engine: Engine,
    max_operations: u64,
    // Cache compiled scripts: (kind, source) -> AST
    script_cache: RwLock<HashMap<(ScriptKind, String), Arc<AST>>>,
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptEngine {
    pub fn new() -> Self {
        Self::with_max_operations(DEFAULT_MAX_OPERATIONS)
    }

    pub fn with_max_operations(max_operations: u64) -> Self {
        Self {
            engine: build_engine(max_operations),
            max_operations,
            script_cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn max_operations(&self) -> u64 {
        self.max_operations
    }

    /// A fresh engine with the same limits and base functions, ready to take
    /// per-pass registrations.
    pub fn create_engine(&self) -> Engine {
        build_engine(self.max_operations)
    }

    /// Compiles (or fetches from cache) a condition or action fragment.
    ///
    /// `AND(...)` calls are lowered to the array form, and conditions are
    /// normalized so a lone `=` compares.
    pub fn compile(&self, kind: ScriptKind, source: &str) -> Result<Arc<AST>, Box<rhai::ParseError>> {
        let key = (kind, source.to_string());

        if let Some(ast) = self
            .script_cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(ast.clone());
        }

        let lowered = lower_and(source);
        let ast = match kind {
            ScriptKind::Condition => self.engine.compile_expression(normalize_condition(&lowered)),
            ScriptKind::Action => self.engine.compile(lowered),
        }
        .map_err(Box::new)?;

        let ast = Arc::new(ast);
        self.script_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, ast.clone());
        Ok(ast)
    }

    pub fn cached_scripts(&self) -> usize {
        self.script_cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Drops one cached script; the next `compile` rebuilds it.
    pub fn release(&self, kind: ScriptKind, source: &str) {
        self.script_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(kind, source.to_string()));
    }

    pub fn clear_cache(&self) {
        self.script_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

fn build_engine(max_operations: u64) -> Engine {
    let mut engine = Engine::new();

    // Safety: Limit max operations
    engine.set_max_operations(max_operations);

    engine.register_fn("now_ms", || chrono::Utc::now().timestamp_millis());

    functions::register_logic_functions(&mut engine);

    // Redirect print() and debug() to tracing
    engine.on_print(|x| {
        tracing::info!("SCRIPT: {}", x);
    });
    engine.on_debug(|x, src, pos| {
        tracing::debug!(source = ?src, position = %pos, "SCRIPT: {}", x);
    });

    engine
}

/// Converts a rhai value to JSON; `()` becomes `null`.
pub fn to_json(value: &Dynamic) -> Result<serde_json::Value, Box<rhai::EvalAltResult>> {
    rhai::serde::from_dynamic(value)
}

/// Converts a JSON value to a rhai value.
pub fn from_json(value: &serde_json::Value) -> Result<Dynamic, Box<rhai::EvalAltResult>> {
    rhai::serde::to_dynamic(value)
}
