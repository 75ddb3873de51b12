use crate::{from_json, to_json};
use ordo_rule::{ContextHandle, Function, FunctionRegistry};
use rhai::{Array, Dynamic, Engine, EvalAltResult};
use tracing::warn;

/// 注册逻辑函数
///
/// `AND([a, b, ...])` is true when every element is boolean `true`. Calls
/// written as `AND(a, b, ...)` are lowered to the array form before compiling,
/// and every argument is evaluated, so it also sequences actions.
pub fn register_logic_functions(engine: &mut Engine) {
    engine.register_fn("AND", |args: Array| {
        args.iter().all(|a| a.as_bool().unwrap_or(false))
    });
}

/// Live view of the pass variables handed out by `get_context()`.
///
/// Index writes go straight to the pass context, so later reads in the same
/// pass (from any rule) see them.
#[derive(Debug, Clone)]
pub struct ContextMap {
    context: ContextHandle,
}

impl ContextMap {
    pub fn new(context: ContextHandle) -> Self {
        Self { context }
    }
}

/// 注册上下文函数
pub fn register_context_functions(engine: &mut Engine, context: &ContextHandle) {
    engine.register_type_with_name::<ContextMap>("ContextMap");

    // set_variable(key, value)
    let ctx = context.clone();
    engine.register_fn(
        "set_variable",
        move |key: &str, value: Dynamic| -> Result<(), Box<EvalAltResult>> {
            ctx.set_variable(key, to_json(&value)?);
            Ok(())
        },
    );

    // get_variable(key)
    let ctx = context.clone();
    engine.register_fn(
        "get_variable",
        move |key: &str| -> Result<Dynamic, Box<EvalAltResult>> {
            match ctx.get_variable(key) {
                Some(value) => from_json(&value),
                None => Ok(Dynamic::UNIT),
            }
        },
    );

    // get_context()
    let ctx = context.clone();
    engine.register_fn("get_context", move || ContextMap::new(ctx.clone()));

    // exclude(event_or_name)
    let ctx = context.clone();
    engine.register_fn("exclude", move |event: &str| {
        ctx.exclude(event);
    });

    engine.register_indexer_get(|map: &mut ContextMap, key: &str| -> Dynamic {
        match map.context.get_variable(key) {
            Some(value) => from_json(&value).unwrap_or_else(|e| {
                warn!(key = %key, error = %e, "Unconvertible context value");
                Dynamic::UNIT
            }),
            None => Dynamic::UNIT,
        }
    });

    engine.register_indexer_set(|map: &mut ContextMap, key: &str, value: Dynamic| {
        match to_json(&value) {
            Ok(value) => map.context.set_variable(key, value),
            Err(e) => warn!(key = %key, error = %e, "Unconvertible context value"),
        }
    });

    engine.register_fn("keys", |map: &mut ContextMap| -> Array {
        let mut keys: Vec<String> = map.context.with_context(|vars| vars.keys().cloned().collect());
        keys.sort();
        keys.into_iter().map(Dynamic::from).collect()
    });

    engine.register_fn("len", |map: &mut ContextMap| -> i64 {
        map.context.with_context(|vars| vars.len() as i64)
    });

    engine.register_fn("contains", |map: &mut ContextMap, key: &str| -> bool {
        map.context.get_variable(key).is_some()
    });

    engine.register_fn("remove", |map: &mut ContextMap, key: &str| -> Dynamic {
        map.context
            .with_context(|vars| vars.remove(key))
            .and_then(|value| from_json(&value).ok())
            .unwrap_or(Dynamic::UNIT)
    });
}

/// 注册扩展函数
///
/// Arities 0 to 4 are supported; anything wider is skipped with a warning.
pub fn register_extension_functions(engine: &mut Engine, functions: &FunctionRegistry) {
    for function in functions.iter() {
        let name = function.name().to_string();
        let f = function.clone();

        match function.arity() {
            0 => {
                engine.register_fn(name, move || call(&f, &[]));
            }
            1 => {
                engine.register_fn(name, move |a: Dynamic| call(&f, &[a]));
            }
            2 => {
                engine.register_fn(name, move |a: Dynamic, b: Dynamic| call(&f, &[a, b]));
            }
            3 => {
                engine.register_fn(name, move |a: Dynamic, b: Dynamic, c: Dynamic| {
                    call(&f, &[a, b, c])
                });
            }
            4 => {
                engine.register_fn(
                    name,
                    move |a: Dynamic, b: Dynamic, c: Dynamic, d: Dynamic| call(&f, &[a, b, c, d]),
                );
            }
            arity => {
                warn!(function = %name, arity, "Unsupported function arity, skipped");
            }
        }
    }
}

fn call(function: &Function, args: &[Dynamic]) -> Result<Dynamic, Box<EvalAltResult>> {
    let args = args
        .iter()
        .map(to_json)
        .collect::<Result<Vec<_>, _>>()?;

    let value = function
        .call(&args)
        .map_err(|e| -> Box<EvalAltResult> { e.to_string().into() })?;

    from_json(&value)
}
