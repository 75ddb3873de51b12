use crate::context::ContextHandle;
use crate::error::{Result, RuleError};
use ordo_types::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Names of the four context capabilities every pass provides.
pub const BUILTIN_FUNCTIONS: [&str; 4] = ["set_variable", "get_variable", "get_context", "exclude"];

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_FUNCTIONS.contains(&name)
}

type Handler = dyn Fn(&[Value]) -> Result<Value> + Send + Sync;

/// 扩展函数
///
/// A named callable made available to rule conditions and actions in
/// addition to the built-in context capabilities.
#[derive(Clone)]
pub struct Function {
    name: String,
    arity: usize,
    handler: Arc<Handler>,
}

impl Function {
    pub fn new<F>(name: impl Into<String>, arity: usize, handler: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            arity,
            handler: Arc::new(handler),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn call(&self, args: &[Value]) -> Result<Value> {
        if args.len() != self.arity {
            return Err(RuleError::Function(format!(
                "{} expects {} argument(s), got {}",
                self.name,
                self.arity,
                args.len()
            )));
        }
        (self.handler)(args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// 扩展函数注册表
///
/// Registering a name twice replaces the earlier entry.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, Function>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, function: Function) -> Option<Function> {
        self.functions.insert(function.name.clone(), function)
    }

    pub fn get(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// 单轮能力集合
///
/// Built fresh for each pass: the typed context capabilities plus the
/// registered extension functions. Nothing here outlives the pass.
#[derive(Debug, Clone)]
pub struct Capabilities {
    context: ContextHandle,
    functions: FunctionRegistry,
}

impl Capabilities {
    pub fn new(context: ContextHandle, functions: FunctionRegistry) -> Self {
        Self { context, functions }
    }

    pub fn context(&self) -> &ContextHandle {
        &self.context
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Calls a capability by name with JSON arguments.
    ///
    /// Built-ins resolve first. `get_context` returns a snapshot here;
    /// evaluators wanting live access go through [`Capabilities::context`].
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        match (name, args) {
            ("set_variable", [key, value]) => {
                self.context.set_variable(key_of(key)?, value.clone());
                Ok(Value::Null)
            }
            ("get_variable", [key]) => Ok(self
                .context
                .get_variable(&key_of(key)?)
                .unwrap_or(Value::Null)),
            ("get_context", []) => Ok(Value::Object(
                self.context.variables().into_iter().collect(),
            )),
            ("exclude", [event]) => {
                self.context.exclude(key_of(event)?);
                Ok(Value::Null)
            }
            _ if is_builtin(name) => Err(RuleError::Function(format!(
                "wrong number of arguments for {}: {}",
                name,
                args.len()
            ))),
            _ => match self.functions.get(name) {
                Some(function) => function.call(args),
                None => Err(RuleError::Function(format!("unknown function: {}", name))),
            },
        }
    }
}

fn key_of(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(RuleError::Function(format!(
            "expected a string argument, got {}",
            other
        ))),
    }
}
