use crate::functions::{register_context_functions, register_extension_functions};
use crate::parser::parse_rules;
use crate::{from_json, ScriptEngine, ScriptKind};
use ordo_rule::{Capabilities, Evaluator, PassEvaluator, Result, RuleError};
use ordo_types::{Params, Rule, RuleBinding};
use rhai::{Engine, Scope};
use tracing::{debug, warn};

/// Evaluator running rule conditions and actions as rhai scripts.
#[derive(Default)]
pub struct RhaiEvaluator {
    scripts: ScriptEngine,
}

impl RhaiEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_operations(max_operations: u64) -> Self {
        Self {
            scripts: ScriptEngine::with_max_operations(max_operations),
        }
    }

    pub fn scripts(&self) -> &ScriptEngine {
        &self.scripts
    }
}

impl Evaluator for RhaiEvaluator {
    fn parse(&self, source: &str) -> Result<Vec<RuleBinding>> {
        let bindings = parse_rules(source)?;

        // 提前编译，语法错误在加载时暴露
        for binding in &bindings {
            let rule = &binding.rule;
            for condition in &rule.conditions {
                self.scripts
                    .compile(ScriptKind::Condition, condition)
                    .map_err(|e| RuleError::Parse(format!("rule [{}] condition: {}", rule.name, e)))?;
            }
            for action in &rule.actions {
                self.scripts
                    .compile(ScriptKind::Action, action)
                    .map_err(|e| RuleError::Parse(format!("rule [{}] action: {}", rule.name, e)))?;
            }
        }

        Ok(bindings)
    }

    fn prepare<'a>(&'a self, capabilities: Capabilities) -> Result<Box<dyn PassEvaluator + 'a>> {
        let mut engine = self.scripts.create_engine();
        register_context_functions(&mut engine, capabilities.context());
        register_extension_functions(&mut engine, capabilities.functions());

        Ok(Box::new(RhaiPass {
            scripts: &self.scripts,
            engine,
        }))
    }

    fn release(&self, rule: &Rule) {
        for condition in &rule.conditions {
            self.scripts.release(ScriptKind::Condition, condition);
        }
        for action in &rule.actions {
            self.scripts.release(ScriptKind::Action, action);
        }
        debug!(rule_name = %rule.name, "Released compiled scripts");
    }
}

/// One pass worth of rhai engine, with the pass capabilities registered.
struct RhaiPass<'a> {
    scripts: &'a ScriptEngine,
    engine: Engine,
}

impl RhaiPass<'_> {
    fn scope(&self, params: &Params) -> Scope<'static> {
        let mut scope = Scope::new();
        for (key, value) in params {
            match from_json(value) {
                Ok(value) => {
                    scope.push_dynamic(key.clone(), value);
                }
                Err(e) => warn!(param = %key, error = %e, "Skipping unconvertible parameter"),
            }
        }
        scope
    }

    fn fault(rule: &Rule, e: impl std::fmt::Display) -> RuleError {
        RuleError::execution(&rule.name, e.to_string())
    }
}

impl PassEvaluator for RhaiPass<'_> {
    fn execute(&self, rule: &Rule, params: &Params) -> Result<bool> {
        let mut scope = self.scope(params);

        for condition in &rule.conditions {
            let ast = self
                .scripts
                .compile(ScriptKind::Condition, condition)
                .map_err(|e| Self::fault(rule, e))?;

            let value = self
                .engine
                .eval_ast_with_scope::<rhai::Dynamic>(&mut scope, &ast)
                .map_err(|e| Self::fault(rule, e))?;

            let holds = value.as_bool().map_err(|type_name| {
                Self::fault(rule, format!("condition evaluated to {}, not bool", type_name))
            })?;

            if !holds {
                debug!(rule_name = %rule.name, "Conditions not met");
                return Ok(false);
            }
        }

        for action in &rule.actions {
            let ast = self
                .scripts
                .compile(ScriptKind::Action, action)
                .map_err(|e| Self::fault(rule, e))?;

            self.engine
                .run_ast_with_scope(&mut scope, &ast)
                .map_err(|e| Self::fault(rule, e))?;
        }

        debug!(rule_name = %rule.name, "Rule fired");
        Ok(true)
    }
}
