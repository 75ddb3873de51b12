use crate::cancel::CancelFlag;
use crate::combinator::combine;
use crate::context::ContextHandle;
use crate::error::{Result, RuleError};
use crate::evaluator::{Evaluator, PassEvaluator};
use crate::execution::{PassReport, RuleOutcome, RuleStatus};
use crate::functions::{is_builtin, Capabilities, Function, FunctionRegistry};
use crate::loader::RuleLoader;
use crate::repository::RuleRepository;
use chrono::Utc;
use ordo_types::{Params, Rule, RuleBinding, RuleDefinition, Variables};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// 规则引擎
///
/// Mutating methods take `&mut self` and `process` takes `&self`, so a pass
/// can never overlap with a change to the rule set.
pub struct RuleEngine<E> {
    /// 规则解析与执行
    evaluator: E,

    /// 按优先级排序的规则
    repository: RuleRepository,

    /// 扩展函数
    functions: FunctionRegistry,

    /// 目录加载器
    loader: RuleLoader,
}

impl<E: Evaluator> RuleEngine<E> {
    pub fn new(evaluator: E) -> Self {
        Self {
            evaluator,
            repository: RuleRepository::new(),
            functions: FunctionRegistry::new(),
            loader: RuleLoader::new(),
        }
    }

    pub fn with_loader(mut self, loader: RuleLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    pub fn repository(&self) -> &RuleRepository {
        &self.repository
    }

    /// 添加规则
    ///
    /// Fragment lists are combined into one `AND(...)` expression; a rule with
    /// the same name is replaced.
    pub fn add_rule(&mut self, definition: RuleDefinition) {
        let mut rule = Rule::new(definition.name);

        if let Some(conditions) = combine(definition.conditions) {
            rule.conditions.push(conditions);
        }
        if let Some(actions) = combine(definition.actions) {
            rule.actions.push(actions);
        }

        self.add_binding(RuleBinding::new(rule, definition.priority));
    }

    /// 批量添加规则，按给定顺序
    pub fn add_rules(&mut self, definitions: impl IntoIterator<Item = RuleDefinition>) {
        for definition in definitions {
            self.add_rule(definition);
        }
    }

    /// Stores an already built binding.
    pub fn add_binding(&mut self, binding: RuleBinding) -> Option<RuleBinding> {
        let name = binding.name().to_string();
        let replaced = self.repository.upsert(binding);
        if let Some(old) = &replaced {
            self.evaluator.release(&old.rule);
            debug!(rule_name = %name, "Rule replaced");
        }
        replaced
    }

    /// 从文本添加规则
    ///
    /// Returns how many rules the text contained.
    pub fn add_rule_from_string(&mut self, source: &str) -> Result<usize> {
        let bindings = self.evaluator.parse(source)?;
        let count = bindings.len();

        for binding in bindings {
            self.add_binding(binding);
        }

        Ok(count)
    }

    /// 从目录加载规则
    ///
    /// Stops at the first read or parse error; rules from files visited
    /// before it stay registered.
    pub fn load_rules_from_folder(&mut self, root: impl AsRef<Path>) -> Result<usize> {
        let root = root.as_ref();
        let loader = self.loader.clone();
        let mut count = 0;

        for file in loader.files(root) {
            let file = file?;
            let added = self.add_rule_from_string(&file.text)?;
            debug!(path = %file.path.display(), rules = added, "Rule file loaded");
            count += added;
        }

        info!(root = %root.display(), rules = count, "Rules loaded");
        Ok(count)
    }

    /// 删除规则
    pub fn remove_rule(&mut self, name: &str) -> Option<RuleBinding> {
        let removed = self.repository.remove(name);
        if let Some(old) = &removed {
            self.evaluator.release(&old.rule);
            info!(rule_name = %name, "Rule removed");
        }
        removed
    }

    pub fn get_rule(&self, name: &str) -> Option<&RuleBinding> {
        self.repository.find(name)
    }

    /// 按执行顺序列出规则
    pub fn rules(&self) -> impl Iterator<Item = &RuleBinding> {
        self.repository.iter()
    }

    /// 注册扩展函数
    ///
    /// Built-in names are reserved. Registering an existing name replaces it.
    pub fn register_function(&mut self, function: Function) -> Result<()> {
        if is_builtin(function.name()) {
            return Err(RuleError::ReservedFunction(function.name().to_string()));
        }
        debug!(function = %function.name(), arity = function.arity(), "Function registered");
        self.functions.register(function);
        Ok(())
    }

    /// 执行一轮，返回最终变量
    ///
    /// Faults raised by individual rules are logged and never surfaced here.
    pub fn process(&self, params: &Params) -> Variables {
        self.process_with(params, None).variables
    }

    /// 执行一轮并返回执行记录
    ///
    /// Rules run in priority order. Before each rule the exclusion list as it
    /// stands at that moment is consulted, so an action can suppress any rule
    /// not yet reached but never one that already ran.
    pub fn process_with(&self, params: &Params, cancel: Option<&CancelFlag>) -> PassReport {
        let id = Uuid::new_v4();
        let started_at = Utc::now();
        let context = ContextHandle::new();
        let capabilities = Capabilities::new(context.clone(), self.functions.clone());

        let mut outcomes = Vec::with_capacity(self.repository.len());

        match self.evaluator.prepare(capabilities) {
            Ok(pass) => {
                self.run_pass(pass.as_ref(), &context, params, cancel, &mut outcomes);
            }
            Err(e) => {
                error!(pass_id = %id, error = %e, "Failed to prepare evaluator");
                outcomes.extend(self.repository.iter().map(|b| RuleOutcome {
                    rule: b.name().to_string(),
                    status: RuleStatus::Failed(e.to_string()),
                }));
            }
        }

        PassReport {
            id,
            started_at,
            finished_at: Utc::now(),
            variables: context.take_variables(),
            outcomes,
        }
    }

    fn run_pass(
        &self,
        pass: &dyn PassEvaluator,
        context: &ContextHandle,
        params: &Params,
        cancel: Option<&CancelFlag>,
        outcomes: &mut Vec<RuleOutcome>,
    ) {
        for binding in self.repository.iter() {
            let rule = &binding.rule;

            if cancel.is_some_and(CancelFlag::is_cancelled) {
                warn!(rule_name = %rule.name, "Pass cancelled");
                outcomes.push(RuleOutcome {
                    rule: rule.name.clone(),
                    status: RuleStatus::Cancelled,
                });
                continue;
            }

            debug!(exclusions = ?context.exclusions(), "Current exclusions");

            let status = if context.is_suppressed(rule) {
                info!(rule_name = %rule.name, "Rule is excluded");
                RuleStatus::Excluded
            } else {
                match execute_isolated(pass, rule, params) {
                    Ok(true) => RuleStatus::Fired,
                    Ok(false) => RuleStatus::NotMatched,
                    Err(e) => {
                        error!(rule_name = %rule.name, error = %e, "Rule execution failed");
                        RuleStatus::Failed(e.to_string())
                    }
                }
            };

            outcomes.push(RuleOutcome {
                rule: rule.name.clone(),
                status,
            });
        }
    }
}

/// Runs one rule, turning a panic into that rule's fault.
fn execute_isolated(pass: &dyn PassEvaluator, rule: &Rule, params: &Params) -> Result<bool> {
    match catch_unwind(AssertUnwindSafe(|| pass.execute(rule, params))) {
        Ok(result) => result,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic".to_string());
            Err(RuleError::execution(&rule.name, message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordo_types::RuleSource;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// Test evaluator: conditions are `true`/`false`/`fail`, actions are
    /// `;`-separated `set:key=json`, `exclude:x`, `fail`, `panic`, `copy:to=from+1`.
    struct StubEvaluator {
        trace: Arc<Mutex<Vec<String>>>,
        released: Mutex<Vec<String>>,
    }

    impl StubEvaluator {
        fn new() -> (Self, Arc<Mutex<Vec<String>>>) {
            let trace = Arc::new(Mutex::new(Vec::new()));
            let evaluator = Self {
                trace: trace.clone(),
                released: Mutex::new(Vec::new()),
            };
            (evaluator, trace)
        }
    }

    struct StubPass<'a> {
        caps: Capabilities,
        trace: &'a Mutex<Vec<String>>,
    }

    impl Evaluator for StubEvaluator {
        fn parse(&self, source: &str) -> Result<Vec<RuleBinding>> {
            // name|priority|condition|action per line
            source
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(|line| {
                    let parts: Vec<_> = line.split('|').collect();
                    if parts.len() != 4 {
                        return Err(RuleError::Parse(line.to_string()));
                    }
                    let priority = parts[1]
                        .parse()
                        .map_err(|_| RuleError::Parse(line.to_string()))?;
                    Ok(RuleBinding::new(
                        Rule::new(parts[0]).with_condition(parts[2]).with_action(parts[3]),
                        priority,
                    ))
                })
                .collect()
        }

        fn prepare<'a>(&'a self, capabilities: Capabilities) -> Result<Box<dyn PassEvaluator + 'a>> {
            Ok(Box::new(StubPass {
                caps: capabilities,
                trace: &self.trace,
            }))
        }

        fn release(&self, rule: &Rule) {
            self.released.lock().unwrap().push(rule.actions.join(";"));
        }
    }

    impl PassEvaluator for StubPass<'_> {
        fn execute(&self, rule: &Rule, _params: &Params) -> Result<bool> {
            self.trace.lock().unwrap().push(rule.name.clone());

            for cond in &rule.conditions {
                match cond.as_str() {
                    "false" => return Ok(false),
                    "fail" => return Err(RuleError::execution(&rule.name, "condition failed")),
                    _ => {}
                }
            }

            for action in rule.actions.iter().flat_map(|a| a.split(';')) {
                let action = action.trim();
                if let Some(rest) = action.strip_prefix("set:") {
                    let (key, value) = rest.split_once('=').unwrap();
                    let value: serde_json::Value = serde_json::from_str(value).unwrap();
                    self.caps.call("set_variable", &[json!(key), value])?;
                } else if let Some(rest) = action.strip_prefix("copy:") {
                    let (to, from) = rest.split_once('=').unwrap();
                    let from = from.trim_end_matches("+1");
                    let current = self.caps.call("get_variable", &[json!(from)])?;
                    let next = current.as_i64().unwrap_or_default() + 1;
                    self.caps.context().set_variable(to, json!(next));
                } else if let Some(rest) = action.strip_prefix("exclude:") {
                    self.caps.call("exclude", &[json!(rest)])?;
                } else if action == "fail" {
                    return Err(RuleError::execution(&rule.name, "action failed"));
                } else if action == "panic" {
                    panic!("rule body panicked");
                } else if !action.is_empty() && action != "AND()" {
                    self.caps.call(action, &[])?;
                }
            }
            Ok(true)
        }
    }

    fn def(name: &str, priority: i64, action: &str) -> RuleDefinition {
        RuleDefinition::new(name, "true", action).with_priority(priority)
    }

    #[test]
    fn test_execution_follows_priority() {
        let (evaluator, trace) = StubEvaluator::new();
        let mut engine = RuleEngine::new(evaluator);
        engine.add_rules(vec![def("A", 10, ""), def("B", 20, ""), def("C", 5, "")]);

        engine.process(&Params::new());
        assert_eq!(*trace.lock().unwrap(), vec!["C", "A", "B"]);
    }

    #[test]
    fn test_earlier_side_effects_visible_later() {
        let (evaluator, _) = StubEvaluator::new();
        let mut engine = RuleEngine::new(evaluator);
        engine.add_rule(def("B", 2, "copy:y=x+1"));
        engine.add_rule(def("A", 1, "set:x=1"));

        let vars = engine.process(&Params::new());
        assert_eq!(vars.get("x"), Some(&json!(1)));
        assert_eq!(vars.get("y"), Some(&json!(2)));
    }

    #[test]
    fn test_add_rule_upserts() {
        let (evaluator, _) = StubEvaluator::new();
        let mut engine = RuleEngine::new(evaluator);
        engine.add_rule(def("r", 1, "set:v=\"old\""));
        engine.add_rule(def("r", 7, "set:v=\"new\""));

        assert_eq!(engine.rules().count(), 1);
        let binding = engine.get_rule("r").unwrap();
        assert_eq!(binding.priority, 7);
        assert_eq!(binding.rule.actions, vec!["set:v=\"new\"".to_string()]);

        let vars = engine.process(&Params::new());
        assert_eq!(vars.get("v"), Some(&json!("new")));
    }

    #[test]
    fn test_fragments_are_combined() {
        let (evaluator, _) = StubEvaluator::new();
        let mut engine = RuleEngine::new(evaluator);
        engine.add_rule(RuleDefinition::new(
            "r",
            vec!["a", "b"],
            RuleSource::Fragments(Vec::new()),
        ));

        let rule = &engine.get_rule("r").unwrap().rule;
        assert_eq!(rule.conditions, vec!["AND(a,\nb)".to_string()]);
        assert!(rule.actions.is_empty());
    }

    #[test]
    fn test_name_exclusion_only_affects_later_rules() {
        let (evaluator, trace) = StubEvaluator::new();
        let mut engine = RuleEngine::new(evaluator);
        engine.add_rules(vec![
            def("early", 1, "set:early=true"),
            def("A", 2, "exclude:early;exclude:B"),
            def("B", 3, "set:b=true"),
        ]);

        let report = engine.process_with(&Params::new(), None);
        assert_eq!(*trace.lock().unwrap(), vec!["early", "A"]);
        assert_eq!(report.variables.get("early"), Some(&json!(true)));
        assert_eq!(report.variables.get("b"), None);
        assert_eq!(report.status_of("B"), Some(&RuleStatus::Excluded));
        assert_eq!(report.status_of("early"), Some(&RuleStatus::Fired));
    }

    #[test]
    fn test_event_exclusion() {
        let (evaluator, _) = StubEvaluator::new();
        let mut engine = RuleEngine::new(evaluator);
        engine.add_rule(def("A", 1, "exclude:checkout"));
        engine.add_rule(
            RuleDefinition::new("B", r#"event="checkout""#, "set:b=1").with_priority(2),
        );
        engine.add_rule(RuleDefinition::new("C", r#"event="other""#, "set:c=1").with_priority(3));

        let report = engine.process_with(&Params::new(), None);
        assert_eq!(report.status_of("B"), Some(&RuleStatus::Excluded));
        assert_eq!(report.variables.get("b"), None);
        assert_eq!(report.variables.get("c"), Some(&json!(1)));
    }

    #[test]
    fn test_faults_are_isolated() {
        let (evaluator, _) = StubEvaluator::new();
        let mut engine = RuleEngine::new(evaluator);
        engine.add_rule(def("bad", 1, "set:partial=1;fail"));
        engine.add_rule(def("boom", 2, "panic"));
        engine.add_rule(RuleDefinition::new("badcond", "fail", "set:z=1").with_priority(3));
        engine.add_rule(def("good", 4, "set:y=2"));

        let report = engine.process_with(&Params::new(), None);
        assert_eq!(report.variables.get("y"), Some(&json!(2)));
        assert_eq!(report.variables.get("partial"), Some(&json!(1)));
        assert_eq!(report.failures().count(), 3);
        assert_eq!(report.fired(), vec!["good"]);

        let vars = engine.process(&Params::new());
        assert_eq!(vars.get("y"), Some(&json!(2)));
    }

    #[test]
    fn test_not_matched() {
        let (evaluator, _) = StubEvaluator::new();
        let mut engine = RuleEngine::new(evaluator);
        engine.add_rule(RuleDefinition::new("r", "false", "set:x=1"));

        let report = engine.process_with(&Params::new(), None);
        assert_eq!(report.status_of("r"), Some(&RuleStatus::NotMatched));
        assert!(report.variables.is_empty());
    }

    #[test]
    fn test_fresh_context_per_pass() {
        let (evaluator, trace) = StubEvaluator::new();
        let mut engine = RuleEngine::new(evaluator);
        engine.add_rule(def("A", 1, "exclude:B"));
        engine.add_rule(def("B", 2, "set:b=1"));
        engine.remove_rule("A");

        let vars = engine.process(&Params::new());
        assert_eq!(vars.get("b"), Some(&json!(1)));

        engine.add_rule(def("A", 1, "exclude:B"));
        engine.process(&Params::new());
        assert_eq!(*trace.lock().unwrap(), vec!["B", "A"]);
    }

    #[test]
    fn test_cancelled_pass() {
        let (evaluator, trace) = StubEvaluator::new();
        let mut engine = RuleEngine::new(evaluator);
        engine.add_rules(vec![def("A", 1, "set:a=1"), def("B", 2, "set:b=1")]);

        let cancel = CancelFlag::new();
        cancel.cancel();
        let report = engine.process_with(&Params::new(), Some(&cancel));

        assert!(trace.lock().unwrap().is_empty());
        assert_eq!(report.status_of("A"), Some(&RuleStatus::Cancelled));
        assert_eq!(report.status_of("B"), Some(&RuleStatus::Cancelled));
    }

    #[test]
    fn test_cancel_during_pass_keeps_earlier_variables() {
        let (evaluator, trace) = StubEvaluator::new();
        let mut engine = RuleEngine::new(evaluator);

        let cancel = CancelFlag::new();
        let flag = cancel.clone();
        engine
            .register_function(Function::new("stop", 0, move |_| {
                flag.cancel();
                Ok(serde_json::Value::Null)
            }))
            .unwrap();
        engine.add_rules(vec![
            def("A", 1, "set:a=1;stop"),
            def("B", 2, "set:b=1"),
            def("C", 3, "set:c=1"),
        ]);

        let report = engine.process_with(&Params::new(), Some(&cancel));

        assert_eq!(*trace.lock().unwrap(), vec!["A"]);
        assert_eq!(report.status_of("A"), Some(&RuleStatus::Fired));
        assert_eq!(report.status_of("B"), Some(&RuleStatus::Cancelled));
        assert_eq!(report.status_of("C"), Some(&RuleStatus::Cancelled));
        assert_eq!(report.variables.get("a"), Some(&json!(1)));
        assert!(report.variables.get("b").is_none());
        assert!(report.variables.get("c").is_none());
    }

    #[test]
    fn test_replaced_and_removed_rules_are_released() {
        let (evaluator, _) = StubEvaluator::new();
        let mut engine = RuleEngine::new(evaluator);
        engine.add_rule(def("A", 1, "set:a=1"));
        engine.add_rule(def("A", 2, "set:a=2"));
        engine.remove_rule("A");
        engine.remove_rule("missing");

        let released = engine.evaluator().released.lock().unwrap().clone();
        assert_eq!(released, vec!["set:a=1", "set:a=2"]);
    }

    #[test]
    fn test_extension_functions() {
        let (evaluator, _) = StubEvaluator::new();
        let mut engine = RuleEngine::new(evaluator);
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        engine
            .register_function(Function::new("notify", 0, move |_| {
                *counter.lock().unwrap() += 1;
                Ok(serde_json::Value::Null)
            }))
            .unwrap();
        engine.add_rule(def("r", 1, "notify"));

        engine.process(&Params::new());
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_builtin_names_are_reserved() {
        let (evaluator, _) = StubEvaluator::new();
        let mut engine = RuleEngine::new(evaluator);
        let result = engine.register_function(Function::new("exclude", 1, |_| Ok(json!(null))));
        assert!(matches!(result, Err(RuleError::ReservedFunction(_))));
    }

    #[test]
    fn test_add_rule_from_string() {
        let (evaluator, trace) = StubEvaluator::new();
        let mut engine = RuleEngine::new(evaluator);

        let added = engine
            .add_rule_from_string("second|20|true|\nfirst|10|true|\n")
            .unwrap();
        assert_eq!(added, 2);

        assert!(matches!(
            engine.add_rule_from_string("broken"),
            Err(RuleError::Parse(_))
        ));

        engine.process(&Params::new());
        assert_eq!(*trace.lock().unwrap(), vec!["first", "second"]);
    }
}
