use crate::error::Result;
use crate::functions::Capabilities;
use ordo_types::{Params, Rule, RuleBinding};

/// Parses rule text and runs rules.
///
/// The grammar of conditions and actions belongs entirely to the
/// implementation; the engine only sees names, fragments and priorities.
pub trait Evaluator {
    /// 解析规则文本，一段文本可包含多条规则
    fn parse(&self, source: &str) -> Result<Vec<RuleBinding>>;

    /// Binds the capabilities of one pass.
    ///
    /// Called once at the start of every pass; whatever gets registered lives
    /// in the returned value and is dropped with it.
    fn prepare<'a>(&'a self, capabilities: Capabilities) -> Result<Box<dyn PassEvaluator + 'a>>;

    /// Called when a rule is replaced or removed, so per-rule state such as
    /// compiled scripts can be dropped.
    fn release(&self, _rule: &Rule) {}
}

/// Executes rules within a single pass.
pub trait PassEvaluator {
    /// Checks the conditions and, when they hold, runs the actions.
    ///
    /// Returns whether the actions ran.
    fn execute(&self, rule: &Rule, params: &Params) -> Result<bool>;
}

impl<E: Evaluator + ?Sized> Evaluator for Box<E> {
    fn parse(&self, source: &str) -> Result<Vec<RuleBinding>> {
        (**self).parse(source)
    }

    fn prepare<'a>(&'a self, capabilities: Capabilities) -> Result<Box<dyn PassEvaluator + 'a>> {
        (**self).prepare(capabilities)
    }

    fn release(&self, rule: &Rule) {
        (**self).release(rule)
    }
}
