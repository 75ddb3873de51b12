pub mod rule;
pub mod value;

pub use rule::{Rule, RuleBinding, RuleDefinition, RuleSource, DEFAULT_PRIORITY};
pub use value::{Params, Value, Variables};
