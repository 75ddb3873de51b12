pub mod cancel;
pub mod combinator;
pub mod context;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod exclusion;
pub mod execution;
pub mod functions;
pub mod loader;
pub mod repository;

pub use cancel::CancelFlag;
pub use combinator::{and_operator, combine};
pub use context::{ContextHandle, ExecutionContext};
pub use engine::RuleEngine;
pub use error::{Result, RuleError};
pub use evaluator::{Evaluator, PassEvaluator};
pub use exclusion::{is_excluded, is_suppressed, ExclusionSet};
pub use execution::{PassReport, RuleOutcome, RuleStatus};
pub use functions::{Capabilities, Function, FunctionRegistry, BUILTIN_FUNCTIONS};
pub use loader::{RuleFile, RuleLoader};
pub use repository::RuleRepository;

pub use ordo_types::{
    Params, Rule, RuleBinding, RuleDefinition, RuleSource, Value, Variables, DEFAULT_PRIORITY,
};
