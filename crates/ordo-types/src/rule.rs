use serde::{Deserialize, Serialize};

/// Priority used when a rule definition does not carry one.
pub const DEFAULT_PRIORITY: i64 = 1000;

fn default_priority() -> i64 {
    DEFAULT_PRIORITY
}

/// A named rule as understood by an evaluator.
///
/// `conditions` and `actions` are append-only fragment lists; the engine
/// appends at most one combined fragment to each.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,

    #[serde(default)]
    pub conditions: Vec<String>,

    #[serde(default)]
    pub actions: Vec<String>,
}

impl Rule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            conditions: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.conditions.push(condition.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.actions.push(action.into());
        self
    }

    /// All condition fragments joined without a separator.
    pub fn conditions_text(&self) -> String {
        self.conditions.concat()
    }
}

/// Conditions or actions as given by a caller: either one ready expression
/// or a list of fragments still to be combined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleSource {
    Text(String),
    Fragments(Vec<String>),
}

impl Default for RuleSource {
    fn default() -> Self {
        RuleSource::Fragments(Vec::new())
    }
}

impl From<&str> for RuleSource {
    fn from(text: &str) -> Self {
        RuleSource::Text(text.to_string())
    }
}

impl From<String> for RuleSource {
    fn from(text: String) -> Self {
        RuleSource::Text(text)
    }
}

impl From<Vec<String>> for RuleSource {
    fn from(fragments: Vec<String>) -> Self {
        RuleSource::Fragments(fragments)
    }
}

impl From<Vec<&str>> for RuleSource {
    fn from(fragments: Vec<&str>) -> Self {
        RuleSource::Fragments(fragments.into_iter().map(str::to_string).collect())
    }
}

/// Programmatic rule definition accepted by `add_rule`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub name: String,

    #[serde(default)]
    pub conditions: RuleSource,

    #[serde(default)]
    pub actions: RuleSource,

    /// Lower runs earlier
    #[serde(default = "default_priority")]
    pub priority: i64,
}

impl RuleDefinition {
    pub fn new(
        name: impl Into<String>,
        conditions: impl Into<RuleSource>,
        actions: impl Into<RuleSource>,
    ) -> Self {
        Self {
            name: name.into(),
            conditions: conditions.into(),
            actions: actions.into(),
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }
}

/// A rule stored in the repository together with its priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleBinding {
    pub rule: Rule,
    pub priority: i64,
}

impl RuleBinding {
    pub fn new(rule: Rule, priority: i64) -> Self {
        Self { rule, priority }
    }

    pub fn name(&self) -> &str {
        &self.rule.name
    }
}

impl From<Rule> for RuleBinding {
    fn from(rule: Rule) -> Self {
        Self::new(rule, DEFAULT_PRIORITY)
    }
}
