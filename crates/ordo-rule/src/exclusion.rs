use ordo_types::Rule;
use regex::Regex;
use tracing::{debug, warn};

/// One entry of the exclusion list: the raw value and its `event = "..."` pattern.
#[derive(Debug, Clone)]
struct Exclusion {
    value: String,
    pattern: Option<Regex>,
}

impl Exclusion {
    fn new(value: String) -> Self {
        let pattern = match Regex::new(&event_pattern(&value)) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(exclusion = %value, error = %e, "Invalid exclusion pattern");
                None
            }
        };
        Self { value, pattern }
    }
}

/// Textual pattern for `event = "<value>"`, either quote style.
///
/// This is a heuristic over the condition text, not a semantic check: it also
/// matches `my_event = "x"` and ignores how the comparison is used.
pub fn event_pattern(value: &str) -> String {
    format!(r#"event\s*=\s*["|']{}["|']"#, regex::escape(value))
}

/// 排除列表
///
/// Grows during a pass. Every rule not yet reached is checked against the
/// entries present at the moment it is reached.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    entries: Vec<Exclusion>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: impl Into<String>) {
        self.entries.push(Exclusion::new(value.into()));
    }

    pub fn contains(&self, value: &str) -> bool {
        self.entries.iter().any(|e| e.value == value)
    }

    pub fn values(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.value.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 条件文本中引用了被排除的事件
    pub fn matches_event(&self, rule: &Rule) -> bool {
        if self.entries.is_empty() {
            return false;
        }

        let conds = rule.conditions_text();
        self.entries.iter().any(|exclusion| {
            let hit = exclusion
                .pattern
                .as_ref()
                .is_some_and(|re| re.is_match(&conds));
            debug!(
                rule_name = %rule.name,
                conditions = %conds,
                exclusion = %exclusion.value,
                hit,
                "Checking event exclusion"
            );
            hit
        })
    }

    /// 规则名本身被排除
    pub fn matches_name(&self, rule: &Rule) -> bool {
        self.contains(&rule.name)
    }
}

/// 判断规则是否因事件引用被排除
pub fn is_excluded(rule: &Rule, exclusions: &ExclusionSet) -> bool {
    exclusions.matches_event(rule)
}

/// 判断规则在本轮是否应跳过：事件引用或规则名命中
pub fn is_suppressed(rule: &Rule, exclusions: &ExclusionSet) -> bool {
    is_excluded(rule, exclusions) || exclusions.matches_name(rule)
}
