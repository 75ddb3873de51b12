use chrono::{DateTime, Utc};
use ordo_types::Variables;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 单轮执行记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassReport {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub variables: Variables,
    pub outcomes: Vec<RuleOutcome>,
}

impl PassReport {
    /// Names of rules whose actions ran, in execution order.
    pub fn fired(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.status == RuleStatus::Fired)
            .map(|o| o.rule.as_str())
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RuleOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, RuleStatus::Failed(_)))
    }

    pub fn status_of(&self, rule: &str) -> Option<&RuleStatus> {
        self.outcomes
            .iter()
            .find(|o| o.rule == rule)
            .map(|o| &o.status)
    }
}

/// 规则在本轮的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub rule: String,
    #[serde(flatten)]
    pub status: RuleStatus,
}

/// 执行状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum RuleStatus {
    Fired,
    NotMatched,
    Excluded,
    Failed(String),
    Cancelled,
}
