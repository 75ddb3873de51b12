use std::path::PathBuf;
use thiserror::Error;

/// 规则引擎统一错误类型
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Load error: {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Execution error in rule [{rule}]: {message}")]
    Execution { rule: String, message: String },

    #[error("Function error: {0}")]
    Function(String),

    #[error("Reserved function name: {0}")]
    ReservedFunction(String),
}

impl RuleError {
    pub fn execution(rule: impl Into<String>, message: impl Into<String>) -> Self {
        RuleError::Execution {
            rule: rule.into(),
            message: message.into(),
        }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, RuleError>;
