use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 全局配置
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OrdoConfig {
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
}

/// 引擎配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 规则目录
    pub rules_dir: Option<PathBuf>,

    /// 只加载该扩展名的文件（不含点）
    pub rule_extension: Option<String>,

    /// 单个脚本最大操作数
    pub max_operations: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rules_dir: None,
            rule_extension: None,
            max_operations: 100_000,
        }
    }
}

/// 日志输出格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 默认级别，RUST_LOG 优先
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Plain,
        }
    }
}
