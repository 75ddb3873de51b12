use anyhow::{anyhow, Context, Result};
use clap::Parser;
use ordo_config::OrdoConfig;
use ordo_rule::{Params, RuleEngine, RuleLoader};
use ordo_script::RhaiEvaluator;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run one pass of ordo rules", long_about = None)]
pub struct Args {
    /// Config directory (reads ordo.toml when present)
    #[arg(short, long, default_value = ".")]
    pub config: PathBuf,

    /// Rule directory, overrides engine.rules_dir
    #[arg(short, long)]
    pub rules: Option<PathBuf>,

    /// Pass parameters: a JSON object, or @path to a JSON file
    #[arg(short, long, default_value = "{}")]
    pub params: String,

    /// Print the whole pass report instead of only the variables
    #[arg(long)]
    pub report: bool,
}

/// 解析参数
pub fn parse_params(raw: &str) -> Result<Params> {
    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read params file {}", path))?,
        None => raw.to_string(),
    };

    let value: serde_json::Value =
        serde_json::from_str(&text).context("Params are not valid JSON")?;

    match value {
        serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(anyhow!("Params must be a JSON object, got {}", other)),
    }
}

/// 根据配置构建引擎并加载规则
pub fn build_engine(config: &OrdoConfig, rules: Option<&Path>) -> Result<RuleEngine<RhaiEvaluator>> {
    let mut loader = RuleLoader::new();
    if let Some(ext) = &config.engine.rule_extension {
        loader = loader.with_extension(ext.clone());
    }

    let mut engine = RuleEngine::new(RhaiEvaluator::with_max_operations(
        config.engine.max_operations,
    ))
    .with_loader(loader);

    let rules_dir = rules.or(config.engine.rules_dir.as_deref());
    match rules_dir {
        Some(dir) => {
            let count = engine
                .load_rules_from_folder(dir)
                .with_context(|| format!("Failed to load rules from {}", dir.display()))?;
            tracing::info!(rules = count, dir = %dir.display(), "Rules ready");
        }
        None => tracing::warn!("No rule directory configured"),
    }

    Ok(engine)
}

/// 执行一轮，返回要输出的 JSON 文本
pub fn run(args: &Args, config: &OrdoConfig) -> Result<String> {
    let params = parse_params(&args.params)?;
    let engine = build_engine(config, args.rules.as_deref())?;

    let output = if args.report {
        serde_json::to_string_pretty(&engine.process_with(&params, None))?
    } else {
        // 按键排序输出
        let variables: std::collections::BTreeMap<_, _> =
            engine.process(&params).into_iter().collect();
        serde_json::to_string_pretty(&variables)?
    };

    Ok(output)
}
