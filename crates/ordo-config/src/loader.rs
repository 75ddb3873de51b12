use anyhow::{anyhow, Result};
use config::{Config, File, FileFormat};
use std::path::{Path, PathBuf};

use crate::OrdoConfig;

/// 配置文件名
pub const CONFIG_FILE: &str = "ordo.toml";

/// 配置加载器
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    /// 创建配置加载器
    pub fn new<P: AsRef<Path>>(config_dir: P) -> Self {
        Self {
            config_dir: config_dir.as_ref().to_path_buf(),
        }
    }

    /// 加载配置
    pub fn load(&self) -> Result<OrdoConfig> {
        let config_path = self.config_dir.join(CONFIG_FILE);

        if !config_path.exists() {
            // 如果配置文件不存在，返回默认配置
            return Ok(OrdoConfig::default());
        }

        let config = Config::builder()
            .add_source(File::new(
                config_path.to_str().ok_or_else(|| anyhow!("Invalid config path"))?,
                FileFormat::Toml,
            ))
            .build()?;

        let mut loaded: OrdoConfig = config.try_deserialize()?;

        // 相对路径以配置目录为基准
        if let Some(dir) = loaded.engine.rules_dir.take() {
            loaded.engine.rules_dir = Some(if dir.is_relative() {
                self.config_dir.join(dir)
            } else {
                dir
            });
        }

        Ok(loaded)
    }

    /// 加载并验证配置
    pub fn load_validated(&self) -> Result<OrdoConfig> {
        let config = self.load()?;
        validate(&config)?;
        Ok(config)
    }
}

/// 验证配置
pub fn validate(config: &OrdoConfig) -> Result<()> {
    if config.engine.max_operations == 0 {
        return Err(anyhow!("max_operations must be greater than 0"));
    }

    if config.logging.level.trim().is_empty() {
        return Err(anyhow!("logging level must not be empty"));
    }

    if let Some(ext) = &config.engine.rule_extension {
        if ext.is_empty() || ext.starts_with('.') {
            return Err(anyhow!(
                "rule_extension must be a bare extension like \"rule\", got {:?}",
                ext
            ));
        }
    }

    Ok(())
}
