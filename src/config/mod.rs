//! # 配置管理模块
//!
//! 处理应用配置加载与验证

mod app_config;
mod database;

pub use app_config::{
    AppConfig, AuthorizationConfig, CLIENT_CREDENTIALS_GRANT, DEFAULT_IDENTITY, IdentityConfig,
    OutboundConfig, TargetConfig,
};
pub use database::DatabaseConfig;

use crate::error::{ConfigError, Result, TrustError};
use std::env;
use std::path::{Path, PathBuf};

/// 显式指定配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "INTERNAL_TRUST_CONFIG_PATH";

/// 按环境解析默认配置文件路径
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    let env = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
    PathBuf::from(format!("config/config.{env}.toml"))
}

/// 加载配置文件
pub fn load_config() -> Result<AppConfig> {
    load_config_from(default_config_path())
}

/// 从指定路径加载配置文件
pub fn load_config_from(path: impl AsRef<Path>) -> Result<AppConfig> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(TrustError::config(format!(
            "配置文件不存在: {}",
            path.display()
        )));
    }

    let config_content = std::fs::read_to_string(path).map_err(|e| {
        TrustError::config_with_source(format!("读取配置文件失败: {}", path.display()), e)
    })?;

    parse_config(&config_content)
}

/// 解析并验证 TOML 配置
pub fn parse_config(content: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(content).map_err(ConfigError::from)?;

    // 验证配置的有效性
    config.validate()?;

    Ok(config)
}
