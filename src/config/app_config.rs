//! # 应用配置结构定义

use serde::{Deserialize, Serialize};

use crate::credentials::SecretString;
use crate::error::ConfigError;
use crate::outbound::TargetCapability;

/// 唯一支持的出站授权类型
pub const CLIENT_CREDENTIALS_GRANT: &str = "client_credentials";

/// 默认身份名称，未配置路由的目标都使用该身份
pub const DEFAULT_IDENTITY: &str = "internal";

/// 应用主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 数据库配置
    pub database: super::DatabaseConfig,
    /// 出站令牌配置
    pub outbound: OutboundConfig,
    /// 授权服务器存储与匹配配置
    pub authorization: AuthorizationConfig,
}

/// 出站令牌配置（`[outbound]`）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboundConfig {
    /// 总开关，关闭后不附加任何令牌
    pub enabled: bool,
    /// 免除令牌的目标服务名
    pub skip_clients: Vec<String>,
    /// 令牌响应未携带 `expires_in` 时使用的有效期
    pub cache_expire_seconds: u64,
    /// 提前刷新窗口
    pub refresh_ahead_seconds: u64,
    /// 等待进行中刷新的上限
    pub refresh_timeout_seconds: u64,
    /// 后台刷新器巡检间隔
    pub refresher_interval_seconds: u64,
    /// 单次令牌请求超时
    pub request_timeout_seconds: u64,
    pub token_endpoint: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    pub grant_type: String,
    /// 额外身份（默认身份之外）
    pub identities: Vec<IdentityConfig>,
    /// 目标服务声明
    pub targets: Vec<TargetConfig>,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            skip_clients: Vec::new(),
            cache_expire_seconds: 540,
            refresh_ahead_seconds: 60,
            refresh_timeout_seconds: 10,
            refresher_interval_seconds: 30,
            request_timeout_seconds: 10,
            token_endpoint: "http://127.0.0.1:9000/oauth2/token".to_string(),
            client_id: "internal".to_string(),
            client_secret: SecretString::default(),
            scope: "internal".to_string(),
            audience: None,
            grant_type: CLIENT_CREDENTIALS_GRANT.to_string(),
            identities: Vec::new(),
            targets: Vec::new(),
        }
    }
}

/// 额外身份配置（`[[outbound.identities]]`）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub name: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: SecretString,
    #[serde(default)]
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    /// 使用该身份的目标服务
    #[serde(default)]
    pub targets: Vec<String>,
}

/// 目标服务声明（`[[outbound.targets]]`）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub name: String,
    #[serde(default)]
    pub capabilities: Vec<TargetCapability>,
}

/// 授权服务器配置（`[authorization]`）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    pub device_authorization_endpoint: String,
    pub token_endpoint: String,
    /// bcrypt 哈希成本
    pub secret_hash_cost: u32,
    pub default_page_size: u64,
    pub max_page_size: u64,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            device_authorization_endpoint: "/oauth2/device_authorization".to_string(),
            token_endpoint: "/oauth2/token".to_string(),
            secret_hash_cost: bcrypt::DEFAULT_COST,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl AppConfig {
    /// 校验全部配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::invalid("database.url", "数据库URL不能为空"));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::invalid(
                "database.max_connections",
                "数据库最大连接数必须大于0",
            ));
        }

        self.outbound.validate()?;
        self.authorization.validate()
    }
}

impl OutboundConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grant_type != CLIENT_CREDENTIALS_GRANT {
            return Err(ConfigError::invalid(
                "outbound.grant_type",
                format!("仅支持 {CLIENT_CREDENTIALS_GRANT}，实际为 {}", self.grant_type),
            ));
        }
        if self.cache_expire_seconds == 0 {
            return Err(ConfigError::invalid(
                "outbound.cache_expire_seconds",
                "必须大于0",
            ));
        }
        if self.refresh_ahead_seconds >= self.cache_expire_seconds {
            return Err(ConfigError::invalid(
                "outbound.refresh_ahead_seconds",
                format!(
                    "必须小于 cache_expire_seconds ({})",
                    self.cache_expire_seconds
                ),
            ));
        }
        for (field, value) in [
            ("outbound.refresh_timeout_seconds", self.refresh_timeout_seconds),
            ("outbound.refresher_interval_seconds", self.refresher_interval_seconds),
            ("outbound.request_timeout_seconds", self.request_timeout_seconds),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(field, "必须大于0"));
            }
        }

        if !self.enabled {
            return Ok(());
        }

        url::Url::parse(&self.token_endpoint).map_err(|e| {
            ConfigError::invalid("outbound.token_endpoint", format!("无效的URL: {e}"))
        })?;
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::invalid("outbound.client_id", "不能为空"));
        }

        let mut names = std::collections::HashSet::from([DEFAULT_IDENTITY]);
        for identity in &self.identities {
            if identity.name.trim().is_empty() || identity.client_id.trim().is_empty() {
                return Err(ConfigError::invalid(
                    "outbound.identities",
                    "身份名称与 client_id 不能为空",
                ));
            }
            if !names.insert(identity.name.as_str()) {
                return Err(ConfigError::invalid(
                    "outbound.identities",
                    format!("身份名称重复: {}", identity.name),
                ));
            }
        }

        let mut routed = std::collections::HashSet::new();
        for target in self.identities.iter().flat_map(|i| i.targets.iter()) {
            if !routed.insert(target.as_str()) {
                return Err(ConfigError::invalid(
                    "outbound.identities.targets",
                    format!("目标服务被多个身份使用: {target}"),
                ));
            }
        }

        if self.targets.iter().any(|t| t.name.trim().is_empty()) {
            return Err(ConfigError::invalid("outbound.targets", "目标服务名不能为空"));
        }

        Ok(())
    }
}

impl AuthorizationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, path) in [
            (
                "authorization.device_authorization_endpoint",
                &self.device_authorization_endpoint,
            ),
            ("authorization.token_endpoint", &self.token_endpoint),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::invalid(field, "端点路径必须以 / 开头"));
            }
        }
        if !(4..=31).contains(&self.secret_hash_cost) {
            return Err(ConfigError::invalid(
                "authorization.secret_hash_cost",
                "bcrypt 成本必须在 4..=31 之间",
            ));
        }
        if self.max_page_size == 0 || self.default_page_size == 0 {
            return Err(ConfigError::invalid(
                "authorization.default_page_size",
                "分页大小必须大于0",
            ));
        }
        if self.default_page_size > self.max_page_size {
            return Err(ConfigError::invalid(
                "authorization.default_page_size",
                "默认分页大小不能超过最大分页大小",
            ));
        }
        Ok(())
    }
}
