//! # 错误类型定义

use axum::http::StatusCode;
use thiserror::Error;

use super::ErrorCategory;

/// 应用主要错误类型
#[derive(Debug, Error)]
pub enum TrustError {
    /// 配置相关错误
    #[error("配置错误: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 数据库相关错误
    #[error("数据库错误: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 网络通信错误
    #[error("网络错误: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 令牌获取失败（令牌端点不可达或拒绝凭据）
    #[error("令牌获取失败: identity={identity}, reason={reason}")]
    AcquisitionFailed {
        identity: String,
        reason: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 等待进行中的刷新超时
    #[error("令牌刷新等待超时: identity={identity}, timeout={timeout_ms}ms")]
    RefreshTimeout { identity: String, timeout_ms: u64 },

    /// 写操作目标不存在
    #[error("资源未找到: {resource_type} {identifier}")]
    NotFound {
        resource_type: String,
        identifier: String,
    },

    /// 唯一性冲突
    #[error("资源冲突: {resource_type} {identifier}")]
    Conflict {
        resource_type: String,
        identifier: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 协议层面的非法请求（OAuth2 `invalid_request` 等）
    #[error("非法请求[{error_code}]: {description}")]
    InvalidRequest {
        error_code: String,
        description: String,
    },

    /// 明确不支持的操作
    #[error("不支持的操作: {operation}")]
    Unsupported { operation: String },

    /// 系统内部错误
    #[error("内部错误: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// IO相关错误
    #[error("IO错误: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// 序列化/反序列化错误
    #[error("序列化错误: {message}")]
    Serialization {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    /// 附带上下文的错误
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<TrustError>,
    },
}

impl TrustError {
    /// 将错误转换为HTTP状态码和错误代码
    #[must_use]
    pub fn to_http_response_parts(&self) -> (StatusCode, &str) {
        match self {
            Self::Config { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            Self::Database { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            Self::Network { .. } => (StatusCode::BAD_GATEWAY, "NETWORK_ERROR"),
            Self::AcquisitionFailed { .. } => (StatusCode::BAD_GATEWAY, "ACQUISITION_FAILED"),
            Self::RefreshTimeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "REFRESH_TIMEOUT"),
            Self::NotFound { .. } => (StatusCode::NOT_FOUND, "RESOURCE_NOT_FOUND"),
            Self::Conflict { .. } => (StatusCode::CONFLICT, "RESOURCE_CONFLICT"),
            Self::InvalidRequest { error_code, .. } => (StatusCode::BAD_REQUEST, error_code.as_str()),
            Self::Unsupported { .. } => (StatusCode::NOT_IMPLEMENTED, "UNSUPPORTED_OPERATION"),
            Self::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::Io { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            Self::Serialization { .. } => (StatusCode::BAD_REQUEST, "SERIALIZATION_ERROR"),
            Self::Context { source, .. } => source.to_http_response_parts(),
        }
    }

    /// 错误归类：客户端错误或服务端错误
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        if self.to_http_response_parts().0.is_client_error() {
            ErrorCategory::Client
        } else {
            ErrorCategory::Server
        }
    }

    /// 去掉上下文包装后的根错误
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// 创建配置错误
    pub fn config<T: Into<String>>(message: T) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的配置错误
    pub fn config_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建数据库错误
    pub fn database<T: Into<String>>(message: T) -> Self {
        Self::Database {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的数据库错误
    pub fn database_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Database {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建网络错误
    pub fn network<T: Into<String>>(message: T) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的网络错误
    pub fn network_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建令牌获取失败错误
    pub fn acquisition_failed<I: Into<String>, R: Into<String>>(identity: I, reason: R) -> Self {
        Self::AcquisitionFailed {
            identity: identity.into(),
            reason: reason.into(),
            source: None,
        }
    }

    /// 创建带来源的令牌获取失败错误
    pub fn acquisition_failed_with_source<I: Into<String>, E: Into<anyhow::Error>>(
        identity: I,
        source: E,
    ) -> Self {
        let source = source.into();
        Self::AcquisitionFailed {
            identity: identity.into(),
            reason: source.to_string(),
            source: Some(source),
        }
    }

    /// 创建刷新超时错误
    pub fn refresh_timeout<I: Into<String>>(identity: I, timeout: std::time::Duration) -> Self {
        Self::RefreshTimeout {
            identity: identity.into(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// 创建资源未找到错误
    pub fn not_found<T: Into<String>, I: Into<String>>(resource_type: T, identifier: I) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            identifier: identifier.into(),
        }
    }

    /// 创建资源冲突错误
    pub fn conflict<T: Into<String>, I: Into<String>>(resource_type: T, identifier: I) -> Self {
        Self::Conflict {
            resource_type: resource_type.into(),
            identifier: identifier.into(),
            source: None,
        }
    }

    /// 创建带来源的资源冲突错误
    pub fn conflict_with_source<T: Into<String>, I: Into<String>, E: Into<anyhow::Error>>(
        resource_type: T,
        identifier: I,
        source: E,
    ) -> Self {
        Self::Conflict {
            resource_type: resource_type.into(),
            identifier: identifier.into(),
            source: Some(source.into()),
        }
    }

    /// 创建 OAuth2 `invalid_request` 错误
    pub fn invalid_request<T: Into<String>>(description: T) -> Self {
        Self::InvalidRequest {
            error_code: "invalid_request".to_string(),
            description: description.into(),
        }
    }

    /// 创建不支持操作错误
    pub fn unsupported<T: Into<String>>(operation: T) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// 创建内部错误
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的内部错误
    pub fn internal_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

// 自动转换常见错误类型
impl From<std::io::Error> for TrustError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: "文件操作失败".to_string(),
            source: err,
        }
    }
}

impl From<toml::de::Error> for TrustError {
    fn from(err: toml::de::Error) -> Self {
        Self::config_with_source("TOML解析失败", err)
    }
}

impl From<serde_json::Error> for TrustError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: "JSON处理失败".to_string(),
            source: err.into(),
        }
    }
}

impl From<sea_orm::error::DbErr> for TrustError {
    fn from(err: sea_orm::error::DbErr) -> Self {
        Self::database_with_source("数据库操作失败", err)
    }
}

// Reqwest错误转换
impl From<reqwest::Error> for TrustError {
    fn from(err: reqwest::Error) -> Self {
        Self::network_with_source("HTTP请求失败", err)
    }
}

// Bcrypt错误转换
impl From<bcrypt::BcryptError> for TrustError {
    fn from(err: bcrypt::BcryptError) -> Self {
        Self::internal_with_source("密钥哈希处理失败", err)
    }
}

impl From<super::ConfigError> for TrustError {
    fn from(err: super::ConfigError) -> Self {
        Self::Config {
            message: err.to_string(),
            source: Some(anyhow::Error::new(err)),
        }
    }
}

impl From<super::DatabaseError> for TrustError {
    fn from(err: super::DatabaseError) -> Self {
        match err {
            super::DatabaseError::UniqueViolation {
                resource_type,
                identifier,
            } => Self::conflict(resource_type, identifier),
            other => Self::Database {
                message: other.to_string(),
                source: Some(anyhow::Error::new(other)),
            },
        }
    }
}
