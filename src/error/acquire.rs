//! 客户端凭据换取访问令牌时的错误

use thiserror::Error;

/// 单次客户端凭据换取失败
///
/// 各变体都保留具体原因，调用方据此记录日志；不携带任何部分填充的令牌。
#[derive(Debug, Error)]
pub enum AcquireError {
    /// 令牌端点返回非成功状态或 OAuth 错误体（`invalid_client`、`invalid_scope`、`server_error` 等）
    #[error("令牌端点拒绝请求 (HTTP {status}): {error}{}", description_suffix(.description.as_deref()))]
    Rejected {
        status: u16,
        error: String,
        description: Option<String>,
    },

    #[error("令牌端点请求超时: {0}")]
    Timeout(String),

    #[error("令牌端点不可达: {0}")]
    Transport(String),

    #[error("令牌响应格式错误: {0}")]
    MalformedResponse(String),
}

impl AcquireError {
    /// 端点给出的 OAuth 错误码
    #[must_use]
    pub fn oauth_error(&self) -> Option<&str> {
        match self {
            Self::Rejected { error, .. } => Some(error.as_str()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AcquireError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

fn description_suffix(description: Option<&str>) -> String {
    description.map_or_else(String::new, |d| format!(" ({d})"))
}
