//! # 令牌获取
//!
//! 使用 OAuth 2.0 client_credentials 授权向令牌端点换取访问令牌。
//! 无状态，仅由 [`CredentialStore`](super::CredentialStore) 调用。

use async_trait::async_trait;
use axum::http::StatusCode;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use std::time::Duration;

use super::types::{AcquiredToken, ClientCredentials};
use crate::config::{CLIENT_CREDENTIALS_GRANT, OutboundConfig};
use crate::error::{AcquireError, Result, TrustError};
use crate::{ldebug, logging::{LogComponent, LogStage}};

/// 令牌获取抽象
#[async_trait]
pub trait TokenAcquirer: Send + Sync {
    async fn acquire(
        &self,
        credentials: &ClientCredentials,
    ) -> std::result::Result<AcquiredToken, AcquireError>;
}

/// 令牌端点原始响应（成功与错误字段共用）
#[derive(Debug, Deserialize)]
struct TokenResponseBody {
    access_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<i64>,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// 基于 reqwest 的令牌获取实现
#[derive(Debug, Clone)]
pub struct HttpTokenAcquirer {
    http_client: reqwest::Client,
    token_endpoint: String,
}

impl HttpTokenAcquirer {
    /// 创建新的令牌获取客户端
    pub fn new(token_endpoint: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("internal-trust/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TrustError::network_with_source("创建HTTP客户端失败", e))?;

        Ok(Self {
            http_client,
            token_endpoint: token_endpoint.into(),
        })
    }

    pub fn from_config(config: &OutboundConfig) -> Result<Self> {
        Self::new(
            config.token_endpoint.clone(),
            Duration::from_secs(config.request_timeout_seconds),
        )
    }

    #[must_use]
    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }
}

#[async_trait]
impl TokenAcquirer for HttpTokenAcquirer {
    async fn acquire(
        &self,
        credentials: &ClientCredentials,
    ) -> std::result::Result<AcquiredToken, AcquireError> {
        let mut form_params = vec![("grant_type", CLIENT_CREDENTIALS_GRANT)];
        if !credentials.scope.is_empty() {
            form_params.push(("scope", credentials.scope.as_str()));
        }
        if let Some(audience) = credentials.audience.as_deref() {
            form_params.push(("audience", audience));
        }

        ldebug!(
            "system",
            LogStage::ExternalApi,
            LogComponent::TokenAcquirer,
            "acquire",
            &format!(
                "请求令牌: endpoint={}, client_id={}, scope={}",
                self.token_endpoint, credentials.client_id, credentials.scope
            )
        );

        let response = self
            .http_client
            .post(&self.token_endpoint)
            .header(ACCEPT, "application/json")
            .basic_auth(
                &credentials.client_id,
                Some(credentials.client_secret.expose()),
            )
            .form(&form_params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        interpret_response(status, &body)
    }
}

/// 校验令牌端点响应，绝不返回字段不完整的令牌
fn interpret_response(
    status: StatusCode,
    body: &str,
) -> std::result::Result<AcquiredToken, AcquireError> {
    let parsed = serde_json::from_str::<TokenResponseBody>(body);

    if !status.is_success() {
        // 错误响应不一定是 JSON
        let (error, description) = match parsed {
            Ok(TokenResponseBody {
                error: Some(error),
                error_description,
                ..
            }) => (error, error_description),
            _ => (
                status
                    .canonical_reason()
                    .unwrap_or("unknown_error")
                    .to_string(),
                (!body.trim().is_empty()).then(|| truncate(body, 200)),
            ),
        };
        return Err(AcquireError::Rejected {
            status: status.as_u16(),
            error,
            description,
        });
    }

    let parsed =
        parsed.map_err(|e| AcquireError::MalformedResponse(format!("无法解析响应: {e}")))?;

    if let Some(error) = parsed.error {
        return Err(AcquireError::Rejected {
            status: status.as_u16(),
            error,
            description: parsed.error_description,
        });
    }

    let access_token = parsed
        .access_token
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| AcquireError::MalformedResponse("缺少 access_token".to_string()))?;

    let token_type = parsed
        .token_type
        .ok_or_else(|| AcquireError::MalformedResponse("缺少 token_type".to_string()))?;
    if !token_type.eq_ignore_ascii_case("bearer") {
        return Err(AcquireError::MalformedResponse(format!(
            "不支持的 token_type: {token_type}"
        )));
    }

    if let Some(expires_in) = parsed.expires_in.filter(|e| *e <= 0) {
        return Err(AcquireError::MalformedResponse(format!(
            "expires_in 必须为正数: {expires_in}"
        )));
    }

    Ok(AcquiredToken {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: parsed.expires_in,
        scope: parsed.scope.filter(|s| !s.trim().is_empty()),
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
