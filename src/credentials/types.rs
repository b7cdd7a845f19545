//! # 凭据数据类型

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, TrustError};

/// 不会出现在 `Debug` 输出里的敏感字符串
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// 取出明文，仅在发送请求时使用
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"***\"")
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// 令牌所代表的逻辑身份
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetIdentity(String);

impl TargetIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TargetIdentity {
    fn default() -> Self {
        Self(crate::config::DEFAULT_IDENTITY.to_string())
    }
}

impl fmt::Display for TargetIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetIdentity {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TargetIdentity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// 为某个身份换取令牌所用的客户端凭据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
    /// 空格分隔的作用域，空串表示不请求特定作用域
    pub scope: String,
    pub audience: Option<String>,
}

impl ClientCredentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<SecretString>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: scope.into(),
            audience: None,
        }
    }

    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }
}

/// 令牌端点返回的、已通过校验的令牌
#[derive(Clone, PartialEq, Eq)]
pub struct AcquiredToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
}

impl fmt::Debug for AcquiredToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcquiredToken")
            .field("access_token", &"***")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}

impl AcquiredToken {
    /// 在接收时刻 `issued_at` 将响应转换为凭据
    ///
    /// 响应未携带 `expires_in` 时使用 `default_ttl`；
    /// 响应未回显作用域时沿用请求的作用域。
    pub fn into_credential(
        self,
        issued_at: DateTime<Utc>,
        default_ttl: TimeDelta,
        requested_scope: &str,
    ) -> Result<Credential> {
        let lifetime = self
            .expires_in
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(default_ttl);
        let expires_at = issued_at
            .checked_add_signed(lifetime)
            .ok_or_else(|| TrustError::internal("凭据过期时间溢出"))?;
        let scopes = split_scopes(self.scope.as_deref().unwrap_or(requested_scope));

        Credential::new(self.access_token, self.token_type, scopes, issued_at, expires_at)
    }
}

/// 缓存中的不可变凭据
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    value: String,
    token_type: String,
    scopes: Vec<String>,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(
        value: impl Into<String>,
        token_type: impl Into<String>,
        scopes: Vec<String>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Self> {
        if expires_at <= issued_at {
            return Err(TrustError::internal(format!(
                "凭据有效期无效: issued_at={issued_at}, expires_at={expires_at}"
            )));
        }
        Ok(Self {
            value: value.into(),
            token_type: token_type.into(),
            scopes,
            issued_at,
            expires_at,
        })
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// 到达或超过 `expires_at` 即视为过期
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// 是否已进入提前刷新窗口
    #[must_use]
    pub fn needs_refresh_at(&self, now: DateTime<Utc>, refresh_ahead: TimeDelta) -> bool {
        now >= self.expires_at - refresh_ahead
    }

    /// `Authorization` 头的取值
    #[must_use]
    pub fn authorization_value(&self) -> String {
        format!("Bearer {}", self.value)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("value", &"***")
            .field("token_type", &self.token_type)
            .field("scopes", &self.scopes)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

fn split_scopes(scope: &str) -> Vec<String> {
    scope.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_credential_rejects_inverted_window() {
        let err = Credential::new("tok", "Bearer", vec![], t0(), t0()).unwrap_err();
        assert!(matches!(err, TrustError::Internal { .. }));
    }

    #[test]
    fn test_refresh_window_and_expiry() {
        let credential =
            Credential::new("tok", "Bearer", vec![], t0(), t0() + TimeDelta::seconds(600)).unwrap();
        let ahead = TimeDelta::seconds(60);

        assert!(!credential.needs_refresh_at(t0() + TimeDelta::seconds(539), ahead));
        assert!(credential.needs_refresh_at(t0() + TimeDelta::seconds(540), ahead));
        assert!(!credential.is_expired_at(t0() + TimeDelta::seconds(599)));
        assert!(credential.is_expired_at(t0() + TimeDelta::seconds(600)));
    }

    #[test]
    fn test_debug_output_hides_secrets() {
        let credential =
            Credential::new("very-secret-token", "Bearer", vec![], t0(), t0() + TimeDelta::seconds(1))
                .unwrap();
        let creds = ClientCredentials::new("svc", "hunter2", "internal");

        assert!(!format!("{credential:?}").contains("very-secret-token"));
        assert!(!format!("{creds:?}").contains("hunter2"));
    }

    #[test]
    fn test_into_credential_falls_back_to_default_ttl() {
        let token = AcquiredToken {
            access_token: "abc".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: None,
            scope: None,
        };
        let credential = token
            .into_credential(t0(), TimeDelta::seconds(540), "internal read")
            .unwrap();

        assert_eq!(credential.expires_at(), t0() + TimeDelta::seconds(540));
        assert_eq!(credential.scopes(), ["internal", "read"]);
        assert_eq!(credential.authorization_value(), "Bearer abc");
    }

    #[test]
    fn test_default_identity_is_internal() {
        assert_eq!(TargetIdentity::default().as_str(), "internal");
    }
}
