//! # 授权服务器领域类型

use chrono::{DateTime, Utc};
use entity::{oauth2_authorization_consent, oauth2_registered_client};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::credentials::SecretString;
use crate::error::{Result, TrustError};

/// OAuth2 授权类型
pub mod grant_type {
    pub const AUTHORIZATION_CODE: &str = "authorization_code";
    pub const CLIENT_CREDENTIALS: &str = "client_credentials";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    pub const DEVICE_CODE: &str = "urn:ietf:params:oauth:grant-type:device_code";
}

/// 客户端认证方式
pub mod auth_method {
    pub const CLIENT_SECRET_BASIC: &str = "client_secret_basic";
    pub const CLIENT_SECRET_POST: &str = "client_secret_post";
    pub const NONE: &str = "none";
}

/// 授权同意中作用域权限的前缀
pub const SCOPE_AUTHORITY_PREFIX: &str = "SCOPE_";

/// 已注册的 OAuth2 客户端
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisteredClient {
    pub id: String,
    pub client_id: String,
    pub client_id_issued_at: DateTime<Utc>,
    /// bcrypt 哈希，公共客户端为空
    #[serde(skip_serializing)]
    pub client_secret: Option<SecretString>,
    pub client_secret_expires_at: Option<DateTime<Utc>>,
    pub client_name: String,
    pub client_authentication_methods: BTreeSet<String>,
    pub authorization_grant_types: BTreeSet<String>,
    pub redirect_uris: BTreeSet<String>,
    pub post_logout_redirect_uris: BTreeSet<String>,
    pub scopes: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RegisteredClient {
    /// 密钥未过期（停用即把过期时间设为停用时刻）
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.client_secret_expires_at
            .is_none_or(|expires_at| expires_at > now)
    }

    #[must_use]
    pub fn supports_grant_type(&self, grant_type: &str) -> bool {
        self.authorization_grant_types.contains(grant_type)
    }

    #[must_use]
    pub fn is_public(&self) -> bool {
        self.client_secret.is_none()
    }
}

impl TryFrom<oauth2_registered_client::Model> for RegisteredClient {
    type Error = TrustError;

    fn try_from(model: oauth2_registered_client::Model) -> Result<Self> {
        Ok(Self {
            client_authentication_methods: decode_set(&model.client_authentication_methods)?,
            authorization_grant_types: decode_set(&model.authorization_grant_types)?,
            redirect_uris: decode_set(&model.redirect_uris)?,
            post_logout_redirect_uris: decode_set(&model.post_logout_redirect_uris)?,
            scopes: decode_set(&model.scopes)?,
            id: model.id,
            client_id: model.client_id,
            client_id_issued_at: model.client_id_issued_at.and_utc(),
            client_secret: model.client_secret.map(SecretString::from),
            client_secret_expires_at: model.client_secret_expires_at.map(|t| t.and_utc()),
            client_name: model.client_name,
            created_at: model.created_at.and_utc(),
            updated_at: model.updated_at.and_utc(),
        })
    }
}

/// `add`/`update` 的输入，密钥为明文，由注册表负责哈希
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisteredClientDraft {
    /// 内部 ID，`add` 时为空则自动生成
    pub id: Option<String>,
    pub client_id: String,
    /// `update` 时为空表示保留原密钥
    pub client_secret: Option<SecretString>,
    pub client_secret_expires_at: Option<DateTime<Utc>>,
    pub client_name: String,
    pub client_authentication_methods: BTreeSet<String>,
    pub authorization_grant_types: BTreeSet<String>,
    pub redirect_uris: BTreeSet<String>,
    pub post_logout_redirect_uris: BTreeSet<String>,
    pub scopes: BTreeSet<String>,
}

impl RegisteredClientDraft {
    pub fn new(client_id: impl Into<String>, client_name: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_name: client_name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<SecretString>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    #[must_use]
    pub fn with_authentication_method(mut self, method: impl Into<String>) -> Self {
        self.client_authentication_methods.insert(method.into());
        self
    }

    #[must_use]
    pub fn with_grant_type(mut self, grant_type: impl Into<String>) -> Self {
        self.authorization_grant_types.insert(grant_type.into());
        self
    }

    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uris.insert(uri.into());
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.insert(scope.into());
        self
    }
}

/// 客户端查询条件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientFilter {
    /// 精确匹配
    pub client_id: Option<String>,
    /// 子串匹配
    pub client_name: Option<String>,
    /// 支持该授权类型
    pub grant_type: Option<String>,
    /// 是否包含已停用客户端
    pub include_disabled: bool,
}

/// 用户对客户端的授权同意
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Consent {
    pub registered_client_id: String,
    pub principal_name: String,
    pub authorities: BTreeSet<String>,
}

impl Consent {
    pub fn new(registered_client_id: impl Into<String>, principal_name: impl Into<String>) -> Self {
        Self {
            registered_client_id: registered_client_id.into(),
            principal_name: principal_name.into(),
            authorities: BTreeSet::new(),
        }
    }

    pub fn add_authority(&mut self, authority: impl Into<String>) {
        self.authorities.insert(authority.into());
    }

    /// 授予作用域，即添加 `SCOPE_` 前缀的权限
    pub fn add_scope(&mut self, scope: &str) {
        self.authorities
            .insert(format!("{SCOPE_AUTHORITY_PREFIX}{scope}"));
    }

    #[must_use]
    pub fn with_scope(mut self, scope: &str) -> Self {
        self.add_scope(scope);
        self
    }

    /// 已授予的作用域（去掉前缀）
    pub fn scopes(&self) -> BTreeSet<String> {
        self.authorities
            .iter()
            .filter_map(|a| a.strip_prefix(SCOPE_AUTHORITY_PREFIX))
            .map(str::to_string)
            .collect()
    }
}

impl TryFrom<oauth2_authorization_consent::Model> for Consent {
    type Error = TrustError;

    fn try_from(model: oauth2_authorization_consent::Model) -> Result<Self> {
        Ok(Self {
            authorities: decode_set(&model.authorities)?,
            registered_client_id: model.registered_client_id,
            principal_name: model.principal_name,
        })
    }
}

/// 集合字段以 JSON 数组文本存储
pub(crate) fn encode_set(values: &BTreeSet<String>) -> Result<String> {
    Ok(serde_json::to_string(values)?)
}

pub(crate) fn decode_set(raw: &str) -> Result<BTreeSet<String>> {
    if raw.trim().is_empty() {
        return Ok(BTreeSet::new());
    }
    Ok(serde_json::from_str(raw)?)
}
