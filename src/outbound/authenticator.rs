//! # 出站认证
//!
//! 为每次出站调用附加 `Authorization: Bearer <token>`。
//! 令牌获取失败时放行请求（不带令牌），并以 warn 级别记录。

use axum::http::{HeaderMap, HeaderValue, header::AUTHORIZATION};
use std::sync::Arc;

use super::policy::{IdentityRoutes, SKIP_HEADER, SkipPolicy, SkipReason, TargetRegistry, skip_requested};
use crate::config::OutboundConfig;
use crate::credentials::{CredentialStore, TargetIdentity};
use crate::{ldebug, lwarn, logging::{LogComponent, LogStage}};

/// 单次出站认证的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundDecision {
    /// 已附加令牌
    Attached { identity: TargetIdentity },
    /// 按策略未附加
    Skipped(SkipReason),
    /// 获取令牌失败，请求照常发出
    Failed {
        identity: TargetIdentity,
        reason: String,
    },
}

impl OutboundDecision {
    #[must_use]
    pub fn is_attached(&self) -> bool {
        matches!(self, Self::Attached { .. })
    }
}

/// 出站认证器
#[derive(Debug, Clone)]
pub struct OutboundAuthenticator {
    store: CredentialStore,
    policy: Arc<SkipPolicy>,
    targets: Arc<TargetRegistry>,
    routes: Arc<IdentityRoutes>,
}

impl OutboundAuthenticator {
    pub fn new(
        store: CredentialStore,
        policy: SkipPolicy,
        targets: TargetRegistry,
        routes: IdentityRoutes,
    ) -> Self {
        Self {
            store,
            policy: Arc::new(policy),
            targets: Arc::new(targets),
            routes: Arc::new(routes),
        }
    }

    pub fn from_config(store: CredentialStore, config: &OutboundConfig) -> Self {
        Self::new(
            store,
            SkipPolicy::from_config(config),
            TargetRegistry::from_config(&config.targets),
            IdentityRoutes::from_config(config),
        )
    }

    #[must_use]
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// 为发往 `target` 的请求头附加令牌
    pub async fn authenticate(&self, target: &str, headers: &mut HeaderMap) -> OutboundDecision {
        // 跳过头只在进程内有意义
        let skip_header = headers
            .remove(SKIP_HEADER)
            .is_some_and(|value| skip_requested(&value));

        if let Some(reason) = self.skip_reason(target, headers, skip_header) {
            ldebug!(
                "system",
                LogStage::RequestModify,
                LogComponent::OutboundAuth,
                "skip",
                &format!("不附加令牌: target={target}, reason={reason}")
            );
            return OutboundDecision::Skipped(reason);
        }

        let identity = self.routes.identity_for(target).clone();
        let result = self.store.get(&identity).await.and_then(|credential| {
            let mut value = HeaderValue::from_str(&credential.authorization_value()).map_err(
                |e| crate::error::TrustError::internal_with_source("令牌包含非法字符", e),
            )?;
            value.set_sensitive(true);
            Ok(value)
        });

        match result {
            Ok(value) => {
                headers.insert(AUTHORIZATION, value);
                OutboundDecision::Attached { identity }
            }
            Err(e) => {
                lwarn!(
                    "system",
                    LogStage::Authentication,
                    LogComponent::OutboundAuth,
                    "attach_failed",
                    &format!("获取令牌失败，请求将不带令牌发出: target={target}, identity={identity}, reason={e}")
                );
                OutboundDecision::Failed {
                    identity,
                    reason: e.to_string(),
                }
            }
        }
    }

    /// reqwest 调用方的入口
    pub async fn apply(&self, target: &str, request: &mut reqwest::Request) -> OutboundDecision {
        self.authenticate(target, request.headers_mut()).await
    }

    fn skip_reason(&self, target: &str, headers: &HeaderMap, skip_header: bool) -> Option<SkipReason> {
        if headers.contains_key(AUTHORIZATION) {
            return Some(SkipReason::ExistingAuthorization);
        }
        if skip_header {
            return Some(SkipReason::SkipHeader);
        }
        if !self.policy.is_enabled() {
            return Some(SkipReason::Disabled);
        }
        if self.policy.is_exempt(&self.targets.resolve(target)) {
            return Some(SkipReason::Exempt);
        }
        None
    }
}
