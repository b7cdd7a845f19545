//! # 出站跳过策略
//!
//! 决定某个目标服务是否需要附加内部令牌，以及使用哪个身份。

use axum::http::HeaderValue;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::config::{OutboundConfig, TargetConfig};
use crate::credentials::TargetIdentity;

/// 单次请求跳过令牌的请求头，离开进程前总会被移除
pub const SKIP_HEADER: &str = "x-internal-token-skip";

/// 目标服务声明的能力
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetCapability {
    /// 目标不接受或不需要内部令牌
    SkipCredential,
}

/// 出站调用的目标服务
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetService {
    name: String,
    capabilities: HashSet<TargetCapability>,
}

impl TargetService {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: HashSet::new(),
        }
    }

    #[must_use]
    pub fn with_capability(mut self, capability: TargetCapability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn has_capability(&self, capability: TargetCapability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// 已声明的目标服务，未声明的目标视为没有任何能力
#[derive(Debug, Clone, Default)]
pub struct TargetRegistry {
    targets: HashMap<String, TargetService>,
}

impl TargetRegistry {
    pub fn from_config(targets: &[TargetConfig]) -> Self {
        let mut registry = Self::default();
        for target in targets {
            let service = target
                .capabilities
                .iter()
                .fold(TargetService::new(target.name.clone()), |service, capability| {
                    service.with_capability(*capability)
                });
            registry.register(service);
        }
        registry
    }

    pub fn register(&mut self, service: TargetService) {
        self.targets.insert(service.name.clone(), service);
    }

    pub fn resolve(&self, name: &str) -> TargetService {
        self.targets
            .get(name)
            .cloned()
            .unwrap_or_else(|| TargetService::new(name))
    }
}

/// 不附加令牌的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// 请求已带有 `Authorization`
    ExistingAuthorization,
    /// 请求显式要求跳过
    SkipHeader,
    /// 总开关关闭
    Disabled,
    /// 目标在免除名单中或声明了 `SkipCredential`
    Exempt,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ExistingAuthorization => "existing_authorization",
            Self::SkipHeader => "skip_header",
            Self::Disabled => "disabled",
            Self::Exempt => "exempt",
        })
    }
}

/// 跳过策略：总开关加免除名单
#[derive(Debug, Clone)]
pub struct SkipPolicy {
    enabled: bool,
    skip_clients: HashSet<String>,
}

impl Default for SkipPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            skip_clients: HashSet::new(),
        }
    }
}

impl SkipPolicy {
    pub fn new(enabled: bool, skip_clients: impl IntoIterator<Item = String>) -> Self {
        Self {
            enabled,
            skip_clients: skip_clients.into_iter().collect(),
        }
    }

    pub fn from_config(config: &OutboundConfig) -> Self {
        Self::new(config.enabled, config.skip_clients.iter().cloned())
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 目标是否免除令牌：在配置名单中，或声明了 `SkipCredential`
    #[must_use]
    pub fn is_exempt(&self, target: &TargetService) -> bool {
        self.skip_clients.contains(target.name())
            || target.has_capability(TargetCapability::SkipCredential)
    }
}

/// 跳过请求头取值是否表示跳过，`false`/`0` 以外的任何值都算
pub fn skip_requested(value: &HeaderValue) -> bool {
    let value = value.to_str().unwrap_or_default().trim();
    !(value.eq_ignore_ascii_case("false") || value == "0")
}

/// 目标服务到身份的路由，未配置的目标使用默认身份
#[derive(Debug, Clone, Default)]
pub struct IdentityRoutes {
    routes: HashMap<String, TargetIdentity>,
    default: TargetIdentity,
}

impl IdentityRoutes {
    pub fn from_config(config: &OutboundConfig) -> Self {
        let routes = config
            .identities
            .iter()
            .flat_map(|identity| {
                identity
                    .targets
                    .iter()
                    .map(|target| (target.clone(), TargetIdentity::new(identity.name.clone())))
            })
            .collect();

        Self {
            routes,
            default: TargetIdentity::default(),
        }
    }

    pub fn route(&mut self, target: impl Into<String>, identity: TargetIdentity) {
        self.routes.insert(target.into(), identity);
    }

    pub fn identity_for(&self, target: &str) -> &TargetIdentity {
        self.routes.get(target).unwrap_or(&self.default)
    }
}
