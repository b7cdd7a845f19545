//! # 出站凭据模块
//!
//! 客户端凭据令牌的获取与缓存：
//! - [`TokenAcquirer`]：向授权端点执行 client_credentials 交换
//! - [`CredentialStore`]：按身份缓存凭据，提前刷新并合并并发刷新

pub mod acquirer;
pub mod clock;
pub mod store;
pub mod types;

pub use acquirer::{HttpTokenAcquirer, TokenAcquirer};
pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{CredentialStore, CredentialStoreStats, StorePolicy};
pub use types::{AcquiredToken, ClientCredentials, Credential, SecretString, TargetIdentity};

use crate::config::OutboundConfig;

/// 由出站配置推导全部身份注册：默认身份加额外身份
pub fn registrations_from_config(
    config: &OutboundConfig,
) -> Vec<(TargetIdentity, ClientCredentials)> {
    let default = ClientCredentials {
        client_id: config.client_id.clone(),
        client_secret: config.client_secret.clone(),
        scope: config.scope.clone(),
        audience: config.audience.clone(),
    };

    std::iter::once((TargetIdentity::default(), default))
        .chain(config.identities.iter().map(|identity| {
            (
                TargetIdentity::new(identity.name.clone()),
                ClientCredentials {
                    client_id: identity.client_id.clone(),
                    client_secret: identity.client_secret.clone(),
                    scope: identity.scope.clone(),
                    audience: identity.audience.clone(),
                },
            )
        }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdentityConfig;

    #[test]
    fn test_registrations_include_default_identity() {
        let config = OutboundConfig {
            identities: vec![IdentityConfig {
                name: "billing".to_string(),
                client_id: "billing-client".to_string(),
                client_secret: SecretString::from("x"),
                scope: "billing.read".to_string(),
                audience: Some("billing".to_string()),
                targets: vec!["invoice".to_string()],
            }],
            ..OutboundConfig::default()
        };

        let registrations = registrations_from_config(&config);
        assert_eq!(registrations.len(), 2);
        assert_eq!(registrations[0].0, TargetIdentity::default());
        assert_eq!(registrations[1].0.as_str(), "billing");
        assert_eq!(registrations[1].1.audience.as_deref(), Some("billing"));
    }
}
