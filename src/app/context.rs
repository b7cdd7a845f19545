//! 应用上下文
//!
//! 进程启动时显式构造全部组件，关闭时按依赖逆序释放。

use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;

use crate::authorization::{ClientRegistry, ConsentStore, DeviceGrantMatcher};
use crate::config::AppConfig;
use crate::credentials::{
    CredentialStore, HttpTokenAcquirer, StorePolicy, TokenAcquirer, registrations_from_config,
};
use crate::error::Result;
use crate::outbound::OutboundAuthenticator;
use crate::{linfo, lwarn, logging::{LogComponent, LogStage}};

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub credentials: CredentialStore,
    pub outbound: OutboundAuthenticator,
    pub clients: ClientRegistry,
    pub consents: ConsentStore,
    pub device_grant: Arc<DeviceGrantMatcher>,
}

impl AppContext {
    /// 使用基于 HTTP 的令牌获取实现构建上下文
    pub fn build(config: Arc<AppConfig>, db: DatabaseConnection) -> Result<Self> {
        let acquirer = Arc::new(HttpTokenAcquirer::from_config(&config.outbound)?);
        Ok(Self::build_with_acquirer(config, db, acquirer))
    }

    pub fn build_with_acquirer(
        config: Arc<AppConfig>,
        db: DatabaseConnection,
        acquirer: Arc<dyn TokenAcquirer>,
    ) -> Self {
        let credentials = CredentialStore::new(
            acquirer,
            registrations_from_config(&config.outbound),
            StorePolicy::from_config(&config.outbound),
        );
        let outbound = OutboundAuthenticator::from_config(credentials.clone(), &config.outbound);
        let clients = ClientRegistry::new(db.clone(), &config.authorization);
        let consents = ConsentStore::new(db.clone());
        let device_grant = Arc::new(DeviceGrantMatcher::from_config(&config.authorization));

        Self {
            config,
            db,
            credentials,
            outbound,
            clients,
            consents,
            device_grant,
        }
    }

    /// 预取凭据并启动后台刷新器；出站认证关闭时什么都不做
    pub async fn start(&self) {
        if !self.config.outbound.enabled {
            lwarn!(
                "system",
                LogStage::Startup,
                LogComponent::OutboundAuth,
                "disabled",
                "出站令牌已关闭，跳过凭据预取"
            );
            return;
        }

        self.credentials.warm_up().await;
        self.credentials.spawn_refresher(Duration::from_secs(
            self.config.outbound.refresher_interval_seconds,
        ));
    }

    /// 关闭：先停凭据缓存，再关闭数据库连接
    pub async fn shutdown(&self) -> Result<()> {
        self.credentials.shutdown().await;
        self.db.clone().close().await?;

        linfo!(
            "system",
            LogStage::Shutdown,
            LogComponent::Main,
            "context_shutdown",
            "应用上下文已关闭"
        );
        Ok(())
    }
}
