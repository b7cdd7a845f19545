//! # 集成测试公共工具
//!
//! 可编程的令牌获取替身、mockall 生成的 mock 以及内存数据库。

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use internal_trust::credentials::{AcquiredToken, ClientCredentials, TargetIdentity, TokenAcquirer};
use internal_trust::error::AcquireError;
use mockall::mock;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

mock! {
    pub Acquirer {}

    #[async_trait]
    impl TokenAcquirer for Acquirer {
        async fn acquire(
            &self,
            credentials: &ClientCredentials,
        ) -> Result<AcquiredToken, AcquireError>;
    }
}

/// 固定起点，便于手动时钟计算
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
}

pub fn bearer(access_token: &str, expires_in: Option<i64>) -> AcquiredToken {
    AcquiredToken {
        access_token: access_token.to_string(),
        token_type: "Bearer".to_string(),
        expires_in,
        scope: None,
    }
}

pub fn internal_registration() -> (TargetIdentity, ClientCredentials) {
    (
        TargetIdentity::default(),
        ClientCredentials::new("gateway", "s3cret", "internal"),
    )
}

/// 计数、可延迟、可按脚本返回结果的令牌获取替身
///
/// 脚本耗尽后返回 `token-{n}`（n 为第几次调用），有效期为 `expires_in`。
pub struct StubAcquirer {
    calls: AtomicUsize,
    delay: Duration,
    expires_in: Option<i64>,
    script: Mutex<VecDeque<Result<AcquiredToken, AcquireError>>>,
}

impl StubAcquirer {
    pub fn new(expires_in: Option<i64>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            expires_in,
            script: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn then(self, result: Result<AcquiredToken, AcquireError>) -> Self {
        self.script.lock().unwrap().push_back(result);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenAcquirer for StubAcquirer {
    async fn acquire(
        &self,
        _credentials: &ClientCredentials,
    ) -> Result<AcquiredToken, AcquireError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(bearer(&format!("token-{call}"), self.expires_in)))
    }
}

/// 等待条件成立，最多约 2 秒
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

/// 创建已迁移的内存数据库（单连接，保证所有查询落在同一个库）
pub async fn create_test_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .expect("Failed to connect to test database");
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    db
}

/// 在临时目录下创建已迁移的文件数据库，连接池允许多个并发连接
pub async fn create_file_test_db(dir: &std::path::Path) -> DatabaseConnection {
    let url = format!("sqlite://{}?mode=rwc", dir.join("trust.db").display());
    let mut options = ConnectOptions::new(url);
    options.max_connections(4).sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .expect("Failed to connect to file test database");
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    db
}
