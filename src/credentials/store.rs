//! # 凭据缓存
//!
//! 按身份缓存 bearer 凭据，负责提前刷新与单飞刷新：
//!
//! - 有效期内直接返回缓存凭据；
//! - 进入提前刷新窗口但尚未过期时，触发（或加入）后台刷新并立即返回当前凭据；
//! - 缺失或已过期时等待刷新结果，最长 `refresh_timeout`。
//!
//! 每个身份一个槽位，槽位内部是一把短暂持有的 `std::sync::Mutex`，
//! 从不跨 `.await` 持有。刷新在独立任务中执行，等待者被取消不会中断刷新。

use chrono::TimeDelta;
use dashmap::DashMap;
use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::acquirer::TokenAcquirer;
use super::clock::{Clock, SystemClock};
use super::types::{ClientCredentials, Credential, TargetIdentity};
use crate::config::OutboundConfig;
use crate::error::{Result, TrustError};
use crate::{ldebug, linfo, lwarn, logging::{LogComponent, LogStage}};

/// 刷新结果：`None` 表示尚未完成
type RefreshOutcome = Option<std::result::Result<Arc<Credential>, Arc<str>>>;

/// 缓存策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorePolicy {
    /// 令牌响应未携带 `expires_in` 时的有效期
    pub default_ttl: Duration,
    /// 提前刷新窗口
    pub refresh_ahead: Duration,
    /// 等待刷新结果的上限
    pub refresh_timeout: Duration,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(540),
            refresh_ahead: Duration::from_secs(60),
            refresh_timeout: Duration::from_secs(10),
        }
    }
}

impl StorePolicy {
    pub fn from_config(config: &OutboundConfig) -> Self {
        Self {
            default_ttl: Duration::from_secs(config.cache_expire_seconds),
            refresh_ahead: Duration::from_secs(config.refresh_ahead_seconds),
            refresh_timeout: Duration::from_secs(config.refresh_timeout_seconds),
        }
    }

    fn default_ttl_delta(&self) -> TimeDelta {
        TimeDelta::from_std(self.default_ttl).unwrap_or(TimeDelta::MAX)
    }

    fn refresh_ahead_delta(&self) -> TimeDelta {
        TimeDelta::from_std(self.refresh_ahead).unwrap_or(TimeDelta::MAX)
    }
}

/// 缓存统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialStoreStats {
    /// 有效期内命中
    pub hits: u64,
    /// 刷新窗口内返回旧凭据的次数
    pub stale_serves: u64,
    /// 成功换取并采用的凭据数
    pub acquisitions: u64,
    /// 换取失败次数
    pub failures: u64,
    /// 因过期时间不晚于当前凭据而被拒绝的响应数
    pub rejected_stale: u64,
    /// 当前持有凭据的身份数
    pub cached_identities: usize,
}

impl CredentialStoreStats {
    /// 命中率（含刷新窗口内的旧凭据）
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.stale_serves;
        let total = served + self.acquisitions + self.failures;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    stale_serves: AtomicU64,
    acquisitions: AtomicU64,
    failures: AtomicU64,
    rejected_stale: AtomicU64,
}

struct InFlight {
    id: u64,
    receiver: watch::Receiver<RefreshOutcome>,
}

impl InFlight {
    /// 发送端已消失却从未发布结果：刷新任务异常退出
    fn is_abandoned(&self) -> bool {
        self.receiver.borrow().is_none() && self.receiver.has_changed().is_err()
    }
}

#[derive(Default)]
struct SlotState {
    credential: Option<Arc<Credential>>,
    in_flight: Option<InFlight>,
}

struct Slot {
    credentials: ClientCredentials,
    state: Mutex<SlotState>,
}

impl Slot {
    fn new(credentials: ClientCredentials) -> Self {
        Self {
            credentials,
            state: Mutex::new(SlotState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct StoreInner {
    acquirer: Arc<dyn TokenAcquirer>,
    clock: Arc<dyn Clock>,
    policy: StorePolicy,
    slots: DashMap<TargetIdentity, Arc<Slot>>,
    counters: Counters,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    next_refresh_id: AtomicU64,
}

/// 按身份缓存凭据的存储，克隆开销为一次 `Arc` 克隆
#[derive(Clone)]
pub struct CredentialStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("policy", &self.inner.policy)
            .field("identities", &self.inner.slots.len())
            .finish_non_exhaustive()
    }
}

impl CredentialStore {
    pub fn new(
        acquirer: Arc<dyn TokenAcquirer>,
        registrations: impl IntoIterator<Item = (TargetIdentity, ClientCredentials)>,
        policy: StorePolicy,
    ) -> Self {
        Self::with_clock(acquirer, registrations, policy, Arc::new(SystemClock))
    }

    pub fn with_clock(
        acquirer: Arc<dyn TokenAcquirer>,
        registrations: impl IntoIterator<Item = (TargetIdentity, ClientCredentials)>,
        policy: StorePolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let slots = registrations
            .into_iter()
            .map(|(identity, credentials)| (identity, Arc::new(Slot::new(credentials))))
            .collect();

        Self {
            inner: Arc::new(StoreInner {
                acquirer,
                clock,
                policy,
                slots,
                counters: Counters::default(),
                tracker: TaskTracker::new(),
                shutdown: CancellationToken::new(),
                next_refresh_id: AtomicU64::new(1),
            }),
        }
    }

    /// 注册（或替换）身份，替换时丢弃旧凭据
    pub fn register(&self, identity: TargetIdentity, credentials: ClientCredentials) {
        ldebug!(
            "system",
            LogStage::Configuration,
            LogComponent::CredentialStore,
            "register",
            &format!("注册令牌身份: identity={identity}, client_id={}", credentials.client_id)
        );
        self.inner
            .slots
            .insert(identity, Arc::new(Slot::new(credentials)));
    }

    /// 已注册的身份
    pub fn identities(&self) -> Vec<TargetIdentity> {
        self.inner.slots.iter().map(|e| e.key().clone()).collect()
    }

    #[must_use]
    pub fn policy(&self) -> &StorePolicy {
        &self.inner.policy
    }

    /// 获取身份对应的有效凭据
    pub async fn get(&self, identity: &TargetIdentity) -> Result<Arc<Credential>> {
        self.inner.get(identity).await
    }

    /// 只读查看当前凭据，不触发刷新，已过期的凭据不会返回
    pub fn peek(&self, identity: &TargetIdentity) -> Option<Arc<Credential>> {
        let slot = self.inner.slot(identity).ok()?;
        let now = self.inner.clock.now();
        let state = slot.lock();
        state
            .credential
            .as_ref()
            .filter(|c| !c.is_expired_at(now))
            .cloned()
    }

    /// 丢弃缓存凭据，下一次 `get` 重新换取
    pub fn invalidate(&self, identity: &TargetIdentity) {
        if let Ok(slot) = self.inner.slot(identity) {
            slot.lock().credential = None;
            linfo!(
                "system",
                LogStage::Cache,
                LogComponent::CredentialStore,
                "invalidate",
                &format!("凭据已失效: identity={identity}")
            );
        }
    }

    /// 启动时为全部身份预取凭据，返回成功数量
    pub async fn warm_up(&self) -> usize {
        let identities = self.identities();
        let results = join_all(identities.iter().map(|identity| self.get(identity))).await;

        let mut warmed = 0;
        for (identity, result) in identities.iter().zip(results) {
            match result {
                Ok(_) => warmed += 1,
                Err(e) => lwarn!(
                    "system",
                    LogStage::Startup,
                    LogComponent::CredentialStore,
                    "warm_up",
                    &format!("预取凭据失败: identity={identity}, reason={e}")
                ),
            }
        }

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::CredentialStore,
            "warm_up",
            &format!("凭据预取完成: {warmed}/{}", identities.len())
        );
        warmed
    }

    /// 启动后台刷新器，周期性为进入刷新窗口的身份触发刷新
    pub fn spawn_refresher(&self, interval: Duration) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let token = inner.shutdown.child_token();

        self.inner.tracker.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // 第一次 tick 立即完成
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let triggered = inner.refresh_due();
                        if triggered > 0 {
                            ldebug!(
                                "system",
                                LogStage::BackgroundTask,
                                LogComponent::CredentialStore,
                                "refresher_tick",
                                &format!("后台刷新触发: {triggered} 个身份")
                            );
                        }
                    }
                }
            }

            ldebug!(
                "system",
                LogStage::Shutdown,
                LogComponent::CredentialStore,
                "refresher_stopped",
                "后台刷新器已停止"
            );
        })
    }

    /// 统计信息
    pub fn stats(&self) -> CredentialStoreStats {
        let counters = &self.inner.counters;
        let cached_identities = self
            .inner
            .slots
            .iter()
            .filter(|e| e.value().lock().credential.is_some())
            .count();

        CredentialStoreStats {
            hits: counters.hits.load(Ordering::Relaxed),
            stale_serves: counters.stale_serves.load(Ordering::Relaxed),
            acquisitions: counters.acquisitions.load(Ordering::Relaxed),
            failures: counters.failures.load(Ordering::Relaxed),
            rejected_stale: counters.rejected_stale.load(Ordering::Relaxed),
            cached_identities,
        }
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// 停止后台刷新器，等待进行中的刷新完成并清空缓存
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;

        for entry in &self.inner.slots {
            entry.value().lock().credential = None;
        }

        linfo!(
            "system",
            LogStage::Shutdown,
            LogComponent::CredentialStore,
            "shutdown",
            "凭据缓存已关闭"
        );
    }
}

impl StoreInner {
    fn slot(&self, identity: &TargetIdentity) -> Result<Arc<Slot>> {
        self.slots
            .get(identity)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| TrustError::config(format!("未注册的令牌身份: {identity}")))
    }

    async fn get(self: &Arc<Self>, identity: &TargetIdentity) -> Result<Arc<Credential>> {
        if self.shutdown.is_cancelled() {
            return Err(TrustError::internal("凭据缓存已关闭"));
        }

        let slot = self.slot(identity)?;
        let deadline = tokio::time::Instant::now() + self.policy.refresh_timeout;
        let refresh_ahead = self.policy.refresh_ahead_delta();

        loop {
            let mut receiver = {
                let now = self.clock.now();
                let mut state = slot.lock();
                match state.credential.clone() {
                    Some(credential) if !credential.needs_refresh_at(now, refresh_ahead) => {
                        self.counters.hits.fetch_add(1, Ordering::Relaxed);
                        return Ok(credential);
                    }
                    Some(credential) if !credential.is_expired_at(now) => {
                        self.counters.stale_serves.fetch_add(1, Ordering::Relaxed);
                        self.ensure_refresh(identity, &slot, &mut state);
                        return Ok(credential);
                    }
                    _ => self.ensure_refresh(identity, &slot, &mut state),
                }
            };

            let outcome = match tokio::time::timeout_at(deadline, receiver.wait_for(Option::is_some))
                .await
            {
                Err(_) => {
                    lwarn!(
                        "system",
                        LogStage::Cache,
                        LogComponent::CredentialStore,
                        "wait_refresh",
                        &format!("等待刷新超时: identity={identity}")
                    );
                    return Err(TrustError::refresh_timeout(
                        identity.as_str(),
                        self.policy.refresh_timeout,
                    ));
                }
                // 发送端未发布即消失，下一轮会重新发起刷新
                Ok(Err(_)) => continue,
                Ok(Ok(value)) => value.clone(),
            };

            match outcome {
                Some(Ok(credential)) if !credential.is_expired_at(self.clock.now()) => {
                    return Ok(credential);
                }
                Some(Err(reason)) => {
                    return Err(TrustError::acquisition_failed(
                        identity.as_str(),
                        reason.as_ref(),
                    ));
                }
                _ => continue,
            }
        }
    }

    /// 确保该槽位有且仅有一个进行中的刷新，返回其结果订阅
    fn ensure_refresh(
        self: &Arc<Self>,
        identity: &TargetIdentity,
        slot: &Arc<Slot>,
        state: &mut SlotState,
    ) -> watch::Receiver<RefreshOutcome> {
        if let Some(in_flight) = &state.in_flight {
            if !in_flight.is_abandoned() {
                return in_flight.receiver.clone();
            }
            lwarn!(
                "system",
                LogStage::Cache,
                LogComponent::CredentialStore,
                "refresh_abandoned",
                &format!("刷新任务异常退出，重新发起: identity={identity}")
            );
        }

        let id = self.next_refresh_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = watch::channel(None);
        state.in_flight = Some(InFlight {
            id,
            receiver: receiver.clone(),
        });

        let inner = Arc::clone(self);
        let identity = identity.clone();
        let slot = Arc::clone(slot);
        self.tracker.spawn(async move {
            inner.run_refresh(identity, slot, id, sender).await;
        });

        receiver
    }

    /// 为进入刷新窗口（或尚无凭据）的身份触发刷新
    fn refresh_due(self: &Arc<Self>) -> usize {
        let now = self.clock.now();
        let refresh_ahead = self.policy.refresh_ahead_delta();
        let slots: Vec<_> = self
            .slots
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();

        let mut triggered = 0;
        for (identity, slot) in slots {
            let mut state = slot.lock();
            let due = state
                .credential
                .as_ref()
                .is_none_or(|c| c.needs_refresh_at(now, refresh_ahead));
            if due && state.in_flight.is_none() {
                // 后台刷新不等待结果
                let _ = self.ensure_refresh(&identity, &slot, &mut state);
                triggered += 1;
            }
        }
        triggered
    }

    async fn run_refresh(
        &self,
        identity: TargetIdentity,
        slot: Arc<Slot>,
        refresh_id: u64,
        sender: watch::Sender<RefreshOutcome>,
    ) {
        let result = self.acquirer.acquire(&slot.credentials).await;
        let now = self.clock.now();

        let minted = result
            .map_err(|e| e.to_string())
            .and_then(|token| {
                token
                    .into_credential(now, self.policy.default_ttl_delta(), &slot.credentials.scope)
                    .map_err(|e| e.to_string())
            });

        let outcome = {
            let mut state = slot.lock();
            let current = state.credential.clone();
            let current_valid = current.clone().filter(|c| !c.is_expired_at(now));

            let outcome: std::result::Result<Arc<Credential>, Arc<str>> = match minted {
                Ok(credential) => {
                    let is_newer = current
                        .as_ref()
                        .is_none_or(|c| credential.expires_at() > c.expires_at());
                    if is_newer {
                        let credential = Arc::new(credential);
                        state.credential = Some(Arc::clone(&credential));
                        self.counters.acquisitions.fetch_add(1, Ordering::Relaxed);
                        ldebug!(
                            "system",
                            LogStage::Cache,
                            LogComponent::CredentialStore,
                            "refresh",
                            &format!(
                                "凭据已刷新: identity={identity}, expires_at={}",
                                credential.expires_at()
                            )
                        );
                        Ok(credential)
                    } else {
                        self.counters.rejected_stale.fetch_add(1, Ordering::Relaxed);
                        lwarn!(
                            "system",
                            LogStage::Cache,
                            LogComponent::CredentialStore,
                            "refresh_rejected",
                            &format!(
                                "拒绝过期时间未更晚的令牌响应: identity={identity}, new_expires_at={}",
                                credential.expires_at()
                            )
                        );
                        current_valid.ok_or_else(|| Arc::from("令牌响应早于当前凭据"))
                    }
                }
                Err(reason) => {
                    self.counters.failures.fetch_add(1, Ordering::Relaxed);
                    let serving = if current_valid.is_some() {
                        "继续使用当前凭据"
                    } else {
                        "无可用凭据"
                    };
                    lwarn!(
                        "system",
                        LogStage::ExternalApi,
                        LogComponent::CredentialStore,
                        "refresh_failed",
                        &format!("令牌获取失败: identity={identity}, reason={reason}, {serving}")
                    );
                    Err(Arc::from(reason))
                }
            };

            if state.in_flight.as_ref().is_some_and(|f| f.id == refresh_id) {
                state.in_flight = None;
            }
            outcome
        };

        sender.send_replace(Some(outcome));
    }
}
