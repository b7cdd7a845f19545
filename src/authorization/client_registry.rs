//! # 注册客户端存储
//!
//! 授权服务器查询已注册客户端的持久化实现。
//! 查找未命中返回 `None`；写入不存在的行返回 `NotFound`；
//! `client_id` 已绑定到其他 ID 时返回 `Conflict`（事务内检查，唯一索引兜底）。

use bcrypt::{hash, verify};
use chrono::Utc;
use entity::oauth2_registered_client::{self, Entity as RegisteredClients};
use sea_orm::sea_query::{Expr, LikeExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use super::pagination::{Page, PageRequest};
use super::types::{ClientFilter, RegisteredClient, RegisteredClientDraft, auth_method, encode_set};
use crate::config::AuthorizationConfig;
use crate::credentials::SecretString;
use crate::error::{Context, DatabaseError, Result, TrustError};
use crate::{ensure, linfo, lwarn, logging::{LogComponent, LogStage}};

const RESOURCE: &str = "registered_client";

/// 注册客户端存储
#[derive(Debug, Clone)]
pub struct ClientRegistry {
    db: DatabaseConnection,
    secret_hash_cost: u32,
    default_page_size: u64,
    max_page_size: u64,
}

impl ClientRegistry {
    pub fn new(db: DatabaseConnection, config: &AuthorizationConfig) -> Self {
        Self {
            db,
            secret_hash_cost: config.secret_hash_cost,
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        }
    }

    /// 按配置的默认值与上限构造分页请求
    #[must_use]
    pub fn page_request(&self, page: Option<u64>, limit: Option<u64>) -> PageRequest {
        PageRequest::new(page, limit, self.default_page_size, self.max_page_size)
    }

    /// 按内部 ID 查找
    pub async fn find_by_id(&self, id: &str) -> Result<Option<RegisteredClient>> {
        RegisteredClients::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .context("查询注册客户端失败")?
            .map(RegisteredClient::try_from)
            .transpose()
    }

    /// 按公开的 client_id 查找
    pub async fn find_by_client_id(&self, client_id: &str) -> Result<Option<RegisteredClient>> {
        RegisteredClients::find()
            .filter(oauth2_registered_client::Column::ClientId.eq(client_id))
            .one(&self.db)
            .await
            .context("查询注册客户端失败")?
            .map(RegisteredClient::try_from)
            .transpose()
    }

    /// 注册新客户端
    pub async fn add(&self, draft: RegisteredClientDraft) -> Result<RegisteredClient> {
        validate_draft(&draft)?;

        let id = draft
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let secret_hash = self.hash_secret(draft.client_secret.as_ref())?;
        let now = Utc::now().naive_utc();

        let txn = self.db.begin().await.map_err(transaction_error)?;

        if let Some(existing) = find_model_by_client_id(&txn, &draft.client_id).await? {
            return Err(TrustError::conflict(
                RESOURCE,
                format!("client_id={} (id={})", draft.client_id, existing.id),
            ));
        }
        if RegisteredClients::find_by_id(id.clone())
            .one(&txn)
            .await
            .context("查询注册客户端失败")?
            .is_some()
        {
            return Err(TrustError::conflict(RESOURCE, format!("id={id}")));
        }

        let model = oauth2_registered_client::ActiveModel {
            id: Set(id.clone()),
            client_id: Set(draft.client_id.clone()),
            client_id_issued_at: Set(now),
            client_secret: Set(secret_hash),
            client_secret_expires_at: Set(draft.client_secret_expires_at.map(|t| t.naive_utc())),
            client_name: Set(draft.client_name.clone()),
            client_authentication_methods: Set(encode_set(&authentication_methods(&draft))?),
            authorization_grant_types: Set(encode_set(&draft.authorization_grant_types)?),
            redirect_uris: Set(encode_set(&draft.redirect_uris)?),
            post_logout_redirect_uris: Set(encode_set(&draft.post_logout_redirect_uris)?),
            scopes: Set(encode_set(&draft.scopes)?),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| DatabaseError::classify(e, RESOURCE, &draft.client_id))?;

        txn.commit().await.map_err(transaction_error)?;

        linfo!(
            "system",
            LogStage::Db,
            LogComponent::ClientRegistry,
            "add",
            &format!("注册客户端已创建: id={id}, client_id={}", draft.client_id)
        );
        RegisteredClient::try_from(model)
    }

    /// 更新客户端；草稿未提供密钥时保留原密钥
    ///
    /// 已停用的客户端只有在草稿给出新的 `client_secret_expires_at` 时才会重新启用。
    pub async fn update(&self, id: &str, draft: RegisteredClientDraft) -> Result<RegisteredClient> {
        validate_draft(&draft)?;
        let secret_hash = self.hash_secret(draft.client_secret.as_ref())?;

        let txn = self.db.begin().await.map_err(transaction_error)?;

        let existing = RegisteredClients::find_by_id(id.to_string())
            .one(&txn)
            .await
            .context("查询注册客户端失败")?
            .ok_or_else(|| TrustError::not_found(RESOURCE, id))?;

        let bound_elsewhere = find_model_by_client_id(&txn, &draft.client_id)
            .await?
            .filter(|other| other.id != existing.id);
        if let Some(other) = bound_elsewhere {
            return Err(TrustError::conflict(
                RESOURCE,
                format!("client_id={} (id={})", draft.client_id, other.id),
            ));
        }

        let now = Utc::now().naive_utc();
        let retired = existing.is_secret_expired_at(now);

        let mut active = existing.into_active_model();
        active.client_id = Set(draft.client_id.clone());
        if secret_hash.is_some() {
            active.client_secret = Set(secret_hash);
        }
        if draft.client_secret_expires_at.is_some() || !retired {
            active.client_secret_expires_at =
                Set(draft.client_secret_expires_at.map(|t| t.naive_utc()));
        }
        active.client_name = Set(draft.client_name.clone());
        active.client_authentication_methods = Set(encode_set(&authentication_methods(&draft))?);
        active.authorization_grant_types = Set(encode_set(&draft.authorization_grant_types)?);
        active.redirect_uris = Set(encode_set(&draft.redirect_uris)?);
        active.post_logout_redirect_uris = Set(encode_set(&draft.post_logout_redirect_uris)?);
        active.scopes = Set(encode_set(&draft.scopes)?);
        active.updated_at = Set(now);

        let model = active
            .update(&txn)
            .await
            .map_err(|e| DatabaseError::classify(e, RESOURCE, &draft.client_id))?;

        txn.commit().await.map_err(transaction_error)?;

        linfo!(
            "system",
            LogStage::Db,
            LogComponent::ClientRegistry,
            "update",
            &format!("注册客户端已更新: id={id}, client_id={}", draft.client_id)
        );
        RegisteredClient::try_from(model)
    }

    /// 逻辑停用：把密钥过期时间设为当前时刻，已停用的客户端保持不变
    pub async fn disable(&self, id: &str) -> Result<RegisteredClient> {
        let existing = RegisteredClients::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .context("查询注册客户端失败")?
            .ok_or_else(|| TrustError::not_found(RESOURCE, id))?;

        let now = Utc::now().naive_utc();
        if existing.is_secret_expired_at(now) {
            return RegisteredClient::try_from(existing);
        }

        let mut active = existing.into_active_model();
        active.client_secret_expires_at = Set(Some(now));
        active.updated_at = Set(now);
        let model = active.update(&self.db).await.context("停用注册客户端失败")?;

        linfo!(
            "system",
            LogStage::Db,
            LogComponent::ClientRegistry,
            "disable",
            &format!("注册客户端已停用: id={id}, client_id={}", model.client_id)
        );
        RegisteredClient::try_from(model)
    }

    /// 分页查询
    pub async fn query(
        &self,
        filter: &ClientFilter,
        page: PageRequest,
    ) -> Result<Page<RegisteredClient>> {
        let page = PageRequest::new(
            Some(page.page),
            Some(page.limit),
            self.default_page_size,
            self.max_page_size,
        );
        let select = filtered_clients(filter)?;

        let total = select
            .clone()
            .count(&self.db)
            .await
            .context("统计注册客户端失败")?;

        let models = select
            .order_by_asc(oauth2_registered_client::Column::ClientId)
            .offset(page.offset())
            .limit(page.limit)
            .all(&self.db)
            .await
            .context("查询注册客户端失败")?;

        let items = models
            .into_iter()
            .map(RegisteredClient::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page::new(items, total, page))
    }

    /// 旧的统一保存入口，已拆分为 `add` 与 `update`
    pub async fn save(&self, client: &RegisteredClient) -> Result<()> {
        lwarn!(
            "system",
            LogStage::Db,
            LogComponent::ClientRegistry,
            "save_unsupported",
            &format!("拒绝 save 调用: client_id={}", client.client_id)
        );
        Err(TrustError::unsupported(
            "ClientRegistry::save，请使用 add 或 update",
        ))
    }

    /// 校验客户端密钥；停用、过期或公共客户端一律返回 false
    pub fn verify_secret(&self, client: &RegisteredClient, raw_secret: &str) -> bool {
        if !client.is_active(Utc::now()) {
            return false;
        }
        let Some(hashed) = client.client_secret.as_ref() else {
            return false;
        };

        verify(raw_secret, hashed.expose()).unwrap_or_else(|e| {
            lwarn!(
                "system",
                LogStage::Authentication,
                LogComponent::ClientRegistry,
                "verify_secret",
                &format!("密钥校验失败: client_id={}, reason={e}", client.client_id)
            );
            false
        })
    }

    fn hash_secret(&self, secret: Option<&SecretString>) -> Result<Option<String>> {
        secret
            .filter(|s| !s.is_empty())
            .map(|s| hash(s.expose(), self.secret_hash_cost).map_err(TrustError::from))
            .transpose()
    }
}

async fn find_model_by_client_id<C: ConnectionTrait>(
    conn: &C,
    client_id: &str,
) -> Result<Option<oauth2_registered_client::Model>> {
    RegisteredClients::find()
        .filter(oauth2_registered_client::Column::ClientId.eq(client_id))
        .one(conn)
        .await
        .context("查询注册客户端失败")
}

fn filtered_clients(filter: &ClientFilter) -> Result<sea_orm::Select<RegisteredClients>> {
    let mut select = RegisteredClients::find();

    if let Some(client_id) = filter.client_id.as_deref().filter(|s| !s.is_empty()) {
        select = select.filter(oauth2_registered_client::Column::ClientId.eq(client_id));
    }
    if let Some(name) = filter.client_name.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        select = select.filter(
            Expr::col(oauth2_registered_client::Column::ClientName).like(contains_literal(name)),
        );
    }
    if let Some(grant_type) = filter.grant_type.as_deref().filter(|s| !s.is_empty()) {
        // 授权类型列存储 JSON 数组，按编码后的完整元素匹配
        let element = serde_json::to_string(grant_type)?;
        select = select.filter(
            Expr::col(oauth2_registered_client::Column::AuthorizationGrantTypes)
                .like(contains_literal(&element)),
        );
    }
    if !filter.include_disabled {
        select = select.filter(
            Condition::any()
                .add(oauth2_registered_client::Column::ClientSecretExpiresAt.is_null())
                .add(oauth2_registered_client::Column::ClientSecretExpiresAt.gt(Utc::now().naive_utc())),
        );
    }

    Ok(select)
}

/// 子串匹配，`%`、`_` 与转义符按字面处理
fn contains_literal(fragment: &str) -> LikeExpr {
    let mut pattern = String::with_capacity(fragment.len() + 2);
    pattern.push('%');
    for c in fragment.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    LikeExpr::new(pattern).escape('\\')
}

fn validate_draft(draft: &RegisteredClientDraft) -> Result<()> {
    ensure!(
        !draft.client_id.trim().is_empty(),
        TrustError::invalid_request("client_id 不能为空")
    );
    ensure!(
        !draft.client_name.trim().is_empty(),
        TrustError::invalid_request("client_name 不能为空")
    );
    ensure!(
        !draft.authorization_grant_types.is_empty(),
        TrustError::invalid_request("至少需要一种授权类型")
    );
    Ok(())
}

/// 未指定认证方式时按是否有密钥推断
fn authentication_methods(draft: &RegisteredClientDraft) -> std::collections::BTreeSet<String> {
    if !draft.client_authentication_methods.is_empty() {
        return draft.client_authentication_methods.clone();
    }
    let method = if draft.client_secret.as_ref().is_some_and(|s| !s.is_empty()) {
        auth_method::CLIENT_SECRET_BASIC
    } else {
        auth_method::NONE
    };
    std::collections::BTreeSet::from([method.to_string()])
}

fn transaction_error(err: sea_orm::DbErr) -> TrustError {
    DatabaseError::Transaction(err.to_string()).into()
}
