//! # 授权同意存储
//!
//! 以 (registered_client_id, principal_name) 为键的授权同意记录。
//! `save` 为原子 upsert，`remove` 幂等。

use chrono::Utc;
use entity::oauth2_authorization_consent::{self, Entity as Consents};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, Set, SqlErr};

use super::types::{Consent, encode_set};
use crate::error::{Context, Result, TrustError};
use crate::{ldebug, logging::{LogComponent, LogStage}};

/// 授权同意存储
#[derive(Debug, Clone)]
pub struct ConsentStore {
    db: DatabaseConnection,
}

impl ConsentStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// 保存（插入或覆盖）授权同意；不含任何权限的同意等同于删除
    pub async fn save(&self, consent: &Consent) -> Result<()> {
        if consent.authorities.is_empty() {
            return self.remove(consent).await;
        }

        let now = Utc::now().naive_utc();
        let model = oauth2_authorization_consent::ActiveModel {
            registered_client_id: Set(consent.registered_client_id.clone()),
            principal_name: Set(consent.principal_name.clone()),
            authorities: Set(encode_set(&consent.authorities)?),
            created_at: Set(now),
            updated_at: Set(now),
        };

        Consents::insert(model)
            .on_conflict(
                OnConflict::columns([
                    oauth2_authorization_consent::Column::RegisteredClientId,
                    oauth2_authorization_consent::Column::PrincipalName,
                ])
                .update_columns([
                    oauth2_authorization_consent::Column::Authorities,
                    oauth2_authorization_consent::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(|e| map_write_error(e, consent))?;

        ldebug!(
            "system",
            LogStage::Db,
            LogComponent::ConsentStore,
            "save",
            &format!(
                "授权同意已保存: client={}, principal={}, authorities={}",
                consent.registered_client_id,
                consent.principal_name,
                consent.authorities.len()
            )
        );
        Ok(())
    }

    /// 删除授权同意，不存在时无操作
    pub async fn remove(&self, consent: &Consent) -> Result<()> {
        let result = Consents::delete_by_id((
            consent.registered_client_id.clone(),
            consent.principal_name.clone(),
        ))
        .exec(&self.db)
        .await
        .context("删除授权同意失败")?;

        ldebug!(
            "system",
            LogStage::Db,
            LogComponent::ConsentStore,
            "remove",
            &format!(
                "授权同意删除: client={}, principal={}, rows={}",
                consent.registered_client_id, consent.principal_name, result.rows_affected
            )
        );
        Ok(())
    }

    pub async fn find_by_id(
        &self,
        registered_client_id: &str,
        principal_name: &str,
    ) -> Result<Option<Consent>> {
        Consents::find_by_id((registered_client_id.to_string(), principal_name.to_string()))
            .one(&self.db)
            .await
            .context("查询授权同意失败")?
            .map(Consent::try_from)
            .transpose()
    }

    /// 某个主体授予过的全部同意
    pub async fn list_by_principal(&self, principal_name: &str) -> Result<Vec<Consent>> {
        Consents::find()
            .filter(oauth2_authorization_consent::Column::PrincipalName.eq(principal_name))
            .order_by_asc(oauth2_authorization_consent::Column::RegisteredClientId)
            .all(&self.db)
            .await
            .context("查询授权同意失败")?
            .into_iter()
            .map(Consent::try_from)
            .collect()
    }

    /// 删除某个客户端的全部同意，返回删除行数
    pub async fn remove_all_for_client(&self, registered_client_id: &str) -> Result<u64> {
        let result = Consents::delete_many()
            .filter(oauth2_authorization_consent::Column::RegisteredClientId.eq(registered_client_id))
            .exec(&self.db)
            .await
            .context("删除授权同意失败")?;
        Ok(result.rows_affected)
    }
}

/// 外键失败说明客户端不存在
fn map_write_error(err: DbErr, consent: &Consent) -> TrustError {
    match err.sql_err() {
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
            TrustError::not_found("registered_client", consent.registered_client_id.clone())
        }
        _ => TrustError::database_with_source("保存授权同意失败", err),
    }
}
