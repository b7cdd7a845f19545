//! # 注册客户端实体定义
//!
//! 授权服务器已注册 OAuth2 客户端表的 Sea-ORM 实体模型。
//! 集合类字段（认证方式、授权类型、回调地址、作用域）以 JSON 数组文本存储。

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 注册客户端实体
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "oauth2_registered_client")]
pub struct Model {
    /// 内部 ID
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// 对外公开的 client_id
    #[sea_orm(unique)]
    pub client_id: String,
    pub client_id_issued_at: DateTime,
    /// bcrypt 哈希后的密钥，公共客户端为空
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,
    pub client_secret_expires_at: Option<DateTime>,
    pub client_name: String,
    #[sea_orm(column_type = "Text")]
    pub client_authentication_methods: String,
    #[sea_orm(column_type = "Text")]
    pub authorization_grant_types: String,
    #[sea_orm(column_type = "Text")]
    pub redirect_uris: String,
    #[sea_orm(column_type = "Text")]
    pub post_logout_redirect_uris: String,
    #[sea_orm(column_type = "Text")]
    pub scopes: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::oauth2_authorization_consent::Entity")]
    AuthorizationConsent,
}

impl Related<super::oauth2_authorization_consent::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AuthorizationConsent.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// 注册客户端辅助方法
impl Model {
    /// 密钥是否已在给定时间点过期（被停用的客户端同样视为过期）
    pub fn is_secret_expired_at(&self, now: DateTime) -> bool {
        self.client_secret_expires_at
            .is_some_and(|expires_at| expires_at <= now)
    }
}
