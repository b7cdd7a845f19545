//! # 授权同意实体定义
//!
//! 以 (registered_client_id, principal_name) 为复合主键的用户授权同意记录。

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 授权同意实体
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "oauth2_authorization_consent")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub registered_client_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub principal_name: String,
    /// 已授予权限的 JSON 数组，作用域以 `SCOPE_` 前缀表示
    #[sea_orm(column_type = "Text")]
    pub authorities: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::oauth2_registered_client::Entity",
        from = "Column::RegisteredClientId",
        to = "super::oauth2_registered_client::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    RegisteredClient,
}

impl Related<super::oauth2_registered_client::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RegisteredClient.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
