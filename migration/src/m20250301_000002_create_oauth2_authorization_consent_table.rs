use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 创建 oauth2_authorization_consent 表 - 复合主键保证 upsert 语义
        manager
            .create_table(
                Table::create()
                    .table(OAuth2AuthorizationConsent::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OAuth2AuthorizationConsent::RegisteredClientId)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2AuthorizationConsent::PrincipalName)
                            .string_len(200)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2AuthorizationConsent::Authorities)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2AuthorizationConsent::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(OAuth2AuthorizationConsent::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .name("pk_oauth2_authorization_consent")
                            .col(OAuth2AuthorizationConsent::RegisteredClientId)
                            .col(OAuth2AuthorizationConsent::PrincipalName),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_oauth2_authorization_consent_registered_client_id")
                            .from(
                                OAuth2AuthorizationConsent::Table,
                                OAuth2AuthorizationConsent::RegisteredClientId,
                            )
                            .to(OAuth2RegisteredClient::Table, OAuth2RegisteredClient::Id)
                            .on_update(ForeignKeyAction::Cascade)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 按主体查询所有授权同意
        manager
            .create_index(
                Index::create()
                    .name("idx_oauth2_authorization_consent_principal_name")
                    .table(OAuth2AuthorizationConsent::Table)
                    .col(OAuth2AuthorizationConsent::PrincipalName)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(OAuth2AuthorizationConsent::Table)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum OAuth2AuthorizationConsent {
    #[sea_orm(iden = "oauth2_authorization_consent")]
    Table,
    RegisteredClientId,
    PrincipalName,
    Authorities,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum OAuth2RegisteredClient {
    #[sea_orm(iden = "oauth2_registered_client")]
    Table,
    Id,
}
