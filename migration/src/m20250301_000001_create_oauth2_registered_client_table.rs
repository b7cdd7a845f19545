use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 创建 oauth2_registered_client 表 - 存储授权服务器注册的客户端
        manager
            .create_table(
                Table::create()
                    .table(OAuth2RegisteredClient::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OAuth2RegisteredClient::Id)
                            .string_len(100)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OAuth2RegisteredClient::ClientId)
                            .string_len(100)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(OAuth2RegisteredClient::ClientIdIssuedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(OAuth2RegisteredClient::ClientSecret).string_len(200))
                    .col(ColumnDef::new(OAuth2RegisteredClient::ClientSecretExpiresAt).timestamp())
                    .col(
                        ColumnDef::new(OAuth2RegisteredClient::ClientName)
                            .string_len(200)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2RegisteredClient::ClientAuthenticationMethods)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2RegisteredClient::AuthorizationGrantTypes)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2RegisteredClient::RedirectUris)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(
                        ColumnDef::new(OAuth2RegisteredClient::PostLogoutRedirectUris)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(
                        ColumnDef::new(OAuth2RegisteredClient::Scopes)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(
                        ColumnDef::new(OAuth2RegisteredClient::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(OAuth2RegisteredClient::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_oauth2_registered_client_client_name")
                    .table(OAuth2RegisteredClient::Table)
                    .col(OAuth2RegisteredClient::ClientName)
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
                    .table(OAuth2RegisteredClient::Table)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum OAuth2RegisteredClient {
    #[sea_orm(iden = "oauth2_registered_client")]
    Table,
    Id,
    ClientId,
    ClientIdIssuedAt,
    ClientSecret,
    ClientSecretExpiresAt,
    ClientName,
    ClientAuthenticationMethods,
    AuthorizationGrantTypes,
    RedirectUris,
    PostLogoutRedirectUris,
    Scopes,
    CreatedAt,
    UpdatedAt,
}
