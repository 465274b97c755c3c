//! Migration to create the discord_connections table.
//!
//! Each row links exactly one principal to exactly one Discord account. Both
//! sides of the link are unique so the storage layer rejects a second row for
//! either the principal or the Discord account.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DiscordConnections::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DiscordConnections::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DiscordConnections::PrincipalId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DiscordConnections::DiscordId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DiscordConnections::Nickname)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DiscordConnections::AccessToken)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DiscordConnections::RefreshToken)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(DiscordConnections::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(DiscordConnections::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(DiscordConnections::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_discord_connections_principal_id")
                            .from(DiscordConnections::Table, DiscordConnections::PrincipalId)
                            .to(Principals::Table, Principals::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_discord_connections_discord_id")
                    .table(DiscordConnections::Table)
                    .col(DiscordConnections::DiscordId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_discord_connections_principal_id")
                    .table(DiscordConnections::Table)
                    .col(DiscordConnections::PrincipalId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_discord_connections_discord_id")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_discord_connections_principal_id")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(DiscordConnections::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum DiscordConnections {
    Table,
    Id,
    PrincipalId,
    DiscordId,
    Nickname,
    AccessToken,
    RefreshToken,
    ExpiresAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Principals {
    Table,
    Id,
}
