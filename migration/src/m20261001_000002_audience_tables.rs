//! 受众相关表（场馆、收藏、签到、推送设备）
//!
//! 这些表由社交服务写入，本服务只读取，用于定向和到店校验。

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Venues::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Venues::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Venues::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Venues::Latitude).double().null())
                    .col(ColumnDef::new(Venues::Longitude).double().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(VenueFavorites::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VenueFavorites::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(VenueFavorites::UserId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VenueFavorites::VenueId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VenueFavorites::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .unique()
                    .name("uq_venue_favorites_user_venue")
                    .table(VenueFavorites::Table)
                    .col(VenueFavorites::VenueId)
                    .col(VenueFavorites::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CheckIns::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CheckIns::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CheckIns::UserId).string_len(64).not_null())
                    .col(ColumnDef::new(CheckIns::VenueId).string_len(64).not_null())
                    .col(
                        ColumnDef::new(CheckIns::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(CheckIns::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 定向查询：按场馆 + 时间范围扫描签到
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_check_ins_venue_time")
                    .table(CheckIns::Table)
                    .col(CheckIns::VenueId)
                    .col(CheckIns::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DeviceTokens::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeviceTokens::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DeviceTokens::UserId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(DeviceTokens::Token).text().not_null())
                    .col(
                        ColumnDef::new(DeviceTokens::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(DeviceTokens::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_device_tokens_user")
                    .table(DeviceTokens::Table)
                    .col(DeviceTokens::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeviceTokens::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CheckIns::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(VenueFavorites::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Venues::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Venues {
    #[sea_orm(iden = "venues")]
    Table,
    Id,
    Name,
    Latitude,
    Longitude,
}

#[derive(DeriveIden)]
enum VenueFavorites {
    #[sea_orm(iden = "venue_favorites")]
    Table,
    Id,
    UserId,
    VenueId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum CheckIns {
    #[sea_orm(iden = "check_ins")]
    Table,
    Id,
    UserId,
    VenueId,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
enum DeviceTokens {
    #[sea_orm(iden = "device_tokens")]
    Table,
    Id,
    UserId,
    Token,
    IsActive,
    UpdatedAt,
}
