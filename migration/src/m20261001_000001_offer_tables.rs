//! Flash offer 核心表迁移
//!
//! 创建以下表：
//! - offers: 优惠活动（容量上限、时间窗口、定向方式）
//! - offer_claims: 用户领取记录（每个 offer/user 至多一条）
//! - offer_events: 漏斗事件日志（只追加）
//! - rate_limit_windows: 场馆发布频率窗口

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Offers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Offers::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Offers::VenueId).string_len(64).not_null())
                    .col(ColumnDef::new(Offers::Title).string_len(255).not_null())
                    .col(ColumnDef::new(Offers::Description).text().null())
                    .col(ColumnDef::new(Offers::ValueCap).string_len(255).null())
                    .col(ColumnDef::new(Offers::MaxClaims).integer().not_null())
                    .col(
                        ColumnDef::new(Offers::ClaimedCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Offers::StartTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Offers::EndTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Offers::RadiusKm).double().not_null())
                    .col(
                        ColumnDef::new(Offers::FavoritesOnly)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Offers::Status).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Offers::PushSent)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Offers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Offers::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 场馆列表查询（按创建时间倒序）
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_offers_venue_created")
                    .table(Offers::Table)
                    .col(Offers::VenueId)
                    .col(Offers::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_offers_status_window")
                    .table(Offers::Table)
                    .col(Offers::Status)
                    .col(Offers::StartTime)
                    .col(Offers::EndTime)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OfferClaims::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OfferClaims::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OfferClaims::OfferId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(OfferClaims::UserId).string_len(64).not_null())
                    .col(ColumnDef::new(OfferClaims::Token).string_len(16).not_null())
                    .col(ColumnDef::new(OfferClaims::Status).string_len(16).not_null())
                    .col(
                        ColumnDef::new(OfferClaims::RedeemedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OfferClaims::RedeemedBy)
                            .string_len(64)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OfferClaims::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OfferClaims::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 每个用户对同一 offer 至多一条领取记录
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .unique()
                    .name("uq_offer_claims_offer_user")
                    .table(OfferClaims::Table)
                    .col(OfferClaims::OfferId)
                    .col(OfferClaims::UserId)
                    .to_owned(),
            )
            .await?;

        // 核销码全局唯一
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .unique()
                    .name("uq_offer_claims_token")
                    .table(OfferClaims::Table)
                    .col(OfferClaims::Token)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_offer_claims_user")
                    .table(OfferClaims::Table)
                    .col(OfferClaims::UserId)
                    .col(OfferClaims::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OfferEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OfferEvents::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OfferEvents::OfferId).string_len(64).not_null())
                    .col(ColumnDef::new(OfferEvents::UserId).string_len(64).null())
                    .col(
                        ColumnDef::new(OfferEvents::EventType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(OfferEvents::Metadata).text().null())
                    .col(
                        ColumnDef::new(OfferEvents::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RateLimitWindows::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RateLimitWindows::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(RateLimitWindows::VenueId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RateLimitWindows::LimitType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RateLimitWindows::WindowStart)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RateLimitWindows::Count)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_rate_limit_windows_lookup")
                    .table(RateLimitWindows::Table)
                    .col(RateLimitWindows::VenueId)
                    .col(RateLimitWindows::LimitType)
                    .col(RateLimitWindows::WindowStart)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RateLimitWindows::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OfferEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OfferClaims::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Offers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Offers {
    #[sea_orm(iden = "offers")]
    Table,
    Id,
    VenueId,
    Title,
    Description,
    ValueCap,
    MaxClaims,
    ClaimedCount,
    StartTime,
    EndTime,
    RadiusKm,
    FavoritesOnly,
    Status,
    PushSent,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum OfferClaims {
    #[sea_orm(iden = "offer_claims")]
    Table,
    Id,
    OfferId,
    UserId,
    Token,
    Status,
    RedeemedAt,
    RedeemedBy,
    ExpiresAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum OfferEvents {
    #[sea_orm(iden = "offer_events")]
    Table,
    Id,
    OfferId,
    UserId,
    EventType,
    Metadata,
    CreatedAt,
}

#[derive(DeriveIden)]
enum RateLimitWindows {
    #[sea_orm(iden = "rate_limit_windows")]
    Table,
    Id,
    VenueId,
    LimitType,
    WindowStart,
    Count,
}
