//! 漏斗事件查询索引
//!
//! - (offer_id, event_type): 按类型计数
//! - (offer_id, created_at): 按小时聚合、第 N 次领取定位

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_offer_events_offer_type")
                    .table(OfferEvents::Table)
                    .col(OfferEvents::OfferId)
                    .col(OfferEvents::EventType)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_offer_events_offer_time")
                    .table(OfferEvents::Table)
                    .col(OfferEvents::OfferId)
                    .col(OfferEvents::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_offer_events_offer_time").to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_offer_events_offer_type").to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum OfferEvents {
    #[sea_orm(iden = "offer_events")]
    Table,
    OfferId,
    EventType,
    CreatedAt,
}
