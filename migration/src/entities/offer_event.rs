//! Append-only funnel event log (push_sent / view / claim / redeem)

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "offer_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub offer_id: String,
    pub user_id: Option<String>,
    pub event_type: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub metadata: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
