//! Flash offer published by a venue

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "offers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub venue_id: String,
    pub title: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub value_cap: Option<String>,
    pub max_claims: i32,
    pub claimed_count: i32,
    pub start_time: DateTimeUtc,
    pub end_time: DateTimeUtc,
    pub radius_km: f64,
    pub favorites_only: bool,
    /// scheduled | active | expired | cancelled | full
    pub status: String,
    pub push_sent: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
