//! A user's reservation against an offer's capacity

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "offer_claims")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub offer_id: String,
    pub user_id: String,
    /// Redemption code shown to the user, unique system-wide
    pub token: String,
    /// active | redeemed | expired
    pub status: String,
    pub redeemed_at: Option<DateTimeUtc>,
    pub redeemed_by: Option<String>,
    pub expires_at: DateTimeUtc,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
