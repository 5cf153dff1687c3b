//! 场馆、收藏、签到、推送设备
//!
//! 这些表由社交服务维护。读方法供定向和到店校验使用；
//! 写方法只用于数据导入和测试。

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};

use super::SeaOrmStorage;
use super::converters::model_to_venue;
use crate::errors::Result;
use crate::storage::models::Venue;

use migration::entities::{check_in, device_token, venue, venue_favorite};

impl SeaOrmStorage {
    pub async fn find_venue(&self, venue_id: &str) -> Result<Option<Venue>> {
        let model = venue::Entity::find_by_id(venue_id.to_string())
            .one(&self.db)
            .await?;
        Ok(model.map(model_to_venue))
    }

    /// 有坐标的场馆
    pub async fn list_located_venues(&self) -> Result<Vec<Venue>> {
        let models = venue::Entity::find()
            .filter(venue::Column::Latitude.is_not_null())
            .filter(venue::Column::Longitude.is_not_null())
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(model_to_venue).collect())
    }

    pub async fn find_venues(&self, venue_ids: &[String]) -> Result<HashMap<String, Venue>> {
        if venue_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let models = venue::Entity::find()
            .filter(venue::Column::Id.is_in(venue_ids.iter().cloned()))
            .all(&self.db)
            .await?;
        Ok(models
            .into_iter()
            .map(|m| {
                let v = model_to_venue(m);
                (v.id.clone(), v)
            })
            .collect())
    }

    /// 收藏了该场馆的用户（按收藏时间）
    pub async fn favorite_user_ids(&self, venue_id: &str) -> Result<Vec<String>> {
        venue_favorite::Entity::find()
            .select_only()
            .column(venue_favorite::Column::UserId)
            .filter(venue_favorite::Column::VenueId.eq(venue_id))
            .order_by_asc(venue_favorite::Column::CreatedAt)
            .into_tuple::<String>()
            .all(&self.db)
            .await
            .map_err(Into::into)
    }

    /// `since` 之后在这些场馆签到过的用户，最近的在前，可能重复
    pub async fn recent_check_in_user_ids(
        &self,
        venue_ids: &[String],
        since: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        if venue_ids.is_empty() {
            return Ok(Vec::new());
        }

        check_in::Entity::find()
            .select_only()
            .column(check_in::Column::UserId)
            .filter(check_in::Column::VenueId.is_in(venue_ids.iter().cloned()))
            .filter(check_in::Column::CreatedAt.gte(since))
            .order_by_desc(check_in::Column::CreatedAt)
            .into_tuple::<String>()
            .all(&self.db)
            .await
            .map_err(Into::into)
    }

    /// 用户在该场馆是否有 `since` 之后的有效签到
    pub async fn has_active_check_in(
        &self,
        user_id: &str,
        venue_id: &str,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        let count = check_in::Entity::find()
            .filter(check_in::Column::UserId.eq(user_id))
            .filter(check_in::Column::VenueId.eq(venue_id))
            .filter(check_in::Column::IsActive.eq(true))
            .filter(check_in::Column::CreatedAt.gte(since))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    /// 每个用户最新的有效推送 token
    pub async fn device_tokens_for(&self, user_ids: &[String]) -> Result<HashMap<String, String>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let models = device_token::Entity::find()
            .filter(device_token::Column::UserId.is_in(user_ids.iter().cloned()))
            .filter(device_token::Column::IsActive.eq(true))
            .order_by_asc(device_token::Column::UpdatedAt)
            .all(&self.db)
            .await?;

        // 升序遍历，后写入的覆盖先写入的
        let mut tokens = HashMap::with_capacity(models.len());
        for m in models {
            tokens.insert(m.user_id, m.token);
        }
        Ok(tokens)
    }

    // ============ 数据导入 ============

    pub async fn upsert_venue(&self, v: &Venue) -> Result<()> {
        use sea_orm::ActiveValue::*;
        use sea_orm::sea_query::OnConflict;

        venue::Entity::insert(venue::ActiveModel {
            id: Set(v.id.clone()),
            name: Set(v.name.clone()),
            latitude: Set(v.coordinates.map(|c| c.latitude)),
            longitude: Set(v.coordinates.map(|c| c.longitude)),
        })
        .on_conflict(
            OnConflict::column(venue::Column::Id)
                .update_columns([
                    venue::Column::Name,
                    venue::Column::Latitude,
                    venue::Column::Longitude,
                ])
                .to_owned(),
        )
        .exec(&self.db)
        .await?;
        Ok(())
    }

    pub async fn add_favorite(&self, user_id: &str, venue_id: &str) -> Result<()> {
        use sea_orm::ActiveValue::*;
        use sea_orm::sea_query::OnConflict;

        let result = venue_favorite::Entity::insert(venue_favorite::ActiveModel {
            id: NotSet,
            user_id: Set(user_id.to_string()),
            venue_id: Set(venue_id.to_string()),
            created_at: Set(Utc::now()),
        })
        .on_conflict(
            OnConflict::columns([venue_favorite::Column::VenueId, venue_favorite::Column::UserId])
                .do_nothing()
                .to_owned(),
        )
        .exec(&self.db)
        .await;

        match result {
            Ok(_) | Err(sea_orm::DbErr::RecordNotInserted) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn record_check_in(
        &self,
        user_id: &str,
        venue_id: &str,
        at: DateTime<Utc>,
        is_active: bool,
    ) -> Result<()> {
        use sea_orm::ActiveValue::*;

        check_in::Entity::insert(check_in::ActiveModel {
            id: NotSet,
            user_id: Set(user_id.to_string()),
            venue_id: Set(venue_id.to_string()),
            is_active: Set(is_active),
            created_at: Set(at),
        })
        .exec(&self.db)
        .await?;
        Ok(())
    }

    pub async fn register_device_token(&self, user_id: &str, token: &str) -> Result<()> {
        use sea_orm::ActiveValue::*;

        device_token::Entity::insert(device_token::ActiveModel {
            id: NotSet,
            user_id: Set(user_id.to_string()),
            token: Set(token.to_string()),
            is_active: Set(true),
            updated_at: Set(Utc::now()),
        })
        .exec(&self.db)
        .await?;
        Ok(())
    }
}
