//! 发布额度的滚动窗口
//!
//! 每个场馆按子窗口记录发布次数，窗口只增不减。

use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ColumnTrait, EntityTrait, ExprTrait, QueryFilter, QueryOrder, sea_query::Expr,
};
use tracing::debug;

use super::SeaOrmStorage;
use super::converters::model_to_window;
use crate::errors::Result;
use crate::storage::models::RateLimitWindow;

use migration::entities::rate_limit_window;

pub const OFFER_PUBLISH: &str = "offer_publish";

impl SeaOrmStorage {
    /// `since` 之后开启的窗口，按开始时间升序
    pub async fn list_rate_windows(
        &self,
        venue_id: &str,
        limit_type: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<RateLimitWindow>> {
        let models = rate_limit_window::Entity::find()
            .filter(rate_limit_window::Column::VenueId.eq(venue_id))
            .filter(rate_limit_window::Column::LimitType.eq(limit_type))
            .filter(rate_limit_window::Column::WindowStart.gt(since))
            .order_by_asc(rate_limit_window::Column::WindowStart)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(model_to_window).collect())
    }

    /// 记录一次发布
    ///
    /// 最新窗口开启不足 `sub_window` 时累加，否则以 `now` 开启新窗口。
    pub async fn increment_rate_window(
        &self,
        venue_id: &str,
        limit_type: &str,
        now: DateTime<Utc>,
        sub_window: Duration,
    ) -> Result<()> {
        let latest = rate_limit_window::Entity::find()
            .filter(rate_limit_window::Column::VenueId.eq(venue_id))
            .filter(rate_limit_window::Column::LimitType.eq(limit_type))
            .filter(rate_limit_window::Column::WindowStart.gt(now - sub_window))
            .order_by_desc(rate_limit_window::Column::WindowStart)
            .one(&self.db)
            .await?;

        if let Some(window) = latest {
            rate_limit_window::Entity::update_many()
                .col_expr(
                    rate_limit_window::Column::Count,
                    Expr::col(rate_limit_window::Column::Count).add(1),
                )
                .filter(rate_limit_window::Column::Id.eq(window.id))
                .exec(&self.db)
                .await?;
            debug!(
                "Rate window {} for venue {} incremented",
                window.id, venue_id
            );
            return Ok(());
        }

        use sea_orm::ActiveValue::*;
        rate_limit_window::Entity::insert(rate_limit_window::ActiveModel {
            id: NotSet,
            venue_id: Set(venue_id.to_string()),
            limit_type: Set(limit_type.to_string()),
            window_start: Set(now),
            count: Set(1),
        })
        .exec(&self.db)
        .await?;
        debug!("Rate window opened for venue {} at {}", venue_id, now);
        Ok(())
    }
}
