//! Offer 读写
//!
//! 状态字段的写入全部是 compare-and-set（`WHERE status = <old>`），
//! 多实例同时刷新同一 offer 时只有一个会生效，其余无副作用。

use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, sea_query::Expr,
};
use tracing::{debug, error, info};

use super::converters::{model_to_offer, offer_to_active_model};
use super::{SeaOrmStorage, retry};
use crate::errors::{FlashOfferError, Result};
use crate::storage::models::{Offer, OfferStatus};

use migration::entities::offer;

/// 场馆 offer 列表过滤条件
#[derive(Default, Clone, Debug)]
pub struct OfferFilter {
    pub status: Option<OfferStatus>,
}

/// 当日 offer 查询条件
#[derive(Clone, Debug)]
pub struct SameDayFilter {
    pub day_start: DateTime<Utc>,
    pub day_end: DateTime<Utc>,
    pub venue_id: Option<String>,
    pub include_scheduled: bool,
}

/// 批量状态刷新的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusSync {
    pub activated: u64,
    pub expired: u64,
}

/// 尚未终结的状态（时间推进可能改变它们）
fn open_statuses() -> [&'static str; 2] {
    [OfferStatus::Scheduled.as_str(), OfferStatus::Active.as_str()]
}

impl SeaOrmStorage {
    pub async fn insert_offer(&self, o: &Offer) -> Result<()> {
        offer::Entity::insert(offer_to_active_model(o))
            .exec(&self.db)
            .await
            .map_err(|e| {
                FlashOfferError::database_operation(format!("创建 offer 失败: {}", e))
            })?;

        self.invalidate_count_cache();
        info!("Offer created: {} (venue {})", o.id, o.venue_id);
        Ok(())
    }

    pub async fn find_offer(&self, offer_id: &str) -> Result<Option<Offer>> {
        let model = offer::Entity::find_by_id(offer_id.to_string())
            .one(&self.db)
            .await?;
        Ok(model.map(model_to_offer))
    }

    /// 分页加载场馆的 offer（最新优先，带 COUNT 缓存和重试）
    pub async fn list_venue_offers(
        &self,
        venue_id: &str,
        filter: OfferFilter,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<Offer>, u64)> {
        let cache_key = format!("count:venue={}:s={:?}", venue_id, filter.status);

        let mut condition = Condition::all().add(offer::Column::VenueId.eq(venue_id));
        if let Some(status) = filter.status {
            condition = condition.add(offer::Column::Status.eq(status.as_str()));
        }

        let total = if let Some(cached) = self.count_cache.get(&cache_key) {
            debug!("count cache hit: key={}, value={}", cache_key, cached);
            cached
        } else {
            let db = &self.db;
            let cond = condition.clone();
            let count = retry::with_retry("list_venue_offers(count)", self.retry_config, || {
                let cond = cond.clone();
                async move { offer::Entity::find().filter(cond).count(db).await }
            })
            .await
            .map_err(|e| {
                error!("offer 计数失败（重试后仍失败）: {}", e);
                FlashOfferError::from(e)
            })?;
            self.count_cache.insert(cache_key, count);
            count
        };

        let db = &self.db;
        let page_offset = page.saturating_sub(1);
        let models = retry::with_retry("list_venue_offers(data)", self.retry_config, || {
            let cond = condition.clone();
            async move {
                offer::Entity::find()
                    .filter(cond)
                    .order_by_desc(offer::Column::CreatedAt)
                    .order_by_desc(offer::Column::Id)
                    .paginate(db, page_size)
                    .fetch_page(page_offset)
                    .await
            }
        })
        .await
        .map_err(|e| {
            error!("offer 分页查询失败（重试后仍失败）: {}", e);
            FlashOfferError::from(e)
        })?;

        Ok((models.into_iter().map(model_to_offer).collect(), total))
    }

    /// 当前时间窗口内、尚未终结的 offer
    ///
    /// 包含开始时间已过但仍标记为 scheduled 的行，由调用方刷新状态。
    pub async fn list_live_offers(&self, now: DateTime<Utc>) -> Result<Vec<Offer>> {
        let models = offer::Entity::find()
            .filter(offer::Column::Status.is_in(open_statuses()))
            .filter(offer::Column::StartTime.lte(now))
            .filter(offer::Column::EndTime.gt(now))
            .order_by_asc(offer::Column::EndTime)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(model_to_offer).collect())
    }

    /// 时间窗口与 [day_start, day_end) 相交的 offer，按开始时间排序
    pub async fn list_same_day_offers(&self, filter: &SameDayFilter) -> Result<Vec<Offer>> {
        let mut query = offer::Entity::find()
            .filter(offer::Column::StartTime.lt(filter.day_end))
            .filter(offer::Column::EndTime.gte(filter.day_start));

        query = if filter.include_scheduled {
            query.filter(offer::Column::Status.is_in(open_statuses()))
        } else {
            query.filter(offer::Column::Status.eq(OfferStatus::Active.as_str()))
        };

        if let Some(venue_id) = &filter.venue_id {
            query = query.filter(offer::Column::VenueId.eq(venue_id.as_str()));
        }

        let models = query
            .order_by_asc(offer::Column::StartTime)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(model_to_offer).collect())
    }

    /// 已开始但从未推送过的 offer
    pub async fn list_unpushed_live_offers(&self, now: DateTime<Utc>) -> Result<Vec<Offer>> {
        let models = offer::Entity::find()
            .filter(offer::Column::PushSent.eq(false))
            .filter(offer::Column::Status.is_in(open_statuses()))
            .filter(offer::Column::StartTime.lte(now))
            .filter(offer::Column::EndTime.gt(now))
            .order_by_asc(offer::Column::StartTime)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(model_to_offer).collect())
    }

    /// Compare-and-set 状态更新，返回是否由本次调用完成了变更
    pub async fn compare_and_set_offer_status(
        &self,
        offer_id: &str,
        from: OfferStatus,
        to: OfferStatus,
    ) -> Result<bool> {
        let result = offer::Entity::update_many()
            .col_expr(offer::Column::Status, Expr::value(to.as_str()))
            .col_expr(offer::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(offer::Column::Id.eq(offer_id))
            .filter(offer::Column::Status.eq(from.as_str()))
            .exec(&self.db)
            .await
            .map_err(|e| {
                FlashOfferError::database_operation(format!("更新 offer 状态失败: {}", e))
            })?;

        if result.rows_affected > 0 {
            self.invalidate_count_cache();
            debug!("Offer {} status {} -> {}", offer_id, from, to);
        }
        Ok(result.rows_affected > 0)
    }

    /// 抢占推送闩锁（push_sent: false -> true），只有一个调用方会拿到 true
    pub async fn claim_push_latch(&self, offer_id: &str) -> Result<bool> {
        let result = offer::Entity::update_many()
            .col_expr(offer::Column::PushSent, Expr::value(true))
            .col_expr(offer::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(offer::Column::Id.eq(offer_id))
            .filter(offer::Column::PushSent.eq(false))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// 按时间推进批量刷新状态：先过期已结束的，再激活已开始的
    ///
    /// `venue_id` 为 None 时作用于全部场馆。
    pub async fn sync_offer_statuses(
        &self,
        venue_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<StatusSync> {
        let mut expire = offer::Entity::update_many()
            .col_expr(
                offer::Column::Status,
                Expr::value(OfferStatus::Expired.as_str()),
            )
            .col_expr(offer::Column::UpdatedAt, Expr::value(now))
            .filter(offer::Column::Status.is_in(open_statuses()))
            .filter(offer::Column::EndTime.lte(now));
        let mut activate = offer::Entity::update_many()
            .col_expr(
                offer::Column::Status,
                Expr::value(OfferStatus::Active.as_str()),
            )
            .col_expr(offer::Column::UpdatedAt, Expr::value(now))
            .filter(offer::Column::Status.eq(OfferStatus::Scheduled.as_str()))
            .filter(offer::Column::StartTime.lte(now))
            .filter(offer::Column::EndTime.gt(now));
        if let Some(venue_id) = venue_id {
            expire = expire.filter(offer::Column::VenueId.eq(venue_id));
            activate = activate.filter(offer::Column::VenueId.eq(venue_id));
        }

        // 两条都是幂等的条件更新，锁超时可以直接重试
        let db = &self.db;
        let expired = retry::with_retry("sync_offer_statuses(expire)", self.retry_config, || {
            let query = expire.clone();
            async move { query.exec(db).await }
        })
        .await
        .map_err(|e| FlashOfferError::database_operation(format!("批量过期 offer 失败: {}", e)))?;
        let activated = retry::with_retry("sync_offer_statuses(activate)", self.retry_config, || {
            let query = activate.clone();
            async move { query.exec(db).await }
        })
        .await
        .map_err(|e| FlashOfferError::database_operation(format!("批量激活 offer 失败: {}", e)))?;

        let sync = StatusSync {
            activated: activated.rows_affected,
            expired: expired.rows_affected,
        };
        if sync.activated > 0 || sync.expired > 0 {
            self.invalidate_count_cache();
            info!(
                "Offer status sync: {} activated, {} expired",
                sync.activated, sync.expired
            );
        }
        Ok(sync)
    }
}
