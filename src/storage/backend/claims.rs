//! Claim 预留与核销
//!
//! 预留在单个事务内完成：先用带条件的自增抢占 offer 行写锁，
//! 再校验用户唯一性、写入 claim、按需把 offer 标记为 full。
//! 容量上限只由这条 UPDATE 的 WHERE 子句保证，没有进程内锁。

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ColumnTrait, DatabaseTransaction, DbErr, EntityTrait, ExprTrait, FromQueryResult,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, SqlErr, TransactionTrait,
    sea_query::Expr,
};
use tracing::{debug, error, info, warn};

use super::converters::{claim_to_active_model, model_to_claim};
use super::{SeaOrmStorage, retry};
use crate::errors::{FlashOfferError, Result};
use crate::storage::models::{Claim, ClaimStats, ClaimStatus, OfferStatus};

use migration::entities::{offer, offer_claim};

/// 单次预留尝试的结果
///
/// 资格类失败以 `Err` 返回；核销码冲突不是错误，调用方换码重试。
#[derive(Debug)]
pub enum ReserveOutcome {
    Reserved(Claim),
    TokenCollision,
}

#[derive(Debug, FromQueryResult)]
struct StatusCountRow {
    status: String,
    count: i64,
}

/// 根据 offer 当前行推断为何不可领取
fn unavailable_reason(model: &offer::Model, now: DateTime<Utc>) -> FlashOfferError {
    let id = &model.id;
    if model.status == OfferStatus::Full.as_str() || model.claimed_count >= model.max_claims {
        FlashOfferError::offer_full(format!("Offer {} has no remaining capacity", id))
    } else if model.status == OfferStatus::Expired.as_str() || model.end_time <= now {
        FlashOfferError::offer_expired(format!("Offer {} has ended", id))
    } else {
        FlashOfferError::offer_not_active(format!(
            "Offer {} is not active (status: {})",
            id, model.status
        ))
    }
}

fn new_claim(
    offer_id: &str,
    user_id: &str,
    token: &str,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Claim {
    Claim {
        id: uuid::Uuid::new_v4().to_string(),
        offer_id: offer_id.to_string(),
        user_id: user_id.to_string(),
        token: token.to_string(),
        status: ClaimStatus::Active,
        redeemed_at: None,
        redeemed_by: None,
        expires_at: now + ttl,
        created_at: now,
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

async fn rollback(txn: DatabaseTransaction) -> Result<()> {
    txn.rollback()
        .await
        .map_err(|e| FlashOfferError::database_operation(format!("回滚事务失败: {}", e)))
}

impl SeaOrmStorage {
    /// 原子预留一份容量
    ///
    /// 返回 `TokenCollision` 时事务已回滚，offer 计数未变。
    pub async fn reserve_claim(
        &self,
        offer_id: &str,
        user_id: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<ReserveOutcome> {
        let now = Utc::now();
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| FlashOfferError::database_connection(format!("开始事务失败: {}", e)))?;

        // 带条件自增：写锁在这里取得，并发领取者在此排队
        let reserved = offer::Entity::update_many()
            .col_expr(
                offer::Column::ClaimedCount,
                Expr::col(offer::Column::ClaimedCount).add(1),
            )
            .col_expr(offer::Column::UpdatedAt, Expr::value(now))
            .filter(offer::Column::Id.eq(offer_id))
            .filter(offer::Column::Status.eq(OfferStatus::Active.as_str()))
            .filter(offer::Column::EndTime.gt(now))
            .filter(Expr::col(offer::Column::ClaimedCount).lt(Expr::col(offer::Column::MaxClaims)))
            .exec(&txn)
            .await?;

        if reserved.rows_affected == 0 {
            let current = offer::Entity::find_by_id(offer_id.to_string())
                .one(&txn)
                .await?;
            rollback(txn).await?;
            return Err(match current {
                Some(model) => unavailable_reason(&model, now),
                None => FlashOfferError::not_found(format!("Offer not found: {}", offer_id)),
            });
        }

        let existing = offer_claim::Entity::find()
            .filter(offer_claim::Column::OfferId.eq(offer_id))
            .filter(offer_claim::Column::UserId.eq(user_id))
            .one(&txn)
            .await?;
        if existing.is_some() {
            rollback(txn).await?;
            return Err(FlashOfferError::already_claimed(format!(
                "User {} already claimed offer {}",
                user_id, offer_id
            )));
        }

        let token_taken = offer_claim::Entity::find()
            .filter(offer_claim::Column::Token.eq(token))
            .one(&txn)
            .await?
            .is_some();
        if token_taken {
            rollback(txn).await?;
            debug!("Token collision for offer {}, regenerating", offer_id);
            return Ok(ReserveOutcome::TokenCollision);
        }

        let claim = new_claim(offer_id, user_id, token, now, ttl);
        if let Err(e) = offer_claim::Entity::insert(claim_to_active_model(&claim))
            .exec(&txn)
            .await
        {
            rollback(txn).await?;
            if !is_unique_violation(&e) {
                return Err(e.into());
            }
            // 唯一索引兜底：区分 (offer, user) 冲突与 token 冲突
            return if self.find_user_claim(offer_id, user_id).await?.is_some() {
                Err(FlashOfferError::already_claimed(format!(
                    "User {} already claimed offer {}",
                    user_id, offer_id
                )))
            } else {
                Ok(ReserveOutcome::TokenCollision)
            };
        }

        // 达到上限时翻转为 full
        let filled = offer::Entity::update_many()
            .col_expr(offer::Column::Status, Expr::value(OfferStatus::Full.as_str()))
            .filter(offer::Column::Id.eq(offer_id))
            .filter(
                Expr::col(offer::Column::ClaimedCount).gte(Expr::col(offer::Column::MaxClaims)),
            )
            .exec(&txn)
            .await?;

        txn.commit()
            .await
            .map_err(|e| FlashOfferError::database_operation(format!("提交事务失败: {}", e)))?;

        self.invalidate_count_cache();
        if filled.rows_affected > 0 {
            info!("Offer {} is now full", offer_id);
        }
        Ok(ReserveOutcome::Reserved(claim))
    }

    /// 非原子的顺序预留：先读再写，读写之间存在竞态窗口
    ///
    /// 仅在显式开启 `offers.allow_non_atomic_fallback` 且事务路径出现
    /// 基础设施错误时使用。
    pub async fn reserve_claim_sequential(
        &self,
        offer_id: &str,
        user_id: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<ReserveOutcome> {
        let now = Utc::now();
        warn!(
            "Non-atomic claim path used for offer {} (user {})",
            offer_id, user_id
        );

        let model = offer::Entity::find_by_id(offer_id.to_string())
            .one(&self.db)
            .await?
            .ok_or_else(|| FlashOfferError::not_found(format!("Offer not found: {}", offer_id)))?;

        if model.status != OfferStatus::Active.as_str()
            || model.end_time <= now
            || model.claimed_count >= model.max_claims
        {
            return Err(unavailable_reason(&model, now));
        }

        if self.find_user_claim(offer_id, user_id).await?.is_some() {
            return Err(FlashOfferError::already_claimed(format!(
                "User {} already claimed offer {}",
                user_id, offer_id
            )));
        }

        if self.find_claim_by_token(token).await?.is_some() {
            return Ok(ReserveOutcome::TokenCollision);
        }

        let claim = new_claim(offer_id, user_id, token, now, ttl);
        if let Err(e) = offer_claim::Entity::insert(claim_to_active_model(&claim))
            .exec(&self.db)
            .await
        {
            if is_unique_violation(&e) {
                return Err(FlashOfferError::already_claimed(format!(
                    "User {} already claimed offer {}",
                    user_id, offer_id
                )));
            }
            return Err(e.into());
        }

        // 以读到的计数为基准写回
        let next_count = model.claimed_count + 1;
        let next_status = if next_count >= model.max_claims {
            OfferStatus::Full
        } else {
            OfferStatus::Active
        };
        offer::Entity::update_many()
            .col_expr(offer::Column::ClaimedCount, Expr::value(next_count))
            .col_expr(offer::Column::Status, Expr::value(next_status.as_str()))
            .col_expr(offer::Column::UpdatedAt, Expr::value(now))
            .filter(offer::Column::Id.eq(offer_id))
            .exec(&self.db)
            .await?;

        self.invalidate_count_cache();
        Ok(ReserveOutcome::Reserved(claim))
    }

    pub async fn find_claim(&self, claim_id: &str) -> Result<Option<Claim>> {
        let model = offer_claim::Entity::find_by_id(claim_id.to_string())
            .one(&self.db)
            .await?;
        Ok(model.map(model_to_claim))
    }

    pub async fn find_claim_by_token(&self, token: &str) -> Result<Option<Claim>> {
        let model = offer_claim::Entity::find()
            .filter(offer_claim::Column::Token.eq(token))
            .one(&self.db)
            .await?;
        Ok(model.map(model_to_claim))
    }

    pub async fn find_user_claim(&self, offer_id: &str, user_id: &str) -> Result<Option<Claim>> {
        let model = offer_claim::Entity::find()
            .filter(offer_claim::Column::OfferId.eq(offer_id))
            .filter(offer_claim::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?;
        Ok(model.map(model_to_claim))
    }

    /// 用户的全部领取记录（最新优先，带重试）
    pub async fn list_user_claims(&self, user_id: &str) -> Result<Vec<Claim>> {
        let db = &self.db;
        let user_owned = user_id.to_string();

        let models = retry::with_retry(
            &format!("list_user_claims({})", user_id),
            self.retry_config,
            || async {
                offer_claim::Entity::find()
                    .filter(offer_claim::Column::UserId.eq(user_owned.as_str()))
                    .order_by_desc(offer_claim::Column::CreatedAt)
                    .all(db)
                    .await
            },
        )
        .await
        .map_err(|e| {
            error!("查询用户领取记录失败（重试后仍失败）: {}", e);
            FlashOfferError::from(e)
        })?;

        Ok(models.into_iter().map(model_to_claim).collect())
    }

    /// offer 的全部领取记录（按领取顺序，带重试）
    pub async fn list_offer_claims(&self, offer_id: &str) -> Result<Vec<Claim>> {
        let db = &self.db;
        let offer_owned = offer_id.to_string();

        let models = retry::with_retry(
            &format!("list_offer_claims({})", offer_id),
            self.retry_config,
            || async {
                offer_claim::Entity::find()
                    .filter(offer_claim::Column::OfferId.eq(offer_owned.as_str()))
                    .order_by_asc(offer_claim::Column::CreatedAt)
                    .all(db)
                    .await
            },
        )
        .await
        .map_err(|e| {
            error!("查询 offer 领取记录失败（重试后仍失败）: {}", e);
            FlashOfferError::from(e)
        })?;

        Ok(models.into_iter().map(model_to_claim).collect())
    }

    /// 已领取该 offer 的用户 ID 集合
    pub async fn claimed_user_ids(&self, offer_id: &str) -> Result<HashSet<String>> {
        let ids: Vec<String> = offer_claim::Entity::find()
            .select_only()
            .column(offer_claim::Column::UserId)
            .filter(offer_claim::Column::OfferId.eq(offer_id))
            .into_tuple::<String>()
            .all(&self.db)
            .await?;
        Ok(ids.into_iter().collect())
    }

    /// 条件核销：仅 active 且未过期的 claim 会被更新
    pub async fn mark_claim_redeemed(
        &self,
        claim_id: &str,
        staff_user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = offer_claim::Entity::update_many()
            .col_expr(
                offer_claim::Column::Status,
                Expr::value(ClaimStatus::Redeemed.as_str()),
            )
            .col_expr(offer_claim::Column::RedeemedAt, Expr::value(now))
            .col_expr(offer_claim::Column::RedeemedBy, Expr::value(staff_user_id))
            .filter(offer_claim::Column::Id.eq(claim_id))
            .filter(offer_claim::Column::Status.eq(ClaimStatus::Active.as_str()))
            .filter(offer_claim::Column::ExpiresAt.gt(now))
            .exec(&self.db)
            .await
            .map_err(|e| FlashOfferError::database_operation(format!("核销失败: {}", e)))?;
        Ok(result.rows_affected > 0)
    }

    pub async fn mark_claim_expired(&self, claim_id: &str) -> Result<bool> {
        let result = offer_claim::Entity::update_many()
            .col_expr(
                offer_claim::Column::Status,
                Expr::value(ClaimStatus::Expired.as_str()),
            )
            .filter(offer_claim::Column::Id.eq(claim_id))
            .filter(offer_claim::Column::Status.eq(ClaimStatus::Active.as_str()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// 批量把过期未核销的 claim 置为 expired
    pub async fn expire_stale_claims(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = offer_claim::Entity::update_many()
            .col_expr(
                offer_claim::Column::Status,
                Expr::value(ClaimStatus::Expired.as_str()),
            )
            .filter(offer_claim::Column::Status.eq(ClaimStatus::Active.as_str()))
            .filter(offer_claim::Column::ExpiresAt.lte(now))
            .exec(&self.db)
            .await
            .map_err(|e| {
                FlashOfferError::database_operation(format!("批量过期 claim 失败: {}", e))
            })?;

        if result.rows_affected > 0 {
            info!("Expired {} stale claims", result.rows_affected);
        }
        Ok(result.rows_affected)
    }

    /// 按状态统计 offer 的领取记录
    ///
    /// 已过有效期但仍为 active 的行计入 expired。
    pub async fn claim_stats(&self, offer_id: &str, now: DateTime<Utc>) -> Result<ClaimStats> {
        let rows = offer_claim::Entity::find()
            .select_only()
            .column(offer_claim::Column::Status)
            .column_as(offer_claim::Column::Id.count(), "count")
            .filter(offer_claim::Column::OfferId.eq(offer_id))
            .group_by(offer_claim::Column::Status)
            .into_model::<StatusCountRow>()
            .all(&self.db)
            .await?;

        let lapsed = offer_claim::Entity::find()
            .filter(offer_claim::Column::OfferId.eq(offer_id))
            .filter(offer_claim::Column::Status.eq(ClaimStatus::Active.as_str()))
            .filter(offer_claim::Column::ExpiresAt.lte(now))
            .count(&self.db)
            .await?;

        let mut stats = ClaimStats::default();
        for row in rows {
            let count = Ord::max(row.count, 0) as u64;
            stats.total += count;
            match row.status.parse::<ClaimStatus>() {
                Ok(ClaimStatus::Active) => stats.active += count,
                Ok(ClaimStatus::Redeemed) => stats.redeemed += count,
                Ok(ClaimStatus::Expired) | Err(_) => stats.expired += count,
            }
        }
        let lapsed = Ord::min(lapsed, stats.active);
        stats.active -= lapsed;
        stats.expired += lapsed;

        Ok(stats)
    }
}
