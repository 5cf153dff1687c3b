//! 漏斗事件的写入与聚合查询
//!
//! 事件表只追加，从不参与容量判断。

use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, EntityTrait, FromQueryResult, QueryFilter, QueryOrder, QuerySelect,
    sea_query::Expr,
};

use super::SeaOrmStorage;
use super::converters::model_to_event;
use crate::errors::Result;
use crate::storage::models::{EventType, OfferEvent};

use migration::entities::offer_event;

/// 待写入的事件
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub offer_id: String,
    pub user_id: Option<String>,
    pub event_type: EventType,
    pub metadata: Option<serde_json::Value>,
}

impl NewEvent {
    pub fn new(offer_id: impl Into<String>, event_type: EventType) -> Self {
        Self {
            offer_id: offer_id.into(),
            user_id: None,
            event_type,
            metadata: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    fn into_active_model(self, now: DateTime<Utc>) -> offer_event::ActiveModel {
        use sea_orm::ActiveValue::*;

        offer_event::ActiveModel {
            id: NotSet,
            offer_id: Set(self.offer_id),
            user_id: Set(self.user_id),
            event_type: Set(self.event_type.as_str().to_string()),
            metadata: Set(self.metadata.map(|m| m.to_string())),
            created_at: Set(now),
        }
    }
}

/// 按类型计数的结果行
#[derive(Debug, FromQueryResult)]
pub struct CountRow {
    pub event_type: String,
    pub count: i64,
}

/// 按小时、类型聚合的结果行
#[derive(Debug, FromQueryResult)]
pub struct HourlyRow {
    pub label: String,
    pub event_type: String,
    pub count: i64,
}

impl SeaOrmStorage {
    pub async fn insert_event(&self, event: NewEvent) -> Result<()> {
        offer_event::Entity::insert(event.into_active_model(Utc::now()))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// 批量写入事件，返回写入条数
    pub async fn insert_events(&self, events: Vec<NewEvent>) -> Result<u64> {
        if events.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let count = events.len() as u64;
        let models: Vec<offer_event::ActiveModel> = events
            .into_iter()
            .map(|e| e.into_active_model(now))
            .collect();

        offer_event::Entity::insert_many(models)
            .exec(&self.db)
            .await?;
        Ok(count)
    }

    pub async fn count_events_by_type(&self, offer_id: &str) -> Result<Vec<CountRow>> {
        offer_event::Entity::find()
            .select_only()
            .column(offer_event::Column::EventType)
            .column_as(offer_event::Column::Id.count(), "count")
            .filter(offer_event::Column::OfferId.eq(offer_id))
            .group_by(offer_event::Column::EventType)
            .into_model::<CountRow>()
            .all(&self.db)
            .await
            .map_err(Into::into)
    }

    /// 第 n 条（从 1 开始）指定类型事件的时间
    pub async fn nth_event_time(
        &self,
        offer_id: &str,
        event_type: EventType,
        n: u64,
    ) -> Result<Option<DateTime<Utc>>> {
        if n == 0 {
            return Ok(None);
        }

        let model = offer_event::Entity::find()
            .filter(offer_event::Column::OfferId.eq(offer_id))
            .filter(offer_event::Column::EventType.eq(event_type.as_str()))
            .order_by_asc(offer_event::Column::CreatedAt)
            .order_by_asc(offer_event::Column::Id)
            .offset(n - 1)
            .limit(1)
            .one(&self.db)
            .await?;
        Ok(model.map(|m| m.created_at))
    }

    /// 按小时分桶的事件计数，`date_expr` 由调用方按数据库方言构造
    pub async fn hourly_event_counts(
        &self,
        offer_id: &str,
        date_expr: Expr,
    ) -> Result<Vec<HourlyRow>> {
        offer_event::Entity::find()
            .select_only()
            .column_as(date_expr.clone(), "label")
            .column(offer_event::Column::EventType)
            .column_as(offer_event::Column::Id.count(), "count")
            .filter(offer_event::Column::OfferId.eq(offer_id))
            .group_by(date_expr)
            .group_by(offer_event::Column::EventType)
            .order_by_asc(Expr::cust("label"))
            .into_model::<HourlyRow>()
            .all(&self.db)
            .await
            .map_err(Into::into)
    }

    /// offer 的事件明细（按时间顺序）
    pub async fn list_offer_events(&self, offer_id: &str, limit: u64) -> Result<Vec<OfferEvent>> {
        let models = offer_event::Entity::find()
            .filter(offer_event::Column::OfferId.eq(offer_id))
            .order_by_asc(offer_event::Column::CreatedAt)
            .order_by_asc(offer_event::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().filter_map(model_to_event).collect())
    }
}
