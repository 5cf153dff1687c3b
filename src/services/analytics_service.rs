//! Offer funnel analytics
//!
//! Events are best-effort appends: tracking never fails the caller. Rates
//! are derived on demand from per-type counts.
//!
//! - open_rate: views / push_sent
//! - claim_rate: claims / views
//! - redemption_rate: redemptions / claims

use std::collections::BTreeMap;
use std::sync::Arc;

use sea_orm::{DbBackend, sea_query::Expr};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::{FlashOfferError, Result};
use crate::storage::{EventType, NewEvent, OfferStatus, SeaOrmStorage};

// ============ 公共类型定义 ============

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FunnelCounts {
    pub push_sent: u64,
    pub views: u64,
    pub claims: u64,
    pub redemptions: u64,
}

impl FunnelCounts {
    fn add(&mut self, event_type: EventType, count: u64) {
        match event_type {
            EventType::PushSent => self.push_sent += count,
            EventType::View => self.views += count,
            EventType::Claim => self.claims += count,
            EventType::Redeem => self.redemptions += count,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OfferAnalytics {
    pub offer_id: String,
    pub counts: FunnelCounts,
    /// Percentages, 0 when the denominator is 0
    pub open_rate: f64,
    pub claim_rate: f64,
    pub redemption_rate: f64,
    /// Seconds from creation to the claim that filled the offer
    pub time_to_full_secs: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HourBucket {
    /// `YYYY-MM-DD HH:00`, UTC
    pub hour: String,
    #[serde(flatten)]
    pub counts: FunnelCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeSeries {
    pub offer_id: String,
    pub buckets: Vec<HourBucket>,
}

/// Percentage rounded to two decimals
pub fn rate(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    let pct = numerator as f64 / denominator as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

// ============ AnalyticsService ============

#[derive(Clone)]
pub struct AnalyticsService {
    storage: Arc<SeaOrmStorage>,
}

impl AnalyticsService {
    pub fn new(storage: Arc<SeaOrmStorage>) -> Self {
        Self { storage }
    }

    fn get_db_backend(&self) -> DbBackend {
        match self.storage.get_backend_name() {
            "sqlite" => DbBackend::Sqlite,
            "mysql" => DbBackend::MySql,
            _ => DbBackend::Postgres,
        }
    }

    fn hour_bucket_expr(&self) -> Expr {
        match self.get_db_backend() {
            DbBackend::Sqlite => Expr::cust("strftime('%Y-%m-%d %H:00', created_at)"),
            DbBackend::MySql => Expr::cust("DATE_FORMAT(created_at, '%Y-%m-%d %H:00')"),
            DbBackend::Postgres | _ => {
                Expr::cust("TO_CHAR(created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD HH24:00')")
            }
        }
    }

    /// Record one funnel event; failures are logged and dropped
    pub async fn track_event(
        &self,
        offer_id: &str,
        event_type: EventType,
        user_id: Option<&str>,
        metadata: Option<serde_json::Value>,
    ) {
        let mut event = NewEvent::new(offer_id, event_type);
        if let Some(user_id) = user_id {
            event = event.with_user(user_id);
        }
        if let Some(metadata) = metadata {
            event = event.with_metadata(metadata);
        }

        if let Err(e) = self.storage.insert_event(event).await {
            warn!(
                "Dropped {} event for offer {}: {}",
                event_type, offer_id, e
            );
        }
    }

    /// Batch variant of `track_event`; returns how many rows were written
    pub async fn track_events(&self, events: Vec<NewEvent>) -> u64 {
        let count = events.len();
        match self.storage.insert_events(events).await {
            Ok(written) => written,
            Err(e) => {
                warn!("Dropped batch of {} events: {}", count, e);
                0
            }
        }
    }

    async fn counts(&self, offer_id: &str) -> Result<FunnelCounts> {
        let rows = self
            .storage
            .count_events_by_type(offer_id)
            .await
            .map_err(|e| {
                FlashOfferError::analytics_query_failed(format!("Count query failed: {}", e))
            })?;

        let mut counts = FunnelCounts::default();
        for row in rows {
            match row.event_type.parse::<EventType>() {
                Ok(event_type) => counts.add(event_type, row.count.max(0) as u64),
                Err(_) => debug!("Ignoring unknown event type '{}'", row.event_type),
            }
        }
        Ok(counts)
    }

    pub async fn get_analytics(&self, offer_id: &str) -> Result<OfferAnalytics> {
        let offer = self
            .storage
            .find_offer(offer_id)
            .await?
            .ok_or_else(|| FlashOfferError::not_found(format!("Offer not found: {}", offer_id)))?;

        let counts = self.counts(offer_id).await?;

        let time_to_full_secs = if offer.status == OfferStatus::Full {
            self.storage
                .nth_event_time(offer_id, EventType::Claim, offer.max_claims as u64)
                .await
                .map_err(|e| {
                    FlashOfferError::analytics_query_failed(format!(
                        "Fill time query failed: {}",
                        e
                    ))
                })?
                .map(|filled_at| (filled_at - offer.created_at).num_seconds().max(0))
        } else {
            None
        };

        info!(
            "Analytics for offer {}: push={} view={} claim={} redeem={}",
            offer_id, counts.push_sent, counts.views, counts.claims, counts.redemptions
        );

        Ok(OfferAnalytics {
            offer_id: offer_id.to_string(),
            open_rate: rate(counts.views, counts.push_sent),
            claim_rate: rate(counts.claims, counts.views),
            redemption_rate: rate(counts.redemptions, counts.claims),
            counts,
            time_to_full_secs,
        })
    }

    /// Hourly event counts per type, oldest bucket first
    pub async fn get_time_series(&self, offer_id: &str) -> Result<TimeSeries> {
        if self.storage.find_offer(offer_id).await?.is_none() {
            return Err(FlashOfferError::not_found(format!(
                "Offer not found: {}",
                offer_id
            )));
        }

        let rows = self
            .storage
            .hourly_event_counts(offer_id, self.hour_bucket_expr())
            .await
            .map_err(|e| {
                FlashOfferError::analytics_query_failed(format!("Time series query failed: {}", e))
            })?;

        let mut buckets: BTreeMap<String, FunnelCounts> = BTreeMap::new();
        for row in rows {
            let Ok(event_type) = row.event_type.parse::<EventType>() else {
                continue;
            };
            buckets
                .entry(row.label)
                .or_default()
                .add(event_type, row.count.max(0) as u64);
        }

        Ok(TimeSeries {
            offer_id: offer_id.to_string(),
            buckets: buckets
                .into_iter()
                .map(|(hour, counts)| HourBucket { hour, counts })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_zero_denominator() {
        assert_eq!(rate(5, 0), 0.0);
    }

    #[test]
    fn test_rate_rounding() {
        assert_eq!(rate(40, 100), 40.0);
        assert_eq!(rate(1, 3), 33.33);
    }

    #[test]
    fn test_funnel_counts_add() {
        let mut counts = FunnelCounts::default();
        counts.add(EventType::View, 3);
        counts.add(EventType::View, 2);
        counts.add(EventType::Redeem, 1);
        assert_eq!(counts.views, 5);
        assert_eq!(counts.redemptions, 1);
        assert_eq!(counts.claims, 0);
    }
}
