//! Publication rate limiter
//!
//! Rolling 24h budget per subscription tier. Reads fail open: when the window
//! lookup errors the venue gets its full budget and the status is flagged.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, warn};

use crate::config::get_config;
use crate::errors::{FlashOfferError, Result};
use crate::storage::{OFFER_PUBLISH, SeaOrmStorage};

/// Venue subscription tier
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SubscriptionTier {
    #[default]
    Free,
    Core,
    Pro,
    Unlimited,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimitStatus {
    pub current_count: u32,
    /// None for the unlimited tier
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub is_unlimited: bool,
    /// When the oldest counted window leaves the rolling period
    pub resets_at: Option<DateTime<Utc>>,
    /// Storage lookup failed and the permissive default was returned
    pub fail_open: bool,
}

impl RateLimitStatus {
    fn unlimited() -> Self {
        Self {
            current_count: 0,
            limit: None,
            remaining: None,
            is_unlimited: true,
            resets_at: None,
            fail_open: false,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        !self.is_unlimited && self.remaining == Some(0)
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    storage: Arc<SeaOrmStorage>,
}

impl RateLimiter {
    pub fn new(storage: Arc<SeaOrmStorage>) -> Self {
        Self { storage }
    }

    pub fn limit_for(tier: SubscriptionTier) -> Option<u32> {
        let config = get_config();
        let cfg = &config.rate_limit;
        match tier {
            SubscriptionTier::Free => Some(cfg.free),
            SubscriptionTier::Core => Some(cfg.core),
            SubscriptionTier::Pro => Some(cfg.pro),
            SubscriptionTier::Unlimited => None,
        }
    }

    /// Current budget for a venue; never fails
    pub async fn get_status(&self, venue_id: &str, tier: SubscriptionTier) -> RateLimitStatus {
        let Some(limit) = Self::limit_for(tier) else {
            return RateLimitStatus::unlimited();
        };

        let window = Duration::hours(get_config().rate_limit.window_hours);
        let now = Utc::now();

        match self
            .storage
            .list_rate_windows(venue_id, OFFER_PUBLISH, now - window)
            .await
        {
            Ok(windows) => {
                let current_count: u32 = windows.iter().map(|w| w.count).sum();
                let resets_at = windows.first().map(|w| w.window_start + window);
                debug!(
                    "Rate limit for venue {}: {}/{} across {} windows",
                    venue_id,
                    current_count,
                    limit,
                    windows.len()
                );
                RateLimitStatus {
                    current_count,
                    limit: Some(limit),
                    remaining: Some(limit.saturating_sub(current_count)),
                    is_unlimited: false,
                    resets_at,
                    fail_open: false,
                }
            }
            Err(e) => {
                warn!(
                    "Rate limit lookup failed for venue {}, failing open: {}",
                    venue_id, e
                );
                RateLimitStatus {
                    current_count: 0,
                    limit: Some(limit),
                    remaining: Some(limit),
                    is_unlimited: false,
                    resets_at: None,
                    fail_open: true,
                }
            }
        }
    }

    /// Status, or `RateLimitExceeded` when the budget is spent
    pub async fn check(&self, venue_id: &str, tier: SubscriptionTier) -> Result<RateLimitStatus> {
        let status = self.get_status(venue_id, tier).await;
        if status.is_exhausted() {
            return Err(FlashOfferError::rate_limit_exceeded(
                format!(
                    "Venue {} reached its {} publication limit of {}",
                    venue_id,
                    tier,
                    status.limit.unwrap_or_default()
                ),
                status.resets_at,
            ));
        }
        Ok(status)
    }

    pub async fn record_publication(&self, venue_id: &str) -> Result<()> {
        let sub_window = Duration::minutes(get_config().rate_limit.sub_window_minutes);
        self.storage
            .increment_rate_window(venue_id, OFFER_PUBLISH, Utc::now(), sub_window)
            .await
    }
}
