//! Offer store service
//!
//! Creation, listing and lifecycle of flash offers. Every read path folds in
//! time-based transitions (scheduled -> active -> expired) and persists them
//! with a compare-and-set, so no background job is needed for correctness.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::get_config;
use crate::errors::{FlashOfferError, Result};
use crate::storage::{
    ClaimStats, Offer, OfferFilter, OfferStatus, SameDayFilter, SeaOrmStorage, StatusSync,
};
use crate::utils::Coordinates;

// ============ Request/Response DTOs ============

/// Input for publishing a new offer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOfferRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub value_cap: Option<String>,
    pub max_claims: u32,
    /// Defaults to now
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: DateTime<Utc>,
    /// Kilometres; defaults to `offers.default_radius_km`
    #[serde(default)]
    pub radius_km: Option<f64>,
    #[serde(default)]
    pub favorites_only: bool,
}

/// One page of a venue's offers
#[derive(Debug, Clone, Serialize)]
pub struct OfferPage {
    pub offers: Vec<Offer>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

/// Offer with venue name and claim statistics
#[derive(Debug, Clone, Serialize)]
pub struct OfferDetails {
    pub offer: Offer,
    pub venue_name: Option<String>,
    pub claims: ClaimStats,
    pub remaining: u32,
}

/// Live offer near a point
#[derive(Debug, Clone, Serialize)]
pub struct NearbyOffer {
    pub offer: Offer,
    pub venue_name: String,
    pub distance_km: f64,
}

/// Options for the same-day listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SameDayOptions {
    /// UTC calendar day; defaults to today
    pub date: Option<NaiveDate>,
    pub venue_id: Option<String>,
    #[serde(default)]
    pub include_scheduled: bool,
}

// ============ Status refresh ============

/// Persist the time-based status of `offer` if it drifted
///
/// Losing the compare-and-set means another writer moved the row first; the
/// row is re-read once and returned as stored.
pub(crate) async fn refresh_status(storage: &SeaOrmStorage, offer: Offer) -> Result<Offer> {
    let now = Utc::now();
    let effective = offer.effective_status(now);
    if effective == offer.status {
        return Ok(offer);
    }

    if storage
        .compare_and_set_offer_status(&offer.id, offer.status, effective)
        .await?
    {
        debug!(
            "Offer {} refreshed on read: {} -> {}",
            offer.id, offer.status, effective
        );
        return Ok(Offer {
            status: effective,
            updated_at: now,
            ..offer
        });
    }

    storage
        .find_offer(&offer.id)
        .await?
        .ok_or_else(|| FlashOfferError::not_found(format!("Offer not found: {}", offer.id)))
}

// ============ OfferService Implementation ============

#[derive(Clone)]
pub struct OfferService {
    storage: Arc<SeaOrmStorage>,
}

impl OfferService {
    pub fn new(storage: Arc<SeaOrmStorage>) -> Self {
        Self { storage }
    }

    fn validate(req: &CreateOfferRequest, start: DateTime<Utc>, now: DateTime<Utc>) -> Result<()> {
        if req.title.trim().is_empty() {
            return Err(FlashOfferError::validation("title must not be empty"));
        }
        if req.max_claims == 0 {
            return Err(FlashOfferError::validation(
                "max_claims must be a positive integer",
            ));
        }
        if i32::try_from(req.max_claims).is_err() {
            return Err(FlashOfferError::validation("max_claims is too large"));
        }
        if start >= req.end_time {
            return Err(FlashOfferError::validation(
                "start_time must be before end_time",
            ));
        }
        if req.end_time <= now {
            return Err(FlashOfferError::validation("end_time must be in the future"));
        }
        if let Some(radius) = req.radius_km
            && !(radius.is_finite() && radius > 0.0)
        {
            return Err(FlashOfferError::validation("radius_km must be positive"));
        }
        Ok(())
    }

    /// Create an offer; status is `active` if it already started, else `scheduled`
    pub async fn create(&self, venue_id: &str, req: CreateOfferRequest) -> Result<Offer> {
        if venue_id.trim().is_empty() {
            return Err(FlashOfferError::validation("venue_id must not be empty"));
        }

        let now = Utc::now();
        let start = req.start_time.unwrap_or(now);
        Self::validate(&req, start, now)?;

        let status = if start <= now {
            OfferStatus::Active
        } else {
            OfferStatus::Scheduled
        };

        let offer = Offer {
            id: uuid::Uuid::new_v4().to_string(),
            venue_id: venue_id.to_string(),
            title: req.title.trim().to_string(),
            description: req.description,
            value_cap: req.value_cap,
            max_claims: req.max_claims,
            claimed_count: 0,
            start_time: start,
            end_time: req.end_time,
            radius_km: req
                .radius_km
                .unwrap_or(get_config().offers.default_radius_km),
            favorites_only: req.favorites_only,
            status,
            push_sent: false,
            created_at: now,
            updated_at: now,
        };

        self.storage.insert_offer(&offer).await?;
        Ok(offer)
    }

    /// Fetch an offer with its status refreshed
    pub async fn get(&self, offer_id: &str) -> Result<Offer> {
        let offer = self
            .storage
            .find_offer(offer_id)
            .await?
            .ok_or_else(|| FlashOfferError::not_found(format!("Offer not found: {}", offer_id)))?;
        refresh_status(&self.storage, offer).await
    }

    /// Paginated, newest first; an empty page is not an error
    pub async fn list(
        &self,
        venue_id: &str,
        status: Option<OfferStatus>,
        page: u64,
        page_size: u64,
    ) -> Result<OfferPage> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, get_config().offers.list_page_size_max.max(1));

        let now = Utc::now();
        // 持久化失败不影响读取，返回前按时间再算一次状态
        if let Err(e) = self.storage.sync_offer_statuses(Some(venue_id), now).await {
            warn!(
                "Status sync before listing venue {} failed, serving computed statuses: {}",
                venue_id, e
            );
        }

        let (offers, total) = self
            .storage
            .list_venue_offers(venue_id, OfferFilter { status }, page, page_size)
            .await?;
        let offers = offers
            .into_iter()
            .map(|mut offer| {
                offer.status = offer.effective_status(now);
                offer
            })
            .collect();

        Ok(OfferPage {
            offers,
            total,
            page,
            page_size,
        })
    }

    /// Active offers whose venue lies within `radius_km`, nearest first
    ///
    /// Distance is computed in process over every live offer; venues without
    /// coordinates are skipped.
    pub async fn get_active_near(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> Result<Vec<NearbyOffer>> {
        let origin = Coordinates::new(latitude, longitude);
        if !origin.is_valid() {
            return Err(FlashOfferError::validation("invalid coordinates"));
        }
        if !(radius_km.is_finite() && radius_km > 0.0) {
            return Err(FlashOfferError::validation("radius must be positive"));
        }

        let now = Utc::now();
        let mut live = Vec::new();
        for offer in self.storage.list_live_offers(now).await? {
            let offer = refresh_status(&self.storage, offer).await?;
            if offer.status == OfferStatus::Active && offer.is_live_at(now) {
                live.push(offer);
            }
        }

        let venue_ids: Vec<String> = live
            .iter()
            .map(|o| o.venue_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let venues = self.storage.find_venues(&venue_ids).await?;

        let mut nearby: Vec<NearbyOffer> = live
            .into_iter()
            .filter_map(|offer| {
                let venue = venues.get(&offer.venue_id)?;
                let distance_km = origin.distance_to(&venue.coordinates?);
                (distance_km <= radius_km).then(|| NearbyOffer {
                    venue_name: venue.name.clone(),
                    distance_km,
                    offer,
                })
            })
            .collect();
        nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));

        Ok(nearby)
    }

    /// Offers whose window intersects a UTC calendar day, ordered by start
    pub async fn get_same_day(&self, options: SameDayOptions) -> Result<Vec<Offer>> {
        let day = options.date.unwrap_or_else(|| Utc::now().date_naive());
        let day_start = day
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| FlashOfferError::validation("invalid date"))?
            .and_utc();
        let filter = SameDayFilter {
            day_start,
            day_end: day_start + Duration::days(1),
            venue_id: options.venue_id,
            include_scheduled: options.include_scheduled,
        };

        let mut offers = Vec::new();
        for offer in self.storage.list_same_day_offers(&filter).await? {
            let offer = refresh_status(&self.storage, offer).await?;
            let keep = match offer.status {
                OfferStatus::Active => true,
                OfferStatus::Scheduled => options.include_scheduled,
                _ => false,
            };
            if keep {
                offers.push(offer);
            }
        }
        Ok(offers)
    }

    /// Explicit status override
    ///
    /// Same-status is a no-op. Terminal states never change and `full` is
    /// only reached through claims.
    pub async fn update_status(&self, offer_id: &str, new_status: OfferStatus) -> Result<Offer> {
        let offer = self.get(offer_id).await?;
        if offer.status == new_status {
            return Ok(offer);
        }

        if !offer.status.can_transition_to(new_status) {
            return Err(FlashOfferError::invalid_status_transition(format!(
                "Cannot move offer {} from {} to {}",
                offer_id, offer.status, new_status
            )));
        }

        if !self
            .storage
            .compare_and_set_offer_status(offer_id, offer.status, new_status)
            .await?
        {
            return Err(FlashOfferError::invalid_status_transition(format!(
                "Offer {} changed status concurrently, retry with the current state",
                offer_id
            )));
        }

        info!(
            "Offer {} status updated: {} -> {}",
            offer_id, offer.status, new_status
        );
        Ok(Offer {
            status: new_status,
            updated_at: Utc::now(),
            ..offer
        })
    }

    pub async fn get_details_with_stats(&self, offer_id: &str) -> Result<OfferDetails> {
        let offer = self.get(offer_id).await?;
        let venue_name = self
            .storage
            .find_venue(&offer.venue_id)
            .await?
            .map(|v| v.name);
        let claims = self.storage.claim_stats(offer_id, Utc::now()).await?;

        Ok(OfferDetails {
            remaining: offer.remaining(),
            offer,
            venue_name,
            claims,
        })
    }

    /// Sweep every venue: expire ended offers and activate started ones
    pub async fn expire_ended_offers(&self) -> Result<StatusSync> {
        self.storage.sync_offer_statuses(None, Utc::now()).await
    }
}
