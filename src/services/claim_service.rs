//! Claim engine
//!
//! Eligibility is checked in a fixed order and short-circuits on the first
//! failure. Capacity is reserved by the storage transaction; the checks here
//! only give precise errors and skip the write for requests that cannot win.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use super::analytics_service::AnalyticsService;
use super::offer_service::refresh_status;
use crate::config::get_config;
use crate::errors::{FlashOfferError, Result};
use crate::storage::{Claim, EventType, Offer, OfferStatus, ReserveOutcome, SeaOrmStorage};
use crate::utils::generate_redemption_token;

#[derive(Clone)]
pub struct ClaimService {
    storage: Arc<SeaOrmStorage>,
    analytics: AnalyticsService,
}

impl ClaimService {
    pub fn new(storage: Arc<SeaOrmStorage>) -> Self {
        Self {
            analytics: AnalyticsService::new(storage.clone()),
            storage,
        }
    }

    async fn check_eligibility(&self, offer: &Offer, user_id: &str) -> Result<()> {
        match offer.status {
            OfferStatus::Active => {}
            OfferStatus::Full => {
                return Err(FlashOfferError::offer_full(format!(
                    "Offer {} has no remaining capacity",
                    offer.id
                )));
            }
            OfferStatus::Expired => {
                return Err(FlashOfferError::offer_expired(format!(
                    "Offer {} has ended",
                    offer.id
                )));
            }
            other => {
                return Err(FlashOfferError::offer_not_active(format!(
                    "Offer {} is not active (status: {})",
                    offer.id, other
                )));
            }
        }

        let now = Utc::now();
        if offer.end_time <= now {
            return Err(FlashOfferError::offer_expired(format!(
                "Offer {} has ended",
                offer.id
            )));
        }

        if offer.claimed_count >= offer.max_claims {
            return Err(FlashOfferError::offer_full(format!(
                "Offer {} has no remaining capacity",
                offer.id
            )));
        }

        if self
            .storage
            .find_user_claim(&offer.id, user_id)
            .await?
            .is_some()
        {
            return Err(FlashOfferError::already_claimed(format!(
                "User {} already claimed offer {}",
                user_id, offer.id
            )));
        }

        let presence = Duration::hours(get_config().offers.presence_window_hours);
        if !self
            .storage
            .has_active_check_in(user_id, &offer.venue_id, now - presence)
            .await?
        {
            return Err(FlashOfferError::not_checked_in(format!(
                "User {} is not checked in at venue {}",
                user_id, offer.venue_id
            )));
        }

        Ok(())
    }

    /// One reservation attempt, falling back to the sequential path only
    /// when explicitly enabled and the transaction failed for infrastructure
    /// reasons
    async fn reserve(
        &self,
        offer_id: &str,
        user_id: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<ReserveOutcome> {
        match self
            .storage
            .reserve_claim(offer_id, user_id, token, ttl)
            .await
        {
            Err(e) if e.is_retryable() && get_config().offers.allow_non_atomic_fallback => {
                warn!(
                    "Atomic claim failed for offer {}, using non-atomic fallback: {}",
                    offer_id, e
                );
                self.storage
                    .reserve_claim_sequential(offer_id, user_id, token, ttl)
                    .await
            }
            other => other,
        }
    }

    /// Claim one unit of an offer's capacity for `user_id`
    pub async fn claim(&self, offer_id: &str, user_id: &str) -> Result<Claim> {
        if user_id.trim().is_empty() {
            return Err(FlashOfferError::validation("user_id must not be empty"));
        }

        let offer = self
            .storage
            .find_offer(offer_id)
            .await?
            .ok_or_else(|| FlashOfferError::not_found(format!("Offer not found: {}", offer_id)))?;
        let offer = refresh_status(&self.storage, offer).await?;

        if let Err(e) = self.check_eligibility(&offer, user_id).await {
            if e.is_eligibility() {
                debug!("Claim rejected for user {}: {}", user_id, e);
            }
            return Err(e);
        }

        let config = get_config();
        let ttl = Duration::hours(config.offers.claim_ttl_hours);
        let max_attempts = config.offers.token_max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let token = generate_redemption_token();
            match self.reserve(offer_id, user_id, &token, ttl).await? {
                ReserveOutcome::Reserved(claim) => {
                    info!(
                        "Offer {} claimed by user {} (claim {})",
                        offer_id, user_id, claim.id
                    );
                    self.analytics
                        .track_event(
                            offer_id,
                            EventType::Claim,
                            Some(user_id),
                            Some(serde_json::json!({ "claim_id": claim.id })),
                        )
                        .await;
                    return Ok(claim);
                }
                ReserveOutcome::TokenCollision => {
                    debug!(
                        "Token collision on attempt {}/{} for offer {}",
                        attempt, max_attempts, offer_id
                    );
                }
            }
        }

        Err(FlashOfferError::token_exhausted(format!(
            "Could not allocate a unique redemption token after {} attempts",
            max_attempts
        )))
    }

    pub async fn get_claim(&self, claim_id: &str) -> Result<Claim> {
        self.storage
            .find_claim(claim_id)
            .await?
            .ok_or_else(|| FlashOfferError::not_found(format!("Claim not found: {}", claim_id)))
    }

    pub async fn list_user_claims(&self, user_id: &str) -> Result<Vec<Claim>> {
        let now = Utc::now();
        let claims = self.storage.list_user_claims(user_id).await?;
        Ok(claims.into_iter().map(|c| with_effective_status(c, now)).collect())
    }

    pub async fn list_offer_claims(&self, offer_id: &str) -> Result<Vec<Claim>> {
        let now = Utc::now();
        let claims = self.storage.list_offer_claims(offer_id).await?;
        Ok(claims.into_iter().map(|c| with_effective_status(c, now)).collect())
    }

    /// Mark every unredeemed claim past its expiry as expired
    pub async fn expire_stale_claims(&self) -> Result<u64> {
        self.storage.expire_stale_claims(Utc::now()).await
    }
}

fn with_effective_status(claim: Claim, now: chrono::DateTime<Utc>) -> Claim {
    Claim {
        status: claim.effective_status(now),
        ..claim
    }
}
