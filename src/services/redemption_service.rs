//! Redemption engine
//!
//! Staff turn an active claim into a redeemed one. The write is a guarded
//! update so two terminals racing on the same code produce exactly one
//! redemption.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::analytics_service::AnalyticsService;
use crate::errors::{FlashOfferError, Result};
use crate::storage::{Claim, ClaimStatus, EventType, SeaOrmStorage};
use crate::utils::normalize_token;

#[derive(Clone)]
pub struct RedemptionService {
    storage: Arc<SeaOrmStorage>,
    analytics: AnalyticsService,
}

impl RedemptionService {
    pub fn new(storage: Arc<SeaOrmStorage>) -> Self {
        Self {
            analytics: AnalyticsService::new(storage.clone()),
            storage,
        }
    }

    /// Reject a claim that cannot be redeemed, lazily persisting expiry
    async fn ensure_redeemable(&self, claim: &Claim) -> Result<()> {
        match claim.effective_status(Utc::now()) {
            ClaimStatus::Active => Ok(()),
            ClaimStatus::Redeemed => Err(FlashOfferError::already_redeemed(format!(
                "Claim {} was already redeemed",
                claim.id
            ))),
            ClaimStatus::Expired => {
                if claim.status == ClaimStatus::Active {
                    self.storage.mark_claim_expired(&claim.id).await?;
                    debug!("Claim {} expired on redemption attempt", claim.id);
                }
                Err(FlashOfferError::claim_expired(format!(
                    "Claim {} has expired",
                    claim.id
                )))
            }
        }
    }

    pub async fn redeem(&self, claim_id: &str, staff_user_id: &str) -> Result<Claim> {
        if staff_user_id.trim().is_empty() {
            return Err(FlashOfferError::validation(
                "staff_user_id must not be empty",
            ));
        }

        let claim = self
            .storage
            .find_claim(claim_id)
            .await?
            .ok_or_else(|| FlashOfferError::not_found(format!("Claim not found: {}", claim_id)))?;
        self.ensure_redeemable(&claim).await?;

        let now = Utc::now();
        if !self
            .storage
            .mark_claim_redeemed(claim_id, staff_user_id, now)
            .await?
        {
            // 被并发核销或刚好过期，重新读取后给出准确错误
            let current = self.storage.find_claim(claim_id).await?.ok_or_else(|| {
                FlashOfferError::not_found(format!("Claim not found: {}", claim_id))
            })?;
            self.ensure_redeemable(&current).await?;
            return Err(FlashOfferError::already_redeemed(format!(
                "Claim {} was already redeemed",
                claim_id
            )));
        }

        info!(
            "Claim {} for offer {} redeemed by {}",
            claim_id, claim.offer_id, staff_user_id
        );
        self.analytics
            .track_event(
                &claim.offer_id,
                EventType::Redeem,
                Some(&claim.user_id),
                Some(serde_json::json!({
                    "claim_id": claim_id,
                    "redeemed_by": staff_user_id,
                })),
            )
            .await;

        Ok(Claim {
            status: ClaimStatus::Redeemed,
            redeemed_at: Some(now),
            redeemed_by: Some(staff_user_id.to_string()),
            ..claim
        })
    }

    /// Look up a claim by its code, only if it belongs to one of the venue's
    /// offers
    pub async fn find_by_token(&self, venue_id: &str, token: &str) -> Result<Option<Claim>> {
        let Some(token) = normalize_token(token) else {
            debug!("Rejected malformed token lookup for venue {}", venue_id);
            return Ok(None);
        };

        let Some(claim) = self.storage.find_claim_by_token(&token).await? else {
            return Ok(None);
        };

        let belongs_to_venue = self
            .storage
            .find_offer(&claim.offer_id)
            .await?
            .is_some_and(|offer| offer.venue_id == venue_id);
        if !belongs_to_venue {
            return Ok(None);
        }

        Ok(Some(Claim {
            status: claim.effective_status(Utc::now()),
            ..claim
        }))
    }

    pub async fn redeem_by_token(
        &self,
        venue_id: &str,
        token: &str,
        staff_user_id: &str,
    ) -> Result<Claim> {
        let claim = self
            .find_by_token(venue_id, token)
            .await?
            .ok_or_else(|| {
                FlashOfferError::not_found(format!(
                    "No claim with code {} at venue {}",
                    token.trim(),
                    venue_id
                ))
            })?;
        self.redeem(&claim.id, staff_user_id).await
    }
}
