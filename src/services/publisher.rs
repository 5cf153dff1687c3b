//! Offer publishing workflow
//!
//! Rate limit check, creation, window accounting and the one-time push
//! fan-out. The push latch lives on the offer row, so concurrent publishers
//! or sweep runs never notify twice.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::analytics_service::AnalyticsService;
use super::notification::{DeliveryReport, PushPayload, PushSender, PushTarget};
use super::offer_service::{CreateOfferRequest, OfferService, refresh_status};
use super::rate_limiter::{RateLimitStatus, RateLimiter, SubscriptionTier};
use super::targeting::{TargetingEngine, TargetingQuery};
use crate::errors::{FlashOfferError, Result};
use crate::storage::{EventType, NewEvent, Offer, OfferStatus, SeaOrmStorage};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushSummary {
    pub targeted: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped_no_token: usize,
    pub skipped_claimed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishOutcome {
    pub offer: Offer,
    pub rate_limit: RateLimitStatus,
    /// None when the offer is scheduled or was already pushed
    pub push: Option<PushSummary>,
}

#[derive(Clone)]
pub struct OfferPublisher {
    storage: Arc<SeaOrmStorage>,
    offers: OfferService,
    rate_limiter: RateLimiter,
    targeting: TargetingEngine,
    analytics: AnalyticsService,
    sender: Arc<dyn PushSender>,
}

impl OfferPublisher {
    pub fn new(storage: Arc<SeaOrmStorage>, sender: Arc<dyn PushSender>) -> Self {
        Self {
            offers: OfferService::new(storage.clone()),
            rate_limiter: RateLimiter::new(storage.clone()),
            targeting: TargetingEngine::new(storage.clone()),
            analytics: AnalyticsService::new(storage.clone()),
            storage,
            sender,
        }
    }

    pub async fn publish(
        &self,
        venue_id: &str,
        tier: SubscriptionTier,
        req: CreateOfferRequest,
    ) -> Result<PublishOutcome> {
        let status = self.rate_limiter.check(venue_id, tier).await?;

        let offer = self.offers.create(venue_id, req).await?;
        info!(
            "Venue {} published offer {} ({}, {} claims)",
            venue_id, offer.id, offer.status, offer.max_claims
        );

        if let Err(e) = self.rate_limiter.record_publication(venue_id).await {
            warn!(
                "Failed to record publication of offer {} in rate window: {}",
                offer.id, e
            );
        }

        let push = if offer.status == OfferStatus::Active {
            self.notify_offer(&offer.id).await?
        } else {
            None
        };

        let rate_limit = self.rate_limiter.get_status(venue_id, tier).await;
        let rate_limit = if rate_limit.fail_open { status } else { rate_limit };

        Ok(PublishOutcome {
            offer,
            rate_limit,
            push,
        })
    }

    /// Send the offer's notification once
    ///
    /// Returns None when the offer is not active or another caller already
    /// took the latch.
    pub async fn notify_offer(&self, offer_id: &str) -> Result<Option<PushSummary>> {
        let offer = self
            .storage
            .find_offer(offer_id)
            .await?
            .ok_or_else(|| FlashOfferError::not_found(format!("Offer not found: {}", offer_id)))?;
        let offer = refresh_status(&self.storage, offer).await?;
        if offer.status != OfferStatus::Active {
            debug!(
                "Skipping push for offer {} in status {}",
                offer_id, offer.status
            );
            return Ok(None);
        }

        if !self.storage.claim_push_latch(offer_id).await? {
            debug!("Push for offer {} already sent", offer_id);
            return Ok(None);
        }

        let venue = self.storage.find_venue(&offer.venue_id).await?;
        let venue_name = venue
            .as_ref()
            .map(|v| v.name.clone())
            .unwrap_or_else(|| offer.venue_id.clone());

        let audience = self
            .targeting
            .resolve_targets(&TargetingQuery {
                venue_id: offer.venue_id.clone(),
                venue_location: venue.and_then(|v| v.coordinates),
                radius_km: offer.radius_km,
                favorites_only: offer.favorites_only,
            })
            .await;

        let claimed = self.storage.claimed_user_ids(offer_id).await?;
        let (targets, mut summary) = partition_audience(audience, &claimed);

        if targets.is_empty() {
            info!("Offer {} has no reachable recipients", offer_id);
            return Ok(Some(summary));
        }

        let payload = build_payload(&offer, &venue_name);
        let reports = match self.sender.send(&targets, &payload).await {
            Ok(reports) => reports,
            Err(e) => {
                warn!("Push batch for offer {} failed: {}", offer_id, e);
                targets
                    .iter()
                    .map(|t| DeliveryReport::failed(t.user_id.clone(), e.to_string()))
                    .collect()
            }
        };

        let delivered: Vec<&DeliveryReport> = reports.iter().filter(|r| r.success).collect();
        summary.sent = delivered.len();
        summary.failed = targets.len().saturating_sub(summary.sent);

        let batch = serde_json::json!({
            "targeted": summary.targeted,
            "sent": summary.sent,
            "failed": summary.failed,
        });
        let events = delivered
            .into_iter()
            .map(|r| {
                NewEvent::new(offer_id, EventType::PushSent)
                    .with_user(r.user_id.clone())
                    .with_metadata(batch.clone())
            })
            .collect();
        self.analytics.track_events(events).await;

        info!(
            "Offer {} pushed: {} sent, {} failed, {} without token, {} already claimed",
            offer_id, summary.sent, summary.failed, summary.skipped_no_token, summary.skipped_claimed
        );
        Ok(Some(summary))
    }

    /// Push every offer that went live without a notification
    ///
    /// Per-offer failures are logged and skipped.
    pub async fn dispatch_due_offers(&self) -> Result<usize> {
        let now = Utc::now();
        self.storage.sync_offer_statuses(None, now).await?;

        let mut pushed = 0;
        for offer in self.storage.list_unpushed_live_offers(now).await? {
            match self.notify_offer(&offer.id).await {
                Ok(Some(_)) => pushed += 1,
                Ok(None) => {}
                Err(e) => warn!("Dispatch for offer {} failed: {}", offer.id, e),
            }
        }
        Ok(pushed)
    }
}

fn partition_audience(
    audience: Vec<super::targeting::TargetUser>,
    claimed: &HashSet<String>,
) -> (Vec<PushTarget>, PushSummary) {
    let mut summary = PushSummary {
        targeted: audience.len(),
        ..Default::default()
    };
    let mut targets = Vec::with_capacity(audience.len());

    for user in audience {
        if claimed.contains(&user.user_id) {
            summary.skipped_claimed += 1;
            continue;
        }
        match user.device_token {
            Some(device_token) => targets.push(PushTarget {
                user_id: user.user_id,
                device_token,
            }),
            None => summary.skipped_no_token += 1,
        }
    }
    (targets, summary)
}

fn build_payload(offer: &Offer, venue_name: &str) -> PushPayload {
    let body = match &offer.value_cap {
        Some(cap) => format!(
            "{}: {} ({} available)",
            venue_name,
            cap,
            offer.remaining()
        ),
        None => format!("{}: {} available", venue_name, offer.remaining()),
    };

    PushPayload {
        offer_id: offer.id.clone(),
        venue_id: offer.venue_id.clone(),
        venue_name: venue_name.to_string(),
        deep_link: PushPayload::deep_link_for(&offer.id),
        title: offer.title.clone(),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::targeting::TargetUser;

    fn user(id: &str, token: Option<&str>) -> TargetUser {
        TargetUser {
            user_id: id.to_string(),
            device_token: token.map(String::from),
        }
    }

    #[test]
    fn test_partition_skips_claimed_and_tokenless() {
        let claimed: HashSet<String> = ["u2".to_string()].into_iter().collect();
        let audience = vec![
            user("u1", Some("t1")),
            user("u2", Some("t2")),
            user("u3", None),
            user("u4", Some("t4")),
        ];

        let (targets, summary) = partition_audience(audience, &claimed);
        assert_eq!(summary.targeted, 4);
        assert_eq!(summary.skipped_claimed, 1);
        assert_eq!(summary.skipped_no_token, 1);
        assert_eq!(
            targets.iter().map(|t| t.user_id.as_str()).collect::<Vec<_>>(),
            vec!["u1", "u4"]
        );
    }

    #[test]
    fn test_claimed_user_without_token_counts_as_claimed() {
        let claimed: HashSet<String> = ["u1".to_string()].into_iter().collect();
        let (targets, summary) = partition_audience(vec![user("u1", None)], &claimed);
        assert!(targets.is_empty());
        assert_eq!(summary.skipped_claimed, 1);
        assert_eq!(summary.skipped_no_token, 0);
    }
}
