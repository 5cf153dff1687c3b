//! Service layer for business logic
//!
//! Each service owns one concern of the offer lifecycle and shares the same
//! `Arc<SeaOrmStorage>`. The HTTP API and the sweep command both call into
//! this layer; neither talks to storage for business decisions directly.

mod analytics_service;
mod claim_service;
mod notification;
mod offer_service;
mod publisher;
mod rate_limiter;
mod redemption_service;
mod targeting;

pub use analytics_service::*;
pub use claim_service::ClaimService;
pub use notification::{DeliveryReport, LoggingPushSender, PushPayload, PushSender, PushTarget};
pub use offer_service::{
    CreateOfferRequest, NearbyOffer, OfferDetails, OfferPage, OfferService, SameDayOptions,
};
pub use publisher::{OfferPublisher, PublishOutcome, PushSummary};
pub use rate_limiter::{RateLimitStatus, RateLimiter, SubscriptionTier};
pub use redemption_service::RedemptionService;
pub use targeting::{TargetUser, TargetingEngine, TargetingQuery};
