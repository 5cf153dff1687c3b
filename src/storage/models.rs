use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

use crate::utils::Coordinates;

/// Offer 生命周期状态
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OfferStatus {
    Scheduled,
    Active,
    Expired,
    Cancelled,
    Full,
}

impl OfferStatus {
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Whether an explicit status update may move an offer from `self` to `next`
    ///
    /// `full` is only ever reached through a claim, never by hand.
    pub fn can_transition_to(self, next: OfferStatus) -> bool {
        use OfferStatus::*;
        match (self, next) {
            (a, b) if a == b => true,
            (Scheduled, Active | Cancelled | Expired) => true,
            (Active, Cancelled | Expired) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub venue_id: String,
    pub title: String,
    pub description: Option<String>,
    pub value_cap: Option<String>,
    pub max_claims: u32,
    pub claimed_count: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub radius_km: f64,
    pub favorites_only: bool,
    pub status: OfferStatus,
    pub push_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Offer {
    /// Status as of `now`, folding in time-based transitions
    ///
    /// Scheduled offers become active once their start passes; scheduled or
    /// active offers become expired once their end passes. Terminal states
    /// are returned unchanged.
    pub fn effective_status(&self, now: DateTime<Utc>) -> OfferStatus {
        match self.status {
            OfferStatus::Scheduled | OfferStatus::Active if now >= self.end_time => {
                OfferStatus::Expired
            }
            OfferStatus::Scheduled if now >= self.start_time => OfferStatus::Active,
            other => other,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.max_claims.saturating_sub(self.claimed_count)
    }

    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now <= self.end_time
    }
}

/// 领取记录状态
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ClaimStatus {
    Active,
    Redeemed,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: String,
    pub offer_id: String,
    pub user_id: String,
    pub token: String,
    pub status: ClaimStatus,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub redeemed_by: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ClaimStatus {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

impl Claim {
    pub fn effective_status(&self, now: DateTime<Utc>) -> ClaimStatus {
        match self.status {
            ClaimStatus::Active if now >= self.expires_at => ClaimStatus::Expired,
            other => other,
        }
    }
}

/// 每个 offer 的领取统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimStats {
    pub total: u64,
    pub active: u64,
    pub redeemed: u64,
    pub expired: u64,
}

/// 漏斗事件类型
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventType {
    PushSent,
    View,
    Claim,
    Redeem,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferEvent {
    pub id: i64,
    pub offer_id: String,
    pub user_id: Option<String>,
    pub event_type: EventType,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Venue {
    pub id: String,
    pub name: String,
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitWindow {
    pub venue_id: String,
    pub limit_type: String,
    pub window_start: DateTime<Utc>,
    pub count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::str::FromStr;

    fn offer_at(status: OfferStatus, start: DateTime<Utc>, end: DateTime<Utc>) -> Offer {
        Offer {
            id: "o1".to_string(),
            venue_id: "v1".to_string(),
            title: "Half price".to_string(),
            description: None,
            value_cap: None,
            max_claims: 5,
            claimed_count: 0,
            start_time: start,
            end_time: end,
            radius_km: 1.0,
            favorites_only: false,
            status,
            push_sent: false,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn test_scheduled_becomes_active_after_start() {
        let now = Utc::now();
        let offer = offer_at(
            OfferStatus::Scheduled,
            now + Duration::hours(1),
            now + Duration::hours(3),
        );
        assert_eq!(offer.effective_status(now), OfferStatus::Scheduled);
        assert_eq!(
            offer.effective_status(now + Duration::hours(2)),
            OfferStatus::Active
        );
        assert_eq!(
            offer.effective_status(now + Duration::hours(3)),
            OfferStatus::Expired
        );
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let now = Utc::now();
        for status in [OfferStatus::Full, OfferStatus::Cancelled] {
            let offer = offer_at(status, now - Duration::hours(2), now - Duration::hours(1));
            assert_eq!(offer.effective_status(now), status);
        }
    }

    #[test]
    fn test_transition_rules() {
        use OfferStatus::*;
        assert!(Scheduled.can_transition_to(Active));
        assert!(Active.can_transition_to(Cancelled));
        assert!(Active.can_transition_to(Active));
        assert!(!Full.can_transition_to(Active));
        assert!(!Expired.can_transition_to(Active));
        assert!(!Cancelled.can_transition_to(Active));
        assert!(!Active.can_transition_to(Full));
        assert!(!Active.can_transition_to(Scheduled));
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(OfferStatus::Full.as_ref(), "full");
        assert_eq!(
            OfferStatus::from_str("scheduled").unwrap(),
            OfferStatus::Scheduled
        );
        assert_eq!(EventType::PushSent.as_ref(), "push_sent");
        assert_eq!(ClaimStatus::Redeemed.to_string(), "redeemed");
    }

    #[test]
    fn test_claim_effective_expiry() {
        let now = Utc::now();
        let claim = Claim {
            id: "c1".to_string(),
            offer_id: "o1".to_string(),
            user_id: "u1".to_string(),
            token: "ABCD-EFGH".to_string(),
            status: ClaimStatus::Active,
            redeemed_at: None,
            redeemed_by: None,
            expires_at: now,
            created_at: now - Duration::hours(24),
        };
        assert_eq!(
            claim.effective_status(now - Duration::seconds(1)),
            ClaimStatus::Active
        );
        assert_eq!(claim.effective_status(now), ClaimStatus::Expired);
    }
}
