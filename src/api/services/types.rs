//! API 类型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::{CreateOfferRequest, SubscriptionTier};
use crate::storage::OfferStatus;

/// 统一响应信封 `{code, message, data}`
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RateLimitErrorData {
    pub resets_at: Option<DateTime<Utc>>,
}

// ============ 场馆端 ============

#[derive(Deserialize, Clone, Debug)]
pub struct PublishOfferRequest {
    #[serde(default)]
    pub tier: SubscriptionTier,
    #[serde(flatten)]
    pub offer: CreateOfferRequest,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ListOffersQuery {
    pub status: Option<OfferStatus>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct TierQuery {
    #[serde(default)]
    pub tier: SubscriptionTier,
}

#[derive(Deserialize, Clone, Debug)]
pub struct TokenLookupQuery {
    pub token: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct RedeemByTokenRequest {
    pub token: String,
    pub staff_user_id: String,
}

// ============ 用户端 ============

#[derive(Deserialize, Clone, Debug)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lon: f64,
    /// 公里，默认 `offers.default_radius_km`
    pub radius: Option<f64>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct UpdateStatusRequest {
    pub status: OfferStatus,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ClaimRequest {
    pub user_id: String,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct ViewRequest {
    pub user_id: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct RedeemRequest {
    pub staff_user_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_request_flattens_offer_fields() {
        let body = r#"{
            "tier": "pro",
            "title": "Two for one",
            "max_claims": 20,
            "end_time": "2030-01-01T00:00:00Z"
        }"#;
        let req: PublishOfferRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.tier, SubscriptionTier::Pro);
        assert_eq!(req.offer.max_claims, 20);
        assert!(!req.offer.favorites_only);
    }

    #[test]
    fn test_publish_request_defaults_to_free_tier() {
        let body = r#"{"title": "t", "max_claims": 1, "end_time": "2030-01-01T00:00:00Z"}"#;
        let req: PublishOfferRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.tier, SubscriptionTier::Free);
    }

    #[test]
    fn test_envelope_omits_empty_data() {
        let resp = ApiResponse::<()> {
            code: 1004,
            message: "missing".to_string(),
            data: None,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("data").is_none());
    }
}
