//! 统一 API 错误码定义

use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::errors::FlashOfferError;

/// API 错误码枚举
///
/// 使用 serde_repr 序列化为数字，按千位分域：
/// - 0: 成功
/// - 1000-1099: 通用错误
/// - 3000-3099: Offer 错误
/// - 4000-4099: 领取错误
/// - 5000-5099: 核销错误
/// - 6000-6099: Analytics 错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i32)]
pub enum ErrorCode {
    // 成功
    Success = 0,

    // 通用错误 1000-1099
    BadRequest = 1000,
    NotFound = 1004,
    InternalServerError = 1005,
    ServiceUnavailable = 1030,

    // Offer 错误 3000-3099
    OfferInvalidStatusTransition = 3001,
    OfferRateLimitExceeded = 3002,

    // 领取错误 4000-4099
    ClaimAlreadyClaimed = 4000,
    ClaimOfferFull = 4001,
    ClaimOfferNotActive = 4002,
    ClaimOfferExpired = 4003,
    ClaimNotCheckedIn = 4004,
    ClaimTokenExhausted = 4005,

    // 核销错误 5000-5099
    RedeemAlreadyRedeemed = 5000,
    RedeemClaimExpired = 5001,

    // Analytics 错误 6000-6099
    AnalyticsQueryFailed = 6000,
}

impl From<&FlashOfferError> for ErrorCode {
    fn from(err: &FlashOfferError) -> Self {
        match err {
            FlashOfferError::Validation(_) => ErrorCode::BadRequest,
            FlashOfferError::NotFound(_) => ErrorCode::NotFound,
            FlashOfferError::InvalidStatusTransition(_) => ErrorCode::OfferInvalidStatusTransition,
            FlashOfferError::RateLimitExceeded { .. } => ErrorCode::OfferRateLimitExceeded,
            FlashOfferError::AlreadyClaimed(_) => ErrorCode::ClaimAlreadyClaimed,
            FlashOfferError::OfferFull(_) => ErrorCode::ClaimOfferFull,
            FlashOfferError::OfferNotActive(_) => ErrorCode::ClaimOfferNotActive,
            FlashOfferError::OfferExpired(_) => ErrorCode::ClaimOfferExpired,
            FlashOfferError::NotCheckedIn(_) => ErrorCode::ClaimNotCheckedIn,
            FlashOfferError::TokenExhausted(_) => ErrorCode::ClaimTokenExhausted,
            FlashOfferError::AlreadyRedeemed(_) => ErrorCode::RedeemAlreadyRedeemed,
            FlashOfferError::ClaimExpired(_) => ErrorCode::RedeemClaimExpired,
            FlashOfferError::AnalyticsQueryFailed(_) => ErrorCode::AnalyticsQueryFailed,
            FlashOfferError::DatabaseConnection(_) | FlashOfferError::DatabaseOperation(_) => {
                ErrorCode::ServiceUnavailable
            }
            FlashOfferError::DatabaseConfig(_)
            | FlashOfferError::FileOperation(_)
            | FlashOfferError::Serialization(_) => ErrorCode::InternalServerError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_serialize_as_numbers() {
        assert_eq!(serde_json::to_string(&ErrorCode::Success).unwrap(), "0");
        assert_eq!(
            serde_json::to_string(&ErrorCode::ClaimOfferFull).unwrap(),
            "4001"
        );
    }

    #[test]
    fn test_error_mapping_by_domain() {
        assert_eq!(
            ErrorCode::from(&FlashOfferError::offer_full("x")),
            ErrorCode::ClaimOfferFull
        );
        assert_eq!(
            ErrorCode::from(&FlashOfferError::already_redeemed("x")),
            ErrorCode::RedeemAlreadyRedeemed
        );
        assert_eq!(
            ErrorCode::from(&FlashOfferError::rate_limit_exceeded("x", None)),
            ErrorCode::OfferRateLimitExceeded
        );
        assert_eq!(
            ErrorCode::from(&FlashOfferError::database_connection("x")),
            ErrorCode::ServiceUnavailable
        );
    }
}
