//! 领取与核销端点

use actix_web::{HttpResponse, web};
use tracing::{info, trace};

use crate::errors::FlashOfferError;
use crate::services::{ClaimService, RedemptionService};

use super::helpers::{api_result, created_response, error_from_flash_offer};
use super::types::{ClaimRequest, RedeemByTokenRequest, RedeemRequest, TokenLookupQuery};

/// POST /offers/{id}/claims
pub async fn claim_offer(
    path: web::Path<String>,
    body: web::Json<ClaimRequest>,
    claims: web::Data<ClaimService>,
) -> HttpResponse {
    let offer_id = path.into_inner();
    trace!("API: user {} claims offer {}", body.user_id, offer_id);

    match claims.claim(&offer_id, &body.user_id).await {
        Ok(claim) => created_response(claim),
        Err(e) => error_from_flash_offer(&e),
    }
}

/// GET /users/{user_id}/claims
pub async fn list_user_claims(
    path: web::Path<String>,
    claims: web::Data<ClaimService>,
) -> HttpResponse {
    api_result(claims.list_user_claims(&path.into_inner()).await)
}

/// POST /claims/{id}/redeem
pub async fn redeem_claim(
    path: web::Path<String>,
    body: web::Json<RedeemRequest>,
    redemption: web::Data<RedemptionService>,
) -> HttpResponse {
    let claim_id = path.into_inner();
    info!("API: staff {} redeems claim {}", body.staff_user_id, claim_id);
    api_result(redemption.redeem(&claim_id, &body.staff_user_id).await)
}

/// GET /venues/{venue_id}/claims/lookup?token=
pub async fn lookup_claim(
    path: web::Path<String>,
    query: web::Query<TokenLookupQuery>,
    redemption: web::Data<RedemptionService>,
) -> HttpResponse {
    let venue_id = path.into_inner();
    let result = redemption
        .find_by_token(&venue_id, &query.token)
        .await
        .and_then(|claim| {
            claim.ok_or_else(|| {
                FlashOfferError::not_found(format!(
                    "No claim with code {} at venue {}",
                    query.token.trim(),
                    venue_id
                ))
            })
        });
    api_result(result)
}

/// POST /venues/{venue_id}/redeem
pub async fn redeem_by_token(
    path: web::Path<String>,
    body: web::Json<RedeemByTokenRequest>,
    redemption: web::Data<RedemptionService>,
) -> HttpResponse {
    let venue_id = path.into_inner();
    info!(
        "API: staff {} redeems code at venue {}",
        body.staff_user_id, venue_id
    );
    api_result(
        redemption
            .redeem_by_token(&venue_id, &body.token, &body.staff_user_id)
            .await,
    )
}
