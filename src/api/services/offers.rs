//! Offer 端点：发布、列表、附近、当日、详情、状态变更

use actix_web::{HttpResponse, web};
use tracing::{info, trace};

use crate::config::get_config;
use crate::services::{OfferPublisher, OfferService, RateLimiter, SameDayOptions};

use super::helpers::{api_result, created_response, error_from_flash_offer, success_response};
use super::types::{ListOffersQuery, NearbyQuery, PublishOfferRequest, TierQuery, UpdateStatusRequest};

/// POST /venues/{venue_id}/offers
pub async fn publish_offer(
    path: web::Path<String>,
    body: web::Json<PublishOfferRequest>,
    publisher: web::Data<OfferPublisher>,
) -> HttpResponse {
    let venue_id = path.into_inner();
    let PublishOfferRequest { tier, offer } = body.into_inner();
    trace!("API: publish offer for venue {} ({})", venue_id, tier);

    match publisher.publish(&venue_id, tier, offer).await {
        Ok(outcome) => {
            info!(
                "API: venue {} published offer {}",
                venue_id, outcome.offer.id
            );
            created_response(outcome)
        }
        Err(e) => error_from_flash_offer(&e),
    }
}

/// GET /venues/{venue_id}/offers
pub async fn list_venue_offers(
    path: web::Path<String>,
    query: web::Query<ListOffersQuery>,
    offers: web::Data<OfferService>,
) -> HttpResponse {
    let venue_id = path.into_inner();
    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(20);
    trace!(
        "API: list offers for venue {} (status={:?}, page={}, size={})",
        venue_id, query.status, page, page_size
    );

    api_result(offers.list(&venue_id, query.status, page, page_size).await)
}

/// GET /venues/{venue_id}/rate-limit
pub async fn get_rate_limit(
    path: web::Path<String>,
    query: web::Query<TierQuery>,
    limiter: web::Data<RateLimiter>,
) -> HttpResponse {
    let status = limiter.get_status(&path.into_inner(), query.tier).await;
    success_response(status)
}

/// GET /offers/nearby
pub async fn get_nearby_offers(
    query: web::Query<NearbyQuery>,
    offers: web::Data<OfferService>,
) -> HttpResponse {
    let radius = query
        .radius
        .unwrap_or_else(|| get_config().offers.default_radius_km);
    api_result(offers.get_active_near(query.lat, query.lon, radius).await)
}

/// GET /offers/today
pub async fn get_same_day_offers(
    query: web::Query<SameDayOptions>,
    offers: web::Data<OfferService>,
) -> HttpResponse {
    api_result(offers.get_same_day(query.into_inner()).await)
}

/// GET /offers/{id}
pub async fn get_offer(path: web::Path<String>, offers: web::Data<OfferService>) -> HttpResponse {
    api_result(offers.get_details_with_stats(&path.into_inner()).await)
}

/// PUT /offers/{id}/status
pub async fn update_offer_status(
    path: web::Path<String>,
    body: web::Json<UpdateStatusRequest>,
    offers: web::Data<OfferService>,
) -> HttpResponse {
    let offer_id = path.into_inner();
    info!("API: set offer {} status to {}", offer_id, body.status);
    api_result(offers.update_status(&offer_id, body.status).await)
}
