//! API 路由配置
//!
//! `/v1` 下按资源拆分：场馆、offer、用户、claim。

use actix_web::web;

use super::analytics::{get_offer_analytics, get_offer_time_series, track_view};
use super::claims::{claim_offer, list_user_claims, lookup_claim, redeem_by_token, redeem_claim};
use super::offers::{
    get_nearby_offers, get_offer, get_rate_limit, get_same_day_offers, list_venue_offers,
    publish_offer, update_offer_status,
};

/// 场馆路由 `/venues/{venue_id}`
pub fn venue_routes() -> actix_web::Scope {
    web::scope("/venues/{venue_id}")
        .route("/offers", web::post().to(publish_offer))
        .route("/offers", web::get().to(list_venue_offers))
        .route("/rate-limit", web::get().to(get_rate_limit))
        .route("/claims/lookup", web::get().to(lookup_claim))
        .route("/redeem", web::post().to(redeem_by_token))
}

/// Offer 路由 `/offers`
///
/// 固定路径（nearby、today）必须在 `/{id}` 之前注册。
pub fn offer_routes() -> actix_web::Scope {
    web::scope("/offers")
        .route("/nearby", web::get().to(get_nearby_offers))
        .route("/today", web::get().to(get_same_day_offers))
        .route("/{id}/status", web::put().to(update_offer_status))
        .route("/{id}/views", web::post().to(track_view))
        .route("/{id}/claims", web::post().to(claim_offer))
        .route(
            "/{id}/analytics/timeseries",
            web::get().to(get_offer_time_series),
        )
        .route("/{id}/analytics", web::get().to(get_offer_analytics))
        .route("/{id}", web::get().to(get_offer))
}

pub fn user_routes() -> actix_web::Scope {
    web::scope("/users").route("/{user_id}/claims", web::get().to(list_user_claims))
}

pub fn claim_routes() -> actix_web::Scope {
    web::scope("/claims").route("/{id}/redeem", web::post().to(redeem_claim))
}

/// 全部 v1 路由
pub fn api_v1_routes() -> actix_web::Scope {
    web::scope("/v1")
        .service(venue_routes())
        .service(offer_routes())
        .service(user_routes())
        .service(claim_routes())
}
