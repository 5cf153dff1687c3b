use std::str::FromStr;

use tracing::warn;

use crate::storage::models::{
    Claim, ClaimStatus, EventType, Offer, OfferEvent, OfferStatus, RateLimitWindow, Venue,
};
use crate::utils::Coordinates;
use migration::entities::{offer, offer_claim, offer_event, rate_limit_window, venue};

/// 将 offer Model 转换为 Offer
///
/// 无法识别的状态按 cancelled 处理，保证不会被领取。
pub fn model_to_offer(model: offer::Model) -> Offer {
    let status = OfferStatus::from_str(&model.status).unwrap_or_else(|_| {
        warn!(
            "Offer {} has unknown status '{}', treating as cancelled",
            model.id, model.status
        );
        OfferStatus::Cancelled
    });

    Offer {
        id: model.id,
        venue_id: model.venue_id,
        title: model.title,
        description: model.description,
        value_cap: model.value_cap,
        max_claims: model.max_claims.max(0) as u32,
        claimed_count: model.claimed_count.max(0) as u32,
        start_time: model.start_time,
        end_time: model.end_time,
        radius_km: model.radius_km,
        favorites_only: model.favorites_only,
        status,
        push_sent: model.push_sent,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

/// 将 Offer 转换为 ActiveModel（仅用于插入）
pub fn offer_to_active_model(o: &Offer) -> offer::ActiveModel {
    use sea_orm::ActiveValue::*;

    offer::ActiveModel {
        id: Set(o.id.clone()),
        venue_id: Set(o.venue_id.clone()),
        title: Set(o.title.clone()),
        description: Set(o.description.clone()),
        value_cap: Set(o.value_cap.clone()),
        max_claims: Set(o.max_claims as i32),
        claimed_count: Set(o.claimed_count as i32),
        start_time: Set(o.start_time),
        end_time: Set(o.end_time),
        radius_km: Set(o.radius_km),
        favorites_only: Set(o.favorites_only),
        status: Set(o.status.to_string()),
        push_sent: Set(o.push_sent),
        created_at: Set(o.created_at),
        updated_at: Set(o.updated_at),
    }
}

pub fn model_to_claim(model: offer_claim::Model) -> Claim {
    let status = ClaimStatus::from_str(&model.status).unwrap_or_else(|_| {
        warn!(
            "Claim {} has unknown status '{}', treating as expired",
            model.id, model.status
        );
        ClaimStatus::Expired
    });

    Claim {
        id: model.id,
        offer_id: model.offer_id,
        user_id: model.user_id,
        token: model.token,
        status,
        redeemed_at: model.redeemed_at,
        redeemed_by: model.redeemed_by,
        expires_at: model.expires_at,
        created_at: model.created_at,
    }
}

pub fn claim_to_active_model(c: &Claim) -> offer_claim::ActiveModel {
    use sea_orm::ActiveValue::*;

    offer_claim::ActiveModel {
        id: Set(c.id.clone()),
        offer_id: Set(c.offer_id.clone()),
        user_id: Set(c.user_id.clone()),
        token: Set(c.token.clone()),
        status: Set(c.status.to_string()),
        redeemed_at: Set(c.redeemed_at),
        redeemed_by: Set(c.redeemed_by.clone()),
        expires_at: Set(c.expires_at),
        created_at: Set(c.created_at),
    }
}

/// 事件类型无法识别时返回 None（调用方跳过该行）
pub fn model_to_event(model: offer_event::Model) -> Option<OfferEvent> {
    let event_type = EventType::from_str(&model.event_type).ok()?;
    let metadata = model
        .metadata
        .as_deref()
        .and_then(|raw| serde_json::from_str(raw).ok());

    Some(OfferEvent {
        id: model.id,
        offer_id: model.offer_id,
        user_id: model.user_id,
        event_type,
        metadata,
        created_at: model.created_at,
    })
}

pub fn model_to_venue(model: venue::Model) -> Venue {
    Venue {
        coordinates: Coordinates::from_parts(model.latitude, model.longitude),
        id: model.id,
        name: model.name,
    }
}

pub fn model_to_window(model: rate_limit_window::Model) -> RateLimitWindow {
    RateLimitWindow {
        venue_id: model.venue_id,
        limit_type: model.limit_type,
        window_start: model.window_start,
        count: model.count.max(0) as u32,
    }
}
