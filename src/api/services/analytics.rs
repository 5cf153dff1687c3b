//! Analytics 端点：浏览埋点、漏斗、按小时时间序列

use actix_web::{HttpResponse, web};

use crate::services::AnalyticsService;
use crate::storage::EventType;

use super::helpers::{api_result, success_response};
use super::types::ViewRequest;

/// POST /offers/{id}/views
///
/// 埋点永远成功，写入失败只记日志。
pub async fn track_view(
    path: web::Path<String>,
    body: Option<web::Json<ViewRequest>>,
    analytics: web::Data<AnalyticsService>,
) -> HttpResponse {
    let offer_id = path.into_inner();
    let user_id = body.and_then(|b| b.into_inner().user_id);
    analytics
        .track_event(&offer_id, EventType::View, user_id.as_deref(), None)
        .await;
    success_response(serde_json::json!({ "offer_id": offer_id }))
}

/// GET /offers/{id}/analytics
pub async fn get_offer_analytics(
    path: web::Path<String>,
    analytics: web::Data<AnalyticsService>,
) -> HttpResponse {
    api_result(analytics.get_analytics(&path.into_inner()).await)
}

/// GET /offers/{id}/analytics/timeseries
pub async fn get_offer_time_series(
    path: web::Path<String>,
    analytics: web::Data<AnalyticsService>,
) -> HttpResponse {
    api_result(analytics.get_time_series(&path.into_inner()).await)
}
