//! HTTP 端点
//!
//! - 场馆：发布、列表、额度、按核销码查询与核销
//! - 用户：附近/当日 offer、领取、我的领取
//! - 分析：浏览埋点、漏斗、时间序列
//! - 健康检查

mod analytics;
mod claims;
pub mod error_code;
pub mod health;
mod helpers;
mod offers;
pub mod routes;
mod types;

pub use error_code::ErrorCode;
pub use health::{AppStartTime, HealthService, health_routes};
pub use helpers::{api_result, error_from_flash_offer, error_response, success_response};
pub use routes::api_v1_routes;
pub use types::*;
