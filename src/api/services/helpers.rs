//! API 帮助函数

use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use serde::Serialize;
use tracing::{debug, error};

use crate::errors::FlashOfferError;

use super::error_code::ErrorCode;
use super::types::{ApiResponse, RateLimitErrorData};

/// 构建 JSON 响应
pub fn json_response<T: Serialize>(
    status: StatusCode,
    code: ErrorCode,
    message: impl Into<String>,
    data: Option<T>,
) -> HttpResponse {
    HttpResponse::build(status)
        .append_header(("Content-Type", "application/json; charset=utf-8"))
        .json(ApiResponse {
            code: code as i32,
            message: message.into(),
            data,
        })
}

/// 构建成功响应
pub fn success_response<T: Serialize>(data: T) -> HttpResponse {
    json_response(StatusCode::OK, ErrorCode::Success, "OK", Some(data))
}

/// 构建 201 响应
pub fn created_response<T: Serialize>(data: T) -> HttpResponse {
    json_response(StatusCode::CREATED, ErrorCode::Success, "Created", Some(data))
}

/// 构建错误响应
pub fn error_response(status: StatusCode, error_code: ErrorCode, message: &str) -> HttpResponse {
    json_response::<()>(status, error_code, message, None)
}

/// 基础设施错误对外统一的提示，细节只进日志
pub const RETRYABLE_ERROR_MESSAGE: &str = "Service temporarily unavailable, please retry";

/// 从 FlashOfferError 构建错误响应（自动映射 HTTP 状态码和 ErrorCode）
///
/// 资格类错误只记 debug，基础设施错误记 error。
pub fn error_from_flash_offer(err: &FlashOfferError) -> HttpResponse {
    let status = err.http_status();
    let error_code = ErrorCode::from(err);

    if status.is_server_error() {
        error!("API request failed: {}", err);
    } else {
        debug!("API request rejected: {}", err);
    }

    match err {
        FlashOfferError::RateLimitExceeded { resets_at, .. } => json_response(
            status,
            error_code,
            err.message(),
            Some(RateLimitErrorData {
                resets_at: *resets_at,
            }),
        ),
        e if e.is_retryable() => error_response(status, error_code, RETRYABLE_ERROR_MESSAGE),
        _ => error_response(status, error_code, err.message()),
    }
}

/// 统一 Result → HttpResponse 转换
///
/// 成功时返回 200 OK + JSON 数据，失败时自动映射 FlashOfferError。
pub fn api_result<T, E>(result: Result<T, E>) -> HttpResponse
where
    T: Serialize,
    E: Into<FlashOfferError>,
{
    match result {
        Ok(data) => success_response(data),
        Err(e) => error_from_flash_offer(&e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_response() {
        let response = success_response("success_data");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_created_response() {
        let response = created_response("new");
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[test]
    fn test_error_mapping_statuses() {
        let cases = [
            (FlashOfferError::validation("bad"), StatusCode::BAD_REQUEST),
            (FlashOfferError::not_found("gone"), StatusCode::NOT_FOUND),
            (FlashOfferError::offer_full("full"), StatusCode::CONFLICT),
            (
                FlashOfferError::rate_limit_exceeded("slow down", None),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                FlashOfferError::database_connection("down"),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(error_from_flash_offer(&err).status(), expected);
        }
    }

    #[actix_rt::test]
    async fn test_retryable_error_hides_database_detail() {
        let err = FlashOfferError::DatabaseOperation(
            "Execution Error: error returned from database: (code: 5) database is locked"
                .to_string(),
        );
        let resp = error_from_flash_offer(&err);
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], ErrorCode::ServiceUnavailable as i32);
        assert_eq!(json["message"], RETRYABLE_ERROR_MESSAGE);
        assert!(!json["message"].as_str().unwrap().contains("locked"));
    }

    #[test]
    fn test_api_result_error() {
        let result: Result<(), FlashOfferError> = Err(FlashOfferError::already_claimed("twice"));
        assert_eq!(api_result(result).status(), StatusCode::CONFLICT);
    }
}
