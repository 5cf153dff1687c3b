use std::fmt;

use actix_web::http::StatusCode;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub enum FlashOfferError {
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    FileOperation(String),
    Validation(String),
    NotFound(String),
    Serialization(String),
    InvalidStatusTransition(String),
    RateLimitExceeded {
        message: String,
        resets_at: Option<DateTime<Utc>>,
    },
    // 领取资格
    AlreadyClaimed(String),
    OfferFull(String),
    OfferNotActive(String),
    OfferExpired(String),
    NotCheckedIn(String),
    // 核销
    AlreadyRedeemed(String),
    ClaimExpired(String),
    TokenExhausted(String),
    AnalyticsQueryFailed(String),
}

impl FlashOfferError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            FlashOfferError::DatabaseConfig(_) => "E001",
            FlashOfferError::DatabaseConnection(_) => "E002",
            FlashOfferError::DatabaseOperation(_) => "E003",
            FlashOfferError::FileOperation(_) => "E004",
            FlashOfferError::Validation(_) => "E005",
            FlashOfferError::NotFound(_) => "E006",
            FlashOfferError::Serialization(_) => "E007",
            FlashOfferError::InvalidStatusTransition(_) => "E008",
            FlashOfferError::RateLimitExceeded { .. } => "E009",
            FlashOfferError::AlreadyClaimed(_) => "E010",
            FlashOfferError::OfferFull(_) => "E011",
            FlashOfferError::OfferNotActive(_) => "E012",
            FlashOfferError::OfferExpired(_) => "E013",
            FlashOfferError::NotCheckedIn(_) => "E014",
            FlashOfferError::AlreadyRedeemed(_) => "E015",
            FlashOfferError::ClaimExpired(_) => "E016",
            FlashOfferError::TokenExhausted(_) => "E017",
            FlashOfferError::AnalyticsQueryFailed(_) => "E018",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            FlashOfferError::DatabaseConfig(_) => "Database Configuration Error",
            FlashOfferError::DatabaseConnection(_) => "Database Connection Error",
            FlashOfferError::DatabaseOperation(_) => "Database Operation Error",
            FlashOfferError::FileOperation(_) => "File Operation Error",
            FlashOfferError::Validation(_) => "Validation Error",
            FlashOfferError::NotFound(_) => "Resource Not Found",
            FlashOfferError::Serialization(_) => "Serialization Error",
            FlashOfferError::InvalidStatusTransition(_) => "Invalid Status Transition",
            FlashOfferError::RateLimitExceeded { .. } => "Publish Limit Reached",
            FlashOfferError::AlreadyClaimed(_) => "Already Claimed",
            FlashOfferError::OfferFull(_) => "Offer Full",
            FlashOfferError::OfferNotActive(_) => "Offer Not Active",
            FlashOfferError::OfferExpired(_) => "Offer Expired",
            FlashOfferError::NotCheckedIn(_) => "Not Checked In",
            FlashOfferError::AlreadyRedeemed(_) => "Already Redeemed",
            FlashOfferError::ClaimExpired(_) => "Claim Expired",
            FlashOfferError::TokenExhausted(_) => "Token Generation Failed",
            FlashOfferError::AnalyticsQueryFailed(_) => "Analytics Query Failed",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            FlashOfferError::DatabaseConfig(msg)
            | FlashOfferError::DatabaseConnection(msg)
            | FlashOfferError::DatabaseOperation(msg)
            | FlashOfferError::FileOperation(msg)
            | FlashOfferError::Validation(msg)
            | FlashOfferError::NotFound(msg)
            | FlashOfferError::Serialization(msg)
            | FlashOfferError::InvalidStatusTransition(msg)
            | FlashOfferError::AlreadyClaimed(msg)
            | FlashOfferError::OfferFull(msg)
            | FlashOfferError::OfferNotActive(msg)
            | FlashOfferError::OfferExpired(msg)
            | FlashOfferError::NotCheckedIn(msg)
            | FlashOfferError::AlreadyRedeemed(msg)
            | FlashOfferError::ClaimExpired(msg)
            | FlashOfferError::TokenExhausted(msg)
            | FlashOfferError::AnalyticsQueryFailed(msg) => msg,
            FlashOfferError::RateLimitExceeded { message, .. } => message,
        }
    }

    /// HTTP 状态码映射
    pub fn http_status(&self) -> StatusCode {
        match self {
            FlashOfferError::Validation(_) => StatusCode::BAD_REQUEST,
            FlashOfferError::NotFound(_) => StatusCode::NOT_FOUND,
            FlashOfferError::InvalidStatusTransition(_) => StatusCode::CONFLICT,
            FlashOfferError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            e if e.is_eligibility() => StatusCode::CONFLICT,
            FlashOfferError::AlreadyRedeemed(_) => StatusCode::CONFLICT,
            FlashOfferError::ClaimExpired(_) => StatusCode::GONE,
            e if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 用户侧资格错误（不可重试，不按系统错误记录）
    pub fn is_eligibility(&self) -> bool {
        matches!(
            self,
            FlashOfferError::AlreadyClaimed(_)
                | FlashOfferError::OfferFull(_)
                | FlashOfferError::OfferNotActive(_)
                | FlashOfferError::OfferExpired(_)
                | FlashOfferError::NotCheckedIn(_)
        )
    }

    /// 基础设施错误，调用方可以稍后重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FlashOfferError::DatabaseConnection(_) | FlashOfferError::DatabaseOperation(_)
        )
    }

    /// 格式化为彩色输出（用于 Server 模式）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出（用于 CLI 模式）
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for FlashOfferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for FlashOfferError {}

// 便捷的构造函数
impl FlashOfferError {
    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        FlashOfferError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        FlashOfferError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        FlashOfferError::DatabaseOperation(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        FlashOfferError::FileOperation(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        FlashOfferError::Validation(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        FlashOfferError::NotFound(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        FlashOfferError::Serialization(msg.into())
    }

    pub fn invalid_status_transition<T: Into<String>>(msg: T) -> Self {
        FlashOfferError::InvalidStatusTransition(msg.into())
    }

    pub fn rate_limit_exceeded<T: Into<String>>(msg: T, resets_at: Option<DateTime<Utc>>) -> Self {
        FlashOfferError::RateLimitExceeded {
            message: msg.into(),
            resets_at,
        }
    }

    pub fn already_claimed<T: Into<String>>(msg: T) -> Self {
        FlashOfferError::AlreadyClaimed(msg.into())
    }

    pub fn offer_full<T: Into<String>>(msg: T) -> Self {
        FlashOfferError::OfferFull(msg.into())
    }

    pub fn offer_not_active<T: Into<String>>(msg: T) -> Self {
        FlashOfferError::OfferNotActive(msg.into())
    }

    pub fn offer_expired<T: Into<String>>(msg: T) -> Self {
        FlashOfferError::OfferExpired(msg.into())
    }

    pub fn not_checked_in<T: Into<String>>(msg: T) -> Self {
        FlashOfferError::NotCheckedIn(msg.into())
    }

    pub fn already_redeemed<T: Into<String>>(msg: T) -> Self {
        FlashOfferError::AlreadyRedeemed(msg.into())
    }

    pub fn claim_expired<T: Into<String>>(msg: T) -> Self {
        FlashOfferError::ClaimExpired(msg.into())
    }

    pub fn token_exhausted<T: Into<String>>(msg: T) -> Self {
        FlashOfferError::TokenExhausted(msg.into())
    }

    pub fn analytics_query_failed<T: Into<String>>(msg: T) -> Self {
        FlashOfferError::AnalyticsQueryFailed(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<sea_orm::DbErr> for FlashOfferError {
    fn from(err: sea_orm::DbErr) -> Self {
        match err {
            sea_orm::DbErr::ConnectionAcquire(_) | sea_orm::DbErr::Conn(_) => {
                FlashOfferError::DatabaseConnection(err.to_string())
            }
            _ => FlashOfferError::DatabaseOperation(err.to_string()),
        }
    }
}

impl From<std::io::Error> for FlashOfferError {
    fn from(err: std::io::Error) -> Self {
        FlashOfferError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for FlashOfferError {
    fn from(err: serde_json::Error) -> Self {
        FlashOfferError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FlashOfferError>;
