//! Push fan-out contract
//!
//! Delivery itself belongs to an external transport. `PushSender` is the seam
//! it plugs into; `LoggingPushSender` stands in until one is wired.

use serde::Serialize;
use tracing::info;

/// 推送内容
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushPayload {
    pub offer_id: String,
    pub venue_id: String,
    pub venue_name: String,
    /// 客户端路由，形如 `offers/{offer_id}`
    pub deep_link: String,
    pub title: String,
    pub body: String,
}

impl PushPayload {
    pub fn deep_link_for(offer_id: &str) -> String {
        format!("offers/{}", offer_id)
    }
}

/// 单个推送目标（已确认有设备 token）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushTarget {
    pub user_id: String,
    pub device_token: String,
}

/// 单个 token 的投递结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub user_id: String,
    pub success: bool,
    pub error: Option<String>,
}

impl DeliveryReport {
    pub fn delivered(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(user_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// 推送发送端
///
/// 整批失败返回 `Err`，调用方把所有目标记为失败。
#[async_trait::async_trait]
pub trait PushSender: Send + Sync {
    async fn send(
        &self,
        targets: &[PushTarget],
        payload: &PushPayload,
    ) -> anyhow::Result<Vec<DeliveryReport>>;
}

/// 只写日志、全部视为成功
pub struct LoggingPushSender;

#[async_trait::async_trait]
impl PushSender for LoggingPushSender {
    async fn send(
        &self,
        targets: &[PushTarget],
        payload: &PushPayload,
    ) -> anyhow::Result<Vec<DeliveryReport>> {
        info!(
            "Push '{}' ({}) to {} devices",
            payload.title,
            payload.deep_link,
            targets.len()
        );
        Ok(targets
            .iter()
            .map(|t| DeliveryReport::delivered(t.user_id.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logging_sender_reports_success_per_target() {
        let targets = vec![
            PushTarget {
                user_id: "u1".to_string(),
                device_token: "tok-1".to_string(),
            },
            PushTarget {
                user_id: "u2".to_string(),
                device_token: "tok-2".to_string(),
            },
        ];
        let payload = PushPayload {
            offer_id: "o1".to_string(),
            venue_id: "v1".to_string(),
            venue_name: "Corner Bar".to_string(),
            deep_link: PushPayload::deep_link_for("o1"),
            title: "Half price".to_string(),
            body: "Corner Bar: 10 available".to_string(),
        };

        let reports = LoggingPushSender.send(&targets, &payload).await.unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.success));
        assert_eq!(payload.deep_link, "offers/o1");
    }
}
