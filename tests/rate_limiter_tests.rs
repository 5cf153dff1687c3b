//! Publication rate limiter tests

use std::sync::{Arc, Once};

use chrono::{Duration, Utc};
use tempfile::TempDir;

use flash_offers::config::init_config;
use flash_offers::errors::FlashOfferError;
use flash_offers::services::{RateLimiter, SubscriptionTier};
use flash_offers::storage::{OFFER_PUBLISH, SeaOrmStorage};

static INIT: Once = Once::new();

fn init_test_config() {
    INIT.call_once(|| {
        init_config();
    });
}

async fn create_temp_storage() -> (Arc<SeaOrmStorage>, TempDir) {
    init_test_config();

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("rate.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let storage = SeaOrmStorage::new(&db_url, "sqlite")
        .await
        .expect("Failed to create storage");

    (Arc::new(storage), temp_dir)
}

async fn publish_at(storage: &SeaOrmStorage, venue_id: &str, minutes_ago: i64) {
    storage
        .increment_rate_window(
            venue_id,
            OFFER_PUBLISH,
            Utc::now() - Duration::minutes(minutes_ago),
            Duration::minutes(60),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_fresh_venue_has_full_budget() {
    let (storage, _dir) = create_temp_storage().await;
    let limiter = RateLimiter::new(storage);

    let status = limiter.get_status("v1", SubscriptionTier::Free).await;
    assert_eq!(status.current_count, 0);
    assert_eq!(status.limit, Some(3));
    assert_eq!(status.remaining, Some(3));
    assert!(!status.is_unlimited);
    assert!(status.resets_at.is_none());
    assert!(!status.fail_open);
}

#[tokio::test]
async fn test_free_tier_exhausted_after_three_publications() {
    let (storage, _dir) = create_temp_storage().await;
    publish_at(&storage, "v1", 120).await;
    publish_at(&storage, "v1", 50).await;
    publish_at(&storage, "v1", 10).await;

    let limiter = RateLimiter::new(storage.clone());
    let status = limiter.get_status("v1", SubscriptionTier::Free).await;
    assert_eq!(status.current_count, 3);
    assert_eq!(status.remaining, Some(0));

    // 最旧窗口在 -120 分钟开启，滚出 24 小时窗口即重置
    let expected_reset = Utc::now() - Duration::minutes(120) + Duration::hours(24);
    let resets_at = status.resets_at.expect("exhausted budget has a reset time");
    assert!((resets_at - expected_reset).num_seconds().abs() < 5);

    let err = limiter.check("v1", SubscriptionTier::Free).await.unwrap_err();
    match err {
        FlashOfferError::RateLimitExceeded { resets_at, .. } => {
            assert_eq!(resets_at, status.resets_at);
        }
        other => panic!("expected RateLimitExceeded, got {:?}", other),
    }

    // 更高档位仍有额度
    let core = limiter.check("v1", SubscriptionTier::Core).await.unwrap();
    assert_eq!(core.remaining, Some(2));
}

#[tokio::test]
async fn test_publications_within_sub_window_share_a_row() {
    let (storage, _dir) = create_temp_storage().await;
    publish_at(&storage, "v1", 30).await;
    publish_at(&storage, "v1", 20).await;
    publish_at(&storage, "v1", 5).await;

    let windows = storage
        .list_rate_windows("v1", OFFER_PUBLISH, Utc::now() - Duration::hours(24))
        .await
        .unwrap();
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].count, 3);
}

#[tokio::test]
async fn test_old_windows_roll_out() {
    let (storage, _dir) = create_temp_storage().await;
    publish_at(&storage, "v1", 25 * 60).await;
    publish_at(&storage, "v1", 24 * 60 + 30).await;
    publish_at(&storage, "v1", 60).await;

    let status = RateLimiter::new(storage)
        .get_status("v1", SubscriptionTier::Free)
        .await;
    assert_eq!(status.current_count, 1);
    assert_eq!(status.remaining, Some(2));
}

#[tokio::test]
async fn test_unlimited_tier_ignores_history() {
    let (storage, _dir) = create_temp_storage().await;
    for minutes in [300, 200, 100, 10] {
        publish_at(&storage, "v1", minutes).await;
    }

    let limiter = RateLimiter::new(storage);
    let status = limiter
        .check("v1", SubscriptionTier::Unlimited)
        .await
        .unwrap();
    assert!(status.is_unlimited);
    assert_eq!(status.limit, None);
    assert_eq!(status.remaining, None);
}

#[tokio::test]
async fn test_record_publication_counts_against_venue_only() {
    let (storage, _dir) = create_temp_storage().await;
    let limiter = RateLimiter::new(storage);

    limiter.record_publication("v1").await.unwrap();
    limiter.record_publication("v1").await.unwrap();

    let v1 = limiter.get_status("v1", SubscriptionTier::Free).await;
    let v2 = limiter.get_status("v2", SubscriptionTier::Free).await;
    assert_eq!(v1.current_count, 2);
    assert_eq!(v1.remaining, Some(1));
    assert_eq!(v2.current_count, 0);
}

#[tokio::test]
async fn test_storage_failure_fails_open() {
    use sea_orm::ConnectionTrait;

    let (storage, _dir) = create_temp_storage().await;
    publish_at(&storage, "v1", 10).await;
    storage
        .get_db()
        .execute_unprepared("DROP TABLE rate_limit_windows")
        .await
        .unwrap();

    let status = RateLimiter::new(storage)
        .get_status("v1", SubscriptionTier::Free)
        .await;
    assert!(status.fail_open);
    assert_eq!(status.current_count, 0);
    assert_eq!(status.limit, Some(3));
    assert_eq!(status.remaining, Some(3));
    assert!(!status.is_unlimited);
}
