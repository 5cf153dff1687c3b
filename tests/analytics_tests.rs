//! Funnel analytics tests

use std::sync::{Arc, Once};

use chrono::{Duration, Utc};
use tempfile::TempDir;

use flash_offers::config::init_config;
use flash_offers::errors::FlashOfferError;
use flash_offers::services::{AnalyticsService, ClaimService, CreateOfferRequest, OfferService};
use flash_offers::storage::{EventType, NewEvent, Offer, OfferStatus, SeaOrmStorage};

static INIT: Once = Once::new();

fn init_test_config() {
    INIT.call_once(|| {
        init_config();
    });
}

async fn create_temp_storage() -> (Arc<SeaOrmStorage>, TempDir) {
    init_test_config();

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("analytics.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let storage = SeaOrmStorage::new(&db_url, "sqlite")
        .await
        .expect("Failed to create storage");

    (Arc::new(storage), temp_dir)
}

async fn create_offer(storage: &Arc<SeaOrmStorage>, max_claims: u32) -> Offer {
    OfferService::new(storage.clone())
        .create(
            "v1",
            CreateOfferRequest {
                title: "Late night special".to_string(),
                description: None,
                value_cap: None,
                max_claims,
                start_time: None,
                end_time: Utc::now() + Duration::hours(1),
                radius_km: None,
                favorites_only: false,
            },
        )
        .await
        .unwrap()
}

fn events(offer_id: &str, event_type: EventType, n: usize) -> Vec<NewEvent> {
    (0..n)
        .map(|i| NewEvent::new(offer_id, event_type).with_user(format!("user-{}", i)))
        .collect()
}

#[tokio::test]
async fn test_funnel_rates() {
    let (storage, _dir) = create_temp_storage().await;
    let offer = create_offer(&storage, 50).await;

    let mut batch = events(&offer.id, EventType::PushSent, 100);
    batch.extend(events(&offer.id, EventType::View, 40));
    batch.extend(events(&offer.id, EventType::Claim, 10));
    batch.extend(events(&offer.id, EventType::Redeem, 5));

    let analytics = AnalyticsService::new(storage.clone());
    assert_eq!(analytics.track_events(batch).await, 155);

    let report = analytics.get_analytics(&offer.id).await.unwrap();
    assert_eq!(report.counts.push_sent, 100);
    assert_eq!(report.counts.views, 40);
    assert_eq!(report.counts.claims, 10);
    assert_eq!(report.counts.redemptions, 5);
    assert_eq!(report.open_rate, 40.0);
    assert_eq!(report.claim_rate, 25.0);
    assert_eq!(report.redemption_rate, 50.0);
    assert_eq!(report.time_to_full_secs, None);
}

#[tokio::test]
async fn test_zero_denominators_report_zero() {
    let (storage, _dir) = create_temp_storage().await;
    let offer = create_offer(&storage, 5).await;

    let analytics = AnalyticsService::new(storage.clone());
    analytics
        .track_event(&offer.id, EventType::View, Some("u1"), None)
        .await;

    let report = analytics.get_analytics(&offer.id).await.unwrap();
    assert_eq!(report.counts.views, 1);
    assert_eq!(report.open_rate, 0.0);
    assert_eq!(report.claim_rate, 0.0);
    assert_eq!(report.redemption_rate, 0.0);
}

#[tokio::test]
async fn test_time_to_full_once_capacity_is_reached() {
    let (storage, _dir) = create_temp_storage().await;
    let offer = create_offer(&storage, 2).await;

    let claims = ClaimService::new(storage.clone());
    for user in ["a", "b"] {
        storage
            .record_check_in(user, "v1", Utc::now(), true)
            .await
            .unwrap();
        claims.claim(&offer.id, user).await.unwrap();
    }

    let stored = storage.find_offer(&offer.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OfferStatus::Full);

    let report = AnalyticsService::new(storage.clone())
        .get_analytics(&offer.id)
        .await
        .unwrap();
    assert_eq!(report.counts.claims, 2);
    let secs = report.time_to_full_secs.expect("full offer has a fill time");
    assert!((0..60).contains(&secs));
}

#[tokio::test]
async fn test_time_series_buckets_by_hour() {
    let (storage, _dir) = create_temp_storage().await;
    let offer = create_offer(&storage, 10).await;

    let mut batch = events(&offer.id, EventType::PushSent, 6);
    batch.extend(events(&offer.id, EventType::View, 3));
    batch.extend(events("other-offer", EventType::View, 7));
    let analytics = AnalyticsService::new(storage.clone());
    analytics.track_events(batch).await;

    let series = analytics.get_time_series(&offer.id).await.unwrap();
    assert!(!series.buckets.is_empty());
    assert!(series.buckets.iter().all(|b| b.hour.ends_with(":00")));

    let push: u64 = series.buckets.iter().map(|b| b.counts.push_sent).sum();
    let views: u64 = series.buckets.iter().map(|b| b.counts.views).sum();
    assert_eq!(push, 6);
    assert_eq!(views, 3);

    let hours: Vec<&str> = series.buckets.iter().map(|b| b.hour.as_str()).collect();
    let mut sorted = hours.clone();
    sorted.sort();
    assert_eq!(hours, sorted);
}

#[tokio::test]
async fn test_unknown_offer_is_not_found() {
    let (storage, _dir) = create_temp_storage().await;
    let analytics = AnalyticsService::new(storage);

    let err = analytics.get_analytics("missing").await.unwrap_err();
    assert!(matches!(err, FlashOfferError::NotFound(_)));

    let err = analytics.get_time_series("missing").await.unwrap_err();
    assert!(matches!(err, FlashOfferError::NotFound(_)));
}

#[tokio::test]
async fn test_tracking_never_fails_the_caller() {
    let (storage, _dir) = create_temp_storage().await;
    let analytics = AnalyticsService::new(storage);

    // 事件表不校验 offer 是否存在，空批次直接返回 0
    analytics
        .track_event("missing", EventType::View, None, None)
        .await;
    assert_eq!(analytics.track_events(Vec::new()).await, 0);
}
