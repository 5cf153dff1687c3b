//! Claim engine tests
//!
//! Eligibility ordering, capacity under concurrency and token handling,
//! against temporary SQLite databases.

use std::sync::{Arc, Once};

use chrono::{Duration, Utc};
use futures_util::future::join_all;
use tempfile::TempDir;

use flash_offers::config::init_config;
use flash_offers::errors::FlashOfferError;
use flash_offers::services::{ClaimService, CreateOfferRequest, OfferService};
use flash_offers::storage::{
    ClaimStatus, Offer, OfferStatus, ReserveOutcome, SeaOrmStorage, Venue,
};
use flash_offers::utils::Coordinates;

static INIT: Once = Once::new();

fn init_test_config() {
    INIT.call_once(|| {
        init_config();
    });
}

async fn create_temp_storage() -> (Arc<SeaOrmStorage>, TempDir) {
    init_test_config();

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("claims.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let storage = SeaOrmStorage::new(&db_url, "sqlite")
        .await
        .expect("Failed to create storage");

    (Arc::new(storage), temp_dir)
}

async fn seed_venue(storage: &SeaOrmStorage, venue_id: &str) {
    storage
        .upsert_venue(&Venue {
            id: venue_id.to_string(),
            name: "Corner Bar".to_string(),
            coordinates: Some(Coordinates::new(40.7128, -74.0060)),
        })
        .await
        .unwrap();
}

async fn check_in(storage: &SeaOrmStorage, user_id: &str, venue_id: &str) {
    storage
        .record_check_in(user_id, venue_id, Utc::now() - Duration::minutes(5), true)
        .await
        .unwrap();
}

async fn create_offer(storage: &Arc<SeaOrmStorage>, venue_id: &str, max_claims: u32) -> Offer {
    OfferService::new(storage.clone())
        .create(
            venue_id,
            CreateOfferRequest {
                title: "Two for one".to_string(),
                description: None,
                value_cap: Some("$10".to_string()),
                max_claims,
                start_time: None,
                end_time: Utc::now() + Duration::hours(3),
                radius_km: None,
                favorites_only: false,
            },
        )
        .await
        .unwrap()
}

fn raw_offer(id: &str, venue_id: &str, status: OfferStatus, max_claims: u32) -> Offer {
    let now = Utc::now();
    Offer {
        id: id.to_string(),
        venue_id: venue_id.to_string(),
        title: "Raw".to_string(),
        description: None,
        value_cap: None,
        max_claims,
        claimed_count: 0,
        start_time: now - Duration::hours(1),
        end_time: now + Duration::hours(1),
        radius_km: 1.0,
        favorites_only: false,
        status,
        push_sent: false,
        created_at: now,
        updated_at: now,
    }
}

// =============================================================================
// 正常领取
// =============================================================================

#[tokio::test]
async fn test_claim_success_reserves_capacity() {
    let (storage, _dir) = create_temp_storage().await;
    seed_venue(&storage, "v1").await;
    check_in(&storage, "alice", "v1").await;
    let offer = create_offer(&storage, "v1", 3).await;

    let service = ClaimService::new(storage.clone());
    let claim = service.claim(&offer.id, "alice").await.unwrap();

    assert_eq!(claim.offer_id, offer.id);
    assert_eq!(claim.user_id, "alice");
    assert_eq!(claim.status, ClaimStatus::Active);
    assert_eq!(claim.token.len(), 9);
    assert!(claim.expires_at > Utc::now() + Duration::hours(23));

    let stored = storage.find_offer(&offer.id).await.unwrap().unwrap();
    assert_eq!(stored.claimed_count, 1);
    assert_eq!(stored.status, OfferStatus::Active);
}

#[tokio::test]
async fn test_last_claim_flips_offer_to_full() {
    let (storage, _dir) = create_temp_storage().await;
    seed_venue(&storage, "v1").await;
    check_in(&storage, "alice", "v1").await;
    check_in(&storage, "bob", "v1").await;
    let offer = create_offer(&storage, "v1", 1).await;

    let service = ClaimService::new(storage.clone());
    service.claim(&offer.id, "alice").await.unwrap();

    let stored = storage.find_offer(&offer.id).await.unwrap().unwrap();
    assert_eq!(stored.claimed_count, stored.max_claims);
    assert_eq!(stored.status, OfferStatus::Full);

    let err = service.claim(&offer.id, "bob").await.unwrap_err();
    assert!(matches!(err, FlashOfferError::OfferFull(_)));
}

// =============================================================================
// 资格校验
// =============================================================================

#[tokio::test]
async fn test_claim_unknown_offer_is_not_found() {
    let (storage, _dir) = create_temp_storage().await;
    let service = ClaimService::new(storage);

    let err = service.claim("missing", "alice").await.unwrap_err();
    assert!(matches!(err, FlashOfferError::NotFound(_)));
}

#[tokio::test]
async fn test_second_claim_by_same_user_is_rejected() {
    let (storage, _dir) = create_temp_storage().await;
    seed_venue(&storage, "v1").await;
    check_in(&storage, "alice", "v1").await;
    let offer = create_offer(&storage, "v1", 5).await;

    let service = ClaimService::new(storage.clone());
    service.claim(&offer.id, "alice").await.unwrap();
    let err = service.claim(&offer.id, "alice").await.unwrap_err();

    assert!(matches!(err, FlashOfferError::AlreadyClaimed(_)));
    let stored = storage.find_offer(&offer.id).await.unwrap().unwrap();
    assert_eq!(stored.claimed_count, 1);
}

#[tokio::test]
async fn test_claim_requires_recent_check_in() {
    let (storage, _dir) = create_temp_storage().await;
    seed_venue(&storage, "v1").await;
    let offer = create_offer(&storage, "v1", 5).await;
    let service = ClaimService::new(storage.clone());

    // 从未到店
    let err = service.claim(&offer.id, "alice").await.unwrap_err();
    assert!(matches!(err, FlashOfferError::NotCheckedIn(_)));

    // 到店记录超出窗口
    storage
        .record_check_in("bob", "v1", Utc::now() - Duration::hours(30), true)
        .await
        .unwrap();
    let err = service.claim(&offer.id, "bob").await.unwrap_err();
    assert!(matches!(err, FlashOfferError::NotCheckedIn(_)));

    // 已离店
    storage
        .record_check_in("carol", "v1", Utc::now(), false)
        .await
        .unwrap();
    let err = service.claim(&offer.id, "carol").await.unwrap_err();
    assert!(matches!(err, FlashOfferError::NotCheckedIn(_)));

    // 在其他场馆到店不算
    check_in(&storage, "dave", "v2").await;
    let err = service.claim(&offer.id, "dave").await.unwrap_err();
    assert!(matches!(err, FlashOfferError::NotCheckedIn(_)));
}

#[tokio::test]
async fn test_claim_status_errors() {
    let (storage, _dir) = create_temp_storage().await;
    seed_venue(&storage, "v1").await;
    check_in(&storage, "alice", "v1").await;
    let service = ClaimService::new(storage.clone());

    let cancelled = raw_offer("cancelled", "v1", OfferStatus::Cancelled, 5);
    storage.insert_offer(&cancelled).await.unwrap();
    let err = service.claim("cancelled", "alice").await.unwrap_err();
    assert!(matches!(err, FlashOfferError::OfferNotActive(_)));

    let mut scheduled = raw_offer("scheduled", "v1", OfferStatus::Scheduled, 5);
    scheduled.start_time = Utc::now() + Duration::hours(1);
    scheduled.end_time = Utc::now() + Duration::hours(2);
    storage.insert_offer(&scheduled).await.unwrap();
    let err = service.claim("scheduled", "alice").await.unwrap_err();
    assert!(matches!(err, FlashOfferError::OfferNotActive(_)));

    // 结束时间已过但状态还没刷新
    let mut ended = raw_offer("ended", "v1", OfferStatus::Active, 5);
    ended.start_time = Utc::now() - Duration::hours(3);
    ended.end_time = Utc::now() - Duration::minutes(1);
    storage.insert_offer(&ended).await.unwrap();
    let err = service.claim("ended", "alice").await.unwrap_err();
    assert!(matches!(err, FlashOfferError::OfferExpired(_)));
    let stored = storage.find_offer("ended").await.unwrap().unwrap();
    assert_eq!(stored.status, OfferStatus::Expired);
}

#[tokio::test]
async fn test_scheduled_offer_becomes_claimable_once_started() {
    let (storage, _dir) = create_temp_storage().await;
    seed_venue(&storage, "v1").await;
    check_in(&storage, "alice", "v1").await;

    // 开始时间已过，但仍是 scheduled
    let offer = raw_offer("late", "v1", OfferStatus::Scheduled, 5);
    storage.insert_offer(&offer).await.unwrap();

    let claim = ClaimService::new(storage.clone())
        .claim("late", "alice")
        .await
        .unwrap();
    assert_eq!(claim.offer_id, "late");

    let stored = storage.find_offer("late").await.unwrap().unwrap();
    assert_eq!(stored.status, OfferStatus::Active);
}

// =============================================================================
// 并发
// =============================================================================

#[tokio::test]
async fn test_concurrent_claims_never_over_allocate() {
    let (storage, _dir) = create_temp_storage().await;
    seed_venue(&storage, "v1").await;
    let users: Vec<String> = (0..20).map(|i| format!("user-{}", i)).collect();
    for user in &users {
        check_in(&storage, user, "v1").await;
    }
    let offer = create_offer(&storage, "v1", 5).await;

    let service = ClaimService::new(storage.clone());
    let results = join_all(users.iter().map(|user| service.claim(&offer.id, user))).await;

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let full = results
        .iter()
        .filter(|r| matches!(r, Err(FlashOfferError::OfferFull(_))))
        .count();
    assert_eq!(successes, 5);
    assert_eq!(full, 15);

    let stored = storage.find_offer(&offer.id).await.unwrap().unwrap();
    assert_eq!(stored.claimed_count, 5);
    assert_eq!(stored.status, OfferStatus::Full);
    assert_eq!(storage.list_offer_claims(&offer.id).await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_concurrent_claims_by_same_user_yield_one_claim() {
    let (storage, _dir) = create_temp_storage().await;
    seed_venue(&storage, "v1").await;
    check_in(&storage, "alice", "v1").await;
    let offer = create_offer(&storage, "v1", 10).await;

    let service = ClaimService::new(storage.clone());
    let results = join_all((0..5).map(|_| service.claim(&offer.id, "alice"))).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, FlashOfferError::AlreadyClaimed(_)))
    );
    let stored = storage.find_offer(&offer.id).await.unwrap().unwrap();
    assert_eq!(stored.claimed_count, 1);
}

// =============================================================================
// 核销码
// =============================================================================

#[tokio::test]
async fn test_tokens_unique_across_offers() {
    let (storage, _dir) = create_temp_storage().await;
    seed_venue(&storage, "v1").await;
    let service = ClaimService::new(storage.clone());

    let mut tokens = std::collections::HashSet::new();
    for i in 0..3 {
        let offer = create_offer(&storage, "v1", 10).await;
        for j in 0..5 {
            let user = format!("u-{}-{}", i, j);
            check_in(&storage, &user, "v1").await;
            let claim = service.claim(&offer.id, &user).await.unwrap();
            assert!(tokens.insert(claim.token));
        }
    }
    assert_eq!(tokens.len(), 15);
}

#[tokio::test]
async fn test_reserve_reports_token_collision_without_consuming_capacity() {
    let (storage, _dir) = create_temp_storage().await;
    seed_venue(&storage, "v1").await;
    let offer = create_offer(&storage, "v1", 5).await;

    let first = storage
        .reserve_claim(&offer.id, "alice", "AAAA-BBBB", Duration::hours(24))
        .await
        .unwrap();
    assert!(matches!(first, ReserveOutcome::Reserved(_)));

    let second = storage
        .reserve_claim(&offer.id, "bob", "AAAA-BBBB", Duration::hours(24))
        .await
        .unwrap();
    assert!(matches!(second, ReserveOutcome::TokenCollision));

    let stored = storage.find_offer(&offer.id).await.unwrap().unwrap();
    assert_eq!(stored.claimed_count, 1);
}

// =============================================================================
// 列表与清理
// =============================================================================

#[tokio::test]
async fn test_list_claims_report_effective_status() {
    let (storage, _dir) = create_temp_storage().await;
    seed_venue(&storage, "v1").await;
    let offer = create_offer(&storage, "v1", 5).await;

    storage
        .reserve_claim(&offer.id, "alice", "CCCC-DDDD", Duration::hours(-1))
        .await
        .unwrap();

    let service = ClaimService::new(storage.clone());
    let claims = service.list_user_claims("alice").await.unwrap();
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].status, ClaimStatus::Expired);

    // 存储里仍是 active，直到清理
    let raw = storage.find_claim(&claims[0].id).await.unwrap().unwrap();
    assert_eq!(raw.status, ClaimStatus::Active);

    assert_eq!(service.expire_stale_claims().await.unwrap(), 1);
    let raw = storage.find_claim(&claims[0].id).await.unwrap().unwrap();
    assert_eq!(raw.status, ClaimStatus::Expired);
    assert_eq!(service.expire_stale_claims().await.unwrap(), 0);
}

#[tokio::test]
async fn test_get_claim_not_found() {
    let (storage, _dir) = create_temp_storage().await;
    let err = ClaimService::new(storage)
        .get_claim("nope")
        .await
        .unwrap_err();
    assert!(matches!(err, FlashOfferError::NotFound(_)));
}

// =============================================================================
// 非原子退化路径
// =============================================================================

#[tokio::test]
async fn test_sequential_reservation_counts_and_fills() {
    let (storage, _dir) = create_temp_storage().await;
    seed_venue(&storage, "v1").await;
    let offer = create_offer(&storage, "v1", 2).await;
    let ttl = Duration::hours(1);

    let first = storage
        .reserve_claim_sequential(&offer.id, "alice", "SQAA-AAAA", ttl)
        .await
        .unwrap();
    let ReserveOutcome::Reserved(claim) = first else {
        panic!("expected a reservation, got {:?}", first);
    };
    assert_eq!(claim.user_id, "alice");
    assert_eq!(claim.status, ClaimStatus::Active);

    let stored = storage.find_offer(&offer.id).await.unwrap().unwrap();
    assert_eq!(stored.claimed_count, 1);
    assert_eq!(stored.status, OfferStatus::Active);

    let again = storage
        .reserve_claim_sequential(&offer.id, "alice", "SQBB-BBBB", ttl)
        .await
        .unwrap_err();
    assert!(matches!(again, FlashOfferError::AlreadyClaimed(_)));

    // 已被占用的核销码交还给调用方换码
    let collision = storage
        .reserve_claim_sequential(&offer.id, "bob", "SQAA-AAAA", ttl)
        .await
        .unwrap();
    assert!(matches!(collision, ReserveOutcome::TokenCollision));

    let last = storage
        .reserve_claim_sequential(&offer.id, "bob", "SQCC-CCCC", ttl)
        .await
        .unwrap();
    assert!(matches!(last, ReserveOutcome::Reserved(_)));

    let stored = storage.find_offer(&offer.id).await.unwrap().unwrap();
    assert_eq!(stored.claimed_count, 2);
    assert_eq!(stored.status, OfferStatus::Full);

    let late = storage
        .reserve_claim_sequential(&offer.id, "carol", "SQDD-DDDD", ttl)
        .await
        .unwrap_err();
    assert!(matches!(late, FlashOfferError::OfferFull(_)));
}

#[tokio::test]
async fn test_infrastructure_error_propagates_without_fallback() {
    use sea_orm::ConnectionTrait;

    let (storage, _dir) = create_temp_storage().await;
    seed_venue(&storage, "v1").await;
    check_in(&storage, "alice", "v1").await;
    let offer = create_offer(&storage, "v1", 3).await;

    // 让事务内的插入失败，模拟存储故障
    storage
        .get_db()
        .execute_unprepared(
            "CREATE TRIGGER refuse_claims BEFORE INSERT ON offer_claims \
             BEGIN SELECT RAISE(ABORT, 'claims unavailable'); END;",
        )
        .await
        .unwrap();

    let err = ClaimService::new(storage.clone())
        .claim(&offer.id, "alice")
        .await
        .unwrap_err();
    assert!(err.is_retryable(), "unexpected error: {:?}", err);
    assert!(matches!(err, FlashOfferError::DatabaseOperation(_)));

    // 事务已回滚，计数未变
    let stored = storage.find_offer(&offer.id).await.unwrap().unwrap();
    assert_eq!(stored.claimed_count, 0);
    assert_eq!(stored.status, OfferStatus::Active);
    assert!(storage.find_user_claim(&offer.id, "alice").await.unwrap().is_none());
}
