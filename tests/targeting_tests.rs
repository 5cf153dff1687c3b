//! Audience resolution tests

use std::sync::{Arc, Once};

use chrono::{Duration, Utc};
use tempfile::TempDir;

use flash_offers::config::init_config;
use flash_offers::services::{TargetUser, TargetingEngine, TargetingQuery};
use flash_offers::storage::{SeaOrmStorage, Venue};
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
    let db_path = temp_dir.path().join("targeting.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let storage = SeaOrmStorage::new(&db_url, "sqlite")
        .await
        .expect("Failed to create storage");

    (Arc::new(storage), temp_dir)
}

const ORIGIN: Coordinates = Coordinates {
    latitude: 40.7128,
    longitude: -74.0060,
};

async fn seed_venue(storage: &SeaOrmStorage, id: &str, coordinates: Option<Coordinates>) {
    storage
        .upsert_venue(&Venue {
            id: id.to_string(),
            name: id.to_string(),
            coordinates,
        })
        .await
        .unwrap();
}

fn query(favorites_only: bool, location: Option<Coordinates>) -> TargetingQuery {
    TargetingQuery {
        venue_id: "home".to_string(),
        venue_location: location,
        radius_km: 2.0,
        favorites_only,
    }
}

fn ids(targets: &[TargetUser]) -> Vec<&str> {
    targets.iter().map(|t| t.user_id.as_str()).collect()
}

#[tokio::test]
async fn test_favorites_mode_returns_favoriting_users() {
    let (storage, _dir) = create_temp_storage().await;
    seed_venue(&storage, "home", Some(ORIGIN)).await;
    storage.add_favorite("alice", "home").await.unwrap();
    storage.add_favorite("bob", "home").await.unwrap();
    storage.add_favorite("carol", "elsewhere").await.unwrap();
    // 重复收藏不产生重复目标
    storage.add_favorite("alice", "home").await.unwrap();
    storage.register_device_token("alice", "tok-a").await.unwrap();

    let targets = TargetingEngine::new(storage)
        .resolve_targets(&query(true, Some(ORIGIN)))
        .await;

    let mut found = ids(&targets);
    found.sort();
    assert_eq!(found, vec!["alice", "bob"]);

    let alice = targets.iter().find(|t| t.user_id == "alice").unwrap();
    assert_eq!(alice.device_token.as_deref(), Some("tok-a"));
    let bob = targets.iter().find(|t| t.user_id == "bob").unwrap();
    assert!(bob.device_token.is_none());
}

#[tokio::test]
async fn test_proximity_mode_uses_recent_check_ins_within_radius() {
    let (storage, _dir) = create_temp_storage().await;
    seed_venue(&storage, "home", Some(ORIGIN)).await;
    // 约 1km 与 30km
    seed_venue(&storage, "nearby", Some(Coordinates::new(40.7218, -74.0060))).await;
    seed_venue(&storage, "faraway", Some(Coordinates::new(40.9826, -74.0060))).await;

    let now = Utc::now();
    storage
        .record_check_in("regular", "home", now - Duration::days(2), false)
        .await
        .unwrap();
    storage
        .record_check_in("neighbor", "nearby", now - Duration::days(10), false)
        .await
        .unwrap();
    storage
        .record_check_in("commuter", "faraway", now - Duration::days(1), false)
        .await
        .unwrap();
    storage
        .record_check_in("lapsed", "home", now - Duration::days(45), false)
        .await
        .unwrap();
    // 同一用户多次签到只计一次
    storage
        .record_check_in("regular", "nearby", now - Duration::hours(3), true)
        .await
        .unwrap();

    let targets = TargetingEngine::new(storage)
        .resolve_targets(&query(false, Some(ORIGIN)))
        .await;

    let mut found = ids(&targets);
    found.sort();
    assert_eq!(found, vec!["neighbor", "regular"]);
}

#[tokio::test]
async fn test_proximity_without_coordinates_is_empty() {
    let (storage, _dir) = create_temp_storage().await;
    seed_venue(&storage, "home", None).await;
    storage
        .record_check_in("regular", "home", Utc::now(), true)
        .await
        .unwrap();

    let targets = TargetingEngine::new(storage)
        .resolve_targets(&query(false, None))
        .await;
    assert!(targets.is_empty());
}

#[tokio::test]
async fn test_favorites_mode_ignores_missing_coordinates() {
    let (storage, _dir) = create_temp_storage().await;
    seed_venue(&storage, "home", None).await;
    storage.add_favorite("alice", "home").await.unwrap();

    let targets = TargetingEngine::new(storage)
        .resolve_targets(&query(true, None))
        .await;
    assert_eq!(ids(&targets), vec!["alice"]);
}

#[tokio::test]
async fn test_lookup_failure_yields_empty_audience() {
    use sea_orm::ConnectionTrait;

    let (storage, _dir) = create_temp_storage().await;
    seed_venue(&storage, "home", Some(ORIGIN)).await;
    storage.add_favorite("alice", "home").await.unwrap();
    storage
        .get_db()
        .execute_unprepared("DROP TABLE venue_favorites")
        .await
        .unwrap();

    let targets = TargetingEngine::new(storage)
        .resolve_targets(&query(true, Some(ORIGIN)))
        .await;
    assert!(targets.is_empty());
}
