use chrono::{Duration, Utc};
use db::test_utils::setup_test_db;

use super::helpers::{create_user, ping_at};
use crate::error::ServiceError;
use crate::geo;
use crate::trip_service::TripService;

#[tokio::test]
async fn generates_trips_split_on_the_gap_threshold() {
    let db = setup_test_db().await;
    let user = create_user(&db, "a@example.com").await;

    let base = Utc::now() - Duration::hours(3);
    for offset in [0i64, 1, 2, 2, 3, 30, 31, 32] {
        ping_at(
            &db,
            user.id,
            10.0 + offset as f64 * 0.0001,
            20.0,
            base + Duration::minutes(offset),
        )
        .await;
    }

    let trips = TripService::generate_trips(&db, user.id).await.unwrap();

    assert_eq!(trips.len(), 2);
    assert_eq!(trips[0].point_count, 5);
    assert_eq!(trips[1].point_count, 3);
    // timestamps may lose sub-millisecond precision in storage
    assert!((trips[0].started_at - base).num_milliseconds().abs() < 1000);
    assert!((trips[0].ended_at - (base + Duration::minutes(3))).num_milliseconds().abs() < 1000);
    assert!((trips[1].started_at - (base + Duration::minutes(30))).num_milliseconds().abs() < 1000);
    assert!((trips[1].ended_at - (base + Duration::minutes(32))).num_milliseconds().abs() < 1000);

    let expected_first = geo::path_distance_m(
        [0i64, 1, 2, 2, 3]
            .into_iter()
            .map(|o| (10.0 + o as f64 * 0.0001, 20.0)),
    );
    assert!((trips[0].distance_m - expected_first).abs() < 0.5);
    assert_eq!(trips[0].start_lat, 10.0);
    assert!((trips[0].end_lat - 10.0003).abs() < 1e-9);
}

#[tokio::test]
async fn regeneration_replaces_rather_than_duplicates() {
    let db = setup_test_db().await;
    let user = create_user(&db, "a@example.com").await;

    let base = Utc::now() - Duration::hours(3);
    for offset in [0i64, 1, 2, 40, 41] {
        ping_at(&db, user.id, 10.0, 20.0, base + Duration::minutes(offset)).await;
    }

    let first = TripService::generate_trips(&db, user.id).await.unwrap();
    assert_eq!(first.len(), 2);

    let second = TripService::generate_trips(&db, user.id).await.unwrap();
    assert_eq!(second.len(), 2);

    let listed = TripService::list_trips(&db, user.id).await.unwrap();
    assert_eq!(listed.len(), 2, "old trips must be replaced, not kept");
}

#[tokio::test]
async fn isolated_pings_yield_no_trips() {
    let db = setup_test_db().await;
    let user = create_user(&db, "a@example.com").await;

    let base = Utc::now() - Duration::hours(3);
    // three pings, each more than the gap apart
    for offset in [0i64, 30, 60] {
        ping_at(&db, user.id, 10.0, 20.0, base + Duration::minutes(offset)).await;
    }

    let trips = TripService::generate_trips(&db, user.id).await.unwrap();
    assert!(trips.is_empty());
}

#[tokio::test]
async fn empty_history_generates_nothing() {
    let db = setup_test_db().await;
    let user = create_user(&db, "a@example.com").await;

    let trips = TripService::generate_trips(&db, user.id).await.unwrap();
    assert!(trips.is_empty());
    assert!(TripService::list_trips(&db, user.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn trips_are_listed_most_recent_first() {
    let db = setup_test_db().await;
    let user = create_user(&db, "a@example.com").await;

    let base = Utc::now() - Duration::hours(5);
    for offset in [0i64, 1, 2, 120, 121, 122] {
        ping_at(&db, user.id, 10.0, 20.0, base + Duration::minutes(offset)).await;
    }

    TripService::generate_trips(&db, user.id).await.unwrap();
    let listed = TripService::list_trips(&db, user.id).await.unwrap();

    assert_eq!(listed.len(), 2);
    assert!(listed[0].started_at > listed[1].started_at);
}

#[tokio::test]
async fn trip_generation_for_unknown_user_is_not_found() {
    let db = setup_test_db().await;
    let err = TripService::generate_trips(&db, 777).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound("user")));
}
