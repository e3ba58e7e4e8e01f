use chrono::{Duration, Utc};
use db::test_utils::setup_test_db;

use super::helpers::{create_user, ping_at};
use crate::attendance_service::{AttendanceService, PunchIn, PunchOut};
use crate::error::ServiceError;
use crate::geo;
use crate::tracking_service::find_user;

fn punch_in_params(user_id: i64) -> PunchIn {
    PunchIn {
        user_id,
        latitude: 10.0,
        longitude: 20.0,
        battery: Some(90),
        address: Some("Depot".into()),
    }
}

fn punch_out_params(user_id: i64) -> PunchOut {
    PunchOut {
        user_id,
        latitude: 10.002,
        longitude: 20.002,
        battery: Some(70),
        address: None,
    }
}

#[tokio::test]
async fn punch_in_opens_an_active_session() {
    let db = setup_test_db().await;
    let user = create_user(&db, "a@example.com").await;

    let session = AttendanceService::punch_in(&db, punch_in_params(user.id))
        .await
        .unwrap();

    assert!(session.is_active);
    assert_eq!(session.user_id, user.id);
    assert_eq!(session.punch_in_lat, 10.0);
    assert!(session.punch_out_time.is_none());
    assert!(session.total_distance_m.is_none());

    let user = find_user(&db, user.id).await.unwrap();
    assert!(user.is_punched_in);
    assert_eq!(user.current_session_id, Some(session.id));
    assert!(user.last_seen.is_some());
}

#[tokio::test]
async fn double_punch_in_is_a_state_conflict() {
    let db = setup_test_db().await;
    let user = create_user(&db, "a@example.com").await;

    AttendanceService::punch_in(&db, punch_in_params(user.id))
        .await
        .unwrap();
    let err = AttendanceService::punch_in(&db, punch_in_params(user.id))
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::StateConflict(_)));
}

#[tokio::test]
async fn punch_out_without_punch_in_is_a_state_conflict() {
    let db = setup_test_db().await;
    let user = create_user(&db, "a@example.com").await;

    let err = AttendanceService::punch_out(&db, punch_out_params(user.id))
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::StateConflict(_)));
}

#[tokio::test]
async fn punch_in_rejects_out_of_range_coordinates() {
    let db = setup_test_db().await;
    let user = create_user(&db, "a@example.com").await;

    let mut params = punch_in_params(user.id);
    params.latitude = 91.0;
    let err = AttendanceService::punch_in(&db, params).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation { field: "latitude", .. }
    ));

    // the failed attempt must not have left a session behind
    let user = find_user(&db, user.id).await.unwrap();
    assert!(!user.is_punched_in);
}

#[tokio::test]
async fn punch_for_unknown_user_is_not_found() {
    let db = setup_test_db().await;

    let err = AttendanceService::punch_in(&db, punch_in_params(4242))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound("user")));
}

#[tokio::test]
async fn punch_out_finalizes_session_and_clears_user_flags() {
    let db = setup_test_db().await;
    let user = create_user(&db, "a@example.com").await;

    AttendanceService::punch_in(&db, punch_in_params(user.id))
        .await
        .unwrap();

    let now = Utc::now();
    ping_at(&db, user.id, 10.0, 20.0, now - Duration::seconds(300)).await;
    ping_at(&db, user.id, 10.001, 20.001, now).await;

    let session = AttendanceService::punch_out(&db, punch_out_params(user.id))
        .await
        .unwrap();

    assert!(!session.is_active);
    assert!(session.punch_out_time.is_some());
    assert_eq!(session.punch_out_lat, Some(10.002));
    assert_eq!(session.punch_out_battery, Some(70));
    assert_eq!(session.total_duration_min, Some(0));

    let expected = geo::haversine_m(10.0, 20.0, 10.001, 20.001);
    let total = session.total_distance_m.unwrap();
    assert!((total - expected).abs() < 0.5, "got {total}, expected {expected}");

    let user = find_user(&db, user.id).await.unwrap();
    assert!(!user.is_punched_in);
    assert_eq!(user.current_session_id, None);
}

#[tokio::test]
async fn current_session_reports_live_stats_then_goes_away() {
    let db = setup_test_db().await;
    let user = create_user(&db, "a@example.com").await;

    assert!(AttendanceService::current_session(&db, user.id)
        .await
        .unwrap()
        .is_none());

    AttendanceService::punch_in(&db, punch_in_params(user.id))
        .await
        .unwrap();

    let now = Utc::now();
    ping_at(&db, user.id, 10.0, 20.0, now - Duration::seconds(120)).await;
    ping_at(&db, user.id, 10.001, 20.001, now).await;

    let view = AttendanceService::current_session(&db, user.id)
        .await
        .unwrap()
        .expect("active session expected");
    assert!(view.session.is_active);
    assert_eq!(view.stats.tracking_points, 2);
    assert_eq!(view.stats.current_battery, Some(80));

    let expected = geo::haversine_m(10.0, 20.0, 10.001, 20.001);
    assert!((view.stats.current_distance_m - expected).abs() < 0.5);

    AttendanceService::punch_out(&db, punch_out_params(user.id))
        .await
        .unwrap();
    assert!(AttendanceService::current_session(&db, user.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn history_lists_sessions_most_recent_first() {
    let db = setup_test_db().await;
    let user = create_user(&db, "a@example.com").await;

    let first = AttendanceService::punch_in(&db, punch_in_params(user.id))
        .await
        .unwrap();
    AttendanceService::punch_out(&db, punch_out_params(user.id))
        .await
        .unwrap();
    let second = AttendanceService::punch_in(&db, punch_in_params(user.id))
        .await
        .unwrap();

    let entries = AttendanceService::attendance_history(&db, user.id, Default::default())
        .await
        .unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].session.id, second.id);
    assert_eq!(entries[1].session.id, first.id);
    assert!(entries[0].live.is_some(), "active session carries live stats");
    assert!(entries[1].live.is_none(), "closed session is returned as stored");

    // entries serialize flat: session fields at the top level, live stats
    // merged in only when present
    let active = serde_json::to_value(&entries[0]).unwrap();
    assert!(active.get("punch_in_time").is_some());
    assert!(active.get("current_duration_min").is_some());
    let closed = serde_json::to_value(&entries[1]).unwrap();
    assert!(closed.get("current_duration_min").is_none());
    assert!(closed.get("live").is_none());
}

#[tokio::test]
async fn session_route_returns_ordered_coordinates() {
    let db = setup_test_db().await;
    let user = create_user(&db, "a@example.com").await;

    AttendanceService::punch_in(&db, punch_in_params(user.id))
        .await
        .unwrap();

    let now = Utc::now();
    ping_at(&db, user.id, 10.0, 20.0, now - Duration::seconds(600)).await;
    ping_at(&db, user.id, 10.001, 20.001, now - Duration::seconds(300)).await;
    ping_at(&db, user.id, 10.002, 20.002, now).await;

    let session = AttendanceService::punch_out(&db, punch_out_params(user.id))
        .await
        .unwrap();

    let route = AttendanceService::session_route(&db, user.id, session.id)
        .await
        .unwrap();

    assert_eq!(route.tracking_points, 3);
    assert_eq!(route.route.len(), 3);
    // (lng, lat, time, battery) vertices in ascending time order
    assert_eq!(route.route[0].0, 20.0);
    assert_eq!(route.route[0].1, 10.0);
    assert_eq!(route.route[2].0, 20.002);
    assert!(route.route[0].2 < route.route[2].2);
    // closed session reports the stored totals
    assert_eq!(route.current_distance_m, session.total_distance_m.unwrap());
    assert_eq!(route.current_duration_min, session.total_duration_min.unwrap());
    assert_eq!(route.current_battery, session.punch_out_battery);
}

#[tokio::test]
async fn session_route_checks_ownership() {
    let db = setup_test_db().await;
    let owner = create_user(&db, "owner@example.com").await;
    let other = create_user(&db, "other@example.com").await;

    let session = AttendanceService::punch_in(&db, punch_in_params(owner.id))
        .await
        .unwrap();

    let err = AttendanceService::session_route(&db, other.id, session.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound("session")));
}
