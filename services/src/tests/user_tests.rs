use db::test_utils::setup_test_db;

use super::helpers::create_user;
use crate::attendance_service::{AttendanceService, PunchIn};
use crate::error::ServiceError;
use crate::user_service::{CreateUser, UserService};
use crate::visit_service::{MarkVisit, VisitQuery, VisitService};

#[tokio::test]
async fn create_user_hashes_the_password() {
    let db = setup_test_db().await;
    let user = create_user(&db, "a@example.com").await;

    assert_ne!(user.password_hash, "hunter2!");
    assert!(!user.is_punched_in);
    assert!(!user.tracking_consent);

    let verified = UserService::verify_credentials(&db, "a@example.com", "hunter2!")
        .await
        .unwrap();
    assert_eq!(verified.map(|u| u.id), Some(user.id));

    let rejected = UserService::verify_credentials(&db, "a@example.com", "wrong")
        .await
        .unwrap();
    assert!(rejected.is_none());
}

#[tokio::test]
async fn create_user_rejects_blank_fields() {
    let db = setup_test_db().await;

    let err = UserService::create_user(
        &db,
        CreateUser {
            name: "  ".into(),
            email: "a@example.com".into(),
            password: "pw".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Validation { field: "name", .. }));
}

#[tokio::test]
async fn device_registration_and_consent() {
    let db = setup_test_db().await;
    let user = create_user(&db, "a@example.com").await;

    let user = UserService::register_device(&db, user.id, "abc123".into(), Some("Pixel 9".into()))
        .await
        .unwrap();
    assert_eq!(user.android_id.as_deref(), Some("abc123"));
    assert_eq!(user.device_model.as_deref(), Some("Pixel 9"));

    let user = UserService::save_consent(&db, user.id, true).await.unwrap();
    assert!(user.tracking_consent);
    assert!(user.consented_at.is_some());

    let user = UserService::save_consent(&db, user.id, false).await.unwrap();
    assert!(!user.tracking_consent);
    assert!(user.consented_at.is_none());
}

#[tokio::test]
async fn visits_are_validated_listed_and_counted() {
    let db = setup_test_db().await;
    let user = create_user(&db, "a@example.com").await;

    let session = AttendanceService::punch_in(
        &db,
        PunchIn {
            user_id: user.id,
            latitude: 10.0,
            longitude: 20.0,
            battery: None,
            address: None,
        },
    )
    .await
    .unwrap();

    let err = VisitService::mark_visit(
        &db,
        MarkVisit {
            user_id: user.id,
            session_id: Some(session.id),
            latitude: -91.0,
            longitude: 0.0,
            address: None,
            notes: None,
            battery: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation { field: "latitude", .. }
    ));

    for i in 0..3 {
        VisitService::mark_visit(
            &db,
            MarkVisit {
                user_id: user.id,
                session_id: Some(session.id),
                latitude: 10.0 + i as f64 * 0.001,
                longitude: 20.0,
                address: Some(format!("Stop {i}")),
                notes: None,
                battery: Some(50),
            },
        )
        .await
        .unwrap();
    }

    assert_eq!(
        VisitService::count_for_session(&db, session.id).await.unwrap(),
        3
    );

    let visits = VisitService::user_visits(&db, user.id, Default::default())
        .await
        .unwrap();
    assert_eq!(visits.len(), 3);

    let filtered = VisitService::user_visits(
        &db,
        user.id,
        VisitQuery {
            session_id: Some(session.id),
            limit: Some(2),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(filtered.len(), 2);

    // visit enrichment shows up on the active session
    let view = AttendanceService::current_session(&db, user.id)
        .await
        .unwrap()
        .expect("active session");
    assert_eq!(view.stats.visit_count, 3);
}
