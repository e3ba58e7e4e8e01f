use chrono::{DateTime, Utc};
use db::models::{tracking_point::Model as TrackingPoint, user::Model as User};
use sea_orm::DatabaseConnection;

use crate::tracking_service::{RecordPing, TrackingService};
use crate::user_service::{CreateUser, UserService};

pub async fn create_user(db: &DatabaseConnection, email: &str) -> User {
    UserService::create_user(
        db,
        CreateUser {
            name: "Test Worker".into(),
            email: email.into(),
            password: "hunter2!".into(),
        },
    )
    .await
    .expect("failed to create test user")
}

pub async fn ping_at(
    db: &DatabaseConnection,
    user_id: i64,
    lat: f64,
    lng: f64,
    timestamp: DateTime<Utc>,
) -> TrackingPoint {
    TrackingService::record_ping(
        db,
        RecordPing {
            user_id,
            latitude: lat,
            longitude: lng,
            accuracy: None,
            battery: Some(80),
            speed: None,
            timestamp: Some(timestamp),
        },
    )
    .await
    .expect("failed to record test ping")
}
