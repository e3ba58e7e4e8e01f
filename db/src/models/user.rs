use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;

/// A tracked field worker in the `users` table. Owns pings, attendance
/// sessions, trips and visits.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    /// Unique login email.
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// True iff `current_session_id` points at an active attendance session.
    pub is_punched_in: bool,
    pub current_session_id: Option<i64>,
    /// Last time any ping or punch was received from this user's device.
    pub last_seen: Option<DateTime<Utc>>,
    pub android_id: Option<String>,
    pub device_model: Option<String>,
    pub tracking_consent: bool,
    pub consented_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::attendance_session::Entity")]
    Sessions,
    #[sea_orm(has_many = "super::tracking_point::Entity")]
    TrackingPoints,
    #[sea_orm(has_many = "super::trip::Entity")]
    Trips,
    #[sea_orm(has_many = "super::visit::Entity")]
    Visits,
}

impl Related<super::attendance_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sessions.def()
    }
}

impl Related<super::tracking_point::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TrackingPoints.def()
    }
}

impl Related<super::trip::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Trips.def()
    }
}

impl Related<super::visit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Visits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
