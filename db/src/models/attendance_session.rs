use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;

/// One attendance interval between punch-in and punch-out.
///
/// Punch-out fields and the totals are null while the session is active and
/// are written exactly once when it closes; the row is never mutated after
/// that.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "attendance_sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub punch_in_time: DateTime<Utc>,
    pub punch_in_lat: f64,
    pub punch_in_lng: f64,
    pub punch_in_battery: Option<i32>,
    pub punch_in_address: Option<String>,
    pub punch_out_time: Option<DateTime<Utc>>,
    pub punch_out_lat: Option<f64>,
    pub punch_out_lng: Option<f64>,
    pub punch_out_battery: Option<i32>,
    pub punch_out_address: Option<String>,
    pub total_distance_m: Option<f64>,
    pub total_duration_min: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(has_many = "super::tracking_point::Entity")]
    TrackingPoints,
    #[sea_orm(has_many = "super::visit::Entity")]
    Visits,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::tracking_point::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TrackingPoints.def()
    }
}

impl Related<super::visit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Visits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
