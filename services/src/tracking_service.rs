//! Ping ingestion, raw history reads and the live-status snapshot.

use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone, Utc};
use db::models::{
    tracking_point::{self, Model as TrackingPoint},
    user::{self, Model as User},
    TrackingPoint as TrackingPointEntity, User as UserEntity,
};
use log::{debug, info};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::Serialize;

use crate::error::{ServiceError, ServiceResult};
use crate::geo;

/// A user counts as online if a ping or punch was seen this recently.
pub const ONLINE_WINDOW_MINUTES: i64 = 5;

const DEFAULT_HISTORY_LIMIT: u64 = 1000;
const DEFAULT_ROUTE_LIMIT: u64 = 100;

#[derive(Debug, Clone)]
pub struct RecordPing {
    pub user_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub battery: Option<i32>,
    pub speed: Option<f64>,
    /// Device-reported sample time; defaults to "now" when absent.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Range options for raw history reads.
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u64>,
}

/// Lightweight projection of a tracking point for route rendering.
#[derive(Debug, Clone, Serialize)]
pub struct RoutePoint {
    pub lat: f64,
    pub lng: f64,
    pub battery: Option<i32>,
    pub timestamp: DateTime<Utc>,
}

impl From<&TrackingPoint> for RoutePoint {
    fn from(p: &TrackingPoint) -> Self {
        RoutePoint {
            lat: p.latitude,
            lng: p.longitude,
            battery: p.battery,
            timestamp: p.timestamp,
        }
    }
}

/// Point-in-time view of a user's whereabouts, only valid the instant it was
/// computed.
#[derive(Debug, Serialize)]
pub struct LiveStatus {
    pub user_id: i64,
    pub is_online: bool,
    pub last_update: Option<DateTime<Utc>>,
    pub current_location: Option<TrackingPoint>,
    /// Recent pings, most recent first.
    pub route: Vec<RoutePoint>,
    pub today_distance_m: f64,
    pub points_today: u64,
}

pub struct TrackingService;

impl TrackingService {
    /// Validates and stores one GPS sample, tagging it with the user's active
    /// session (if any) and refreshing `last_seen`.
    pub async fn record_ping(
        db: &DatabaseConnection,
        params: RecordPing,
    ) -> ServiceResult<TrackingPoint> {
        geo::validate_coordinates(params.latitude, params.longitude)?;

        let user = find_user(db, params.user_id).await?;
        let now = Utc::now();

        let session_id = if user.is_punched_in {
            user.current_session_id
        } else {
            None
        };

        let point = tracking_point::ActiveModel {
            user_id: Set(params.user_id),
            session_id: Set(session_id),
            latitude: Set(params.latitude),
            longitude: Set(params.longitude),
            accuracy: Set(params.accuracy),
            battery: Set(params.battery),
            speed: Set(params.speed),
            timestamp: Set(params.timestamp.unwrap_or(now)),
            ..Default::default()
        }
        .insert(db)
        .await?;

        let mut am: user::ActiveModel = user.into();
        am.last_seen = Set(Some(now));
        am.updated_at = Set(now);
        am.update(db).await?;

        debug!(
            "stored ping {} for user {} (session {:?})",
            point.id, point.user_id, point.session_id
        );
        Ok(point)
    }

    /// Raw ping history in ascending timestamp order, optionally bounded.
    pub async fn tracking_history(
        db: &DatabaseConnection,
        user_id: i64,
        query: HistoryQuery,
    ) -> ServiceResult<Vec<TrackingPoint>> {
        find_user(db, user_id).await?;

        let mut select = TrackingPointEntity::find()
            .filter(tracking_point::Column::UserId.eq(user_id));
        if let Some(from) = query.from {
            select = select.filter(tracking_point::Column::Timestamp.gte(from));
        }
        if let Some(to) = query.to {
            select = select.filter(tracking_point::Column::Timestamp.lte(to));
        }

        let rows = select
            .order_by_asc(tracking_point::Column::Timestamp)
            .limit(query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
            .all(db)
            .await?;
        Ok(rows)
    }

    /// Snapshot combining ping recency, today's accumulated distance and the
    /// recent route. Pure read; no side effects.
    pub async fn live_status(
        db: &DatabaseConnection,
        user_id: i64,
        limit: Option<u64>,
    ) -> ServiceResult<LiveStatus> {
        let user = find_user(db, user_id).await?;
        let now = Utc::now();

        let recent = TrackingPointEntity::find()
            .filter(tracking_point::Column::UserId.eq(user_id))
            .order_by_desc(tracking_point::Column::Timestamp)
            .limit(limit.unwrap_or(DEFAULT_ROUTE_LIMIT))
            .all(db)
            .await?;

        let today = TrackingPointEntity::find()
            .filter(tracking_point::Column::UserId.eq(user_id))
            .filter(tracking_point::Column::Timestamp.gte(local_midnight_utc()))
            .order_by_asc(tracking_point::Column::Timestamp)
            .all(db)
            .await?;

        let today_distance_m =
            geo::path_distance_m(today.iter().map(|p| (p.latitude, p.longitude)));

        let is_online = user
            .last_seen
            .map(|seen| now - seen <= Duration::minutes(ONLINE_WINDOW_MINUTES))
            .unwrap_or(false);

        info!(
            "live status for user {}: online={}, {} points today, {:.0} m",
            user_id,
            is_online,
            today.len(),
            today_distance_m
        );

        Ok(LiveStatus {
            user_id,
            is_online,
            last_update: user.last_seen,
            route: recent.iter().map(RoutePoint::from).collect(),
            current_location: recent.into_iter().next(),
            today_distance_m,
            points_today: today.len() as u64,
        })
    }
}

pub(crate) async fn find_user(db: &DatabaseConnection, user_id: i64) -> ServiceResult<User> {
    UserEntity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound("user"))
}

/// Start of "today" in the server's local timezone, as a UTC instant.
fn local_midnight_utc() -> DateTime<Utc> {
    let midnight = Local::now().date_naive().and_time(NaiveTime::MIN);
    midnight
        .and_local_timezone(Local)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}
