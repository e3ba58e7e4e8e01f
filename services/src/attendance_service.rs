//! Punch-in/punch-out lifecycle and session-derived views.
//!
//! Exactly one active session may exist per user. The user's punch flag and
//! the session's `is_active` flag always change together inside one database
//! transaction, with a conditional update on `is_punched_in` serving as the
//! serialization point against concurrent punches.

use chrono::{DateTime, Utc};
use db::models::{
    attendance_session::{self, Model as AttendanceSession},
    tracking_point,
    user,
    visit,
    AttendanceSession as SessionEntity, TrackingPoint as TrackingPointEntity, User as UserEntity,
    Visit as VisitEntity,
};
use log::{info, warn};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;

use crate::error::{ServiceError, ServiceResult};
use crate::geo;
use crate::tracking_service::find_user;

/// Window of most-recent pings used for live distance/battery readouts.
const LIVE_POINT_WINDOW: u64 = 100;

const DEFAULT_HISTORY_LIMIT: u64 = 30;

#[derive(Debug, Clone)]
pub struct PunchIn {
    pub user_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub battery: Option<i32>,
    pub address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PunchOut {
    pub user_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub battery: Option<i32>,
    pub address: Option<String>,
}

/// Range options for attendance history reads.
#[derive(Debug, Clone, Default)]
pub struct SessionQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u64>,
}

/// Live readouts for a session that is still open.
#[derive(Debug, Clone, Serialize)]
pub struct LiveSessionStats {
    pub current_distance_m: f64,
    pub current_duration_min: i64,
    pub tracking_points: u64,
    pub current_battery: Option<i32>,
    pub visit_count: u64,
}

/// An active session together with its live stats.
#[derive(Debug, Serialize)]
pub struct ActiveSessionView {
    #[serde(flatten)]
    pub session: AttendanceSession,
    #[serde(flatten)]
    pub stats: LiveSessionStats,
}

/// One attendance history entry; `live` is present only for sessions that
/// were still active at read time.
#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub session: AttendanceSession,
    #[serde(flatten)]
    pub live: Option<LiveSessionStats>,
}

/// (longitude, latitude, sample time, battery) — ordered vertices for
/// line-geometry rendering.
pub type RouteCoord = (f64, f64, DateTime<Utc>, i32);

/// A session plus the full ordered route it was tracked over.
#[derive(Debug, Serialize)]
pub struct SessionRoute {
    #[serde(flatten)]
    pub session: AttendanceSession,
    pub current_distance_m: f64,
    pub current_duration_min: i64,
    pub tracking_points: u64,
    pub visit_count: u64,
    pub current_battery: Option<i32>,
    pub route: Vec<RouteCoord>,
}

pub struct AttendanceService;

impl AttendanceService {
    /// Opens a session for the user. Fails with `StateConflict` if one is
    /// already active — including when a concurrent punch-in wins the race,
    /// which the conditional flag update detects inside the transaction.
    pub async fn punch_in(
        db: &DatabaseConnection,
        params: PunchIn,
    ) -> ServiceResult<AttendanceSession> {
        geo::validate_coordinates(params.latitude, params.longitude)?;

        let user = find_user(db, params.user_id).await?;
        if user.is_punched_in {
            return Err(ServiceError::conflict(
                "already punched in; punch out first",
            ));
        }

        let now = Utc::now();
        let txn = db.begin().await?;

        let session = attendance_session::ActiveModel {
            user_id: Set(params.user_id),
            punch_in_time: Set(now),
            punch_in_lat: Set(params.latitude),
            punch_in_lng: Set(params.longitude),
            punch_in_battery: Set(params.battery),
            punch_in_address: Set(params.address),
            is_active: Set(true),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        // Compare-and-set: only flip the flag if nobody else has. Zero rows
        // affected means a concurrent punch-in committed between our read
        // and this write.
        let flipped = UserEntity::update_many()
            .col_expr(user::Column::IsPunchedIn, Expr::value(true))
            .col_expr(user::Column::CurrentSessionId, Expr::value(session.id))
            .col_expr(user::Column::LastSeen, Expr::value(now))
            .col_expr(user::Column::UpdatedAt, Expr::value(now))
            .filter(user::Column::Id.eq(params.user_id))
            .filter(user::Column::IsPunchedIn.eq(false))
            .exec(&txn)
            .await?;

        if flipped.rows_affected == 0 {
            txn.rollback().await?;
            warn!("lost punch-in race for user {}", params.user_id);
            return Err(ServiceError::conflict(
                "already punched in; punch out first",
            ));
        }

        txn.commit().await?;
        info!("user {} punched in (session {})", params.user_id, session.id);
        Ok(session)
    }

    /// Closes the user's active session, finalizing punch-out fields, the
    /// session's total distance (over its full ordered ping stream) and its
    /// duration in whole minutes.
    pub async fn punch_out(
        db: &DatabaseConnection,
        params: PunchOut,
    ) -> ServiceResult<AttendanceSession> {
        geo::validate_coordinates(params.latitude, params.longitude)?;

        let user = find_user(db, params.user_id).await?;
        let session_id = match (user.is_punched_in, user.current_session_id) {
            (true, Some(id)) => id,
            _ => return Err(ServiceError::conflict("not punched in")),
        };

        let session = SessionEntity::find_by_id(session_id)
            .one(db)
            .await?
            .ok_or(ServiceError::NotFound("session"))?;

        let points = session_points_asc(db, session_id).await?;
        let total_distance =
            geo::path_distance_m(points.iter().map(|p| (p.latitude, p.longitude)));

        let now = Utc::now();
        let duration_min = (now - session.punch_in_time).num_minutes();

        let txn = db.begin().await?;

        let mut am: attendance_session::ActiveModel = session.into();
        am.punch_out_time = Set(Some(now));
        am.punch_out_lat = Set(Some(params.latitude));
        am.punch_out_lng = Set(Some(params.longitude));
        am.punch_out_battery = Set(params.battery);
        am.punch_out_address = Set(params.address);
        am.total_distance_m = Set(Some(total_distance));
        am.total_duration_min = Set(Some(duration_min));
        am.is_active = Set(false);
        let session = am.update(&txn).await?;

        let cleared = UserEntity::update_many()
            .col_expr(user::Column::IsPunchedIn, Expr::value(false))
            .col_expr(
                user::Column::CurrentSessionId,
                Expr::value(Option::<i64>::None),
            )
            .col_expr(user::Column::LastSeen, Expr::value(now))
            .col_expr(user::Column::UpdatedAt, Expr::value(now))
            .filter(user::Column::Id.eq(params.user_id))
            .filter(user::Column::IsPunchedIn.eq(true))
            .exec(&txn)
            .await?;

        if cleared.rows_affected == 0 {
            txn.rollback().await?;
            warn!("lost punch-out race for user {}", params.user_id);
            return Err(ServiceError::conflict("not punched in"));
        }

        txn.commit().await?;
        info!(
            "user {} punched out (session {}, {:.0} m, {} min)",
            params.user_id, session.id, total_distance, duration_min
        );
        Ok(session)
    }

    /// The user's active session enriched with live distance, duration and
    /// point count, or `None` when not punched in. Never mutates state.
    pub async fn current_session(
        db: &DatabaseConnection,
        user_id: i64,
    ) -> ServiceResult<Option<ActiveSessionView>> {
        let user = find_user(db, user_id).await?;
        let session_id = match (user.is_punched_in, user.current_session_id) {
            (true, Some(id)) => id,
            _ => return Ok(None),
        };

        let session = SessionEntity::find_by_id(session_id)
            .one(db)
            .await?
            .ok_or(ServiceError::NotFound("session"))?;
        let stats = live_stats(db, &session).await?;

        Ok(Some(ActiveSessionView { session, stats }))
    }

    /// Sessions most recent first; active ones carry live stats.
    pub async fn attendance_history(
        db: &DatabaseConnection,
        user_id: i64,
        query: SessionQuery,
    ) -> ServiceResult<Vec<HistoryEntry>> {
        find_user(db, user_id).await?;

        let mut select =
            SessionEntity::find().filter(attendance_session::Column::UserId.eq(user_id));
        if let Some(from) = query.from {
            select = select.filter(attendance_session::Column::PunchInTime.gte(from));
        }
        if let Some(to) = query.to {
            select = select.filter(attendance_session::Column::PunchInTime.lte(to));
        }

        let sessions = select
            .order_by_desc(attendance_session::Column::PunchInTime)
            .limit(query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
            .all(db)
            .await?;

        let mut entries = Vec::with_capacity(sessions.len());
        for session in sessions {
            let live = if session.is_active {
                Some(live_stats(db, &session).await?)
            } else {
                None
            };
            entries.push(HistoryEntry { session, live });
        }
        Ok(entries)
    }

    /// The full ordered route of one session, with totals taken live while
    /// the session is active and from the stored record once closed.
    pub async fn session_route(
        db: &DatabaseConnection,
        user_id: i64,
        session_id: i64,
    ) -> ServiceResult<SessionRoute> {
        let session = SessionEntity::find_by_id(session_id)
            .filter(attendance_session::Column::UserId.eq(user_id))
            .one(db)
            .await?
            .ok_or(ServiceError::NotFound("session"))?;

        let points = session_points_asc(db, session_id).await?;

        let (current_distance_m, current_duration_min) = if session.is_active {
            (
                geo::path_distance_m(points.iter().map(|p| (p.latitude, p.longitude))),
                (Utc::now() - session.punch_in_time).num_minutes(),
            )
        } else {
            (
                session.total_distance_m.unwrap_or(0.0),
                session.total_duration_min.unwrap_or(0),
            )
        };

        let current_battery = if session.is_active {
            points
                .last()
                .and_then(|p| p.battery)
                .or(session.punch_in_battery)
        } else {
            session.punch_out_battery
        };

        let visit_count = count_session_visits(db, session_id).await?;

        let route = points
            .iter()
            .map(|p| {
                (
                    p.longitude,
                    p.latitude,
                    p.timestamp,
                    p.battery.unwrap_or(0),
                )
            })
            .collect();

        Ok(SessionRoute {
            session,
            current_distance_m,
            current_duration_min,
            tracking_points: points.len() as u64,
            visit_count,
            current_battery,
            route,
        })
    }
}

/// Live distance/duration over the most-recent ping window plus battery and
/// visit enrichment, for a session that is still open.
async fn live_stats(
    db: &DatabaseConnection,
    session: &AttendanceSession,
) -> ServiceResult<LiveSessionStats> {
    let recent = TrackingPointEntity::find()
        .filter(tracking_point::Column::SessionId.eq(session.id))
        .order_by_desc(tracking_point::Column::Timestamp)
        .limit(LIVE_POINT_WINDOW)
        .all(db)
        .await?;

    // Haversine is symmetric, so summing the reversed window gives the same
    // total as ascending order.
    let current_distance_m =
        geo::path_distance_m(recent.iter().map(|p| (p.latitude, p.longitude)));
    let current_duration_min = (Utc::now() - session.punch_in_time).num_minutes();
    let current_battery = recent
        .first()
        .and_then(|p| p.battery)
        .or(session.punch_in_battery);
    let visit_count = count_session_visits(db, session.id).await?;

    Ok(LiveSessionStats {
        current_distance_m,
        current_duration_min,
        tracking_points: recent.len() as u64,
        current_battery,
        visit_count,
    })
}

async fn session_points_asc<C: ConnectionTrait>(
    db: &C,
    session_id: i64,
) -> Result<Vec<tracking_point::Model>, sea_orm::DbErr> {
    TrackingPointEntity::find()
        .filter(tracking_point::Column::SessionId.eq(session_id))
        .order_by_asc(tracking_point::Column::Timestamp)
        .all(db)
        .await
}

async fn count_session_visits(
    db: &DatabaseConnection,
    session_id: i64,
) -> Result<u64, sea_orm::DbErr> {
    VisitEntity::find()
        .filter(visit::Column::SessionId.eq(session_id))
        .count(db)
        .await
}
