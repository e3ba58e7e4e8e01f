//! Batch derivation of discrete trips from a user's ping history.

use chrono::{Duration, Utc};
use db::models::{
    tracking_point::{self, Model as TrackingPoint},
    trip::{self, Model as Trip},
    TrackingPoint as TrackingPointEntity, Trip as TripEntity,
};
use log::info;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};

use crate::error::ServiceResult;
use crate::geo;
use crate::tracking_service::find_user;

/// Consecutive pings further apart than this belong to different trips.
pub const TRIP_GAP_MINUTES: i64 = 20;

/// Partitions an ascending-timestamp ping sequence into maximal runs whose
/// consecutive samples are at most `gap` apart. Runs of fewer than two points
/// are dropped: a single isolated ping is not a trip, though it stays in raw
/// history.
pub fn segment(points: &[TrackingPoint], gap: Duration) -> Vec<&[TrackingPoint]> {
    let mut runs = Vec::new();
    if points.is_empty() {
        return runs;
    }

    let mut run_start = 0;
    for i in 1..points.len() {
        if points[i].timestamp - points[i - 1].timestamp > gap {
            if i - run_start >= 2 {
                runs.push(&points[run_start..i]);
            }
            run_start = i;
        }
    }
    if points.len() - run_start >= 2 {
        runs.push(&points[run_start..]);
    }
    runs
}

pub struct TripService;

impl TripService {
    /// Re-derives the user's trips from their full ping history.
    ///
    /// The prior derived trips are replaced in the same transaction as the
    /// inserts, so regenerating over unchanged history reproduces the same
    /// trip set instead of appending duplicates. The history read is a
    /// snapshot taken outside the write transaction; concurrent ping
    /// ingestion is never blocked by it.
    pub async fn generate_trips(
        db: &DatabaseConnection,
        user_id: i64,
    ) -> ServiceResult<Vec<Trip>> {
        find_user(db, user_id).await?;

        let points = TrackingPointEntity::find()
            .filter(tracking_point::Column::UserId.eq(user_id))
            .order_by_asc(tracking_point::Column::Timestamp)
            .all(db)
            .await?;

        let runs = segment(&points, Duration::minutes(TRIP_GAP_MINUTES));

        let txn = db.begin().await?;
        TripEntity::delete_many()
            .filter(trip::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;

        let now = Utc::now();
        let mut created = Vec::with_capacity(runs.len());
        for run in runs {
            // segment() guarantees at least two points per run.
            let start = &run[0];
            let end = &run[run.len() - 1];
            let distance_m =
                geo::path_distance_m(run.iter().map(|p| (p.latitude, p.longitude)));

            let trip = trip::ActiveModel {
                user_id: Set(user_id),
                started_at: Set(start.timestamp),
                ended_at: Set(end.timestamp),
                start_lat: Set(start.latitude),
                start_lng: Set(start.longitude),
                end_lat: Set(end.latitude),
                end_lng: Set(end.longitude),
                distance_m: Set(distance_m),
                point_count: Set(run.len() as i32),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            created.push(trip);
        }
        txn.commit().await?;

        info!(
            "generated {} trips from {} points for user {}",
            created.len(),
            points.len(),
            user_id
        );
        Ok(created)
    }

    /// Derived trips, most recent first.
    pub async fn list_trips(db: &DatabaseConnection, user_id: i64) -> ServiceResult<Vec<Trip>> {
        find_user(db, user_id).await?;

        let trips = TripEntity::find()
            .filter(trip::Column::UserId.eq(user_id))
            .order_by_desc(trip::Column::StartedAt)
            .all(db)
            .await?;
        Ok(trips)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn point_at(minute_offset: i64) -> TrackingPoint {
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        TrackingPoint {
            id: minute_offset,
            user_id: 1,
            session_id: None,
            latitude: 10.0 + minute_offset as f64 * 0.0001,
            longitude: 20.0,
            accuracy: None,
            battery: None,
            speed: None,
            timestamp: base + Duration::minutes(minute_offset),
        }
    }

    #[test]
    fn splits_on_gaps_above_threshold() {
        let points: Vec<_> = [0, 1, 2, 2, 3, 30, 31, 32].into_iter().map(point_at).collect();
        let runs = segment(&points, Duration::minutes(TRIP_GAP_MINUTES));

        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].len(), 5);
        assert_eq!(runs[1].len(), 3);
        assert_eq!(runs[0][0].timestamp, point_at(0).timestamp);
        assert_eq!(runs[0][4].timestamp, point_at(3).timestamp);
        assert_eq!(runs[1][0].timestamp, point_at(30).timestamp);
        assert_eq!(runs[1][2].timestamp, point_at(32).timestamp);
    }

    #[test]
    fn gap_exactly_at_threshold_stays_in_one_run() {
        let points: Vec<_> = [0, 20, 40].into_iter().map(point_at).collect();
        let runs = segment(&points, Duration::minutes(TRIP_GAP_MINUTES));
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].len(), 3);
    }

    #[test]
    fn isolated_points_produce_no_trip() {
        let points: Vec<_> = [0].into_iter().map(point_at).collect();
        assert!(segment(&points, Duration::minutes(TRIP_GAP_MINUTES)).is_empty());

        // A lone ping between two real runs is discarded too.
        let points: Vec<_> = [0, 1, 50, 100, 101].into_iter().map(point_at).collect();
        let runs = segment(&points, Duration::minutes(TRIP_GAP_MINUTES));
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].len(), 2);
        assert_eq!(runs[1].len(), 2);
    }

    #[test]
    fn empty_history_yields_no_runs() {
        assert!(segment(&[], Duration::minutes(TRIP_GAP_MINUTES)).is_empty());
    }
}
