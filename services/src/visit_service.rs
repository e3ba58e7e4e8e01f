//! Manually marked points of interest, independent of the ping stream.

use chrono::{DateTime, Utc};
use db::models::{
    visit::{self, Model as Visit},
    Visit as VisitEntity,
};
use log::info;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use crate::error::ServiceResult;
use crate::geo;
use crate::tracking_service::find_user;

const DEFAULT_VISIT_LIMIT: u64 = 100;

#[derive(Debug, Clone)]
pub struct MarkVisit {
    pub user_id: i64,
    pub session_id: Option<i64>,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub battery: Option<i32>,
}

/// Filter options for visit listings.
#[derive(Debug, Clone, Default)]
pub struct VisitQuery {
    pub session_id: Option<i64>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u64>,
}

pub struct VisitService;

impl VisitService {
    pub async fn mark_visit(db: &DatabaseConnection, params: MarkVisit) -> ServiceResult<Visit> {
        geo::validate_coordinates(params.latitude, params.longitude)?;
        find_user(db, params.user_id).await?;

        let visit = visit::ActiveModel {
            user_id: Set(params.user_id),
            session_id: Set(params.session_id),
            latitude: Set(params.latitude),
            longitude: Set(params.longitude),
            address: Set(params.address),
            notes: Set(params.notes),
            battery: Set(params.battery),
            visit_time: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!("marked visit {} for user {}", visit.id, visit.user_id);
        Ok(visit)
    }

    /// Visits most recent first, optionally narrowed to a session or a time
    /// range.
    pub async fn user_visits(
        db: &DatabaseConnection,
        user_id: i64,
        query: VisitQuery,
    ) -> ServiceResult<Vec<Visit>> {
        find_user(db, user_id).await?;

        let mut select = VisitEntity::find().filter(visit::Column::UserId.eq(user_id));
        if let Some(session_id) = query.session_id {
            select = select.filter(visit::Column::SessionId.eq(session_id));
        }
        if let Some(from) = query.from {
            select = select.filter(visit::Column::VisitTime.gte(from));
        }
        if let Some(to) = query.to {
            select = select.filter(visit::Column::VisitTime.lte(to));
        }

        let visits = select
            .order_by_desc(visit::Column::VisitTime)
            .limit(query.limit.unwrap_or(DEFAULT_VISIT_LIMIT))
            .all(db)
            .await?;
        Ok(visits)
    }

    pub async fn count_for_session(
        db: &DatabaseConnection,
        session_id: i64,
    ) -> ServiceResult<u64> {
        let count = VisitEntity::find()
            .filter(visit::Column::SessionId.eq(session_id))
            .count(db)
            .await?;
        Ok(count)
    }
}
