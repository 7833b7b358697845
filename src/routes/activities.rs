// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity listing.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::Activity;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 200;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/activities", get(list_activities))
        .route("/activities/", get(list_activities))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    limit: Option<u32>,
    offset: Option<u32>,
}

/// Activity as returned by the API.
#[derive(Debug, Serialize, Deserialize)]
pub struct ActivityResponse {
    pub id: u64,
    pub strava_activity_id: u64,
    pub name: Option<String>,
    pub sport_type: Option<String>,
    pub start_date: Option<String>,
    pub distance_m: Option<f64>,
    pub moving_time_s: Option<i64>,
    pub elevation_gain_m: Option<f64>,
}

impl From<Activity> for ActivityResponse {
    fn from(a: Activity) -> Self {
        Self {
            id: a.strava_activity_id,
            strava_activity_id: a.strava_activity_id,
            name: a.name,
            sport_type: a.sport_type,
            start_date: a.start_date,
            distance_m: a.distance_m,
            moving_time_s: a.moving_time_s,
            elevation_gain_m: a.elevation_gain_m,
        }
    }
}

/// List the caller's activities, newest first.
async fn list_activities(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ActivityResponse>>> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0);

    let activities = state
        .db
        .get_activities_for_user(user.athlete_id, limit, offset)
        .await?;

    Ok(Json(activities.into_iter().map(Into::into).collect()))
}
