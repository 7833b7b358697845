// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity sync from Strava.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::services::{ActivityProcessor, SyncFilter};
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::post,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const DEFAULT_PER_PAGE: u32 = 30;
const MAX_PER_PAGE: u32 = 200;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/sync/activities", post(sync_activities))
}

#[derive(Debug, Deserialize)]
pub struct SyncParams {
    per_page: Option<u32>,
    sport_type: Option<String>,
    name_contains: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncResponse {
    pub ok: bool,
    pub count: usize,
}

/// Pull the latest page of activities from Strava and store matching ones.
async fn sync_activities(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<SyncParams>,
) -> Result<Json<SyncResponse>> {
    let per_page = params
        .per_page
        .unwrap_or(DEFAULT_PER_PAGE)
        .clamp(1, MAX_PER_PAGE);
    let filter = SyncFilter {
        sport_type: params.sport_type.filter(|s| !s.is_empty()),
        name_contains: params.name_contains.filter(|s| !s.is_empty()),
    };

    let processor = ActivityProcessor::new(state.strava_service.clone(), state.db.clone());
    let count = processor
        .sync_recent(user.athlete_id, per_page, &filter)
        .await?;

    Ok(Json(SyncResponse { ok: true, count }))
}
