// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! ML routes: quality labels and feature snapshot rebuilds.

use crate::db::LabelQuery;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::QualityLabel;
use crate::routes::owned_activity;
use crate::services::ml_features::{self, FEATURE_VERSION_V1};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// Accepted values for `label_source`, sorted.
pub const ALLOWED_LABEL_SOURCES: &[&str] = &["manual", "weak_rule"];

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ml/activities/{id}/label", post(upsert_label))
        .route("/ml/labels", get(list_labels))
        .route("/ml/features/rebuild", post(rebuild_features))
}

fn default_label_version() -> u32 {
    1
}

/// Label upsert request body.
#[derive(Debug, Deserialize, Validate)]
pub struct LabelUpsertRequest {
    pub label_bad: bool,
    #[validate(length(min = 1, max = 32))]
    pub label_source: String,
    #[serde(default)]
    pub label_reason: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 1.0))]
    pub label_confidence: Option<f64>,
    #[serde(default = "default_label_version")]
    #[validate(range(min = 1))]
    pub label_version: u32,
    #[serde(default)]
    #[validate(length(max = 128))]
    pub created_by: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LabelResponse {
    pub id: String,
    pub activity_id: u64,
    pub label_bad: bool,
    pub label_source: String,
    pub label_reason: Option<String>,
    pub label_confidence: Option<f64>,
    pub label_version: u32,
    pub created_at: String,
    pub created_by: Option<String>,
}

impl From<QualityLabel> for LabelResponse {
    fn from(l: QualityLabel) -> Self {
        Self {
            id: l.id,
            activity_id: l.activity_id,
            label_bad: l.label_bad,
            label_source: l.label_source,
            label_reason: l.label_reason,
            label_confidence: l.label_confidence,
            label_version: l.label_version,
            created_at: l.created_at,
            created_by: l.created_by,
        }
    }
}

/// Create or replace the label of an activity. `id` and `created_at`
/// survive replacement.
async fn upsert_label(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<u64>,
    Json(body): Json<LabelUpsertRequest>,
) -> Result<Json<LabelResponse>> {
    body.validate()
        .map_err(|e| AppError::BadRequest(format!("Invalid label: {}", e)))?;

    let activity = owned_activity(&state, &user, activity_id).await?;

    if !ALLOWED_LABEL_SOURCES.contains(&body.label_source.as_str()) {
        return Err(AppError::BadRequest(format!(
            "label_source must be one of: {}",
            ALLOWED_LABEL_SOURCES.join(", ")
        )));
    }

    let existing = state.db.get_label(activity_id).await?;
    let (id, created_at) = match existing {
        Some(label) => (label.id, label.created_at),
        None => (
            uuid::Uuid::new_v4().to_string(),
            format_utc_rfc3339(chrono::Utc::now()),
        ),
    };

    let label = QualityLabel {
        id,
        activity_id,
        athlete_id: activity.athlete_id,
        label_bad: body.label_bad,
        label_source: body.label_source,
        label_reason: body.label_reason,
        label_confidence: body.label_confidence,
        label_version: body.label_version,
        created_at,
        created_by: body.created_by,
    };
    state.db.upsert_label(&label).await?;

    tracing::info!(
        activity_id,
        label_bad = label.label_bad,
        label_source = %label.label_source,
        "Quality label stored"
    );
    Ok(Json(label.into()))
}

#[derive(Debug, Deserialize)]
pub struct LabelListParams {
    label_bad: Option<bool>,
    label_source: Option<String>,
    activity_id: Option<u64>,
    limit: Option<u32>,
    offset: Option<u32>,
}

/// List the caller's labels, newest first.
async fn list_labels(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<LabelListParams>,
) -> Result<Json<Vec<LabelResponse>>> {
    let limit = params.limit.unwrap_or(100);
    if !(1..=1000).contains(&limit) {
        return Err(AppError::BadRequest(
            "limit must be between 1 and 1000".to_string(),
        ));
    }

    let query = LabelQuery {
        label_bad: params.label_bad,
        label_source: params.label_source,
        activity_id: params.activity_id,
        limit,
        offset: params.offset.unwrap_or(0),
    };
    let labels = state.db.list_labels(user.athlete_id, &query).await?;

    Ok(Json(labels.into_iter().map(Into::into).collect()))
}

#[derive(Debug, Deserialize)]
pub struct RebuildParams {
    #[serde(default = "default_labeled_only")]
    labeled_only: bool,
    limit: Option<u32>,
    #[serde(default)]
    offset: usize,
}

fn default_labeled_only() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RebuildResponse {
    pub ok: bool,
    pub feature_version: u32,
    pub labeled_only: bool,
    pub selected: usize,
    pub rebuilt: usize,
    pub skipped: usize,
    pub skipped_activity_ids: Vec<u64>,
    pub snapshots_in_db: usize,
}

/// Rebuild feature snapshots for the caller's activities (ascending id).
async fn rebuild_features(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<RebuildParams>,
) -> Result<Json<RebuildResponse>> {
    if let Some(limit) = params.limit {
        if !(1..=5000).contains(&limit) {
            return Err(AppError::BadRequest(
                "limit must be between 1 and 5000".to_string(),
            ));
        }
    }

    let mut candidates = state.db.get_activity_ids_for_user(user.athlete_id).await?;
    if params.labeled_only {
        let mut labeled = Vec::with_capacity(candidates.len());
        for id in candidates {
            if state.db.get_label(id).await?.is_some() {
                labeled.push(id);
            }
        }
        candidates = labeled;
    }

    let selected: Vec<u64> = candidates
        .into_iter()
        .skip(params.offset)
        .take(params.limit.map_or(usize::MAX, |l| l as usize))
        .collect();

    let summary = ml_features::rebuild(&state.db, &selected, FEATURE_VERSION_V1).await?;
    let snapshots_in_db = state.db.count_feature_snapshots(user.athlete_id).await?;

    Ok(Json(RebuildResponse {
        ok: true,
        feature_version: FEATURE_VERSION_V1,
        labeled_only: params.labeled_only,
        selected: summary.selected,
        rebuilt: summary.rebuilt,
        skipped: summary.skipped_activity_ids.len(),
        skipped_activity_ids: summary.skipped_activity_ids,
        snapshots_in_db,
    }))
}
