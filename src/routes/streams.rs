// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-activity stream routes: ingest, track geometry, points, quality and
//! features.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Activity, ActivityFeatures, FeatureMetadata, QualityMetric};
use crate::routes::owned_activity;
use crate::services::ml_features::{self, FEATURE_VERSION_V1};
use crate::services::{quality_metrics, ActivityProcessor};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Message returned when an activity has no stored points.
pub const NO_POINTS: &str = "No points found. Ingest streams first.";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/activities/{id}/ingest_streams", post(ingest_streams))
        .route("/activities/{id}/track", get(get_track))
        .route("/activities/{id}/points.geojson", get(get_points))
        .route("/activities/{id}/quality", get(get_quality))
        .route("/activities/{id}/features", get(get_features))
}

fn to_object(value: serde_json::Value) -> Option<JsonObject> {
    match value {
        serde_json::Value::Object(map) => Some(map),
        _ => None,
    }
}

fn track_properties(activity: &Activity, point_count: usize) -> serde_json::Value {
    json!({
        "activity_id": activity.strava_activity_id,
        "name": activity.name,
        "sport_type": activity.sport_type,
        "point_count": point_count,
        "start_date": activity.start_date,
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub ok: bool,
    pub points: usize,
}

/// Fetch streams from Strava and replace the stored points.
async fn ingest_streams(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<u64>,
) -> Result<Json<IngestResponse>> {
    let activity = owned_activity(&state, &user, activity_id).await?;

    let processor = ActivityProcessor::new(state.strava_service.clone(), state.db.clone());
    let points = processor.ingest_streams(&activity).await?;

    Ok(Json(IngestResponse { ok: true, points }))
}

/// Track as a GeoJSON LineString feature. Geometry is null with fewer than
/// two points.
async fn get_track(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<u64>,
) -> Result<Json<Feature>> {
    let activity = owned_activity(&state, &user, activity_id).await?;
    let stream = state
        .db
        .get_stream(activity_id)
        .await?
        .filter(|s| !s.points.is_empty())
        .ok_or_else(|| AppError::NotFound(NO_POINTS.to_string()))?;

    let geometry = (stream.points.len() >= 2).then(|| {
        Geometry::new(Value::LineString(
            stream.points.iter().map(|p| vec![p.lon, p.lat]).collect(),
        ))
    });

    Ok(Json(Feature {
        bbox: None,
        geometry,
        id: None,
        properties: to_object(track_properties(&activity, stream.points.len())),
        foreign_members: None,
    }))
}

/// Every stored point as a GeoJSON Point feature.
async fn get_points(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<u64>,
) -> Result<Json<FeatureCollection>> {
    let activity = owned_activity(&state, &user, activity_id).await?;
    let stream = state
        .db
        .get_stream(activity_id)
        .await?
        .filter(|s| !s.points.is_empty())
        .ok_or_else(|| AppError::NotFound(NO_POINTS.to_string()))?;

    let features: Vec<Feature> = stream
        .points
        .iter()
        .map(|p| Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Point(vec![p.lon, p.lat]))),
            id: None,
            properties: to_object(json!({
                "activity_id": activity_id,
                "seq": p.seq,
                "time_s": p.time_s,
                "ele_m": p.ele_m,
            })),
            foreign_members: None,
        })
        .collect();

    let mut foreign_members = JsonObject::new();
    foreign_members.insert(
        "properties".to_string(),
        track_properties(&activity, features.len()),
    );

    Ok(Json(FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(foreign_members),
    }))
}

/// Thresholds a quality report was computed with.
#[derive(Debug, Serialize, Deserialize)]
pub struct QualityNotes {
    pub spike_speed_threshold_mps: f64,
    pub stop_speed_threshold_mps: f64,
    pub stop_min_duration_s: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QualityResponse {
    pub activity_id: u64,
    pub name: Option<String>,
    pub sport_type: Option<String>,
    pub point_count: u32,
    pub duration_s: i64,
    pub distance_m_gps: f64,
    pub max_speed_mps: f64,
    pub max_speed_kmh: f64,
    pub spike_count: u32,
    pub stopped_time_s: i64,
    pub stop_segments: u32,
    pub jitter_score: f64,
    pub computed_at: Option<String>,
    pub notes: QualityNotes,
}

impl QualityResponse {
    fn new(activity: &Activity, metric: QualityMetric) -> Self {
        Self {
            activity_id: activity.strava_activity_id,
            name: activity.name.clone(),
            sport_type: activity.sport_type.clone(),
            point_count: metric.point_count,
            duration_s: metric.duration_s,
            distance_m_gps: metric.distance_m_gps,
            max_speed_mps: metric.max_speed_mps,
            max_speed_kmh: metric.max_speed_mps * 3.6,
            spike_count: metric.spike_count,
            stopped_time_s: metric.stopped_time_s,
            stop_segments: metric.stop_segments,
            jitter_score: metric.jitter_score,
            computed_at: Some(metric.computed_at),
            notes: QualityNotes {
                spike_speed_threshold_mps: metric.spike_speed_threshold_mps,
                stop_speed_threshold_mps: metric.stop_speed_threshold_mps,
                stop_min_duration_s: metric.stop_min_duration_s,
            },
        }
    }
}

/// Quality report, computed and stored on first request.
async fn get_quality(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<u64>,
) -> Result<Json<QualityResponse>> {
    let activity = owned_activity(&state, &user, activity_id).await?;
    let metric = quality_metrics::get_or_compute(&state.db, activity_id).await?;
    Ok(Json(QualityResponse::new(&activity, metric)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeaturesResponse {
    pub activity_id: u64,
    pub strava_activity_id: u64,
    pub feature_version: u32,
    pub computed_at: Option<String>,
    pub metadata: FeatureMetadata,
    pub features: ActivityFeatures,
}

/// Feature vector for one activity. The snapshot is stored as a side effect.
async fn get_features(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<u64>,
) -> Result<Json<FeaturesResponse>> {
    let activity = owned_activity(&state, &user, activity_id).await?;
    let snapshot =
        ml_features::build_activity_features(&state.db, &activity, FEATURE_VERSION_V1, true)
            .await?;

    Ok(Json(FeaturesResponse {
        activity_id: snapshot.activity_id,
        strava_activity_id: activity.strava_activity_id,
        feature_version: snapshot.feature_version,
        computed_at: Some(snapshot.computed_at),
        metadata: snapshot.metadata,
        features: snapshot.features,
    }))
}
