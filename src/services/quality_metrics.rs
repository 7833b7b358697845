// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persisted quality metrics: compute from a series and store, or return
//! the stored snapshot.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::QualityMetric;
use crate::services::quality::{compute_quality, QualityThresholds};
use crate::time_utils::format_utc_rfc3339;
use chrono::Utc;

/// Message returned when an activity has no usable stream.
pub const NOT_ENOUGH_POINTS: &str = "Not enough points. Ingest streams first.";

/// Build a metric record from a series without storing it.
pub fn metric_from_series(
    activity_id: u64,
    latlons: &[(f64, f64)],
    times: &[i64],
    thresholds: &QualityThresholds,
) -> QualityMetric {
    let report = compute_quality(latlons, times, thresholds);
    QualityMetric {
        activity_id,
        point_count: report.point_count,
        duration_s: report.duration_s,
        distance_m_gps: report.distance_m,
        max_speed_mps: report.max_speed_mps,
        spike_count: report.spike_count,
        stopped_time_s: report.stopped_time_s,
        stop_segments: report.stop_segments,
        jitter_score: report.jitter_score,
        spike_speed_threshold_mps: thresholds.spike_speed_mps,
        stop_speed_threshold_mps: thresholds.stop_speed_mps,
        stop_min_duration_s: thresholds.stop_min_duration_s,
        computed_at: format_utc_rfc3339(Utc::now()),
    }
}

/// Compute quality for a series and store it, replacing any previous metric.
pub async fn upsert_from_series(
    db: &FirestoreDb,
    activity_id: u64,
    latlons: &[(f64, f64)],
    times: &[i64],
    thresholds: &QualityThresholds,
) -> Result<QualityMetric, AppError> {
    let metric = metric_from_series(activity_id, latlons, times, thresholds);
    db.set_quality_metric(&metric).await?;

    tracing::debug!(
        activity_id,
        point_count = metric.point_count,
        spike_count = metric.spike_count,
        "Quality metric stored"
    );
    Ok(metric)
}

/// Recompute from the stored stream.
///
/// Fails with `NotFound` when fewer than two points are stored.
pub async fn upsert_from_stream(
    db: &FirestoreDb,
    activity_id: u64,
    thresholds: &QualityThresholds,
) -> Result<QualityMetric, AppError> {
    let stream = db.get_stream(activity_id).await?;
    let Some(stream) = stream.filter(|s| s.points.len() >= 2) else {
        return Err(AppError::NotFound(NOT_ENOUGH_POINTS.to_string()));
    };

    let (latlons, times) = stream.series();
    upsert_from_series(db, activity_id, &latlons, &times, thresholds).await
}

/// Return the stored metric, computing and storing it on first use.
pub async fn get_or_compute(db: &FirestoreDb, activity_id: u64) -> Result<QualityMetric, AppError> {
    if let Some(metric) = db.get_quality_metric(activity_id).await? {
        return Ok(metric);
    }
    upsert_from_stream(db, activity_id, &QualityThresholds::default()).await
}
