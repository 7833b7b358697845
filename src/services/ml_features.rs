// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! ML feature snapshots built from activity metadata and quality metrics.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{Activity, ActivityFeatures, FeatureMetadata, MlFeatureSnapshot, QualityMetric};
use crate::services::quality_metrics;
use crate::time_utils::format_utc_rfc3339;
use chrono::Utc;

pub const FEATURE_VERSION_V1: u32 = 1;

/// `numerator / denominator`, or `None` when the denominator is not positive.
fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    (denominator > 0.0).then(|| numerator / denominator)
}

/// Build metadata and the v1 feature vector for an activity.
pub fn build_features(activity: &Activity, metric: &QualityMetric) -> (FeatureMetadata, ActivityFeatures) {
    let duration = metric.duration_s as f64;
    let gps_km = metric.distance_m_gps / 1000.0;
    let points = f64::from(metric.point_count);
    let spikes = f64::from(metric.spike_count);

    let metadata = FeatureMetadata {
        name: activity.name.clone(),
        sport_type: activity.sport_type.clone(),
        start_date: activity.start_date.clone(),
        moving_time_s: activity.moving_time_s,
        distance_m_official: activity.distance_m,
        elevation_gain_m: activity.elevation_gain_m,
    };

    let features = ActivityFeatures {
        point_count: metric.point_count,
        duration_s: metric.duration_s,
        distance_m_gps: metric.distance_m_gps,
        distance_ratio_gps_vs_official: activity
            .distance_m
            .and_then(|official| ratio(metric.distance_m_gps, official)),
        avg_speed_mps_gps: ratio(metric.distance_m_gps, duration),
        max_speed_mps: metric.max_speed_mps,
        max_speed_kmh: metric.max_speed_mps * 3.6,
        spike_count: metric.spike_count,
        spikes_per_km: ratio(spikes, gps_km),
        stopped_time_s: metric.stopped_time_s,
        stopped_fraction: ratio(metric.stopped_time_s as f64, duration),
        stop_segments: metric.stop_segments,
        jitter_score: metric.jitter_score,
        points_per_km: ratio(points, gps_km),
        points_per_min: ratio(points, duration / 60.0),
        stop_segments_per_hour: ratio(f64::from(metric.stop_segments), duration / 3600.0),
        spike_fraction: ratio(spikes, points),
    };

    (metadata, features)
}

/// Build the feature snapshot for an activity, storing it when `persist` is set.
///
/// The quality metric is computed on demand, so this fails with `NotFound`
/// when the activity has no ingested stream and no stored metric.
pub async fn build_activity_features(
    db: &FirestoreDb,
    activity: &Activity,
    feature_version: u32,
    persist: bool,
) -> Result<MlFeatureSnapshot, AppError> {
    let metric = quality_metrics::get_or_compute(db, activity.strava_activity_id).await?;
    let (metadata, features) = build_features(activity, &metric);

    let snapshot = MlFeatureSnapshot {
        activity_id: activity.strava_activity_id,
        athlete_id: activity.athlete_id,
        feature_version,
        metadata,
        features,
        computed_at: if persist {
            format_utc_rfc3339(Utc::now())
        } else {
            metric.computed_at
        },
    };

    if persist {
        db.set_feature_snapshot(&snapshot).await?;
    }
    Ok(snapshot)
}

/// Outcome of a bulk rebuild.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RebuildSummary {
    pub selected: usize,
    pub rebuilt: usize,
    pub skipped_activity_ids: Vec<u64>,
}

/// Rebuild snapshots for the given activities, skipping those without data.
pub async fn rebuild(
    db: &FirestoreDb,
    activity_ids: &[u64],
    feature_version: u32,
) -> Result<RebuildSummary, AppError> {
    let mut summary = RebuildSummary {
        selected: activity_ids.len(),
        ..Default::default()
    };

    for &activity_id in activity_ids {
        let Some(activity) = db.get_activity(activity_id).await? else {
            summary.skipped_activity_ids.push(activity_id);
            continue;
        };

        match build_activity_features(db, &activity, feature_version, true).await {
            Ok(_) => summary.rebuilt += 1,
            Err(AppError::NotFound(reason)) => {
                tracing::debug!(activity_id, reason = %reason, "Skipping feature rebuild");
                summary.skipped_activity_ids.push(activity_id);
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(
        selected = summary.selected,
        rebuilt = summary.rebuilt,
        skipped = summary.skipped_activity_ids.len(),
        "Feature rebuild finished"
    );
    Ok(summary)
}
