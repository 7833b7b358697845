// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! ML feature snapshots derived from quality metrics.

use serde::{Deserialize, Serialize};

/// Activity metadata copied into a feature snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMetadata {
    pub name: Option<String>,
    pub sport_type: Option<String>,
    pub start_date: Option<String>,
    pub moving_time_s: Option<i64>,
    pub distance_m_official: Option<f64>,
    pub elevation_gain_m: Option<f64>,
}

/// Feature vector (version 1). Ratios are `None` when undefined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityFeatures {
    pub point_count: u32,
    pub duration_s: i64,
    pub distance_m_gps: f64,
    pub distance_ratio_gps_vs_official: Option<f64>,
    pub avg_speed_mps_gps: Option<f64>,
    pub max_speed_mps: f64,
    pub max_speed_kmh: f64,
    pub spike_count: u32,
    pub spikes_per_km: Option<f64>,
    pub stopped_time_s: i64,
    pub stopped_fraction: Option<f64>,
    pub stop_segments: u32,
    pub jitter_score: f64,
    pub points_per_km: Option<f64>,
    pub points_per_min: Option<f64>,
    pub stop_segments_per_hour: Option<f64>,
    pub spike_fraction: Option<f64>,
}

/// Persisted feature snapshot (one per activity).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlFeatureSnapshot {
    pub activity_id: u64,
    pub athlete_id: u64,
    pub feature_version: u32,
    pub metadata: FeatureMetadata,
    pub features: ActivityFeatures,
    pub computed_at: String,
}
