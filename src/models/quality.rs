// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persisted quality metrics and quality labels.

use serde::{Deserialize, Serialize};

/// Quality metric snapshot for an activity (one per activity).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetric {
    pub activity_id: u64,
    pub point_count: u32,
    pub duration_s: i64,
    pub distance_m_gps: f64,
    pub max_speed_mps: f64,
    pub spike_count: u32,
    pub stopped_time_s: i64,
    pub stop_segments: u32,
    pub jitter_score: f64,

    // Thresholds used for this computation
    pub spike_speed_threshold_mps: f64,
    pub stop_speed_threshold_mps: f64,
    pub stop_min_duration_s: i64,

    pub computed_at: String,
}

/// Manual or rule-based "bad recording" label for an activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityLabel {
    /// Stable across upserts
    pub id: String,
    pub activity_id: u64,
    /// Owner of the labelled activity
    pub athlete_id: u64,
    pub label_bad: bool,
    pub label_source: String,
    pub label_reason: Option<String>,
    pub label_confidence: Option<f64>,
    pub label_version: u32,
    pub created_at: String,
    pub created_by: Option<String>,
}
