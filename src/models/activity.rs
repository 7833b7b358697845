// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava activity and GPS stream models for storage and API.

use serde::{Deserialize, Serialize};

/// Synced activity summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    /// Strava activity ID (also used as document ID)
    pub strava_activity_id: u64,
    /// Strava athlete ID (owner)
    pub athlete_id: u64,
    /// Activity name/title
    pub name: Option<String>,
    /// Sport type (Run, Ride, Hike, etc.)
    pub sport_type: Option<String>,
    /// Start date/time (RFC3339, `Z` suffix)
    pub start_date: Option<String>,
    /// Distance reported by Strava, in meters
    pub distance_m: Option<f64>,
    pub moving_time_s: Option<i64>,
    pub elevation_gain_m: Option<f64>,
    /// When this activity was last synced
    pub synced_at: String,
}

/// One recorded GPS sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    /// Index of the point in the stream (0, 1, 2, ...)
    pub seq: u32,
    pub lat: f64,
    pub lon: f64,
    /// Seconds since activity start
    pub time_s: i64,
    /// Elevation in meters, rounded
    pub ele_m: Option<i64>,
}

/// Ingested GPS stream for an activity, ordered by `seq`.
///
/// Replaced wholesale on every ingest. Firestore stores it as a header
/// document plus point chunks, since long streams exceed the document size
/// limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityStream {
    pub activity_id: u64,
    pub points: Vec<TrackPoint>,
    pub ingested_at: String,
}

impl ActivityStream {
    /// `(lat, lon)` pairs and timestamps in stream order.
    pub fn series(&self) -> (Vec<(f64, f64)>, Vec<i64>) {
        self.points
            .iter()
            .map(|p| ((p.lat, p.lon), p.time_s))
            .unzip()
    }
}
