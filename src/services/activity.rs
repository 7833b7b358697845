// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity sync and stream ingestion.
//!
//! Handles the core workflow:
//! 1. Sync recent activity summaries from Strava, with optional filters
//! 2. Fetch GPS streams for one activity and replace the stored points
//! 3. Recompute and store the quality metric for the new points

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::{Activity, ActivityStream, TrackPoint};
use crate::services::quality::QualityThresholds;
use crate::services::quality_metrics;
use crate::services::strava::{StravaActivitySummary, StravaStreams};
use crate::services::StravaService;
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};

/// Filters applied to synced summaries. Both comparisons ignore case.
#[derive(Debug, Clone, Default)]
pub struct SyncFilter {
    /// Exact sport type match (falls back to the legacy `type` field)
    pub sport_type: Option<String>,
    /// Substring of the activity name
    pub name_contains: Option<String>,
}

impl SyncFilter {
    pub fn matches(&self, summary: &StravaActivitySummary) -> bool {
        if let Some(sport) = &self.sport_type {
            let actual = summary_sport(summary).unwrap_or_default();
            if !actual.eq_ignore_ascii_case(sport) {
                return false;
            }
        }
        if let Some(needle) = &self.name_contains {
            let name = summary.name.as_deref().unwrap_or_default().to_lowercase();
            if !name.contains(&needle.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

fn summary_sport(summary: &StravaActivitySummary) -> Option<&str> {
    summary
        .sport_type
        .as_deref()
        .filter(|s| !s.is_empty())
        .or(summary.activity_type.as_deref())
        .filter(|s| !s.is_empty())
}

/// Normalize a Strava timestamp to RFC3339 UTC with a `Z` suffix.
fn normalize_start_date(raw: Option<&str>, activity_id: u64) -> Option<String> {
    let raw = raw.filter(|s| !s.is_empty())?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(date) => Some(format_utc_rfc3339(date.with_timezone(&Utc))),
        Err(e) => {
            tracing::warn!(activity_id, start_date = raw, error = %e, "Unparseable start_date");
            None
        }
    }
}

/// Build the stored activity from a Strava summary.
pub fn activity_from_summary(summary: &StravaActivitySummary, athlete_id: u64, now: &str) -> Activity {
    Activity {
        strava_activity_id: summary.id,
        athlete_id,
        name: summary.name.clone().filter(|n| !n.is_empty()),
        sport_type: summary_sport(summary).map(str::to_string),
        start_date: normalize_start_date(summary.start_date.as_deref(), summary.id),
        distance_m: summary.distance,
        moving_time_s: summary.moving_time,
        elevation_gain_m: summary.total_elevation_gain,
        synced_at: now.to_string(),
    }
}

/// Convert Strava streams into ordered track points.
///
/// Fails when either the `latlng` or `time` stream is missing or empty.
pub fn points_from_streams(streams: &StravaStreams) -> Result<Vec<TrackPoint>> {
    let latlng = streams.latlng.as_ref().map(|s| s.data.as_slice()).unwrap_or_default();
    let times = streams.time.as_ref().map(|s| s.data.as_slice()).unwrap_or_default();
    if latlng.is_empty() || times.is_empty() {
        return Err(AppError::BadRequest(
            "Missing latlng or time streams".to_string(),
        ));
    }
    let altitude = streams.altitude.as_ref().map(|s| s.data.as_slice());

    Ok(latlng
        .iter()
        .zip(times)
        .enumerate()
        .map(|(i, ([lat, lon], &time_s))| TrackPoint {
            seq: i as u32,
            lat: *lat,
            lon: *lon,
            time_s,
            ele_m: altitude
                .and_then(|alt| alt.get(i))
                .map(|ele| ele.round() as i64),
        })
        .collect())
}

/// Syncs activities and ingests their GPS streams.
pub struct ActivityProcessor {
    strava: StravaService,
    db: FirestoreDb,
}

impl ActivityProcessor {
    pub fn new(strava: StravaService, db: FirestoreDb) -> Self {
        Self { strava, db }
    }

    /// Fetch the first page of recent activities and upsert those matching
    /// `filter`. Returns the number stored.
    pub async fn sync_recent(
        &self,
        athlete_id: u64,
        per_page: u32,
        filter: &SyncFilter,
    ) -> Result<usize> {
        let summaries = self.strava.list_activities(athlete_id, 1, per_page).await?;
        let now = format_utc_rfc3339(Utc::now());

        let mut count = 0;
        for summary in summaries.iter().filter(|s| filter.matches(s)) {
            let activity = activity_from_summary(summary, athlete_id, &now);
            self.db.upsert_activity(&activity).await?;
            count += 1;
        }

        tracing::info!(
            athlete_id,
            fetched = summaries.len(),
            stored = count,
            "Activity sync finished"
        );
        Ok(count)
    }

    /// Fetch streams for an activity, replace its stored points, and store
    /// a fresh quality metric. Returns the number of points stored.
    pub async fn ingest_streams(&self, activity: &Activity) -> Result<usize> {
        let activity_id = activity.strava_activity_id;
        let streams = self
            .strava
            .get_activity_streams(activity.athlete_id, activity_id)
            .await?;

        let points = points_from_streams(&streams)?;
        let stream = ActivityStream {
            activity_id,
            points,
            ingested_at: format_utc_rfc3339(Utc::now()),
        };
        self.db.set_stream(&stream).await?;

        let (latlons, times) = stream.series();
        quality_metrics::upsert_from_series(
            &self.db,
            activity_id,
            &latlons,
            &times,
            &QualityThresholds::default(),
        )
        .await?;

        tracing::info!(activity_id, points = stream.points.len(), "Streams ingested");
        Ok(stream.points.len())
    }
}
