// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dashboard state and the actions that drive it.
//!
//! All actions run on one task. Loading flags are set for the duration of
//! the action that owns them and cleared before it returns.

use super::client::{ApiClient, ApiError};
use crate::routes::activities::ActivityResponse;
use crate::routes::streams::QualityResponse;
use geojson::Feature;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Activities requested per list load.
pub const LIST_LIMIT: u32 = 50;
pub const DEFAULT_PER_PAGE: u32 = 30;
pub const MIN_PER_PAGE: u32 = 5;
pub const MAX_PER_PAGE: u32 = 50;

/// Error messages meaning "streams were never ingested".
static MISSING_DATA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)ingest streams first|not enough points|no points found")
        .expect("missing-data pattern is valid")
});

/// True when the error can be fixed by ingesting the activity's streams.
pub fn is_missing_data(result: &Result<impl Sized, ApiError>) -> bool {
    matches!(result, Err(e) if e.status == 404 && MISSING_DATA.is_match(&e.message))
}

/// Client-side dashboard state.
pub struct Dashboard {
    client: ApiClient,
    pub activities: Vec<ActivityResponse>,
    selected_id: Option<u64>,
    pub list_loading: bool,
    pub syncing: bool,
    pub ingesting: bool,
    pub detail_loading: bool,
    pub track: Option<Feature>,
    pub quality: Option<QualityResponse>,
    pub track_error: Option<String>,
    pub quality_error: Option<String>,
    per_page: u32,
    pub only_runs: bool,
    pub message: Option<String>,
    auto_ingested: HashSet<u64>,
}

impl Dashboard {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            activities: Vec::new(),
            selected_id: None,
            list_loading: false,
            syncing: false,
            ingesting: false,
            detail_loading: false,
            track: None,
            quality: None,
            track_error: None,
            quality_error: None,
            per_page: DEFAULT_PER_PAGE,
            only_runs: true,
            message: None,
            auto_ingested: HashSet::new(),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn selected_id(&self) -> Option<u64> {
        self.selected_id
    }

    pub fn selected_activity(&self) -> Option<&ActivityResponse> {
        let id = self.selected_id?;
        self.activities.iter().find(|a| a.id == id)
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Set the sync page size, clamped to 5..=50.
    pub fn set_per_page(&mut self, per_page: u32) {
        self.per_page = per_page.clamp(MIN_PER_PAGE, MAX_PER_PAGE);
    }

    /// True once auto-ingest has been attempted for `activity_id`.
    pub fn was_auto_ingested(&self, activity_id: u64) -> bool {
        self.auto_ingested.contains(&activity_id)
    }

    /// Reload the activity list, clearing any previous message.
    pub async fn load_activities(&mut self) {
        self.message = None;
        self.refresh_activities().await;
    }

    async fn refresh_activities(&mut self) {
        self.list_loading = true;
        match self.client.list_activities(LIST_LIMIT).await {
            Ok(activities) => {
                self.activities = activities;
                let still_listed = self
                    .selected_id
                    .is_some_and(|id| self.activities.iter().any(|a| a.id == id));
                if !still_listed {
                    self.selected_id = self.activities.first().map(|a| a.id);
                }
            }
            Err(e) => {
                self.message = Some(format!("Could not load activities. {}", e));
            }
        }
        self.list_loading = false;
    }

    /// Change the selection without loading details. Ids that are not in
    /// the loaded list are rejected.
    pub fn set_selected(&mut self, activity_id: u64) -> bool {
        if !self.activities.iter().any(|a| a.id == activity_id) {
            return false;
        }
        self.selected_id = Some(activity_id);
        true
    }

    /// Select a listed activity and load its details.
    pub async fn select(&mut self, activity_id: u64) -> bool {
        if !self.set_selected(activity_id) {
            return false;
        }
        self.load_details(activity_id).await;
        true
    }

    /// Fetch track and quality together, auto-ingesting once per activity
    /// when either reports missing stream data.
    pub async fn load_details(&mut self, activity_id: u64) {
        let mut skip_auto_ingest = false;
        loop {
            self.detail_loading = true;
            self.track = None;
            self.quality = None;
            self.track_error = None;
            self.quality_error = None;

            let (track, quality) = tokio::join!(
                self.client.get_track(activity_id),
                self.client.get_quality(activity_id),
            );

            let needs_ingest = is_missing_data(&track) || is_missing_data(&quality);
            if needs_ingest && !skip_auto_ingest && self.auto_ingested.insert(activity_id) {
                tracing::info!(activity_id, "Auto-ingesting streams");
                self.message = Some("Auto-ingesting streams for this activity…".to_string());
                let outcome = self.client.ingest_streams(activity_id).await;
                self.message = Some(match outcome {
                    Ok(_) => "Streams ingested automatically.".to_string(),
                    Err(e) => format!("Auto-ingest failed. {}", e),
                });
                skip_auto_ingest = true;
                continue;
            }

            match track {
                Ok(feature) => self.track = Some(feature),
                Err(e) => self.track_error = Some(e.message),
            }
            match quality {
                Ok(report) => self.quality = Some(report),
                Err(e) => self.quality_error = Some(e.message),
            }
            self.detail_loading = false;
            return;
        }
    }

    /// Sync recent activities (runs only unless `only_runs` is off), then
    /// reload the list.
    pub async fn sync(&mut self) {
        self.syncing = true;
        self.message = None;

        let sport_type = self.only_runs.then_some("Run");
        match self.client.sync_activities(self.per_page, sport_type).await {
            Ok(result) => {
                self.message = Some(if self.only_runs {
                    format!("Synced {} run activities.", result.count)
                } else {
                    format!("Synced {} activities.", result.count)
                });
                self.refresh_activities().await;
            }
            Err(e) => self.message = Some(format!("Sync failed. {}", e)),
        }
        self.syncing = false;
    }

    /// Ingest the selected activity and reload its details. No-op without
    /// a selection.
    pub async fn ingest_selected(&mut self) {
        let Some(activity_id) = self.selected_id else {
            return;
        };
        self.ingesting = true;
        self.message = None;

        match self.client.ingest_streams(activity_id).await {
            Ok(_) => {
                self.message = Some("Streams ingested. Loading track and quality…".to_string());
                self.load_details(activity_id).await;
            }
            Err(e) => self.message = Some(format!("Ingest failed. {}", e)),
        }
        self.ingesting = false;
    }
}
