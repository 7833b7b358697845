// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dashboard tests against a live API server and a fake Strava.

use livemap_coach::dashboard::render::{render_activity_list, render_details};
use livemap_coach::dashboard::{ApiClient, Dashboard};
use std::sync::atomic::Ordering;

mod common;

use common::{
    create_test_jwt, far_future, seed_activity, seed_tokens, spawn_fake_strava, streams_json,
    ATHLETE_ID,
};

/// API server backed by a fake Strava, plus a dashboard logged in as `ATHLETE_ID`.
async fn setup() -> (
    std::sync::Arc<common::FakeStrava>,
    std::sync::Arc<livemap_coach::AppState>,
    Dashboard,
) {
    let (fake, strava_base) = spawn_fake_strava().await;
    let (app, state) = common::create_test_app_with_strava(&strava_base);
    seed_tokens(&state, ATHLETE_ID, "live-token", far_future()).await;
    let api_base = common::serve(app).await;

    let client = ApiClient::new(&api_base, Some(create_test_jwt(ATHLETE_ID)));
    (fake, state, Dashboard::new(client))
}

#[tokio::test]
async fn test_load_without_token_reports_auth_error() {
    let (app, _) = common::create_test_app();
    let api_base = common::serve(app).await;

    let mut dashboard = Dashboard::new(ApiClient::new(&api_base, None));
    dashboard.load_activities().await;

    assert!(dashboard.activities.is_empty());
    assert!(!dashboard.list_loading);
    assert_eq!(
        dashboard.message.as_deref(),
        Some("Could not load activities. Authentication required")
    );
}

#[tokio::test]
async fn test_load_selects_newest_activity() {
    let (_fake, state, mut dashboard) = setup().await;
    state
        .db
        .upsert_activity(&common::test_activity(1, ATHLETE_ID, Some("2026-01-01T07:00:00Z")))
        .await
        .unwrap();
    state
        .db
        .upsert_activity(&common::test_activity(2, ATHLETE_ID, Some("2026-02-01T07:00:00Z")))
        .await
        .unwrap();

    dashboard.load_activities().await;
    assert_eq!(dashboard.activities.len(), 2);
    assert_eq!(dashboard.selected_id(), Some(2));

    // Selection survives a reload while the activity is still listed
    assert!(dashboard.set_selected(1));
    dashboard.load_activities().await;
    assert_eq!(dashboard.selected_id(), Some(1));

    let list = render_activity_list(&dashboard);
    let selected = list.lines().find(|l| l.starts_with('>')).unwrap();
    assert!(selected.contains("Run 1"), "{selected}");
    assert!(list.contains("Run 2"));
}

#[tokio::test]
async fn test_reload_moves_selection_off_removed_activity() {
    let (_fake, state, mut dashboard) = setup().await;
    let first = common::test_activity(1, ATHLETE_ID, Some("2026-01-01T07:00:00Z"));
    let second = common::test_activity(2, ATHLETE_ID, Some("2026-02-01T07:00:00Z"));
    state.db.upsert_activity(&first).await.unwrap();
    state.db.upsert_activity(&second).await.unwrap();

    dashboard.load_activities().await;
    assert_eq!(dashboard.selected_id(), Some(2));

    // Handing an activity to another athlete drops it from this list
    let reassign = |mut activity: livemap_coach::models::Activity| {
        activity.athlete_id = common::OTHER_ATHLETE_ID;
        activity
    };

    state.db.upsert_activity(&reassign(second)).await.unwrap();
    dashboard.load_activities().await;
    assert_eq!(dashboard.activities.len(), 1);
    assert_eq!(dashboard.selected_id(), Some(1));

    state.db.upsert_activity(&reassign(first)).await.unwrap();
    dashboard.load_activities().await;
    assert!(dashboard.activities.is_empty());
    assert_eq!(dashboard.selected_id(), None);
    assert!(dashboard.selected_activity().is_none());
}

#[tokio::test]
async fn test_sync_runs_only() {
    let (fake, _state, mut dashboard) = setup().await;
    fake.set_activities(serde_json::json!([
        {"id": 7, "name": "Tempo", "sport_type": "Run", "start_date": "2026-03-01T07:00:00Z"},
        {"id": 8, "name": "Commute", "sport_type": "Ride", "start_date": "2026-03-02T07:00:00Z"}
    ]));

    dashboard.sync().await;

    assert!(!dashboard.syncing);
    assert_eq!(dashboard.message.as_deref(), Some("Synced 1 run activities."));
    assert_eq!(dashboard.activities.len(), 1);
    assert_eq!(dashboard.selected_id(), Some(7));

    dashboard.only_runs = false;
    dashboard.sync().await;
    assert_eq!(dashboard.message.as_deref(), Some("Synced 2 activities."));
    assert_eq!(dashboard.activities.len(), 2);
}

#[tokio::test]
async fn test_sync_failure_message() {
    let (fake, state, mut dashboard) = setup().await;
    state.db.delete_tokens(ATHLETE_ID).await.unwrap();
    fake.set_activities(serde_json::json!([]));

    dashboard.sync().await;
    assert_eq!(
        dashboard.message.as_deref(),
        Some("Sync failed. No Strava token found. Login with Strava first.")
    );
}

#[tokio::test]
async fn test_details_auto_ingest() {
    let (fake, state, mut dashboard) = setup().await;
    seed_activity(&state, 70, ATHLETE_ID).await;
    fake.set_streams(70, streams_json(25));

    dashboard.load_activities().await;
    dashboard.load_details(70).await;

    assert!(dashboard.was_auto_ingested(70));
    assert!(!dashboard.detail_loading);
    assert_eq!(
        dashboard.message.as_deref(),
        Some("Streams ingested automatically.")
    );
    assert_eq!(dashboard.track_error, None);
    assert_eq!(dashboard.quality_error, None);
    assert_eq!(dashboard.quality.as_ref().map(|q| q.point_count), Some(25));

    let details = render_details(&dashboard);
    assert!(details.contains("points: 25"));
    assert!(details.contains("bounds: SW 37.00000,-122.00000"));
}

#[tokio::test]
async fn test_details_auto_ingest_runs_once() {
    let (fake, state, mut dashboard) = setup().await;
    // No streams on the fake Strava, so ingest fails
    seed_activity(&state, 71, ATHLETE_ID).await;

    dashboard.load_activities().await;
    assert!(dashboard.select(71).await);

    let message = dashboard.message.clone().unwrap();
    assert!(message.starts_with("Auto-ingest failed."), "{message}");
    assert_eq!(
        dashboard.track_error.as_deref(),
        Some("No points found. Ingest streams first.")
    );
    assert_eq!(
        dashboard.quality_error.as_deref(),
        Some("Not enough points. Ingest streams first.")
    );

    let calls = fake.api_calls.load(Ordering::SeqCst);
    dashboard.load_details(71).await;
    assert_eq!(fake.api_calls.load(Ordering::SeqCst), calls);
    assert!(dashboard.track.is_none());
}

#[tokio::test]
async fn test_ingest_selected() {
    let (fake, state, mut dashboard) = setup().await;
    seed_activity(&state, 72, ATHLETE_ID).await;
    fake.set_streams(72, streams_json(12));

    dashboard.load_activities().await;
    dashboard.ingest_selected().await;

    assert!(!dashboard.ingesting);
    assert_eq!(
        dashboard.message.as_deref(),
        Some("Streams ingested. Loading track and quality…")
    );
    assert!(!dashboard.was_auto_ingested(72));
    assert!(dashboard.track.is_some());
    assert_eq!(dashboard.quality.as_ref().map(|q| q.point_count), Some(12));
}
