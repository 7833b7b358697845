// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use livemap_coach::config::Config;
use livemap_coach::db::FirestoreDb;
use livemap_coach::middleware::auth::create_jwt;
use livemap_coach::models::{Activity, ActivityStream, TrackPoint, UserTokens};
use livemap_coach::routes::create_router;
use livemap_coach::services::strava::RetryPolicy;
use livemap_coach::services::StravaClient;
use livemap_coach::AppState;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ATHLETE_ID: u64 = 1001;
pub const OTHER_ATHLETE_ID: u64 = 2002;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Session token for `athlete_id`, signed with the test key.
#[allow(dead_code)]
pub fn create_test_jwt(athlete_id: u64) -> String {
    create_jwt(athlete_id, &Config::test_default().jwt_signing_key).expect("Failed to create JWT")
}

/// Test app on the in-memory backend. Strava is unreachable.
#[allow(dead_code)]
pub fn create_test_app() -> (Router, Arc<AppState>) {
    create_test_app_with_config(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with_config(config: Config) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(config, FirestoreDb::in_memory()));
    (create_router(state.clone()), state)
}

/// Test app whose Strava client talks to a fake server at `fake_base`.
#[allow(dead_code)]
pub fn create_test_app_with_strava(fake_base: &str) -> (Router, Arc<AppState>) {
    let mut config = Config::test_default();
    config.strava_api_base = format!("{}/api/v3", fake_base);
    config.strava_oauth_base = format!("{}/oauth", fake_base);

    let client = StravaClient::with_base_urls(
        config.strava_client_id.clone(),
        config.strava_client_secret.clone(),
        &config.strava_api_base,
        &config.strava_oauth_base,
    )
    .with_retry_policy(RetryPolicy {
        max_retries: 3,
        backoff_base: Duration::from_millis(5),
        max_delay: Duration::from_millis(50),
    });

    let state = Arc::new(AppState::with_client(config, FirestoreDb::in_memory(), client));
    (create_router(state.clone()), state)
}

/// Serve `app` on an ephemeral local port and return its base URL.
#[allow(dead_code)]
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });
    format!("http://{}", addr)
}

// ─── Seed helpers ────────────────────────────────────────────────────────────

#[allow(dead_code)]
pub async fn seed_tokens(state: &AppState, athlete_id: u64, access_token: &str, expires_at: i64) {
    state
        .db
        .set_tokens(
            athlete_id,
            &UserTokens {
                access_token: access_token.to_string(),
                refresh_token: "refresh-1".to_string(),
                expires_at,
                scopes: vec!["read".to_string(), "activity:read_all".to_string()],
            },
        )
        .await
        .unwrap();
}

#[allow(dead_code)]
pub fn far_future() -> i64 {
    chrono::Utc::now().timestamp() + 6 * 3600
}

#[allow(dead_code)]
pub fn test_activity(id: u64, athlete_id: u64, start_date: Option<&str>) -> Activity {
    Activity {
        strava_activity_id: id,
        athlete_id,
        name: Some(format!("Run {}", id)),
        sport_type: Some("Run".to_string()),
        start_date: start_date.map(String::from),
        distance_m: Some(5000.0),
        moving_time_s: Some(1500),
        elevation_gain_m: Some(20.0),
        synced_at: "2026-01-01T00:00:00Z".to_string(),
    }
}

#[allow(dead_code)]
pub async fn seed_activity(state: &AppState, id: u64, athlete_id: u64) -> Activity {
    let activity = test_activity(id, athlete_id, Some("2026-01-01T07:00:00Z"));
    state.db.upsert_activity(&activity).await.unwrap();
    activity
}

/// Straight line heading north at ~3 m/s, one point per second.
#[allow(dead_code)]
pub fn steady_points(n: u32) -> Vec<TrackPoint> {
    (0..n)
        .map(|i| TrackPoint {
            seq: i,
            lat: 37.0 + f64::from(i) * 3.0 / 111_195.0,
            lon: -122.0,
            time_s: i64::from(i),
            ele_m: Some(10),
        })
        .collect()
}

#[allow(dead_code)]
pub async fn seed_stream(state: &AppState, activity_id: u64, n: u32) {
    state
        .db
        .set_stream(&ActivityStream {
            activity_id,
            points: steady_points(n),
            ingested_at: "2026-01-01T00:00:00Z".to_string(),
        })
        .await
        .unwrap();
}

// ─── Fake Strava ─────────────────────────────────────────────────────────────

/// Behaviour and call counters of the fake Strava API.
#[derive(Default)]
pub struct FakeStrava {
    pub activities: Mutex<Value>,
    pub streams: Mutex<HashMap<u64, Value>>,
    /// Respond 401 to this many API calls before succeeding
    pub unauthorized_remaining: AtomicUsize,
    /// Respond 503 to this many API calls before succeeding
    pub unavailable_remaining: AtomicUsize,
    /// Fail the OAuth code exchange
    pub reject_code: std::sync::atomic::AtomicBool,
    pub api_calls: AtomicUsize,
    pub token_calls: AtomicUsize,
    pub last_bearer: Mutex<Option<String>>,
}

impl FakeStrava {
    #[allow(dead_code)]
    pub fn set_activities(&self, activities: Value) {
        *self.activities.lock().unwrap() = activities;
    }

    #[allow(dead_code)]
    pub fn set_streams(&self, activity_id: u64, streams: Value) {
        self.streams.lock().unwrap().insert(activity_id, streams);
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn api_gate(fake: &FakeStrava, headers: &HeaderMap) -> Option<Response> {
    fake.api_calls.fetch_add(1, Ordering::SeqCst);
    *fake.last_bearer.lock().unwrap() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start_matches("Bearer ").to_string());

    if take_one(&fake.unavailable_remaining) {
        return Some(StatusCode::SERVICE_UNAVAILABLE.into_response());
    }
    if take_one(&fake.unauthorized_remaining) {
        return Some(
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"message": "Authorization Error"})),
            )
                .into_response(),
        );
    }
    None
}

async fn fake_list_activities(
    State(fake): State<Arc<FakeStrava>>,
    headers: HeaderMap,
) -> Response {
    if let Some(resp) = api_gate(&fake, &headers) {
        return resp;
    }
    let activities = fake.activities.lock().unwrap().clone();
    Json(if activities.is_null() { json!([]) } else { activities }).into_response()
}

async fn fake_streams(
    State(fake): State<Arc<FakeStrava>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Response {
    if let Some(resp) = api_gate(&fake, &headers) {
        return resp;
    }
    match fake.streams.lock().unwrap().get(&id) {
        Some(streams) => Json(streams.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"message": "Record Not Found"}))).into_response(),
    }
}

async fn fake_athlete(State(fake): State<Arc<FakeStrava>>, headers: HeaderMap) -> Response {
    if let Some(resp) = api_gate(&fake, &headers) {
        return resp;
    }
    Json(json!({"id": ATHLETE_ID, "firstname": "Ada", "lastname": "Runner", "profile": null}))
        .into_response()
}

async fn fake_token(
    State(fake): State<Arc<FakeStrava>>,
    axum::extract::Form(form): axum::extract::Form<HashMap<String, String>>,
) -> Response {
    let n = fake.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let expires_at = chrono::Utc::now().timestamp() + 6 * 3600;

    match form.get("grant_type").map(String::as_str) {
        Some("authorization_code") => {
            if fake.reject_code.load(Ordering::SeqCst) {
                return (StatusCode::BAD_REQUEST, Json(json!({"message": "Bad Request"})))
                    .into_response();
            }
            Json(json!({
                "access_token": format!("access-{}", n),
                "refresh_token": format!("refresh-{}", n),
                "expires_at": expires_at,
                "athlete": {"id": ATHLETE_ID, "firstname": "Ada", "lastname": "Runner"}
            }))
            .into_response()
        }
        Some("refresh_token") => Json(json!({
            "access_token": format!("refreshed-{}", n),
            "refresh_token": format!("refresh-{}", n),
            "expires_at": expires_at
        }))
        .into_response(),
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}

/// Start a fake Strava API and return its state and base URL.
#[allow(dead_code)]
pub async fn spawn_fake_strava() -> (Arc<FakeStrava>, String) {
    let fake = Arc::new(FakeStrava::default());
    let app = Router::new()
        .route("/api/v3/athlete", get(fake_athlete))
        .route("/api/v3/athlete/activities", get(fake_list_activities))
        .route("/api/v3/activities/{id}/streams", get(fake_streams))
        .route("/oauth/token", post(fake_token))
        .with_state(fake.clone());

    let base = serve(app).await;
    (fake, base)
}

/// Streams body in `key_by_type` form: a northbound line, one point per second.
#[allow(dead_code)]
pub fn streams_json(n: usize) -> Value {
    let latlng: Vec<[f64; 2]> = (0..n)
        .map(|i| [37.0 + i as f64 * 3.0 / 111_195.0, -122.0])
        .collect();
    let time: Vec<i64> = (0..n as i64).collect();
    let altitude: Vec<f64> = (0..n).map(|i| 10.0 + i as f64 * 0.4).collect();
    json!({
        "latlng": {"data": latlng, "series_type": "distance"},
        "time": {"data": time, "series_type": "distance"},
        "altitude": {"data": altitude, "series_type": "distance"}
    })
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
