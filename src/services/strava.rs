// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client for syncing activities and fetching GPS streams.
//!
//! Handles:
//! - Activity listing and stream fetching
//! - OAuth code exchange and token refresh
//! - Retries with exponential backoff for throttling and transient failures

use crate::error::AppError;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration as StdDuration;

/// Stream types requested on ingest.
pub const STREAM_KEYS: &str = "latlng,time,altitude";

/// Retry behaviour for Strava requests.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: StdDuration,
    pub max_delay: StdDuration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: StdDuration::from_millis(500),
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt + 1`. `Retry-After` wins when present.
    pub fn delay(&self, attempt: u32, retry_after: Option<StdDuration>) -> StdDuration {
        let delay = retry_after.unwrap_or_else(|| self.backoff_base * 2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }
}

fn is_retryable(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

fn retry_after(response: &Response) -> Option<StdDuration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(StdDuration::from_secs_f64)
}

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    oauth_url: String,
    client_id: String,
    client_secret: String,
    retry: RetryPolicy,
}

/// HTTP client with a request timeout.
///
/// If the TLS backend cannot be initialised the default client is used and
/// the timeout is lost, so that case is logged.
pub(crate) fn build_http_client(timeout: StdDuration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(
                error = %e,
                timeout_secs = timeout.as_secs_f64(),
                "Failed to build HTTP client, falling back to defaults without timeout"
            );
            reqwest::Client::new()
        })
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self::with_base_urls(
            client_id,
            client_secret,
            crate::config::STRAVA_API_BASE,
            crate::config::STRAVA_OAUTH_BASE,
        )
    }

    /// Create a client talking to non-default endpoints (tests, proxies).
    pub fn with_base_urls(
        client_id: String,
        client_secret: String,
        base_url: &str,
        oauth_url: &str,
    ) -> Self {
        let http = build_http_client(StdDuration::from_secs(20));

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            oauth_url: oauth_url.trim_end_matches('/').to_string(),
            client_id,
            client_secret,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn oauth_url(&self) -> &str {
        &self.oauth_url
    }

    /// List the athlete's most recent activities.
    pub async fn list_activities(
        &self,
        access_token: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StravaActivitySummary>, AppError> {
        let url = format!("{}/athlete/activities", self.base_url);
        let query = [("page", page.to_string()), ("per_page", per_page.to_string())];

        let response = self
            .send_with_retry(|| self.http.get(&url).bearer_auth(access_token).query(&query))
            .await?;
        check_response_json(response).await
    }

    /// Fetch the GPS streams of an activity, keyed by stream type.
    pub async fn get_activity_streams(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<StravaStreams, AppError> {
        let url = format!("{}/activities/{}/streams", self.base_url, activity_id);
        let query = [("keys", STREAM_KEYS), ("key_by_type", "true")];

        let response = self
            .send_with_retry(|| self.http.get(&url).bearer_auth(access_token).query(&query))
            .await?;
        check_response_json(response).await
    }

    /// Get authenticated athlete profile.
    pub async fn get_athlete(&self, access_token: &str) -> Result<StravaAthlete, AppError> {
        let url = format!("{}/athlete", self.base_url);
        let response = self
            .send_with_retry(|| self.http.get(&url).bearer_auth(access_token))
            .await?;
        check_response_json(response).await
    }

    /// Exchange an OAuth authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<StravaTokenResponse, AppError> {
        let url = format!("{}/token", self.oauth_url);
        let response = self
            .http
            .post(&url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token exchange failed: {}", e)))?;

        check_response_json(response).await
    }

    /// Refresh an expired access token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<StravaTokenResponse, AppError> {
        let url = format!("{}/token", self.oauth_url);
        let response = self
            .http
            .post(&url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token refresh request failed: {}", e)))?;

        check_response_json(response).await
    }

    /// Send a request, retrying throttled, 5xx and transport failures.
    async fn send_with_retry<F>(&self, build: F) -> Result<Response, AppError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if !is_retryable(status) || attempt >= self.retry.max_retries {
                        return Ok(response);
                    }
                    let delay = self.retry.delay(attempt, retry_after(&response));
                    tracing::warn!(
                        status = %status,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying Strava request"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay(attempt, None);
                    tracing::warn!(
                        error = %e,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying Strava request after transport error"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(AppError::StravaApi(e.to_string())),
            }
            attempt += 1;
        }
    }
}

/// Check response status and parse the JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: Response,
) -> Result<T, AppError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!("Strava rate limit hit (429)");
            return Err(AppError::StravaApi(AppError::STRAVA_RATE_LIMIT.to_string()));
        }

        if status == StatusCode::UNAUTHORIZED {
            return Err(AppError::StravaApi(
                AppError::STRAVA_TOKEN_ERROR.to_string(),
            ));
        }

        return Err(AppError::StravaApi(format!("HTTP {}: {}", status, body)));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::StravaApi(format!("JSON parse error: {}", e)))
}

fn is_unauthorized(err: &AppError) -> bool {
    matches!(err, AppError::StravaApi(msg) if msg == AppError::STRAVA_TOKEN_ERROR)
}

/// Token response from Strava OAuth (exchange and refresh).
#[derive(Debug, Clone, Deserialize)]
pub struct StravaTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    /// Only present on the initial code exchange
    #[serde(default)]
    pub athlete: Option<StravaAthlete>,
}

/// Athlete info from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaAthlete {
    pub id: u64,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub profile: Option<String>,
}

/// Summary activity for list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivitySummary {
    pub id: u64,
    pub name: Option<String>,
    pub sport_type: Option<String>,
    /// Legacy activity type, used when `sport_type` is missing
    #[serde(rename = "type")]
    pub activity_type: Option<String>,
    pub start_date: Option<String>,
    pub distance: Option<f64>,
    pub moving_time: Option<i64>,
    pub total_elevation_gain: Option<f64>,
}

/// Activity streams keyed by type (`key_by_type=true`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StravaStreams {
    pub latlng: Option<StreamData<[f64; 2]>>,
    pub time: Option<StreamData<i64>>,
    pub altitude: Option<StreamData<f64>>,
}

/// One stream's samples.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamData<T> {
    pub data: Vec<T>,
}

// ─────────────────────────────────────────────────────────────────────────────
// StravaService - High-level service with token management
// ─────────────────────────────────────────────────────────────────────────────

use crate::db::FirestoreDb;
use crate::models::{User, UserTokens};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Refresh this many seconds before the token actually expires.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Cached access token with expiry information.
#[derive(Clone)]
pub struct CachedToken {
    access_token: String,
    expires_at: i64,
}

/// Shared token cache type for use in AppState.
pub type TokenCache = Arc<DashMap<u64, CachedToken>>;

/// Shared refresh locks type for use in AppState.
pub type RefreshLocks = Arc<DashMap<u64, Arc<Mutex<()>>>>;

/// High-level Strava service that manages token lifecycle and API calls.
///
/// This service encapsulates:
/// - Token retrieval from the database
/// - Refresh shortly before expiry, and once more when Strava answers 401
/// - Storage of refreshed tokens
/// - In-memory token caching with per-user refresh locks
#[derive(Clone)]
pub struct StravaService {
    client: StravaClient,
    db: FirestoreDb,
    token_cache: TokenCache,
    refresh_locks: RefreshLocks,
    scopes: Vec<String>,
}

impl StravaService {
    /// Create a new Strava service with a shared token cache.
    pub fn new(
        client: StravaClient,
        db: FirestoreDb,
        token_cache: TokenCache,
        refresh_locks: RefreshLocks,
        scopes: &str,
    ) -> Self {
        Self {
            client,
            db,
            token_cache,
            refresh_locks,
            scopes: scopes
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn client(&self) -> &StravaClient {
        &self.client
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Get a valid (non-expired) access token for the given athlete.
    ///
    /// Missing tokens map to `NotFound` so callers can ask the user to log in.
    pub async fn get_valid_access_token(&self, athlete_id: u64) -> Result<String, AppError> {
        let now = Utc::now().timestamp();

        if let Some(cached) = self.token_cache.get(&athlete_id) {
            if now + TOKEN_REFRESH_MARGIN_SECS < cached.expires_at {
                return Ok(cached.access_token.clone());
            }
        }

        // Only one task per user performs the refresh; others wait here.
        let lock = self
            .refresh_locks
            .entry(athlete_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another task may have refreshed while we were waiting.
        if let Some(cached) = self.token_cache.get(&athlete_id) {
            if now + TOKEN_REFRESH_MARGIN_SECS < cached.expires_at {
                return Ok(cached.access_token.clone());
            }
        }

        let tokens = self.load_tokens(athlete_id).await?;
        if now + TOKEN_REFRESH_MARGIN_SECS < tokens.expires_at {
            self.cache(athlete_id, &tokens.access_token, tokens.expires_at);
            return Ok(tokens.access_token);
        }

        tracing::info!(athlete_id, "Strava token near expiry; refreshing");
        self.refresh_and_store(athlete_id, tokens).await
    }

    /// Refresh regardless of the recorded expiry (after a 401).
    async fn force_refresh(&self, athlete_id: u64) -> Result<String, AppError> {
        let lock = self
            .refresh_locks
            .entry(athlete_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        self.token_cache.remove(&athlete_id);
        let tokens = self.load_tokens(athlete_id).await?;
        tracing::warn!(athlete_id, "Strava returned 401; refreshing token and retrying");
        self.refresh_and_store(athlete_id, tokens).await
    }

    async fn load_tokens(&self, athlete_id: u64) -> Result<UserTokens, AppError> {
        self.db.get_tokens(athlete_id).await?.ok_or_else(|| {
            AppError::NotFound("No Strava token found. Login with Strava first.".to_string())
        })
    }

    async fn refresh_and_store(
        &self,
        athlete_id: u64,
        tokens: UserTokens,
    ) -> Result<String, AppError> {
        let refreshed = self.client.refresh_token(&tokens.refresh_token).await?;

        let updated = UserTokens {
            access_token: refreshed.access_token.clone(),
            refresh_token: refreshed.refresh_token,
            expires_at: refreshed.expires_at,
            scopes: tokens.scopes,
        };
        self.db.set_tokens(athlete_id, &updated).await?;
        self.cache(athlete_id, &updated.access_token, updated.expires_at);

        tracing::info!(athlete_id, "Token refreshed and cached");
        Ok(refreshed.access_token)
    }

    fn cache(&self, athlete_id: u64, access_token: &str, expires_at: i64) {
        self.token_cache.insert(
            athlete_id,
            CachedToken {
                access_token: access_token.to_string(),
                expires_at,
            },
        );
    }

    // ─── OAuth Callback Handling ─────────────────────────────────────────────

    /// Handle OAuth callback: exchange code for tokens, store user and tokens.
    pub async fn handle_oauth_callback(&self, code: &str) -> Result<OAuthResult, AppError> {
        let token_response = self.client.exchange_code(code).await.map_err(|e| {
            tracing::error!(error = %e, "Strava token exchange failed");
            AppError::BadRequest(format!("Token exchange failed: {}", e))
        })?;

        let athlete = token_response
            .athlete
            .clone()
            .ok_or_else(|| AppError::BadRequest("No athlete returned by Strava".to_string()))?;
        let athlete_id = athlete.id;
        let now = crate::time_utils::format_utc_rfc3339(Utc::now());

        let created_at = self
            .db
            .get_user(athlete_id)
            .await?
            .map(|u| u.created_at)
            .unwrap_or_else(|| now.clone());

        let user = User {
            strava_athlete_id: athlete_id,
            firstname: athlete.firstname.clone(),
            lastname: athlete.lastname.clone(),
            profile_picture: athlete.profile.clone(),
            created_at,
            last_active: now,
        };
        self.db.upsert_user(&user).await?;

        let tokens = UserTokens {
            access_token: token_response.access_token.clone(),
            refresh_token: token_response.refresh_token.clone(),
            expires_at: token_response.expires_at,
            scopes: self.scopes.clone(),
        };
        self.db.set_tokens(athlete_id, &tokens).await?;
        self.cache(athlete_id, &tokens.access_token, tokens.expires_at);

        tracing::info!(athlete_id, "OAuth callback handled, user and tokens stored");

        Ok(OAuthResult {
            athlete_id,
            firstname: athlete.firstname,
            lastname: athlete.lastname,
        })
    }

    // ─── API Wrappers ────────────────────────────────────────────────────────

    /// List the athlete's most recent activities.
    pub async fn list_activities(
        &self,
        athlete_id: u64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StravaActivitySummary>, AppError> {
        let access_token = self.get_valid_access_token(athlete_id).await?;
        match self
            .client
            .list_activities(&access_token, page, per_page)
            .await
        {
            Err(e) if is_unauthorized(&e) => {
                let access_token = self.force_refresh(athlete_id).await?;
                self.client
                    .list_activities(&access_token, page, per_page)
                    .await
            }
            other => other,
        }
    }

    /// Fetch GPS streams for an activity.
    pub async fn get_activity_streams(
        &self,
        athlete_id: u64,
        activity_id: u64,
    ) -> Result<StravaStreams, AppError> {
        let access_token = self.get_valid_access_token(athlete_id).await?;
        match self
            .client
            .get_activity_streams(&access_token, activity_id)
            .await
        {
            Err(e) if is_unauthorized(&e) => {
                let access_token = self.force_refresh(athlete_id).await?;
                self.client
                    .get_activity_streams(&access_token, activity_id)
                    .await
            }
            other => other,
        }
    }
}

/// Result of handling OAuth callback.
#[derive(Debug, Clone)]
pub struct OAuthResult {
    pub athlete_id: u64,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
}
