// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava OAuth authentication routes.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, SESSION_COOKIE, SESSION_TTL_SECS};
use crate::AppState;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/strava/login", get(auth_start))
        .route("/auth/strava/callback", get(auth_callback))
        .route("/auth/logout", post(logout))
}

/// Query parameters for starting OAuth flow.
#[derive(Deserialize)]
pub struct AuthStartParams {
    /// Frontend URL to redirect back to after OAuth completes.
    /// If not provided, uses FRONTEND_URL.
    #[serde(default)]
    redirect_uri: Option<String>,
}

/// Sign `frontend_url` and the current time into an opaque OAuth state.
fn sign_state(frontend_url: &str, timestamp_ms: i64, secret: &[u8]) -> Result<String> {
    // "frontend_url|timestamp_hex"
    let payload = format!("{}|{:x}", frontend_url, timestamp_ms);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
}

/// Verify HMAC signature and decode the frontend URL from the OAuth state parameter.
fn verify_and_decode_state(state: &str, secret: &[u8]) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // The URL itself may contain '|', so split from the right.
    let mut parts = state_str.rsplitn(3, '|');
    let signature_hex = parts.next()?;
    let timestamp_hex = parts.next()?;
    let frontend_url = parts.next()?;
    i64::from_str_radix(timestamp_hex, 16).ok()?;

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(format!("{}|{}", frontend_url, timestamp_hex).as_bytes());
    let expected = mac.finalize().into_bytes();
    let provided = hex::decode(signature_hex).ok()?;

    if !bool::from(expected.as_slice().ct_eq(&provided)) {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    Some(frontend_url.to_string())
}

/// Callback URL registered with Strava: explicit config, else derived from Host.
fn callback_url(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(uri) = &state.config.strava_redirect_uri {
        return uri.clone();
    }

    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost:8080");
    let scheme = if host.contains("localhost") || host.contains("127.0.0.1") {
        "http"
    } else {
        "https"
    };
    format!("{}://{}/auth/strava/callback", scheme, host)
}

/// Start OAuth flow - redirect to Strava authorization.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthStartParams>,
    headers: HeaderMap,
) -> Result<Redirect> {
    let frontend_url = params
        .redirect_uri
        .unwrap_or_else(|| state.config.frontend_url.clone());

    let oauth_state = sign_state(
        &frontend_url,
        chrono::Utc::now().timestamp_millis(),
        &state.config.oauth_state_key,
    )?;

    let auth_url = format!(
        "{}/authorize?client_id={}&redirect_uri={}&response_type=code&approval_prompt=auto&scope={}&state={}",
        state.config.strava_oauth_base.trim_end_matches('/'),
        urlencoding::encode(&state.config.strava_client_id),
        urlencoding::encode(&callback_url(&state, &headers)),
        urlencoding::encode(&state.config.strava_scopes),
        oauth_state
    );

    tracing::info!(
        client_id = %state.config.strava_client_id,
        frontend_url = %frontend_url,
        "Starting OAuth flow, redirecting to Strava"
    );

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn with_query(base: &str, key: &str, value: &str) -> String {
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", base, sep, key, urlencoding::encode(value))
}

fn session_cookie(value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

/// OAuth callback - exchange code for tokens, create session.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Redirect)> {
    let frontend_url = params
        .state
        .as_deref()
        .and_then(|s| verify_and_decode_state(s, &state.config.oauth_state_key))
        .unwrap_or_else(|| {
            tracing::warn!(
                "Missing or invalid state parameter, falling back to default frontend URL"
            );
            state.config.frontend_url.clone()
        });

    // Check for OAuth errors (e.g. the user declined access)
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Strava");
        return Ok((jar, Redirect::to(&with_query(&frontend_url, "error", &error))));
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    tracing::info!("Exchanging authorization code for tokens");
    let oauth_result = state.strava_service.handle_oauth_callback(&code).await?;

    tracing::info!(
        athlete_id = oauth_result.athlete_id,
        firstname = ?oauth_result.firstname,
        "OAuth successful, user and tokens stored"
    );

    // Create JWT session token
    let jwt = create_jwt(oauth_result.athlete_id, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    let target = state
        .config
        .auth_success_redirect_url
        .clone()
        .unwrap_or(frontend_url);
    let secure = target.starts_with("https://");

    let mut cookie = session_cookie(jwt.clone(), secure);
    cookie.set_max_age(time::Duration::seconds(SESSION_TTL_SECS));

    Ok((jar.add(cookie), Redirect::to(&with_query(&target, "token", &jwt))))
}

/// Logout - clear the session cookie.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let secure = state.config.frontend_url.starts_with("https://");
    let mut cookie = session_cookie(String::new(), secure);
    cookie.make_removal();

    (jar.add(cookie), StatusCode::NO_CONTENT)
}
