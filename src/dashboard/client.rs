// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP client for the LiveMap Coach API.

use crate::routes::activities::ActivityResponse;
use crate::routes::streams::{IngestResponse, QualityResponse};
use crate::routes::sync::SyncResponse;
use crate::services::strava::build_http_client;
use geojson::Feature;
use reqwest::{header, Method, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// A failed API call. `message` is the server's `detail` when it sent one.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    /// HTTP status, or 0 when the request never got a response
    pub status: u16,
    pub message: String,
}

impl ApiError {
    fn transport(err: reqwest::Error) -> Self {
        Self {
            status: 0,
            message: err.to_string(),
        }
    }
}

/// Pull a human-readable message out of an error body.
pub fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["detail", "details"]
                .iter()
                .find_map(|key| v.get(*key).and_then(|d| d.as_str()).map(str::to_string))
        })
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            format!(
                "{} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or_default()
            )
            .trim_end()
            .to_string()
        })
}

/// API client with an optional session token.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        let http = build_http_client(Duration::from_secs(60));

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL that starts the Strava login flow in a browser.
    pub fn login_url(&self) -> String {
        format!("{}/auth/strava/login", self.base_url)
    }

    /// Send a request and decode a JSON response.
    ///
    /// Non-GET/HEAD requests carry `Content-Type: application/json`.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method.clone(), &url);
        if method != Method::GET && method != Method::HEAD {
            request = request.header(header::CONTENT_TYPE, "application/json");
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(ApiError::transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = ApiError {
                status: status.as_u16(),
                message: error_message(status, &body),
            };
            tracing::debug!(%method, path, status = err.status, message = %err.message, "API call failed");
            return Err(err);
        }

        response.json().await.map_err(ApiError::transport)
    }

    pub async fn list_activities(&self, limit: u32) -> Result<Vec<ActivityResponse>, ApiError> {
        self.fetch_json(Method::GET, &format!("/activities/?limit={}", limit))
            .await
    }

    pub async fn sync_activities(
        &self,
        per_page: u32,
        sport_type: Option<&str>,
    ) -> Result<SyncResponse, ApiError> {
        let mut path = format!("/sync/activities?per_page={}", per_page);
        if let Some(sport) = sport_type {
            path.push_str(&format!("&sport_type={}", urlencoding::encode(sport)));
        }
        self.fetch_json(Method::POST, &path).await
    }

    pub async fn ingest_streams(&self, activity_id: u64) -> Result<IngestResponse, ApiError> {
        self.fetch_json(
            Method::POST,
            &format!("/activities/{}/ingest_streams", activity_id),
        )
        .await
    }

    pub async fn get_track(&self, activity_id: u64) -> Result<Feature, ApiError> {
        self.fetch_json(Method::GET, &format!("/activities/{}/track", activity_id))
            .await
    }

    pub async fn get_quality(&self, activity_id: u64) -> Result<QualityResponse, ApiError> {
        self.fetch_json(Method::GET, &format!("/activities/{}/quality", activity_id))
            .await
    }
}
