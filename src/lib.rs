// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! LiveMap Coach: GPS recording quality for Strava activities
//!
//! This crate provides the backend API that syncs Strava activities, ingests
//! their GPS streams and derives quality metrics and ML features, plus a
//! terminal dashboard client for that API.

pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{StravaClient, StravaService};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub strava_service: StravaService,
}

impl AppState {
    /// Build the state with a fresh token cache and a Strava client
    /// pointed at the configured endpoints.
    pub fn new(config: Config, db: FirestoreDb) -> Self {
        let client = StravaClient::with_base_urls(
            config.strava_client_id.clone(),
            config.strava_client_secret.clone(),
            &config.strava_api_base,
            &config.strava_oauth_base,
        );
        Self::with_client(config, db, client)
    }

    /// Build the state around an already configured Strava client.
    pub fn with_client(config: Config, db: FirestoreDb, client: StravaClient) -> Self {
        let token_cache = Arc::new(dashmap::DashMap::new());
        let refresh_locks = Arc::new(dashmap::DashMap::new());
        let strava_service = StravaService::new(
            client,
            db.clone(),
            token_cache,
            refresh_locks,
            &config.strava_scopes,
        );

        Self {
            config,
            db,
            strava_service,
        }
    }
}
