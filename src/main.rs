// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! LiveMap Coach API Server
//!
//! Syncs Strava activities, ingests GPS streams and serves tracks, quality
//! reports and ML feature snapshots.

use livemap_coach::{
    config::{Config, StorageBackend},
    db::FirestoreDb,
    AppState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        storage = ?config.storage_backend,
        "Starting LiveMap Coach API"
    );

    let db = match config.storage_backend {
        StorageBackend::Firestore => FirestoreDb::new(&config.gcp_project_id).await?,
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            FirestoreDb::in_memory()
        }
    };

    let port = config.port;
    let state = Arc::new(AppState::new(config, db));

    // Build router
    let app = livemap_coach::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(true)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("livemap_coach=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
