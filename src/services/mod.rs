// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod activity;
pub mod ml_features;
pub mod quality;
pub mod quality_metrics;
pub mod strava;

pub use activity::{ActivityProcessor, SyncFilter};
pub use quality::{compute_quality, QualityReport, QualityThresholds};
pub use strava::{OAuthResult, StravaClient, StravaService};
