// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod activity;
pub mod features;
pub mod quality;
pub mod user;

pub use activity::{Activity, ActivityStream, TrackPoint};
pub use features::{ActivityFeatures, FeatureMetadata, MlFeatureSnapshot};
pub use quality::{QualityLabel, QualityMetric};
pub use user::{User, UserTokens};
