// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Terminal dashboard for the API: list and sync activities, then show the
//! selected activity's track and quality report.

pub mod client;
pub mod format;
pub mod render;
pub mod state;

pub use client::{ApiClient, ApiError};
pub use state::Dashboard;
