// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use serde::{Deserialize, Serialize};

/// User profile stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Strava athlete ID (also used as document ID)
    pub strava_athlete_id: u64,
    /// First name
    pub firstname: Option<String>,
    /// Last name
    pub lastname: Option<String>,
    /// Profile picture URL
    pub profile_picture: Option<String>,
    /// When user first connected
    pub created_at: String,
    /// Last login
    pub last_active: String,
}

/// User's Strava OAuth tokens. One document per athlete.
#[derive(Clone, Serialize, Deserialize)]
pub struct UserTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// When the access token expires (unix seconds)
    pub expires_at: i64,
    /// Granted OAuth scopes
    pub scopes: Vec<String>,
}

impl std::fmt::Debug for UserTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserTokens")
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}
