// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (authentication, request context, security headers).

pub mod auth;
pub mod request_id;
pub mod security;

pub use auth::{require_auth, AuthUser};
pub use request_id::request_context;
