//! REST API client module for the session-protected backend.
//!
//! This module provides the `ApiClient`, which is both the authenticated
//! request executor used for every business call and the client for the
//! `/api/auth/*` endpoints (CSRF handshake, login, refresh, logout, me).
//!
//! Authentication uses a short-lived bearer credential plus a long-lived
//! session cookie that only the refresh endpoint reads.

pub mod client;
pub mod error;
pub mod protocol;
pub mod request;

pub use client::ApiClient;
pub use error::{ApiError, Result};
pub use protocol::{is_session_expired, CSRF_COOKIE_NAME, CSRF_HEADER_NAME};
pub use request::RequestOptions;
