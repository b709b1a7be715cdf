//! Client configuration.
//!
//! The API base origin comes from the environment (`SESSIONGUARD_API_BASE_URL`),
//! the same way a bundled web client takes it from its build environment.
//! Timeouts have sensible defaults and can be overridden the same way.

use std::time::Duration;

use tracing::warn;

/// Base origin used when nothing is configured
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Idle period after which the session is logged out (30 minutes)
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 30 * 60;

pub const ENV_API_BASE_URL: &str = "SESSIONGUARD_API_BASE_URL";
pub const ENV_IDLE_TIMEOUT_SECS: &str = "SESSIONGUARD_IDLE_TIMEOUT_SECS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "SESSIONGUARD_REQUEST_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Origin that relative request paths are resolved against
    pub base_url: String,
    pub request_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Build from process environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_BASE_URL).filter(|u| !u.trim().is_empty()) {
            config.base_url = url.trim().to_string();
        }
        if let Some(secs) = parse_secs(&lookup, ENV_IDLE_TIMEOUT_SECS) {
            config.idle_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_secs(&lookup, ENV_REQUEST_TIMEOUT_SECS) {
            config.request_timeout = Duration::from_secs(secs);
        }
        config
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }
}

fn parse_secs(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(0) => {
            warn!(key, "Ignoring zero timeout");
            None
        }
        Ok(secs) => Some(secs),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring non-numeric timeout");
            None
        }
    }
}
