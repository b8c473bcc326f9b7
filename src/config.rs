//! Host configuration parsed from environment variables.
//!
//! `.env` files are loaded by `main` before this runs; command-line flags
//! override individual fields afterwards.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_PERSIST_RETRIES: u32 = 3;
pub const DEFAULT_PERSIST_RETRY_BASE_MS: u64 = 50;

/// Retry schedule for single-hex writes: attempt `n` waits `n * base_ms` before the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub attempts: u32,
    pub base_ms: u64,
}

impl RetryPolicy {
    /// Delay after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(u64::from(attempt) * self.base_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Server origin without a trailing slash.
    pub base_url: String,
    /// Bearer credential attached to every call.
    pub auth_token: Option<String>,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            auth_token: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            retry: RetryPolicy { attempts: DEFAULT_PERSIST_RETRIES, base_ms: DEFAULT_PERSIST_RETRY_BASE_MS },
        }
    }
}

impl HostConfig {
    /// Build typed host config from environment variables.
    ///
    /// Optional:
    /// - `HEXKEEP_BASE_URL`: default `http://localhost:3000`
    /// - `HEXKEEP_AUTH_TOKEN`: no default; unauthenticated calls are rejected server-side
    /// - `HEXKEEP_REQUEST_TIMEOUT_SECS`: default 15
    /// - `HEXKEEP_CONNECT_TIMEOUT_SECS`: default 5
    /// - `HEXKEEP_PERSIST_RETRIES`: default 3
    /// - `HEXKEEP_PERSIST_RETRY_BASE_MS`: default 50
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = std::env::var("HEXKEEP_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            auth_token: std::env::var("HEXKEEP_AUTH_TOKEN").ok().filter(|t| !t.trim().is_empty()),
            request_timeout_secs: env_parse("HEXKEEP_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_timeout_secs: env_parse("HEXKEEP_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
            retry: RetryPolicy {
                attempts: env_parse("HEXKEEP_PERSIST_RETRIES", DEFAULT_PERSIST_RETRIES),
                base_ms: env_parse("HEXKEEP_PERSIST_RETRY_BASE_MS", DEFAULT_PERSIST_RETRY_BASE_MS),
            },
        }
    }

    /// Replace the base URL, normalising the trailing slash.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_owned();
        self
    }

    #[must_use]
    pub fn with_auth_token(mut self, token: String) -> Self {
        self.auth_token = Some(token);
        self
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
