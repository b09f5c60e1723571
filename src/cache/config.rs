/**
 * Configuration constants for the refresh scheduler and fetcher
 */
use std::time::Duration;

/// Seconds between the starts of two refresh cycles
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;

/// Per-request timeout for origin fetches in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Attempts per resource and cycle (the first try plus one retry)
pub const MAX_FETCH_ATTEMPTS: u32 = 2;

/// Pause before the retry in milliseconds
pub const RETRY_DELAY_MILLIS: u64 = 250;

/// Channel buffer size for outgoing alert messages
pub const NOTIFICATION_CHANNEL_CAPACITY: usize = 100;

/// How long startup waits for the first refresh before serving anyway
pub const DEFAULT_STARTUP_WAIT_SECS: u64 = 30;

/// Suffix of the sibling URL that carries a resource's recency marker
pub const TIMESTAMP_SUFFIX: &str = ".timestamp";

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Base URL every resource file is resolved against
    pub origin_url: String,
    pub refresh_interval: Duration,
    pub request_timeout: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub startup_wait: Duration,
}

impl CacheConfig {
    #[must_use]
    pub fn new(origin_url: impl Into<String>) -> Self {
        Self {
            origin_url: origin_url.into(),
            ..Self::default()
        }
    }

    /// `<origin>/<file>` with exactly one slash in between.
    #[must_use]
    pub fn resource_url(&self, file: &str) -> String {
        format!("{}/{}", self.origin_url.trim_end_matches('/'), file)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            origin_url: String::new(),
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_attempts: MAX_FETCH_ATTEMPTS,
            retry_delay: Duration::from_millis(RETRY_DELAY_MILLIS),
            startup_wait: Duration::from_secs(DEFAULT_STARTUP_WAIT_SECS),
        }
    }
}

/// Validate configuration constants at compile time
const _: () = {
    assert!(DEFAULT_REFRESH_INTERVAL_SECS > 0, "DEFAULT_REFRESH_INTERVAL_SECS must be greater than 0");
    assert!(DEFAULT_REQUEST_TIMEOUT_SECS > 0, "DEFAULT_REQUEST_TIMEOUT_SECS must be greater than 0");
    assert!(MAX_FETCH_ATTEMPTS > 0, "MAX_FETCH_ATTEMPTS must be greater than 0");
    assert!(NOTIFICATION_CHANNEL_CAPACITY > 0, "NOTIFICATION_CHANNEL_CAPACITY must be greater than 0");
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_url_joins_once() {
        let config = CacheConfig::new("https://origin.example/csv/");
        assert_eq!(config.resource_url("stats.csv"), "https://origin.example/csv/stats.csv");

        let config = CacheConfig::new("https://origin.example/csv");
        assert_eq!(config.resource_url("stats.csv"), "https://origin.example/csv/stats.csv");
    }
}
