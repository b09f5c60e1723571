use crate::cache::CacheConfig;
use crate::cache::config::{
    DEFAULT_REFRESH_INTERVAL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_STARTUP_WAIT_SECS,
};
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_ORIGIN_URL: &str = "https://raw.githubusercontent.com/sledilnik/data/master/csv";

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Settings {
    /// Base URL the CSV files are fetched from
    #[arg(long, env = "ORIGIN_URL", default_value = DEFAULT_ORIGIN_URL)]
    pub origin_url: String,

    /// Address the HTTP server listens on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:5000")]
    pub bind: SocketAddr,

    /// Seconds between the starts of two refresh cycles
    #[arg(
        long,
        env = "REFRESH_INTERVAL_SECS",
        default_value_t = DEFAULT_REFRESH_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub refresh_interval_secs: u64,

    /// Timeout for a single origin request
    #[arg(
        long,
        env = "REQUEST_TIMEOUT_SECS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub request_timeout_secs: u64,

    /// How long to wait for the first refresh before accepting requests
    #[arg(long, env = "STARTUP_WAIT_SECS", default_value_t = DEFAULT_STARTUP_WAIT_SECS)]
    pub startup_wait_secs: u64,

    /// Slack-compatible webhook for refresh alerts; alerts are only logged when unset
    #[arg(long, env = "ALERT_WEBHOOK_URL")]
    pub webhook_url: Option<String>,
}

impl Settings {
    #[must_use]
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            refresh_interval: Duration::from_secs(self.refresh_interval_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            startup_wait: Duration::from_secs(self.startup_wait_secs),
            ..CacheConfig::new(self.origin_url.clone())
        }
    }
}
