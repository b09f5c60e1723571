#![allow(dead_code)]

use covid_cache::cache::{CacheConfig, Fetcher, HealthTracker, Notifier};
use covid_cache::metrics::Metrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub struct Harness {
    pub config: CacheConfig,
    pub metrics: Metrics,
    pub health: Arc<HealthTracker>,
    pub fetcher: Fetcher,
    pub alerts: mpsc::Receiver<String>,
}

/// Fetcher, health tracker and alert queue pointed at `origin`, with short
/// timeouts so failure paths stay fast.
pub fn harness(origin: &str) -> Harness {
    let config = CacheConfig {
        request_timeout: Duration::from_millis(500),
        retry_delay: Duration::from_millis(10),
        ..CacheConfig::new(origin)
    };
    let metrics = Metrics::new().unwrap();
    let (notifier, alerts) = Notifier::channel(64);
    let health = Arc::new(HealthTracker::new(notifier, metrics.clone()));
    let fetcher = Fetcher::new(&config, metrics.clone()).unwrap();

    Harness {
        config,
        metrics,
        health,
        fetcher,
        alerts,
    }
}

pub fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<String> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

/// `days` consecutive March 2020 rows starting on the 1st.
pub fn march_stats(days: u32) -> String {
    let mut body = "date,cases\n".to_string();
    for d in 1..=days {
        body.push_str(&format!("2020-03-{d:02},{d}\n"));
    }
    body
}
