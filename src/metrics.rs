//! Prometheus series for origin fetches and cache reads.
//!
//! The registry is owned by the process and handed around explicitly, so
//! tests can build as many independent instances as they like.
use crate::error::Result;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

const NAMESPACE: &str = "covid_cache";

/// Which side of the cache a measurement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint<'a> {
    Fetch(&'a str),
    Serve(&'a str),
}

impl Endpoint<'_> {
    fn label(self) -> String {
        match self {
            Self::Fetch(resource) => format!("fetch:{resource}"),
            Self::Serve(resource) => format!("serve:{resource}"),
        }
    }
}

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    requests: IntCounterVec,
    exceptions: IntCounterVec,
    cache_misses: IntCounterVec,
    duration: HistogramVec,
    down: IntGaugeVec,
}

impl Metrics {
    /// # Errors
    ///
    /// Returns an error if a series cannot be registered (duplicate name).
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("requests_total", "number of requests").namespace(NAMESPACE),
            &["endpoint", "exception"],
        )?;
        let exceptions = IntCounterVec::new(
            Opts::new("request_exceptions_total", "number of failed requests").namespace(NAMESPACE),
            &["endpoint"],
        )?;
        let cache_misses = IntCounterVec::new(
            Opts::new("cache_miss_total", "reads answered with a full payload").namespace(NAMESPACE),
            &["endpoint"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new("request_duration_seconds", "request duration in seconds")
                .namespace(NAMESPACE),
            &["endpoint", "exception"],
        )?;
        let down = IntGaugeVec::new(
            Opts::new("resource_down", "1 while the resource fails to refresh").namespace(NAMESPACE),
            &["endpoint"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(exceptions.clone()))?;
        registry.register(Box::new(cache_misses.clone()))?;
        registry.register(Box::new(duration.clone()))?;
        registry.register(Box::new(down.clone()))?;

        Ok(Self {
            registry,
            requests,
            exceptions,
            cache_misses,
            duration,
            down,
        })
    }

    pub fn observe_request(&self, endpoint: Endpoint<'_>, elapsed: Duration, exception: bool) {
        let label = endpoint.label();
        let flag = if exception { "true" } else { "false" };
        self.requests.with_label_values(&[label.as_str(), flag]).inc();
        self.duration
            .with_label_values(&[label.as_str(), flag])
            .observe(elapsed.as_secs_f64());
        if exception {
            self.exceptions.with_label_values(&[label.as_str()]).inc();
        }
    }

    pub fn cache_miss(&self, resource: &str) {
        self.cache_misses
            .with_label_values(&[Endpoint::Serve(resource).label().as_str()])
            .inc();
    }

    pub fn mark_down(&self, resource: &str) {
        self.down
            .with_label_values(&[Endpoint::Fetch(resource).label().as_str()])
            .inc();
    }

    pub fn mark_up(&self, resource: &str) {
        self.down
            .with_label_values(&[Endpoint::Fetch(resource).label().as_str()])
            .dec();
    }

    #[must_use]
    pub fn down_gauge(&self, resource: &str) -> i64 {
        self.down
            .with_label_values(&[Endpoint::Fetch(resource).label().as_str()])
            .get()
    }

    #[must_use]
    pub fn request_count(&self, endpoint: Endpoint<'_>, exception: bool) -> u64 {
        let flag = if exception { "true" } else { "false" };
        self.requests
            .with_label_values(&[endpoint.label().as_str(), flag])
            .get()
    }

    #[must_use]
    pub fn cache_miss_count(&self, resource: &str) -> u64 {
        self.cache_misses
            .with_label_values(&[Endpoint::Serve(resource).label().as_str()])
            .get()
    }

    /// Text exposition of every series.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn render(&self) -> Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| crate::error::Error::Custom(e.to_string()))
    }
}
