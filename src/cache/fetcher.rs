use super::config::{CacheConfig, TIMESTAMP_SUFFIX};
use super::snapshot::Snapshot;
use crate::metrics::{Endpoint, Metrics};
use reqwest::header::{ETAG, HeaderValue, IF_NONE_MATCH};
use reqwest::{Client, Response, StatusCode};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Default user agent - automatically uses the package version
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Why a refresh produced no snapshot. `Display` is the human-readable
/// reason that ends up in alerts.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{reason}")]
    Status { status: StatusCode, reason: String },

    #[error("{}", with_causes(.0))]
    Transport(#[source] reqwest::Error),

    #[error("{0}")]
    Parse(#[source] crate::error::Error),
}

/// `error` followed by every underlying cause, so alerts say what actually
/// went wrong ("operation timed out", "Connection refused", ...).
fn with_causes(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut cause = std::error::Error::source(error);
    while let Some(inner) = cause {
        let text = inner.to_string();
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        cause = std::error::Error::source(inner);
    }
    message
}

impl FetchError {
    fn from_status(status: StatusCode) -> Self {
        Self::Status {
            status,
            reason: status
                .canonical_reason()
                .map_or_else(|| status.as_str().to_string(), str::to_string),
        }
    }
}

/// Result of one successful refresh attempt.
#[derive(Debug)]
pub enum FetchOutcome<T> {
    Updated(Snapshot<T>),
    /// Origin confirmed the cached token is still current
    NotModified,
}

const fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    !error.is_builder() && !error.is_redirect()
}

/// Pulls one resource from the origin.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    max_attempts: u32,
    retry_delay: Duration,
    metrics: Metrics,
}

impl Fetcher {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &CacheConfig, metrics: Metrics) -> crate::error::Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            max_attempts: config.max_attempts.max(1),
            retry_delay: config.retry_delay,
            metrics,
        })
    }

    /// Fetch `url`, its `.timestamp` sibling, and parse the body.
    ///
    /// `current_token` is sent as `If-None-Match` so an unchanged origin can
    /// answer 304. Every call is counted and timed, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns the failure reason on a non-2xx status, a transport error
    /// after the retry, or an unparsable body.
    pub async fn fetch<T, P>(
        &self,
        resource: &str,
        url: &str,
        current_token: Option<&str>,
        parse: P,
    ) -> Result<FetchOutcome<T>, FetchError>
    where
        P: FnOnce(&str) -> crate::error::Result<Vec<T>>,
    {
        let started = Instant::now();
        let result = self.fetch_inner(url, current_token, parse).await;
        let elapsed = started.elapsed();

        self.metrics
            .observe_request(Endpoint::Fetch(resource), elapsed, result.is_err());
        match &result {
            Ok(FetchOutcome::Updated(snapshot)) => debug!(
                "fetched {} ({} records, {:.2}s)",
                resource,
                snapshot.records.len(),
                elapsed.as_secs_f64()
            ),
            Ok(FetchOutcome::NotModified) => debug!("{} not modified", resource),
            Err(e) => debug!("fetch of {} failed: {}", resource, e),
        }
        result
    }

    async fn fetch_inner<T, P>(
        &self,
        url: &str,
        current_token: Option<&str>,
        parse: P,
    ) -> Result<FetchOutcome<T>, FetchError>
    where
        P: FnOnce(&str) -> crate::error::Result<Vec<T>>,
    {
        let response = self.get_with_retry(url, current_token).await?;
        if response.status() == StatusCode::NOT_MODIFIED {
            return Ok(FetchOutcome::NotModified);
        }

        let token = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let body = response.text().await.map_err(FetchError::Transport)?;
        let timestamp = self.fetch_timestamp(url).await;
        let records = parse(&body).map_err(FetchError::Parse)?;

        Ok(FetchOutcome::Updated(Snapshot::new(token, body, records, timestamp)))
    }

    async fn get_with_retry(&self, url: &str, current_token: Option<&str>) -> Result<Response, FetchError> {
        let mut attempt = 1;
        loop {
            let mut request = self.client.get(url);
            if let Some(value) = current_token.and_then(|t| HeaderValue::from_str(t).ok()) {
                request = request.header(IF_NONE_MATCH, value);
            }

            let error = match request.send().await {
                Ok(response)
                    if response.status().is_success()
                        || response.status() == StatusCode::NOT_MODIFIED =>
                {
                    return Ok(response);
                }
                Ok(response) => {
                    let status = response.status();
                    if attempt >= self.max_attempts || !is_retryable_status(status) {
                        return Err(FetchError::from_status(status));
                    }
                    FetchError::from_status(status)
                }
                Err(e) => {
                    if attempt >= self.max_attempts || !is_retryable_error(&e) {
                        return Err(FetchError::Transport(e));
                    }
                    FetchError::Transport(e)
                }
            };

            warn!("{} attempt {}/{} failed: {}, retrying", url, attempt, self.max_attempts, error);
            attempt += 1;
            sleep(self.retry_delay).await;
        }
    }

    /// Recency marker from `<url>.timestamp`. Any failure just means "unknown".
    async fn fetch_timestamp(&self, url: &str) -> Option<i64> {
        let ts_url = format!("{url}{TIMESTAMP_SUFFIX}");
        let response = match self.client.get(&ts_url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("timestamp fetch {} failed: {}", ts_url, e);
                return None;
            }
        };

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!("no timestamp at {}", ts_url);
                None
            }
            status if status.is_success() => match response.text().await {
                Ok(text) => text.trim().parse().map_or_else(
                    |_| {
                        warn!("timestamp at {} is not an integer: {:?}", ts_url, text.trim());
                        None
                    },
                    Some,
                ),
                Err(e) => {
                    warn!("timestamp body {} unreadable: {}", ts_url, e);
                    None
                }
            },
            status => {
                warn!("timestamp fetch {} returned {}", ts_url, status);
                None
            }
        }
    }
}
