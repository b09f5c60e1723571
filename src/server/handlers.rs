use super::AppState;
use crate::cache::{CacheSlot, DataFilter, read};
use crate::metrics::Metrics;
use crate::model::CachedRecord;
use axum::Json;
use axum::extract::State;
use axum::http::header::{CONTENT_TYPE, ETAG, IF_NONE_MATCH};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::error;

pub const TIMESTAMP_HEADER: HeaderName = HeaderName::from_static("x-data-timestamp");

#[derive(Debug, Default, Deserialize)]
pub struct ReadParams {
    #[serde(default, deserialize_with = "optional_date")]
    pub from: Option<NaiveDate>,
    #[serde(default, deserialize_with = "optional_date")]
    pub to: Option<NaiveDate>,
    pub format: Option<String>,
}

/// `YYYY-MM-DD`; an empty value (`?from=`) is no bound.
fn optional_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(date) => NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| serde::de::Error::custom(format!("invalid date `{date}`: {e}"))),
    }
}

impl ReadParams {
    fn wants_csv(&self) -> bool {
        self.format.as_deref().is_some_and(|f| f.eq_ignore_ascii_case("csv"))
    }
}

fn version_headers(token: Option<&str>, timestamp: Option<i64>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(value) = token.and_then(|t| HeaderValue::from_str(t).ok()) {
        headers.insert(ETAG, value);
    }
    if let Some(ts) = timestamp {
        headers.insert(TIMESTAMP_HEADER, HeaderValue::from(ts));
    }
    headers
}

/// Map one read onto HTTP: 304 when the caller is current, otherwise the
/// filtered records as JSON (or the raw CSV when asked for).
pub fn serve<T: CachedRecord + Serialize>(
    resource: &str,
    slot: &CacheSlot<T>,
    metrics: &Metrics,
    request_headers: &HeaderMap,
    params: &ReadParams,
) -> Response {
    let caller_token = request_headers
        .get(IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok());
    let filter = DataFilter::new(params.from, params.to);

    let response = read(resource, slot, metrics, caller_token, &filter);
    let headers = version_headers(response.token.as_deref(), response.timestamp);

    match response.data {
        None => (StatusCode::NOT_MODIFIED, headers).into_response(),
        Some(_) if params.wants_csv() => (
            headers,
            [(CONTENT_TYPE, "text/csv; charset=utf-8")],
            response.raw_body.to_string(),
        )
            .into_response(),
        Some(data) => (headers, Json(data)).into_response(),
    }
}

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub down: Vec<String>,
}

pub async fn health(State(state): State<AppState>) -> Response {
    match state.health.down() {
        Ok(down) => {
            let status = if down.is_empty() {
                StatusCode::OK
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            };
            (status, Json(HealthBody { down })).into_response()
        }
        Err(e) => {
            error!("health state unavailable: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(text) => (
            [(CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!("metrics rendering failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
