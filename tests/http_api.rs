mod common;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use common::march_stats;
use covid_cache::cache::{CacheConfig, HealthTracker, Notifier, Registry, Snapshot};
use covid_cache::metrics::{Endpoint, Metrics};
use covid_cache::model::{Hospital, parse_directory, parse_stats};
use covid_cache::server::{AppState, router};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

struct App {
    router: Router,
    state: AppState,
}

fn app() -> App {
    let metrics = Metrics::new().unwrap();
    let (notifier, _alerts) = Notifier::channel(16);
    let state = AppState {
        registry: Arc::new(Registry::new(&CacheConfig::new("http://origin.invalid/csv"))),
        metrics: metrics.clone(),
        health: Arc::new(HealthTracker::new(notifier, metrics)),
    };
    App {
        router: router(state.clone()),
        state,
    }
}

fn with_stats(app: &App, days: u32, token: &str) {
    let body = march_stats(days);
    let records = parse_stats(&body).unwrap();
    app.state
        .registry
        .stats
        .publish(Snapshot::new(Some(token.to_string()), body, records, Some(1_585_000_000)));
}

async fn get(router: &Router, uri: &str, if_none_match: Option<&str>) -> (StatusCode, axum::http::HeaderMap, String) {
    let mut request = Request::builder().uri(uri);
    if let Some(token) = if_none_match {
        request = request.header("If-None-Match", token);
    }
    let response = router
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn test_full_payload_carries_version_headers() {
    let app = app();
    with_stats(&app, 1, "abc");

    let (status, headers, body) = get(&app.router, "/api/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["etag"], "abc");
    assert_eq!(headers["x-data-timestamp"], "1585000000");

    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json, serde_json::json!([{"date": "2020-03-01", "cases": 1}]));
}

#[tokio::test]
async fn test_current_token_gets_not_modified() {
    let app = app();
    with_stats(&app, 3, "abc");

    let (status, headers, body) = get(&app.router, "/api/stats", Some("abc")).await;
    assert_eq!(status, StatusCode::NOT_MODIFIED);
    assert_eq!(headers["etag"], "abc");
    assert!(body.is_empty());

    let (status, _, _) = get(&app.router, "/api/stats", Some("stale")).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(app.state.metrics.cache_miss_count("stats"), 1);
    assert_eq!(app.state.metrics.request_count(Endpoint::Serve("stats"), false), 2);
}

#[tokio::test]
async fn test_date_range_filter() {
    let app = app();
    with_stats(&app, 20, "v20");

    let (status, headers, body) =
        get(&app.router, "/api/stats?from=2020-03-10&to=2020-03-15", None).await;
    assert_eq!(status, StatusCode::OK);
    // the version describes the whole payload, not the filtered view
    assert_eq!(headers["etag"], "v20");

    let json: Vec<Value> = serde_json::from_str(&body).unwrap();
    let dates: Vec<_> = json.iter().map(|r| r["date"].as_str().unwrap()).collect();
    assert_eq!(
        dates,
        ["2020-03-10", "2020-03-11", "2020-03-12", "2020-03-13", "2020-03-14", "2020-03-15"]
    );
}

#[tokio::test]
async fn test_open_ended_filter() {
    let app = app();
    with_stats(&app, 20, "v20");

    let (_, _, body) = get(&app.router, "/api/stats?from=2020-03-18", None).await;
    let json: Vec<Value> = serde_json::from_str(&body).unwrap();
    assert_eq!(json.len(), 3);
}

#[tokio::test]
async fn test_empty_bound_means_unbounded() {
    let app = app();
    with_stats(&app, 20, "v20");

    let (status, _, body) = get(&app.router, "/api/stats?from=&to=2020-03-02", None).await;
    assert_eq!(status, StatusCode::OK);
    let json: Vec<Value> = serde_json::from_str(&body).unwrap();
    assert_eq!(json.len(), 2);

    let (status, _, body) = get(&app.router, "/api/stats?from=&to=", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Vec<Value>>(&body).unwrap().len(), 20);
}

#[tokio::test]
async fn test_bad_date_is_rejected() {
    let app = app();
    with_stats(&app, 2, "abc");

    let (status, _, _) = get(&app.router, "/api/stats?from=yesterday", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = get(&app.router, "/api/stats?to=2020-02-30", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_csv_format_returns_raw_body() {
    let app = app();
    with_stats(&app, 20, "v20");

    let (status, headers, body) =
        get(&app.router, "/api/stats?format=csv&from=2020-03-10&to=2020-03-10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers["content-type"].to_str().unwrap().starts_with("text/csv"));
    assert_eq!(body, march_stats(20));
}

#[tokio::test]
async fn test_directory_ignores_date_filter() {
    let app = app();
    let body = "id,name,url\nukclj,UKC Ljubljana,https://www.kclj.si\nghmb,UKC Maribor,\n".to_string();
    let records = parse_directory::<Hospital>(&body).unwrap();
    app.state
        .registry
        .hospitals_list
        .publish(Snapshot::new(None, body, records, None));

    let (status, headers, body) =
        get(&app.router, "/api/hospitals-list?from=2030-01-01", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.get("etag").is_none());
    assert!(headers.get("x-data-timestamp").is_none());

    let json: Vec<Value> = serde_json::from_str(&body).unwrap();
    assert_eq!(json.len(), 2);
    assert_eq!(json[0]["id"], "ukclj");
}

#[tokio::test]
async fn test_unloaded_resource_serves_empty_list() {
    let app = app();
    let (status, headers, body) = get(&app.router, "/api/regions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.get("etag").is_none());
    assert_eq!(body, "[]");
}

#[tokio::test]
async fn test_health_reports_down_resources() {
    let app = app();
    let (status, _, body) = get(&app.router, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), serde_json::json!({"down": []}));

    app.state
        .health
        .record_failure("regions", "http://origin.invalid/csv/regions.csv", "Not Found")
        .unwrap();
    let (status, _, body) = get(&app.router, "/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        serde_json::json!({"down": ["regions"]})
    );
}

#[tokio::test]
async fn test_metrics_exposition() {
    let app = app();
    with_stats(&app, 1, "abc");
    get(&app.router, "/api/stats", None).await;

    let (status, _, body) = get(&app.router, "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("covid_cache_cache_miss_total{endpoint=\"serve:stats\"} 1"));
    assert!(body.contains("covid_cache_requests_total{endpoint=\"serve:stats\",exception=\"false\"} 1"));
}

#[tokio::test]
async fn test_unknown_route() {
    let app = app();
    let (status, _, _) = get(&app.router, "/api/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
