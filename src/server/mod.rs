//! Thin HTTP surface over the cache: one GET route per resource plus
//! `/health` and `/metrics`.
pub mod handlers;

use crate::cache::{CacheSlot, HealthTracker, Registry, ids};
use crate::metrics::Metrics;
use crate::model::CachedRecord;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::get;
use handlers::ReadParams;
use serde::Serialize;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub metrics: Metrics,
    pub health: Arc<HealthTracker>,
}

fn resource<T>(id: &'static str, pick: fn(&Registry) -> &Arc<CacheSlot<T>>) -> Router<AppState>
where
    T: CachedRecord + Serialize,
{
    Router::new().route(
        &format!("/api/{id}"),
        get(
            move |State(state): State<AppState>, headers: HeaderMap, Query(params): Query<ReadParams>| async move {
                handlers::serve(id, pick(&state.registry), &state.metrics, &headers, &params)
            },
        ),
    )
}

pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .merge(resource(ids::STATS, |r| &r.stats))
        .merge(resource(ids::STATS_WEEKLY, |r| &r.stats_weekly))
        .merge(resource(ids::REGIONS, |r| &r.regions))
        .merge(resource(ids::REGION_DECEASED, |r| &r.region_deceased))
        .merge(resource(ids::PATIENTS, |r| &r.patients))
        .merge(resource(ids::HOSPITALS, |r| &r.hospitals))
        .merge(resource(ids::RETIREMENT_HOMES, |r| &r.retirement_homes))
        .merge(resource(ids::MUNICIPALITIES, |r| &r.municipalities))
        .merge(resource(ids::HEALTH_CENTERS, |r| &r.health_centers))
        .merge(resource(ids::HOSPITALS_LIST, |r| &r.hospitals_list))
        .merge(resource(ids::MUNICIPALITIES_LIST, |r| &r.municipalities_list))
        .merge(resource(ids::RETIREMENT_HOMES_LIST, |r| &r.retirement_homes_list))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics));
    finish(routes, state)
}

/// Middleware shared by every route. A panicking handler fails only its own
/// request, with a 500.
fn finish(routes: Router<AppState>, state: AppState) -> Router {
    routes
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
