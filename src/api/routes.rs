//! API route definitions.

use axum::extract::{Query, State};
use axum::{routing::get, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::state::AppState;
use super::ApiError;
use crate::detect::resolver::latest_per_location;
use crate::storage::Store;

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 500;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/alerts", get(list_alerts))
        .route("/crowd/latest", get(crowd_latest))
        .route("/sentiment", get(list_sentiment))
        .route("/insights/latest", get(insight_latest))
        .route("/camera-feed", get(camera_feed))
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

impl LimitQuery {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

async fn read<T, F>(store: &Store, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Store) -> anyhow::Result<T> + Send + 'static,
{
    Ok(store.blocking(f).await?)
}

async fn health() -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION")
        },
        "meta": {
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }
    }))
}

async fn list_alerts(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = q.limit();
    let alerts = read(&state.store, move |s| s.recent_alerts(limit)).await?;
    Ok(Json(json!({ "data": alerts, "meta": { "total": alerts.len(), "limit": limit } })))
}

async fn crowd_latest(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let window = state.sample_window;
    let samples = read(&state.store, move |s| s.recent_samples(window)).await?;
    let latest: Vec<_> = latest_per_location(samples).into_values().collect();
    Ok(Json(json!({ "data": latest, "meta": { "total": latest.len(), "window": window } })))
}

async fn list_sentiment(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = q.limit();
    let records = read(&state.store, move |s| s.recent_sentiment(limit)).await?;
    Ok(Json(json!({ "data": records, "meta": { "total": records.len(), "limit": limit } })))
}

async fn insight_latest(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    match read(&state.store, |s| s.latest_insight()).await? {
        Some(insight) => Ok(Json(json!({ "data": insight, "meta": {} }))),
        None => Ok(Json(json!({ "data": null, "meta": { "message": "no insights yet" } }))),
    }
}

async fn camera_feed(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    match read(&state.store, |s| s.camera_feed()).await? {
        Some(feed) => Ok(Json(json!({ "data": feed, "meta": {} }))),
        None => Ok(Json(json!({ "data": null, "meta": { "message": "no camera feed yet" } }))),
    }
}
