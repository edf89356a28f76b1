//! API v1 routes.

use crate::{
    error::{ApiError, ApiResult},
    middleware::{RateLimitLayer, RateLimitPolicy},
    state::AppState,
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use bakehouse_activity_types::{sanitize_details, ActivityBatch, ActivityEvent};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Events returned by the recent-activity view when no limit is given.
const DEFAULT_RECENT_LIMIT: usize = 50;

/// Create the v1 API router.
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(collection_routes(state))
        .route("/activity/recent", get(recent_activity))
}

fn collection_routes(state: &AppState) -> Router<AppState> {
    let routes = Router::new().route("/activity", post(collect_activity));

    let rate_limit = &state.config.rate_limit;
    if !rate_limit.enabled {
        return routes;
    }

    let policy = RateLimitPolicy::from_config(rate_limit).with_discriminator("activity");
    routes.route_layer(RateLimitLayer::new(state.rate_window.clone(), policy))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CollectResponse {
    pub accepted: usize,
}

async fn collect_activity(
    State(state): State<AppState>,
    payload: Result<Json<ActivityBatch>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(batch) = payload?;

    let max = state.config.collector.max_batch_events;
    if batch.events.len() > max {
        return Err(ApiError::UnprocessableEntity(format!(
            "batch of {} events exceeds the limit of {}",
            batch.events.len(),
            max
        )));
    }

    let events: Vec<ActivityEvent> = batch
        .events
        .into_iter()
        .map(|mut event| {
            event.details = event.details.map(sanitize_details);
            event
        })
        .collect();

    for event in &events {
        info!(
            action = %event.action,
            resource = %event.resource,
            resource_id = event.resource_id.as_deref(),
            timestamp = %event.timestamp,
            "Activity collected"
        );
    }

    let accepted = events.len();
    state.activity_log.record(events);

    Ok((StatusCode::ACCEPTED, Json(CollectResponse { accepted })))
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

async fn recent_activity(
    State(state): State<AppState>,
    query: Result<Query<RecentQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<ActivityEvent>>> {
    let Query(query) = query?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_RECENT_LIMIT)
        .min(state.activity_log.capacity());

    Ok(Json(state.activity_log.recent(limit)))
}
