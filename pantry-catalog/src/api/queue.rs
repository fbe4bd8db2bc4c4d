//! Enrichment queue status

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::queue::QueueItem;
use crate::AppState;

const DEFAULT_PREVIEW: usize = 10;
const MAX_PREVIEW: usize = 100;

#[derive(Debug, Deserialize)]
pub struct QueueParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct QueueStatus {
    pub pending: u64,
    /// Credits left in the current window (starts a window if none is open)
    pub remaining_budget: i64,
    /// Entries the worker would pull next, in order
    pub next: Vec<QueueItem>,
}

/// GET /queue
pub async fn queue_status(
    State(state): State<AppState>,
    Query(params): Query<QueueParams>,
) -> ApiResult<Json<QueueStatus>> {
    let limit = params.limit.unwrap_or(DEFAULT_PREVIEW).min(MAX_PREVIEW);

    Ok(Json(QueueStatus {
        pending: state.queue.len().await?,
        remaining_budget: state.budget.remaining().await?,
        next: state.queue.next_batch(limit).await?,
    }))
}

pub fn queue_routes() -> Router<AppState> {
    Router::new().route("/queue", get(queue_status))
}
