//! Item endpoints

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use pantry_common::db::Item;
use serde::Deserialize;

use crate::db::items;
use crate::error::{ApiError, ApiResult};
use crate::queue::{Priority, QueueItem};
use crate::AppState;

/// Priority names accepted over HTTP
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityParam {
    High,
    #[default]
    Default,
    Low,
}

impl From<PriorityParam> for Priority {
    fn from(p: PriorityParam) -> Self {
        match p {
            PriorityParam::High => Priority::High,
            PriorityParam::Default => Priority::Default,
            PriorityParam::Low => Priority::Low,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct EnrichRequest {
    #[serde(default)]
    pub priority: PriorityParam,
}

/// GET /item/:id
pub async fn get_item(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Item>> {
    items::load_item(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("item {}", id)))
}

/// POST /item/:id/enrich
///
/// Body is optional; `{"priority": "high" | "default" | "low"}`.
pub async fn enrich_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<QueueItem>)> {
    let request: EnrichRequest = if body.iter().all(u8::is_ascii_whitespace) {
        EnrichRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };

    let item = items::load_item(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("item {}", id)))?;

    let entry = QueueItem::new(item.id, item.name, request.priority.into());
    state.queue.enqueue(&entry).await?;

    tracing::info!(item_id = entry.item_id, priority = ?entry.priority, "Item queued for enrichment");
    Ok((StatusCode::ACCEPTED, Json(entry)))
}

pub fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/item/:id", get(get_item))
        .route("/item/:id/enrich", post(enrich_item))
}
