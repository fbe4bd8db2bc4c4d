//! pantry-catalog library interface
//!
//! Exposes the enrichment pipeline and the HTTP router for the binary and for
//! integration tests.

pub mod api;
pub mod budget;
pub mod config;
pub mod db;
pub mod error;
pub mod lease;
pub mod queue;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::budget::BudgetLedger;
use crate::queue::EnrichmentQueue;
use crate::services::RecipeIngestor;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub queue: Arc<dyn EnrichmentQueue>,
    pub budget: Arc<dyn BudgetLedger>,
    pub ingestor: Arc<RecipeIngestor>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        queue: Arc<dyn EnrichmentQueue>,
        budget: Arc<dyn BudgetLedger>,
        ingestor: Arc<RecipeIngestor>,
    ) -> Self {
        Self {
            db,
            queue,
            budget,
            ingestor,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::recipe_routes())
        .merge(api::item_routes())
        .merge(api::queue_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
