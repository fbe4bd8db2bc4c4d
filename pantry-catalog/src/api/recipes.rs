//! Recipe endpoints
//!
//! `GET /recipe/search` may ingest from the external provider and create
//! catalog rows; the `ingested` flag in the response says whether it did.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use pantry_common::db::Recipe;
use serde::Deserialize;

use crate::db::{recipes, RecipeQuery};
use crate::error::{ApiError, ApiResult};
use crate::services::recipe_ingestor::RecipeSearch;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub title: Option<String>,
    pub diet: Option<String>,
    /// Comma-separated item ids
    pub ingredients: Option<String>,
}

impl SearchParams {
    /// Non-numeric ids are dropped
    fn ingredient_ids(&self) -> Vec<i64> {
        self.ingredients
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter_map(|id| id.trim().parse().ok())
            .collect()
    }
}

/// GET /recipe/search?title=&diet=&ingredients=1,2
pub async fn search_recipes(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<RecipeSearch>> {
    let query = RecipeQuery::new(
        params.title.clone(),
        params.diet.clone(),
        params.ingredient_ids(),
    );
    let result = state.ingestor.search(&query).await?;
    Ok(Json(result))
}

/// GET /recipe/:id
pub async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Recipe>> {
    recipes::load_recipe(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("recipe {}", id)))
}

pub fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/recipe/search", get(search_recipes))
        .route("/recipe/:id", get(get_recipe))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingredient_ids_drop_garbage() {
        let params = SearchParams {
            ingredients: Some("7, 8,abc,,9".to_string()),
            ..Default::default()
        };
        assert_eq!(params.ingredient_ids(), vec![7, 8, 9]);
    }

    #[test]
    fn test_missing_ingredients_param() {
        assert!(SearchParams::default().ingredient_ids().is_empty());
    }
}
