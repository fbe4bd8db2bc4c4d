//! Recipe search with external ingestion on local miss
//!
//! A search that finds nothing locally asks the recipe provider, stores the
//! returned recipes (deduplicated by external id) and enqueues every newly
//! created ingredient item for enrichment. A read request can therefore write
//! to the catalog; [`RecipeSearch::ingested`] reports when it did.
//!
//! Items are committed before they are queued. If queueing fails the recipe
//! is still returned, and the item stays unenriched until something queues it
//! again (`POST /item/{id}/enrich`); later ingestions see it as existing.

use pantry_common::db::{DietCount, Nutrient, Recipe, RecipeInstruction};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::db::{items, recipes, ItemInsert, NewRecipe, NewRecipeItem, RecipeQuery};
use crate::queue::{EnrichmentQueue, Priority, QueueItem};
use crate::services::provider::{
    ProviderError, ProviderRecipe, RecipeProvider, RecipeSearchRequest,
};

/// Nutrient whose amount becomes the recipe's kcal
const CALORIES_NUTRIENT: &str = "Calories";

/// Default number of external results requested per ingestion
pub const DEFAULT_RESULT_COUNT: u32 = 2;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Upstream search failed: {0}")]
    Upstream(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] pantry_common::Error),
}

impl From<sqlx::Error> for IngestError {
    fn from(e: sqlx::Error) -> Self {
        IngestError::Store(e.into())
    }
}

/// Search response
#[derive(Debug, Clone, Serialize)]
pub struct RecipeSearch {
    pub recipes: Vec<Recipe>,
    /// Local grouped total, or the external result count when ingestion ran
    pub count: i64,
    /// Local breakdown computed before any ingestion
    pub diet_counts: Vec<DietCount>,
    /// Whether this request went to the provider and wrote to the catalog
    pub ingested: bool,
}

pub struct RecipeIngestor {
    pool: SqlitePool,
    provider: Arc<dyn RecipeProvider>,
    queue: Arc<dyn EnrichmentQueue>,
    result_count: u32,
}

impl RecipeIngestor {
    pub fn new(
        pool: SqlitePool,
        provider: Arc<dyn RecipeProvider>,
        queue: Arc<dyn EnrichmentQueue>,
    ) -> Self {
        Self {
            pool,
            provider,
            queue,
            result_count: DEFAULT_RESULT_COUNT,
        }
    }

    pub fn with_result_count(mut self, result_count: u32) -> Self {
        self.result_count = result_count;
        self
    }

    pub async fn search(&self, query: &RecipeQuery) -> Result<RecipeSearch, IngestError> {
        let diet_counts = recipes::diet_counts(&self.pool, query).await?;
        let local_total = diet_counts.iter().map(|dc| dc.count).sum();

        let ids = recipes::search_recipe_ids(&self.pool, query).await?;
        if !ids.is_empty() {
            let found = recipes::load_recipes(&self.pool, &ids).await?;
            return Ok(RecipeSearch {
                recipes: found,
                count: local_total,
                diet_counts,
                ingested: false,
            });
        }

        let ingested = self.ingest(query).await?;
        Ok(RecipeSearch {
            count: ingested.len() as i64,
            recipes: ingested,
            diet_counts,
            ingested: true,
        })
    }

    async fn ingest(&self, query: &RecipeQuery) -> Result<Vec<Recipe>, IngestError> {
        let ingredient_names = items::item_names(&self.pool, query.ingredient_ids()).await?;
        let request = RecipeSearchRequest {
            title: query.title.clone(),
            diet: query.diet.clone(),
            ingredient_names,
            number: self.result_count,
        };

        info!(
            title = ?request.title,
            diet = ?request.diet,
            ingredients = request.ingredient_names.len(),
            "No local recipes, searching provider"
        );

        let results = self.provider.complex_search(&request).await?;

        let mut stored = Vec::with_capacity(results.len());
        for external in &results {
            let recipe_id = self.store_recipe(external).await?;
            if let Some(recipe) = recipes::load_recipe(&self.pool, recipe_id).await? {
                stored.push(recipe);
            }
        }

        Ok(stored)
    }

    /// Store one external recipe unless already known, returning its local id
    async fn store_recipe(&self, external: &ProviderRecipe) -> Result<i64, IngestError> {
        // Take the write lock up front: a deferred transaction that reads first
        // fails with SQLITE_BUSY when it later upgrades past a concurrent commit
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        if let Some(id) = recipes::find_recipe_id_by_external_id(&mut tx, external.id).await? {
            debug!(recipe_id = id, external_id = external.id, "Recipe already ingested");
            return Ok(id);
        }

        let mut created_items = Vec::new();
        let mut links = Vec::with_capacity(external.nutrition.ingredients.len());
        for ingredient in &external.nutrition.ingredients {
            let insert = items::insert_item_if_absent(&mut tx, &ingredient.name, ingredient.id).await?;
            if let ItemInsert::Created(item_id) = insert {
                created_items.push(QueueItem::new(item_id, ingredient.name.clone(), Priority::Default));
            }
            links.push(NewRecipeItem {
                item_id: insert.id(),
                amount: ingredient.amount,
                unit: ingredient.unit.clone(),
            });
        }

        let insert = recipes::insert_recipe(&mut tx, &new_recipe(external, links)).await?;
        tx.commit().await?;

        // Items are committed before they are queued, so the worker never
        // picks up an id it cannot find
        for entry in &created_items {
            if let Err(e) = self.queue.enqueue(entry).await {
                warn!(
                    item_id = entry.item_id,
                    name = %entry.name,
                    error = %e,
                    "Failed to queue ingested item for enrichment"
                );
            }
        }

        info!(
            recipe_id = insert.id(),
            external_id = external.id,
            new_items = created_items.len(),
            "Recipe ingested"
        );
        Ok(insert.id())
    }
}

fn new_recipe(external: &ProviderRecipe, ingredients: Vec<NewRecipeItem>) -> NewRecipe {
    let nutrients: Vec<Nutrient> = external
        .nutrition
        .nutrients
        .iter()
        .cloned()
        .map(Into::into)
        .collect();

    let kcal = nutrients
        .iter()
        .find(|n| n.name == CALORIES_NUTRIENT)
        .map(|n| n.amount)
        .unwrap_or_default();

    let instructions = external
        .analyzed_instructions
        .first()
        .map(|group| {
            group
                .steps
                .iter()
                .map(|s| RecipeInstruction {
                    number: s.number,
                    step: s.step.clone(),
                })
                .collect()
        })
        .unwrap_or_default();

    NewRecipe {
        title: external.title.clone(),
        summary: external.summary.clone().unwrap_or_default(),
        external_id: external.id,
        servings: external.servings.unwrap_or_default(),
        ready_time: external.ready_in_minutes.unwrap_or_default(),
        cooking_time: external.cooking_minutes.unwrap_or_default(),
        prep_time: external.preparation_minutes.unwrap_or_default(),
        image: external.image.clone().unwrap_or_default(),
        kcal,
        vegan: external.vegan,
        vegetarian: external.vegetarian,
        ingredients,
        nutrients,
        instructions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::provider::{
        InstructionGroup, InstructionStep, ProviderNutrient, RecipeNutrition,
    };

    fn external() -> ProviderRecipe {
        ProviderRecipe {
            id: 716429,
            title: "Pasta with Garlic".to_string(),
            image: None,
            ready_in_minutes: Some(45),
            preparation_minutes: None,
            cooking_minutes: None,
            servings: Some(2.0),
            summary: None,
            vegan: false,
            vegetarian: true,
            nutrition: RecipeNutrition {
                nutrients: vec![
                    ProviderNutrient {
                        name: "Fat".to_string(),
                        amount: 12.0,
                        unit: "g".to_string(),
                        percent_of_daily_needs: 18.0,
                    },
                    ProviderNutrient {
                        name: "Calories".to_string(),
                        amount: 543.4,
                        unit: "kcal".to_string(),
                        percent_of_daily_needs: 27.0,
                    },
                ],
                ingredients: vec![],
            },
            analyzed_instructions: vec![
                InstructionGroup {
                    steps: vec![InstructionStep {
                        number: 1,
                        step: "Boil water".to_string(),
                    }],
                },
                InstructionGroup {
                    steps: vec![InstructionStep {
                        number: 1,
                        step: "Make the sauce".to_string(),
                    }],
                },
            ],
        }
    }

    #[test]
    fn test_kcal_from_calories_nutrient() {
        let recipe = new_recipe(&external(), vec![]);
        assert_eq!(recipe.kcal, 543.4);
        assert_eq!(recipe.nutrients.len(), 2);
    }

    #[test]
    fn test_only_first_instruction_group_kept() {
        let recipe = new_recipe(&external(), vec![]);
        assert_eq!(recipe.instructions.len(), 1);
        assert_eq!(recipe.instructions[0].step, "Boil water");
    }

    #[test]
    fn test_null_timings_read_as_zero() {
        let recipe = new_recipe(&external(), vec![]);
        assert_eq!(recipe.ready_time, 45);
        assert_eq!(recipe.prep_time, 0);
        assert_eq!(recipe.cooking_time, 0);
        assert_eq!(recipe.summary, "");
    }
}
