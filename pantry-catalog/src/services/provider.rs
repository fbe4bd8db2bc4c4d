//! External provider seam
//!
//! The enrichment worker and the ingestion path only see these traits and
//! payload types, never the HTTP client behind them.

use async_trait::async_trait;
use pantry_common::db::Nutrient;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// External provider errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("No match found for '{0}'")]
    NoMatch(String),

    #[error("Provider quota or rate limit exceeded (status {0})")]
    RateLimited(u16),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Nutrient entry as reported by the provider
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderNutrient {
    pub name: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub percent_of_daily_needs: f64,
}

impl From<ProviderNutrient> for Nutrient {
    fn from(n: ProviderNutrient) -> Self {
        Nutrient {
            name: n.name,
            amount: n.amount,
            unit: n.unit,
            percent_of_daily_needs: n.percent_of_daily_needs,
        }
    }
}

/// Nutrition block of an ingredient lookup
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct IngredientNutrition {
    #[serde(default)]
    pub nutrients: Vec<ProviderNutrient>,
}

/// Result of a nutrition lookup for one ingredient
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IngredientInformation {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub nutrition: IngredientNutrition,
}

/// Ingredient line of an external recipe
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProviderIngredient {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub unit: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RecipeNutrition {
    #[serde(default)]
    pub nutrients: Vec<ProviderNutrient>,
    #[serde(default)]
    pub ingredients: Vec<ProviderIngredient>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InstructionStep {
    pub number: i64,
    pub step: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct InstructionGroup {
    #[serde(default)]
    pub steps: Vec<InstructionStep>,
}

/// One recipe from a complex search
///
/// Timing fields are frequently `null` upstream and read as 0.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRecipe {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub ready_in_minutes: Option<i64>,
    #[serde(default)]
    pub preparation_minutes: Option<i64>,
    #[serde(default)]
    pub cooking_minutes: Option<i64>,
    #[serde(default)]
    pub servings: Option<f64>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub vegan: bool,
    #[serde(default)]
    pub vegetarian: bool,
    #[serde(default)]
    pub nutrition: RecipeNutrition,
    #[serde(default)]
    pub analyzed_instructions: Vec<InstructionGroup>,
}

/// Complex search filters sent upstream on a local miss
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeSearchRequest {
    pub title: Option<String>,
    pub diet: Option<String>,
    pub ingredient_names: Vec<String>,
    pub number: u32,
}

/// Nutrition lookup by ingredient name
#[async_trait]
pub trait NutritionProvider: Send + Sync {
    async fn lookup_ingredient(&self, name: &str) -> Result<IngredientInformation, ProviderError>;
}

/// Recipe discovery
#[async_trait]
pub trait RecipeProvider: Send + Sync {
    async fn complex_search(
        &self,
        request: &RecipeSearchRequest,
    ) -> Result<Vec<ProviderRecipe>, ProviderError>;
}
