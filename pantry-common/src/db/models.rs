//! Catalog row models
//!
//! Shapes returned by the catalog repositories and serialized by the HTTP
//! layer. `external_id` is the identifier assigned by the external provider;
//! 0 means the row has not been matched externally yet.

use serde::{Deserialize, Serialize};

/// A nutrition fact owned by exactly one item or one recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nutrient {
    pub name: String,
    pub amount: f64,
    pub unit: String,
    #[serde(rename = "percentOfDailyNeeds")]
    pub percent_of_daily_needs: f64,
}

/// Catalog item (grocery ingredient)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub image: String,
    pub external_id: i64,
    pub nutrients: Vec<Nutrient>,
}

/// One numbered preparation step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeInstruction {
    pub number: i64,
    pub step: String,
}

/// Ingredient link between a recipe and an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeItem {
    pub item: Item,
    pub amount: f64,
    pub unit: String,
}

/// Recipe aggregate with ingredients, nutrients and instructions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: i64,
    pub title: String,
    pub summary: String,
    pub external_id: i64,
    pub servings: f64,
    pub ready_time: i64,
    pub cooking_time: i64,
    pub prep_time: i64,
    pub image: String,
    pub kcal: f64,
    pub vegan: bool,
    pub vegetarian: bool,
    pub ingredients: Vec<RecipeItem>,
    pub nutrients: Vec<Nutrient>,
    pub instructions: Vec<RecipeInstruction>,
}

/// Grouped recipe count per dietary flag combination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DietCount {
    pub vegan: bool,
    pub vegetarian: bool,
    pub count: i64,
}
