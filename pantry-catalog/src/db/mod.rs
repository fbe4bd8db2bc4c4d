//! Catalog repositories
//!
//! Schema creation lives in `pantry_common::db`; these modules read and write
//! catalog rows for the worker, the ingestion path and the HTTP handlers.

pub mod items;
pub mod recipes;

pub use items::{ItemEnrichment, ItemInsert};
pub use recipes::{NewRecipe, NewRecipeItem, RecipeInsert, RecipeQuery};
