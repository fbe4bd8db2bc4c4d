//! Enrichment pipeline services

pub mod enrichment_worker;
pub mod provider;
pub mod recipe_ingestor;
pub mod spoonacular_client;

pub use enrichment_worker::{
    EnrichmentWorker, ItemCatalog, SqliteCatalog, TickOutcome, TickReport, WorkerSettings,
};
pub use provider::{NutritionProvider, ProviderError, RecipeProvider};
pub use recipe_ingestor::{IngestError, RecipeIngestor, RecipeSearch};
pub use spoonacular_client::{SpoonacularClient, SpoonacularSettings};
