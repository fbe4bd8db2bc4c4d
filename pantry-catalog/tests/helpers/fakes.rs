//! Scripted collaborators for worker and ingestion tests

use async_trait::async_trait;
use pantry_catalog::db::ItemEnrichment;
use pantry_catalog::lease::TickLease;
use pantry_catalog::queue::{EnrichmentQueue, MemoryEnrichmentQueue, QueueItem};
use pantry_catalog::services::provider::{
    IngredientInformation, IngredientNutrition, NutritionProvider, ProviderError, ProviderNutrient,
    ProviderRecipe, RecipeProvider, RecipeSearchRequest,
};
use pantry_catalog::services::ItemCatalog;
use pantry_common::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Provider answer for an ingredient with a single protein nutrient
pub fn ingredient_info(external_id: i64, name: &str) -> IngredientInformation {
    IngredientInformation {
        id: external_id,
        name: name.to_string(),
        image: format!("{}.jpg", name),
        nutrition: IngredientNutrition {
            nutrients: vec![ProviderNutrient {
                name: "Protein".to_string(),
                amount: 12.5,
                unit: "g".to_string(),
                percent_of_daily_needs: 25.0,
            }],
        },
    }
}

/// Nutrition provider answering from a fixed table; unknown names are `NoMatch`
#[derive(Default)]
pub struct FakeNutritionProvider {
    known: HashMap<String, IngredientInformation>,
    calls: Mutex<Vec<String>>,
}

impl FakeNutritionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, info: IngredientInformation) -> Self {
        self.known.insert(info.name.clone(), info);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl NutritionProvider for FakeNutritionProvider {
    async fn lookup_ingredient(
        &self,
        name: &str,
    ) -> std::result::Result<IngredientInformation, ProviderError> {
        self.calls.lock().unwrap().push(name.to_string());
        self.known
            .get(name)
            .cloned()
            .ok_or_else(|| ProviderError::NoMatch(name.to_string()))
    }
}

/// Recipe provider returning a scripted result (or failure) and recording requests
pub struct FakeRecipeProvider {
    results: Vec<ProviderRecipe>,
    fail_status: Option<u16>,
    requests: Mutex<Vec<RecipeSearchRequest>>,
}

impl FakeRecipeProvider {
    pub fn returning(results: Vec<ProviderRecipe>) -> Self {
        Self {
            results,
            fail_status: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            results: Vec::new(),
            fail_status: Some(status),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RecipeSearchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecipeProvider for FakeRecipeProvider {
    async fn complex_search(
        &self,
        request: &RecipeSearchRequest,
    ) -> std::result::Result<Vec<ProviderRecipe>, ProviderError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.fail_status {
            Some(status) => Err(ProviderError::Api(status, "scripted failure".to_string())),
            None => Ok(self.results.clone()),
        }
    }
}

/// Catalog that rejects writes for selected item ids and delegates the rest
pub struct FlakyCatalog {
    inner: Arc<dyn ItemCatalog>,
    failing: HashSet<i64>,
    writes: AtomicUsize,
}

impl FlakyCatalog {
    pub fn new(inner: Arc<dyn ItemCatalog>, failing: &[i64]) -> Self {
        Self {
            inner,
            failing: failing.iter().copied().collect(),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ItemCatalog for FlakyCatalog {
    async fn apply_enrichment(&self, item_id: i64, enrichment: &ItemEnrichment) -> Result<()> {
        if self.failing.contains(&item_id) {
            return Err(Error::Internal(format!("write rejected for item {}", item_id)));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.apply_enrichment(item_id, enrichment).await
    }
}

/// Queue whose removals always fail
#[derive(Default)]
pub struct FailingRemoveQueue {
    pub inner: MemoryEnrichmentQueue,
}

#[async_trait]
impl EnrichmentQueue for FailingRemoveQueue {
    async fn enqueue(&self, item: &QueueItem) -> Result<()> {
        self.inner.enqueue(item).await
    }

    async fn next_batch(&self, limit: usize) -> Result<Vec<QueueItem>> {
        self.inner.next_batch(limit).await
    }

    async fn remove(&self, _item: &QueueItem) -> Result<()> {
        Err(Error::Store("connection reset".to_string()))
    }

    async fn len(&self) -> Result<u64> {
        self.inner.len().await
    }
}

/// Queue whose inserts always fail
#[derive(Default)]
pub struct FailingEnqueueQueue {
    pub inner: MemoryEnrichmentQueue,
}

#[async_trait]
impl EnrichmentQueue for FailingEnqueueQueue {
    async fn enqueue(&self, _item: &QueueItem) -> Result<()> {
        Err(Error::Store("connection refused".to_string()))
    }

    async fn next_batch(&self, limit: usize) -> Result<Vec<QueueItem>> {
        self.inner.next_batch(limit).await
    }

    async fn remove(&self, item: &QueueItem) -> Result<()> {
        self.inner.remove(item).await
    }

    async fn len(&self) -> Result<u64> {
        self.inner.len().await
    }
}

/// Lease with a fixed answer
pub struct FakeLease {
    pub granted: bool,
    pub releases: AtomicUsize,
}

impl FakeLease {
    pub fn new(granted: bool) -> Self {
        Self {
            granted,
            releases: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TickLease for FakeLease {
    async fn try_acquire(&self) -> Result<bool> {
        Ok(self.granted)
    }

    async fn release(&self) -> Result<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
