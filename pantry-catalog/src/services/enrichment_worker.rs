//! Enrichment worker
//!
//! Periodic background task that drains bounded batches from the enrichment
//! queue, looks each item up at the nutrition provider and writes the result
//! back to the catalog.
//!
//! Per tick: lease, budget check, batch fetch, then strictly sequential
//! processing. The budget is read once per tick, so a batch that starts with
//! any credit left runs to completion even if it overdraws the ledger.
//! Cancellation is observed only between ticks; a running batch is finished.

use async_trait::async_trait;
use pantry_common::Result;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::budget::BudgetLedger;
use crate::db::{items, ItemEnrichment};
use crate::lease::{SingleInstance, TickLease};
use crate::queue::{EnrichmentQueue, QueueItem};
use crate::services::provider::NutritionProvider;

const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Catalog write performed for each enriched item
#[async_trait]
pub trait ItemCatalog: Send + Sync {
    async fn apply_enrichment(&self, item_id: i64, enrichment: &ItemEnrichment) -> Result<()>;
}

/// [`ItemCatalog`] backed by the SQLite catalog
#[derive(Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ItemCatalog for SqliteCatalog {
    async fn apply_enrichment(&self, item_id: i64, enrichment: &ItemEnrichment) -> Result<()> {
        items::apply_enrichment(&self.pool, item_id, enrichment).await
    }
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Time between ticks
    pub interval: Duration,
    /// Maximum queue entries pulled per tick
    pub batch_size: usize,
    /// Pause between enriched items within a batch
    pub item_delay: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            batch_size: 10,
            item_delay: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another instance holds the tick lease
    LeaseHeld,
    /// No credit left in the current window
    BudgetExhausted,
    /// Nothing queued
    Idle,
    /// A batch was processed
    Processed,
}

/// Summary of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub outcome: TickOutcome,
    /// Queue entries pulled
    pub attempted: usize,
    /// Entries whose catalog write succeeded
    pub enriched: usize,
    /// Entries left queued because lookup or catalog write failed
    pub failed: usize,
}

impl TickReport {
    fn skipped(outcome: TickOutcome) -> Self {
        Self {
            outcome,
            attempted: 0,
            enriched: 0,
            failed: 0,
        }
    }
}

/// Per-item result inside a tick
enum ItemResult {
    /// Lookup or catalog write failed; entry stays queued
    Failed,
    /// Catalog written but the entry could not be removed; no credit charged
    StillQueued,
    /// Written, removed and charged
    Enriched,
}

pub struct EnrichmentWorker {
    queue: Arc<dyn EnrichmentQueue>,
    budget: Arc<dyn BudgetLedger>,
    provider: Arc<dyn NutritionProvider>,
    catalog: Arc<dyn ItemCatalog>,
    lease: Arc<dyn TickLease>,
    settings: WorkerSettings,
}

impl EnrichmentWorker {
    pub fn new(
        queue: Arc<dyn EnrichmentQueue>,
        budget: Arc<dyn BudgetLedger>,
        provider: Arc<dyn NutritionProvider>,
        catalog: Arc<dyn ItemCatalog>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            queue,
            budget,
            provider,
            catalog,
            lease: Arc::new(SingleInstance),
            settings,
        }
    }

    /// Serialize ticks across instances through `lease`
    pub fn with_lease(mut self, lease: Arc<dyn TickLease>) -> Self {
        self.lease = lease;
        self
    }

    /// Tick every `interval` until `cancel` fires
    ///
    /// The first tick runs one full interval after start.
    pub async fn run(&self, cancel: CancellationToken) {
        let period = self.settings.interval.max(MIN_INTERVAL);
        info!(
            interval_secs = period.as_secs_f64(),
            batch_size = self.settings.batch_size,
            "Enrichment worker started"
        );

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.run_tick().await {
                Ok(report) if report.outcome == TickOutcome::Processed => info!(
                    attempted = report.attempted,
                    enriched = report.enriched,
                    failed = report.failed,
                    "Enrichment batch finished"
                ),
                Ok(report) => debug!(outcome = ?report.outcome, "Enrichment tick skipped"),
                Err(e) => warn!(error = %e, "Enrichment tick aborted"),
            }
        }

        info!("Enrichment worker stopped");
    }

    /// Run a single tick now
    pub async fn run_tick(&self) -> Result<TickReport> {
        if !self.lease.try_acquire().await? {
            debug!("Tick lease held by another instance");
            return Ok(TickReport::skipped(TickOutcome::LeaseHeld));
        }

        let result = self.tick_inner().await;

        if let Err(e) = self.lease.release().await {
            warn!(error = %e, "Failed to release tick lease");
        }
        result
    }

    async fn tick_inner(&self) -> Result<TickReport> {
        let remaining = self.budget.remaining().await?;
        if remaining <= 0 {
            info!(remaining, "No API credits remaining, skipping tick");
            return Ok(TickReport::skipped(TickOutcome::BudgetExhausted));
        }

        let batch = self.queue.next_batch(self.settings.batch_size).await?;
        if batch.is_empty() {
            return Ok(TickReport::skipped(TickOutcome::Idle));
        }

        debug!(batch_size = batch.len(), remaining, "Processing enrichment batch");

        let mut report = TickReport {
            outcome: TickOutcome::Processed,
            attempted: batch.len(),
            enriched: 0,
            failed: 0,
        };

        for (index, entry) in batch.iter().enumerate() {
            match self.enrich_one(entry).await {
                ItemResult::Failed => report.failed += 1,
                ItemResult::StillQueued => report.enriched += 1,
                ItemResult::Enriched => {
                    report.enriched += 1;
                    if index + 1 < batch.len() {
                        tokio::time::sleep(self.settings.item_delay).await;
                    }
                }
            }
        }

        Ok(report)
    }

    async fn enrich_one(&self, entry: &QueueItem) -> ItemResult {
        let info = match self.provider.lookup_ingredient(&entry.name).await {
            Ok(info) => info,
            Err(e) => {
                warn!(item_id = entry.item_id, name = %entry.name, error = %e, "Nutrition lookup failed");
                return ItemResult::Failed;
            }
        };

        let enrichment = ItemEnrichment {
            name: entry.name.clone(),
            image: info.image,
            external_id: info.id,
            nutrients: info.nutrition.nutrients.into_iter().map(Into::into).collect(),
        };

        if let Err(e) = self.catalog.apply_enrichment(entry.item_id, &enrichment).await {
            warn!(item_id = entry.item_id, error = %e, "Failed to update item");
            return ItemResult::Failed;
        }

        // Left queued on failure; a later tick repeats the idempotent write
        if let Err(e) = self.queue.remove(entry).await {
            warn!(item_id = entry.item_id, error = %e, "Failed to remove item from queue");
            return ItemResult::StillQueued;
        }

        if let Err(e) = self.budget.consume().await {
            warn!(item_id = entry.item_id, error = %e, "Failed to decrement API credits");
        }

        debug!(
            item_id = entry.item_id,
            external_id = enrichment.external_id,
            nutrients = enrichment.nutrients.len(),
            "Item enriched"
        );
        ItemResult::Enriched
    }
}
