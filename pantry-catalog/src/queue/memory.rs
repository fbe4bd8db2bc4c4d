//! In-process enrichment queue
//!
//! Mirrors the sorted-set semantics of the Redis backend (members compared by
//! encoded form, ties broken by member order) so tests and single-process
//! development see the same ordering.

use async_trait::async_trait;
use pantry_common::{Error, Result};
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use super::{EnrichmentQueue, QueueItem, DEFAULT_PRIORITY_MULTIPLIER};

#[derive(Default)]
struct SortedSet {
    ordered: BTreeSet<(i64, String)>,
    scores: HashMap<String, i64>,
}

impl SortedSet {
    fn insert(&mut self, member: String, score: i64) {
        if let Some(previous) = self.scores.insert(member.clone(), score) {
            self.ordered.remove(&(previous, member.clone()));
        }
        self.ordered.insert((score, member));
    }

    fn remove(&mut self, member: &str) {
        if let Some(score) = self.scores.remove(member) {
            self.ordered.remove(&(score, member.to_string()));
        }
    }
}

/// Queue held in process memory
pub struct MemoryEnrichmentQueue {
    entries: Mutex<SortedSet>,
    priority_multiplier: i64,
}

impl Default for MemoryEnrichmentQueue {
    fn default() -> Self {
        Self::new(DEFAULT_PRIORITY_MULTIPLIER)
    }
}

impl MemoryEnrichmentQueue {
    pub fn new(priority_multiplier: i64) -> Self {
        Self {
            entries: Mutex::new(SortedSet::default()),
            priority_multiplier,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, SortedSet>> {
        self.entries
            .lock()
            .map_err(|_| Error::Store("queue lock poisoned".to_string()))
    }

    #[cfg(test)]
    fn insert_raw(&self, member: &str, score: i64) {
        self.lock().unwrap().insert(member.to_string(), score);
    }
}

#[async_trait]
impl EnrichmentQueue for MemoryEnrichmentQueue {
    async fn enqueue(&self, item: &QueueItem) -> Result<()> {
        let member = item.encode()?;
        let score = item.score(self.priority_multiplier);
        self.lock()?.insert(member, score);
        Ok(())
    }

    async fn next_batch(&self, limit: usize) -> Result<Vec<QueueItem>> {
        let entries = self.lock()?;
        entries
            .ordered
            .iter()
            .take(limit)
            .map(|(_, raw)| QueueItem::decode(raw))
            .collect()
    }

    async fn remove(&self, item: &QueueItem) -> Result<()> {
        let member = item.encode()?;
        self.lock()?.remove(&member);
        Ok(())
    }

    async fn len(&self) -> Result<u64> {
        Ok(self.lock()?.scores.len() as u64)
    }
}
