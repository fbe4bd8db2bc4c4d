//! Enrichment queue
//!
//! A durable, score-ordered queue of items awaiting a nutrition lookup.
//! Producers are request handlers (recipe ingestion, manual enrich requests);
//! the only consumer is the enrichment worker.
//!
//! # Ordering
//! Each entry is scored `priority * multiplier + created_at_unix_seconds` and
//! read in ascending score order. With the default multiplier (10^6) the
//! timestamp dominates: priority only separates entries created within about
//! 12 days of each other. The multiplier is configurable rather than changed.
//! Note that ascending order places a High (+1) entry after a Default entry of
//! the same second.
//!
//! # Duplicates
//! The queue does not enforce one entry per item. Entries are compared by
//! their serialized form, so re-enqueueing an identical record only refreshes
//! its score while a record with a different timestamp or priority coexists
//! with the first one. Enrichment is idempotent, so duplicates cost budget but
//! not correctness.

pub mod memory;
pub mod redis_store;

pub use memory::MemoryEnrichmentQueue;
pub use redis_store::RedisEnrichmentQueue;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pantry_common::Result;
use serde::{Deserialize, Serialize};

/// Default score multiplier applied to [`Priority`]
pub const DEFAULT_PRIORITY_MULTIPLIER: i64 = 1_000_000;

/// Priority tag carried by a queue entry
///
/// Serialized as its integer weight (High = 1, Default = 0, Low = -1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Priority {
    High,
    #[default]
    Default,
    Low,
}

impl Priority {
    pub fn weight(self) -> i64 {
        i8::from(self) as i64
    }
}

impl From<Priority> for i8 {
    fn from(priority: Priority) -> Self {
        match priority {
            Priority::High => 1,
            Priority::Default => 0,
            Priority::Low => -1,
        }
    }
}

impl TryFrom<i8> for Priority {
    type Error = String;

    fn try_from(value: i8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Priority::High),
            0 => Ok(Priority::Default),
            -1 => Ok(Priority::Low),
            other => Err(format!("unknown priority weight {}", other)),
        }
    }
}

/// One unit of enrichment work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub item_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub priority: Priority,
}

impl QueueItem {
    /// New entry stamped with the current time
    pub fn new(item_id: i64, name: impl Into<String>, priority: Priority) -> Self {
        Self {
            item_id,
            name: name.into(),
            created_at: Utc::now(),
            priority,
        }
    }

    /// Ordering score under the given multiplier
    pub fn score(&self, multiplier: i64) -> i64 {
        self.priority
            .weight()
            .saturating_mul(multiplier)
            .saturating_add(self.created_at.timestamp())
    }

    /// Stored member encoding; identical records encode identically
    pub(crate) fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub(crate) fn decode(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Queue backing store
///
/// Every method maps onto a single atomic store primitive; callers hold no
/// client-side lock. A stored entry that fails to decode fails the whole call.
#[async_trait]
pub trait EnrichmentQueue: Send + Sync {
    /// Insert an entry (refreshes the score of an identical existing record)
    async fn enqueue(&self, item: &QueueItem) -> Result<()>;

    /// Up to `limit` entries in ascending score order, without removing them
    async fn next_batch(&self, limit: usize) -> Result<Vec<QueueItem>>;

    /// Delete one exact-match entry; absent entries are not an error
    async fn remove(&self, item: &QueueItem) -> Result<()>;

    /// Number of pending entries
    async fn len(&self) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(item_id: i64, unix: i64, priority: Priority) -> QueueItem {
        QueueItem {
            item_id,
            name: format!("item-{}", item_id),
            created_at: Utc.timestamp_opt(unix, 0).unwrap(),
            priority,
        }
    }

    #[test]
    fn test_score_formula() {
        let item = at(1, 1_700_000_000, Priority::High);
        assert_eq!(item.score(DEFAULT_PRIORITY_MULTIPLIER), 1_701_000_000);

        let item = at(1, 1_700_000_000, Priority::Low);
        assert_eq!(item.score(DEFAULT_PRIORITY_MULTIPLIER), 1_699_000_000);

        let item = at(1, 1_700_000_000, Priority::Default);
        assert_eq!(item.score(DEFAULT_PRIORITY_MULTIPLIER), 1_700_000_000);
    }

    #[test]
    fn test_timestamp_dominates_default_multiplier() {
        // A low-priority entry created 30 days later still scores above a
        // high-priority entry from today
        let high_today = at(1, 1_700_000_000, Priority::High);
        let low_later = at(2, 1_700_000_000 + 30 * 86_400, Priority::Low);

        assert!(low_later.score(DEFAULT_PRIORITY_MULTIPLIER) > high_today.score(DEFAULT_PRIORITY_MULTIPLIER));
    }

    #[test]
    fn test_priority_serializes_as_weight() {
        let item = at(7, 1_700_000_000, Priority::Low);
        let json: serde_json::Value = serde_json::from_str(&item.encode().unwrap()).unwrap();

        assert_eq!(json["priority"], -1);
        assert_eq!(json["item_id"], 7);
        assert_eq!(QueueItem::decode(&item.encode().unwrap()).unwrap(), item);
    }

    #[test]
    fn test_unknown_priority_rejected() {
        let raw = r#"{"item_id":1,"name":"x","created_at":"2024-01-01T00:00:00Z","priority":5}"#;
        assert!(QueueItem::decode(raw).is_err());
    }
}
