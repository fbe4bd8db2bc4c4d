//! Redis-backed enrichment queue (sorted set)

use async_trait::async_trait;
use pantry_common::{Error, Result};
use redis::{aio::ConnectionManager, AsyncCommands};

use super::{EnrichmentQueue, QueueItem};

/// Sorted set keyed by `queue_key`; members are JSON-encoded [`QueueItem`]s
#[derive(Clone)]
pub struct RedisEnrichmentQueue {
    connection: ConnectionManager,
    queue_key: String,
    priority_multiplier: i64,
}

impl RedisEnrichmentQueue {
    pub fn new(connection: ConnectionManager, queue_key: impl Into<String>, priority_multiplier: i64) -> Self {
        Self {
            connection,
            queue_key: queue_key.into(),
            priority_multiplier,
        }
    }
}

pub(crate) fn store_error(context: &str, err: redis::RedisError) -> Error {
    Error::Store(format!("{}: {}", context, err))
}

#[async_trait]
impl EnrichmentQueue for RedisEnrichmentQueue {
    async fn enqueue(&self, item: &QueueItem) -> Result<()> {
        let member = item.encode()?;
        let score = item.score(self.priority_multiplier) as f64;

        let mut conn = self.connection.clone();
        conn.zadd::<_, _, _, ()>(&self.queue_key, member, score)
            .await
            .map_err(|e| store_error("failed to add item to queue", e))?;

        tracing::debug!(item_id = item.item_id, score, "Queued item for enrichment");
        Ok(())
    }

    async fn next_batch(&self, limit: usize) -> Result<Vec<QueueItem>> {
        // ZRANGE 0 -1 would return the whole set
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.connection.clone();
        let members: Vec<String> = conn
            .zrange(&self.queue_key, 0, limit as isize - 1)
            .await
            .map_err(|e| store_error("failed to get items from queue", e))?;

        members.iter().map(|raw| QueueItem::decode(raw)).collect()
    }

    async fn remove(&self, item: &QueueItem) -> Result<()> {
        let member = item.encode()?;

        let mut conn = self.connection.clone();
        conn.zrem::<_, _, ()>(&self.queue_key, member)
            .await
            .map_err(|e| store_error("failed to remove item from queue", e))?;

        Ok(())
    }

    async fn len(&self) -> Result<u64> {
        let mut conn = self.connection.clone();
        conn.zcard(&self.queue_key)
            .await
            .map_err(|e| store_error("failed to count queue", e))
    }
}
