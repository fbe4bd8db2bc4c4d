//! Tick lease
//!
//! Nothing in the queue or the ledger coordinates several worker instances:
//! two instances can both pass the budget check and pull overlapping batches.
//! A [`TickLease`] is taken around each worker tick so that a multi-instance
//! deployment can serialize ticks. Single-instance deployments use
//! [`SingleInstance`], which always grants.

use async_trait::async_trait;
use pantry_common::Result;
use redis::{aio::ConnectionManager, Script};
use std::time::Duration;
use uuid::Uuid;

use crate::queue::redis_store::store_error;

#[async_trait]
pub trait TickLease: Send + Sync {
    /// Try to become the only instance running a tick; `false` means skip
    async fn try_acquire(&self) -> Result<bool>;

    /// Give the lease back after the tick
    async fn release(&self) -> Result<()>;
}

/// Lease for a single-instance deployment
#[derive(Debug, Default, Clone, Copy)]
pub struct SingleInstance;

#[async_trait]
impl TickLease for SingleInstance {
    async fn try_acquire(&self) -> Result<bool> {
        Ok(true)
    }

    async fn release(&self) -> Result<()> {
        Ok(())
    }
}

const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// Short-TTL mutual-exclusion key shared by all instances
///
/// The TTL bounds how long a crashed holder can block other instances.
pub struct RedisTickLease {
    connection: ConnectionManager,
    lease_key: String,
    token: String,
    ttl: Duration,
}

impl RedisTickLease {
    pub fn new(connection: ConnectionManager, lease_key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            connection,
            lease_key: lease_key.into(),
            token: Uuid::new_v4().to_string(),
            ttl,
        }
    }
}

#[async_trait]
impl TickLease for RedisTickLease {
    async fn try_acquire(&self) -> Result<bool> {
        let mut conn = self.connection.clone();
        let granted: Option<String> = redis::cmd("SET")
            .arg(&self.lease_key)
            .arg(&self.token)
            .arg("NX")
            .arg("PX")
            .arg(self.ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error("failed to acquire tick lease", e))?;

        Ok(granted.is_some())
    }

    async fn release(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: i64 = Script::new(RELEASE_SCRIPT)
            .key(&self.lease_key)
            .arg(&self.token)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| store_error("failed to release tick lease", e))?;
        Ok(())
    }
}
