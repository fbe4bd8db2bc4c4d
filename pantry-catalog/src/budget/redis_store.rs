//! Redis-backed budget ledger

use async_trait::async_trait;
use pantry_common::Result;
use redis::{aio::ConnectionManager, AsyncCommands, Script};
use std::time::Duration;

use super::BudgetLedger;
use crate::queue::redis_store::store_error;

// DECR only while the key exists: decrementing a just-expired key would
// otherwise create a counter with no TTL that never resets.
const CONSUME_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return redis.call('DECR', KEYS[1])
end
return false
"#;

/// Integer counter under `budget_key` with a TTL of `window`
#[derive(Clone)]
pub struct RedisBudgetLedger {
    connection: ConnectionManager,
    budget_key: String,
    allowance: i64,
    window: Duration,
}

impl RedisBudgetLedger {
    pub fn new(
        connection: ConnectionManager,
        budget_key: impl Into<String>,
        allowance: i64,
        window: Duration,
    ) -> Self {
        Self {
            connection,
            budget_key: budget_key.into(),
            allowance,
            window,
        }
    }
}

#[async_trait]
impl BudgetLedger for RedisBudgetLedger {
    async fn remaining(&self) -> Result<i64> {
        let mut conn = self.connection.clone();
        let current: Option<i64> = conn
            .get(&self.budget_key)
            .await
            .map_err(|e| store_error("failed to get API credits", e))?;

        if let Some(credits) = current {
            return Ok(credits);
        }

        conn.set_ex::<_, _, ()>(&self.budget_key, self.allowance, self.window.as_secs())
            .await
            .map_err(|e| store_error("failed to initialize API credits", e))?;

        tracing::info!(
            allowance = self.allowance,
            window_secs = self.window.as_secs(),
            "API credit window started"
        );
        Ok(self.allowance)
    }

    async fn consume(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        let after: Option<i64> = Script::new(CONSUME_SCRIPT)
            .key(&self.budget_key)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| store_error("failed to decrement API credits", e))?;

        match after {
            Some(credits) => tracing::debug!(remaining = credits, "API credit consumed"),
            None => tracing::debug!("API credit window expired before decrement"),
        }
        Ok(())
    }
}
