//! Budget ledger
//!
//! Tracks the external provider's replenishing call allowance. A single global
//! counter lives under one key with a fixed validity window. Reading an absent
//! (never set or expired) counter re-initializes it to the default allowance;
//! each successful external lookup consumes one unit. Consumption never blocks
//! and never floors at zero, so concurrent consumers may drive it negative.

pub mod memory;
pub mod redis_store;

pub use memory::MemoryBudgetLedger;
pub use redis_store::RedisBudgetLedger;

use async_trait::async_trait;
use pantry_common::Result;
use std::time::Duration;

/// Calls allowed per window when the counter is (re)initialized
pub const DEFAULT_ALLOWANCE: i64 = 150;

/// Counter validity window
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

#[async_trait]
pub trait BudgetLedger: Send + Sync {
    /// Current allowance, initializing it if absent or expired
    async fn remaining(&self) -> Result<i64>;

    /// Spend one call
    async fn consume(&self) -> Result<()>;
}
