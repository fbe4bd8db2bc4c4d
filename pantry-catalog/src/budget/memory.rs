//! In-process budget ledger

use async_trait::async_trait;
use pantry_common::{Error, Result};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::{BudgetLedger, DEFAULT_ALLOWANCE, DEFAULT_WINDOW};

struct Counter {
    credits: i64,
    expires_at: Instant,
}

/// Budget counter held in process memory, expiring like a Redis TTL key
pub struct MemoryBudgetLedger {
    counter: Mutex<Option<Counter>>,
    allowance: i64,
    window: Duration,
}

impl Default for MemoryBudgetLedger {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWANCE, DEFAULT_WINDOW)
    }
}

impl MemoryBudgetLedger {
    pub fn new(allowance: i64, window: Duration) -> Self {
        Self {
            counter: Mutex::new(None),
            allowance,
            window,
        }
    }

    /// Ledger whose current window already holds `credits`
    pub fn with_remaining(credits: i64) -> Self {
        let ledger = Self::default();
        if let Ok(mut counter) = ledger.counter.lock() {
            *counter = Some(Counter {
                credits,
                expires_at: Instant::now() + ledger.window,
            });
        }
        ledger
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<Counter>>> {
        self.counter
            .lock()
            .map_err(|_| Error::Store("budget lock poisoned".to_string()))
    }
}

#[async_trait]
impl BudgetLedger for MemoryBudgetLedger {
    async fn remaining(&self) -> Result<i64> {
        let mut counter = self.lock()?;
        let now = Instant::now();

        match counter.as_ref() {
            Some(c) if c.expires_at > now => Ok(c.credits),
            _ => {
                *counter = Some(Counter {
                    credits: self.allowance,
                    expires_at: now + self.window,
                });
                Ok(self.allowance)
            }
        }
    }

    async fn consume(&self) -> Result<()> {
        let mut counter = self.lock()?;
        if let Some(c) = counter.as_mut() {
            if c.expires_at > Instant::now() {
                c.credits -= 1;
            }
        }
        Ok(())
    }
}
