//! In-memory credit ledger.
//!
//! Implements the same read-then-conditional-update contract as the HTTP
//! client: every balance carries a version, a consume only lands when the
//! version is unchanged since the read, and a bounded number of retries
//! precedes a conflict error. Tests can inject artificial contention to
//! exercise the retry path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use cradle_core::credit::{CreditLedger, MAX_CONSUME_RETRIES};
use cradle_core::error::{CradleError, Result};

#[derive(Debug, Clone, Copy)]
struct Balance {
    amount: u32,
    version: u64,
}

/// Credit ledger holding balances in memory.
#[derive(Debug, Default)]
pub struct MemoryCreditLedger {
    accounts: Mutex<HashMap<String, Balance>>,
    /// While positive, each conditional update is sabotaged by bumping the
    /// stored version first, simulating a concurrent writer.
    forced_conflicts: AtomicU32,
}

impl MemoryCreditLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an account balance, creating the account if needed.
    pub fn grant(&self, id: &str, amount: u32) {
        let mut accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
        let entry = accounts.entry(id.to_string()).or_insert(Balance {
            amount: 0,
            version: 0,
        });
        entry.amount = amount;
        entry.version += 1;
    }

    /// Makes the next `n` conditional updates collide with a simulated
    /// concurrent writer.
    pub fn force_conflicts(&self, n: u32) {
        self.forced_conflicts.store(n, Ordering::SeqCst);
    }

    fn read(&self, id: &str) -> Result<Balance> {
        let accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
        accounts
            .get(id)
            .copied()
            .ok_or_else(|| CradleError::not_found("credit account", id))
    }
}

#[async_trait]
impl CreditLedger for MemoryCreditLedger {
    async fn fetch_balance(&self, id: &str, _email: Option<&str>) -> Result<u32> {
        Ok(self.read(id)?.amount)
    }

    async fn consume(&self, id: &str, _email: Option<&str>, amount: u32) -> Result<u32> {
        for attempt in 1..=MAX_CONSUME_RETRIES {
            let observed = self.read(id)?;
            if observed.amount < amount {
                return Err(CradleError::InsufficientCredits {
                    available: observed.amount,
                    required: amount,
                });
            }

            if self.forced_conflicts.load(Ordering::SeqCst) > 0 {
                self.forced_conflicts.fetch_sub(1, Ordering::SeqCst);
                let mut accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(entry) = accounts.get_mut(id) {
                    entry.version += 1;
                }
            }

            let mut accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
            let Some(entry) = accounts.get_mut(id) else {
                return Err(CradleError::not_found("credit account", id));
            };
            if entry.version != observed.version {
                tracing::debug!(target: "credit", attempt, "ledger version moved; retrying");
                continue;
            }
            entry.amount -= amount;
            entry.version += 1;
            return Ok(entry.amount);
        }

        Err(CradleError::LedgerConflict {
            attempts: MAX_CONSUME_RETRIES,
        })
    }
}
