//! Credit ledger trait.
//!
//! The ledger is consulted, not owned: the engine checks and spends
//! credits before premium actions (custom free-text answers), and the
//! service behind this trait holds the balance.

use async_trait::async_trait;

use crate::error::Result;

/// Number of attempts a conditional update makes before surfacing a
/// conflict to the caller.
pub const MAX_CONSUME_RETRIES: u32 = 3;

/// An abstract credit ledger with an optimistic-concurrency contract.
///
/// `consume` is read-then-conditional-update: implementations re-read and
/// retry up to [`MAX_CONSUME_RETRIES`] times when the balance moved under
/// them, then surface [`CradleError::LedgerConflict`]. An insufficient
/// balance is [`CradleError::InsufficientCredits`] and is not retried.
///
/// [`CradleError::LedgerConflict`]: crate::error::CradleError::LedgerConflict
/// [`CradleError::InsufficientCredits`]: crate::error::CradleError::InsufficientCredits
#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Returns the current balance for an account.
    async fn fetch_balance(&self, id: &str, email: Option<&str>) -> Result<u32>;

    /// Spends `amount` credits, returning the remaining balance.
    async fn consume(&self, id: &str, email: Option<&str>, amount: u32) -> Result<u32>;
}
