use async_trait::async_trait;
use stylebase_types::prelude::PrincipalId;

use crate::errors::LedgerError;
use crate::model::{Entitlement, GrantReason, SpendReceipt, Transaction};

/// The only write path to a principal's entitlement row. Implementations
/// must make every mutation atomic: the balance update and the matching
/// transaction append commit together or not at all, under a lock scoped
/// to the single principal's row.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Current balance; 0 when no entitlement row exists yet.
    async fn balance(&self, principal: &PrincipalId) -> Result<i64, LedgerError>;

    /// The full entitlement row, when one exists.
    async fn entitlement(&self, principal: &PrincipalId)
        -> Result<Option<Entitlement>, LedgerError>;

    /// Idempotent spend keyed on `(principal, idem_key)`. A replay returns
    /// the current balance without mutating anything. A fresh spend
    /// verifies `balance >= cost` and decrements within the same critical
    /// section, failing with `LEDGER.INSUFFICIENT_TOKENS` otherwise.
    async fn spend(
        &self,
        principal: &PrincipalId,
        cost: i64,
        idem_key: &str,
    ) -> Result<SpendReceipt, LedgerError>;

    async fn grant(
        &self,
        principal: &PrincipalId,
        amount: i64,
        reason: GrantReason,
    ) -> Result<i64, LedgerError>;

    /// Reverses a prior spend; `reference` should be the spend's idem key
    /// so refund symmetry is auditable from the transaction log alone.
    async fn refund(
        &self,
        principal: &PrincipalId,
        amount: i64,
        reference: &str,
    ) -> Result<i64, LedgerError>;

    /// Whether any grant-kind transaction exists for the principal.
    async fn has_grant(&self, principal: &PrincipalId) -> Result<bool, LedgerError>;

    /// Grants `amount` only when no grant-kind transaction exists yet for
    /// the principal; the existence check and the grant run in the same
    /// row-lock critical section so concurrent first calls issue exactly
    /// one grant. Returns whether a grant was written.
    async fn grant_initial(
        &self,
        principal: &PrincipalId,
        amount: i64,
        reason: GrantReason,
    ) -> Result<bool, LedgerError>;

    /// Newest-first transaction history.
    async fn transactions(
        &self,
        principal: &PrincipalId,
        limit: usize,
    ) -> Result<Vec<Transaction>, LedgerError>;
}
