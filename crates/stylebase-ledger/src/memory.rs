use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::{Mutex, RwLock};
use stylebase_types::prelude::{now, PrincipalId};

use crate::errors::LedgerError;
use crate::model::{Entitlement, GrantReason, SpendReceipt, Transaction, TxKind};
use crate::store::Ledger;

#[derive(Debug)]
struct AccountRow {
    entitlement: Entitlement,
    transactions: Vec<Transaction>,
}

impl AccountRow {
    fn new(principal: &PrincipalId, plan: &str) -> Self {
        Self {
            entitlement: Entitlement {
                principal_id: principal.clone(),
                plan: plan.to_string(),
                tokens_balance: 0,
                next_renewal_at: now() + Duration::days(30),
            },
            transactions: Vec::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct MemoryLedgerConfig {
    pub default_plan: String,
}

impl Default for MemoryLedgerConfig {
    fn default() -> Self {
        Self {
            default_plan: "free".to_string(),
        }
    }
}

/// In-process ledger. The outer map lock is held only long enough to
/// reach (or create) a principal's row; the read-check-write critical
/// section runs under the per-row mutex, so contention is bounded to
/// concurrent requests from the same principal.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    config: MemoryLedgerConfig,
    rows: Arc<RwLock<HashMap<PrincipalId, Arc<Mutex<AccountRow>>>>>,
}

impl MemoryLedger {
    pub fn new(config: MemoryLedgerConfig) -> Self {
        Self {
            config,
            rows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn row(&self, principal: &PrincipalId) -> Arc<Mutex<AccountRow>> {
        if let Some(row) = self.rows.read().get(principal) {
            return row.clone();
        }
        let mut guard = self.rows.write();
        guard
            .entry(principal.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(AccountRow::new(principal, &self.config.default_plan)))
            })
            .clone()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn balance(&self, principal: &PrincipalId) -> Result<i64, LedgerError> {
        let balance = self
            .rows
            .read()
            .get(principal)
            .map(|row| row.lock().entitlement.tokens_balance)
            .unwrap_or(0);
        Ok(balance)
    }

    async fn entitlement(
        &self,
        principal: &PrincipalId,
    ) -> Result<Option<Entitlement>, LedgerError> {
        Ok(self
            .rows
            .read()
            .get(principal)
            .map(|row| row.lock().entitlement.clone()))
    }

    async fn spend(
        &self,
        principal: &PrincipalId,
        cost: i64,
        idem_key: &str,
    ) -> Result<SpendReceipt, LedgerError> {
        if cost <= 0 {
            return Err(LedgerError::invalid_amount("spend cost must be positive"));
        }
        if idem_key.is_empty() {
            return Err(LedgerError::invalid_amount("spend requires an idempotency key"));
        }

        let row = self.row(principal);
        let mut guard = row.lock();

        let replay = guard
            .transactions
            .iter()
            .any(|tx| tx.kind == TxKind::Spend && tx.reference == idem_key);
        if replay {
            return Ok(SpendReceipt {
                new_balance: guard.entitlement.tokens_balance,
                replayed: true,
            });
        }

        if guard.entitlement.tokens_balance < cost {
            return Err(LedgerError::insufficient_tokens(
                guard.entitlement.tokens_balance,
                cost,
            ));
        }

        guard.entitlement.tokens_balance -= cost;
        let balance = guard.entitlement.tokens_balance;
        guard.transactions.push(Transaction {
            principal_id: principal.clone(),
            kind: TxKind::Spend,
            amount: -cost,
            reference: idem_key.to_string(),
            created_at: Utc::now(),
        });

        Ok(SpendReceipt {
            new_balance: balance,
            replayed: false,
        })
    }

    async fn grant(
        &self,
        principal: &PrincipalId,
        amount: i64,
        reason: GrantReason,
    ) -> Result<i64, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::invalid_amount("grant amount must be positive"));
        }

        let row = self.row(principal);
        let mut guard = row.lock();
        guard.entitlement.tokens_balance += amount;
        let balance = guard.entitlement.tokens_balance;
        guard.transactions.push(Transaction {
            principal_id: principal.clone(),
            kind: reason.kind(),
            amount,
            reference: reason.reference(),
            created_at: Utc::now(),
        });
        Ok(balance)
    }

    async fn refund(
        &self,
        principal: &PrincipalId,
        amount: i64,
        reference: &str,
    ) -> Result<i64, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::invalid_amount("refund amount must be positive"));
        }

        let row = self.row(principal);
        let mut guard = row.lock();
        guard.entitlement.tokens_balance += amount;
        let balance = guard.entitlement.tokens_balance;
        guard.transactions.push(Transaction {
            principal_id: principal.clone(),
            kind: TxKind::Refund,
            amount,
            reference: reference.to_string(),
            created_at: Utc::now(),
        });
        Ok(balance)
    }

    async fn grant_initial(
        &self,
        principal: &PrincipalId,
        amount: i64,
        reason: GrantReason,
    ) -> Result<bool, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::invalid_amount("grant amount must be positive"));
        }

        let row = self.row(principal);
        let mut guard = row.lock();
        if guard.transactions.iter().any(|tx| tx.kind.is_grant()) {
            return Ok(false);
        }
        guard.entitlement.tokens_balance += amount;
        guard.transactions.push(Transaction {
            principal_id: principal.clone(),
            kind: reason.kind(),
            amount,
            reference: reason.reference(),
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn has_grant(&self, principal: &PrincipalId) -> Result<bool, LedgerError> {
        let found = self
            .rows
            .read()
            .get(principal)
            .map(|row| {
                row.lock()
                    .transactions
                    .iter()
                    .any(|tx| tx.kind.is_grant())
            })
            .unwrap_or(false);
        Ok(found)
    }

    async fn transactions(
        &self,
        principal: &PrincipalId,
        limit: usize,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let Some(row) = self.rows.read().get(principal).cloned() else {
            return Ok(Vec::new());
        };
        let guard = row.lock();
        Ok(guard.transactions.iter().rev().take(limit).cloned().collect())
    }
}
