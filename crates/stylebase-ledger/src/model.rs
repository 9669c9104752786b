use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stylebase_types::prelude::PrincipalId;

/// A principal's current plan and token balance. Mutated exclusively by
/// ledger operations; `tokens_balance` never goes negative.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Entitlement {
    pub principal_id: PrincipalId,
    pub plan: String,
    pub tokens_balance: i64,
    pub next_renewal_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    WelcomeGrant,
    MonthlyGrant,
    Spend,
    Grant,
    Refund,
}

impl TxKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            TxKind::WelcomeGrant => "welcome_grant",
            TxKind::MonthlyGrant => "monthly_grant",
            TxKind::Spend => "spend",
            TxKind::Grant => "grant",
            TxKind::Refund => "refund",
        }
    }

    pub const fn is_grant(self) -> bool {
        matches!(self, TxKind::WelcomeGrant | TxKind::MonthlyGrant | TxKind::Grant)
    }
}

/// Append-only ledger entry. `amount` is signed: spends are negative,
/// everything else positive. `reference` carries the idempotency key for
/// spends and refunds, or a free-form reason tag for grants.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub principal_id: PrincipalId,
    pub kind: TxKind,
    pub amount: i64,
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

/// Why a grant is being issued; selects the transaction kind recorded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrantReason {
    Welcome,
    MonthlyRenewal,
    Manual(String),
}

impl GrantReason {
    pub fn kind(&self) -> TxKind {
        match self {
            GrantReason::Welcome => TxKind::WelcomeGrant,
            GrantReason::MonthlyRenewal => TxKind::MonthlyGrant,
            GrantReason::Manual(_) => TxKind::Grant,
        }
    }

    pub fn reference(&self) -> String {
        match self {
            GrantReason::Welcome => "welcome".to_string(),
            GrantReason::MonthlyRenewal => "monthly_renewal".to_string(),
            GrantReason::Manual(tag) => tag.clone(),
        }
    }
}

/// Outcome of a spend. `replayed` is true when the `(principal, idem_key)`
/// pair had already been spent and nothing was mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpendReceipt {
    pub new_balance: i64,
    pub replayed: bool,
}
