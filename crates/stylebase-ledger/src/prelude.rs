pub use crate::errors::LedgerError;
pub use crate::memory::{MemoryLedger, MemoryLedgerConfig};
pub use crate::model::{Entitlement, GrantReason, SpendReceipt, Transaction, TxKind};
pub use crate::store::Ledger;
