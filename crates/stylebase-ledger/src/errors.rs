use stylebase_errors::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0:?}")]
pub struct LedgerError(pub Box<ErrorObj>);

impl LedgerError {
    pub fn into_inner(self) -> ErrorObj {
        *self.0
    }

    pub fn obj(&self) -> &ErrorObj {
        &self.0
    }

    pub fn insufficient_tokens(balance: i64, cost: i64) -> Self {
        LedgerError(Box::new(
            ErrorBuilder::new(codes::LEDGER_INSUFFICIENT_TOKENS)
                .user_msg("Not enough tokens for this action.")
                .dev_msg(format!("balance {balance} < cost {cost}"))
                .build(),
        ))
    }

    pub fn invalid_amount(msg: &str) -> Self {
        LedgerError(Box::new(
            ErrorBuilder::new(codes::SCHEMA_VALIDATION)
                .user_msg("Invalid ledger amount.")
                .dev_msg(msg)
                .build(),
        ))
    }

    pub fn unknown(msg: &str) -> Self {
        LedgerError(Box::new(
            ErrorBuilder::new(codes::UNKNOWN_INTERNAL)
                .user_msg("Wallet operation failed.")
                .dev_msg(msg)
                .build(),
        ))
    }

    pub fn is_insufficient(&self) -> bool {
        self.0.code == codes::LEDGER_INSUFFICIENT_TOKENS.code
    }
}
