use stylebase_errors::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0:?}")]
pub struct DecodeError(pub Box<ErrorObj>);

impl DecodeError {
    pub fn into_inner(self) -> ErrorObj {
        *self.0
    }

    pub fn obj(&self) -> &ErrorObj {
        &self.0
    }

    pub fn code(&self) -> &'static str {
        self.0.code
    }

    pub fn not_found(job_id: &str) -> Self {
        DecodeError(Box::new(
            ErrorBuilder::new(codes::STORAGE_NOT_FOUND)
                .user_msg("Decode job not found.")
                .dev_msg(format!("no job {job_id} for this principal"))
                .build(),
        ))
    }

    pub fn schema(msg: &str) -> Self {
        DecodeError(Box::new(
            ErrorBuilder::new(codes::SCHEMA_VALIDATION)
                .user_msg("Invalid decode request.")
                .dev_msg(msg)
                .build(),
        ))
    }

    pub fn internal(msg: &str) -> Self {
        DecodeError(Box::new(
            ErrorBuilder::new(codes::UNKNOWN_INTERNAL)
                .user_msg("Decode failed.")
                .dev_msg(msg)
                .build(),
        ))
    }

    pub fn is_insufficient_tokens(&self) -> bool {
        self.0.code == codes::LEDGER_INSUFFICIENT_TOKENS.code
    }
}

impl From<stylebase_ledger::prelude::LedgerError> for DecodeError {
    fn from(err: stylebase_ledger::prelude::LedgerError) -> Self {
        DecodeError(Box::new(err.into_inner()))
    }
}

impl From<stylebase_llm::prelude::LlmError> for DecodeError {
    fn from(err: stylebase_llm::prelude::LlmError) -> Self {
        DecodeError(Box::new(err.into_inner()))
    }
}

impl From<stylebase_normalize::prelude::NormalizeError> for DecodeError {
    fn from(err: stylebase_normalize::prelude::NormalizeError) -> Self {
        DecodeError(Box::new(err.into_inner()))
    }
}
