use stylebase_errors::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0:?}")]
pub struct LlmError(pub Box<ErrorObj>);

impl LlmError {
    pub fn into_inner(self) -> ErrorObj {
        *self.0
    }

    pub fn obj(&self) -> &ErrorObj {
        &self.0
    }

    pub fn code(&self) -> &'static str {
        self.0.code
    }

    /// Network failure or upstream 5xx.
    pub fn provider_unavailable(msg: &str) -> Self {
        LlmError(Box::new(
            ErrorBuilder::new(codes::PROVIDER_UNAVAILABLE)
                .user_msg("The decode service is temporarily unavailable. Please try again.")
                .dev_msg(msg)
                .build(),
        ))
    }

    /// Deadline exceeded or the caller's cancel signal fired; either way
    /// the in-flight call has been aborted.
    pub fn timeout(msg: &str) -> Self {
        LlmError(Box::new(
            ErrorBuilder::new(codes::PROVIDER_TIMEOUT)
                .user_msg("The decode timed out. Please try again.")
                .dev_msg(msg)
                .build(),
        ))
    }

    /// Upstream 4xx: bad image, bad key, oversized payload.
    pub fn rejected(msg: &str) -> Self {
        LlmError(Box::new(
            ErrorBuilder::new(codes::PROVIDER_REJECTED)
                .user_msg("The decode request was rejected. Please try a different image.")
                .dev_msg(msg)
                .build(),
        ))
    }

    /// 200 OK with no extractable text.
    pub fn empty_response(msg: &str) -> Self {
        LlmError(Box::new(
            ErrorBuilder::new(codes::PROVIDER_EMPTY)
                .user_msg("The decode returned no result. Please try again.")
                .dev_msg(msg)
                .build(),
        ))
    }

    pub fn schema(msg: &str) -> Self {
        LlmError(Box::new(
            ErrorBuilder::new(codes::SCHEMA_VALIDATION)
                .user_msg("Invalid decode request.")
                .dev_msg(msg)
                .build(),
        ))
    }

    pub fn unknown(msg: &str) -> Self {
        LlmError(Box::new(
            ErrorBuilder::new(codes::UNKNOWN_INTERNAL)
                .user_msg("Decode failed.")
                .dev_msg(msg)
                .build(),
        ))
    }
}
