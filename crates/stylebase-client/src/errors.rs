use stylebase_errors::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0:?}")]
pub struct ClientError(pub Box<ErrorObj>);

impl ClientError {
    pub fn into_inner(self) -> ErrorObj {
        *self.0
    }

    pub fn obj(&self) -> &ErrorObj {
        &self.0
    }

    pub fn code(&self) -> &'static str {
        self.0.code
    }

    pub fn schema(msg: &str) -> Self {
        ClientError(Box::new(
            ErrorBuilder::new(codes::SCHEMA_VALIDATION)
                .user_msg("This upload cannot be decoded.")
                .dev_msg(msg)
                .build(),
        ))
    }

    pub fn transport(msg: &str) -> Self {
        ClientError(Box::new(
            ErrorBuilder::new(codes::PROVIDER_UNAVAILABLE)
                .user_msg("Could not reach the decode service.")
                .dev_msg(msg)
                .build(),
        ))
    }

    /// Terminal auth state after the bounded refresh was already spent:
    /// the caller must sign out and back in.
    pub fn reauth_required() -> Self {
        ClientError(Box::new(
            ErrorBuilder::new(codes::AUTH_UNAUTHENTICATED)
                .user_msg("Please sign out and back in.")
                .dev_msg("second consecutive auth failure for the same action")
                .build(),
        ))
    }

    pub fn poll_exhausted(attempts: u32) -> Self {
        ClientError(Box::new(
            ErrorBuilder::new(codes::PROVIDER_TIMEOUT)
                .user_msg("The decode is taking too long. Please check back later.")
                .dev_msg(format!("status polling gave up after {attempts} attempts"))
                .build(),
        ))
    }

    /// Error envelope relayed by the API. The machine code is preserved
    /// so callers can branch (insufficient tokens vs auth vs provider).
    pub fn api(code: &str, message: &str) -> Self {
        let known = match code {
            "LEDGER.INSUFFICIENT_TOKENS" => codes::LEDGER_INSUFFICIENT_TOKENS,
            "AUTH.UNAUTHENTICATED" => codes::AUTH_UNAUTHENTICATED,
            "AUTH.FORBIDDEN" => codes::AUTH_FORBIDDEN,
            "PROVIDER.TIMEOUT" => codes::PROVIDER_TIMEOUT,
            "PROVIDER.REJECTED" => codes::PROVIDER_REJECTED,
            "SCHEMA.VALIDATION" => codes::SCHEMA_VALIDATION,
            "STORAGE.NOT_FOUND" => codes::STORAGE_NOT_FOUND,
            _ => codes::PROVIDER_UNAVAILABLE,
        };
        ClientError(Box::new(
            ErrorBuilder::new(known)
                .user_msg(message)
                .dev_msg(format!("api error code {code}"))
                .build(),
        ))
    }

    pub fn is_auth_failure(&self) -> bool {
        self.0.code == codes::AUTH_UNAUTHENTICATED.code
    }

    pub fn is_transient(&self) -> bool {
        self.0.retry == RetryClass::Transient
    }
}
