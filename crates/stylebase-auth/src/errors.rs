use stylebase_errors::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0:?}")]
pub struct AuthError(pub Box<ErrorObj>);

impl AuthError {
    pub fn into_inner(self) -> ErrorObj {
        *self.0
    }

    pub fn obj(&self) -> &ErrorObj {
        &self.0
    }

    fn unauthenticated(reason: &str, detail: String) -> Self {
        AuthError(Box::new(
            ErrorBuilder::new(codes::AUTH_UNAUTHENTICATED)
                .user_msg("Please sign in again.")
                .dev_msg(format!("{reason}: {detail}"))
                .build(),
        ))
    }

    pub fn no_credential() -> Self {
        Self::unauthenticated("no_credential", "authorization header missing".into())
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::unauthenticated("malformed_credential", detail.into())
    }

    pub fn expired(detail: impl Into<String>) -> Self {
        Self::unauthenticated("expired_credential", detail.into())
    }

    pub fn not_yet_valid(detail: impl Into<String>) -> Self {
        Self::unauthenticated("not_yet_valid_credential", detail.into())
    }

    pub fn unknown_key(detail: impl Into<String>) -> Self {
        Self::unauthenticated("unknown_signing_key", detail.into())
    }

    pub fn invalid_signature(detail: impl Into<String>) -> Self {
        Self::unauthenticated("invalid_signature", detail.into())
    }

    pub fn forbidden(detail: &str) -> Self {
        AuthError(Box::new(
            ErrorBuilder::new(codes::AUTH_FORBIDDEN)
                .user_msg("You do not have access to this resource.")
                .dev_msg(detail)
                .build(),
        ))
    }

    /// Signing-key source unreachable or unconfigured. Fatal, 5xx-class;
    /// never downgraded to an anonymous pass-through.
    pub fn config(detail: &str) -> Self {
        AuthError(Box::new(
            ErrorBuilder::new(codes::AUTH_CONFIG)
                .user_msg("Authentication is temporarily unavailable.")
                .dev_msg(detail)
                .build(),
        ))
    }

    pub fn internal(detail: &str) -> Self {
        AuthError(Box::new(
            ErrorBuilder::new(codes::UNKNOWN_INTERNAL)
                .user_msg("Authentication failed.")
                .dev_msg(detail)
                .build(),
        ))
    }
}

impl From<stylebase_ledger::prelude::LedgerError> for AuthError {
    fn from(err: stylebase_ledger::prelude::LedgerError) -> Self {
        AuthError(Box::new(err.into_inner()))
    }
}
