pub mod jwks;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stylebase_types::prelude::Role;

use crate::errors::AuthError;

/// What a verified credential asserts about the caller. The stable
/// internal principal id is resolved separately by the account layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenIdentity {
    pub subject: String,
    pub role: Role,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, bearer: &str) -> Result<TokenIdentity, AuthError>;
}

/// Fixed-token authenticator for wiring tests and local harnesses:
/// accepts `<subject>` or `<subject>@<role>`.
pub struct StaticAuthenticator;

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, bearer: &str) -> Result<TokenIdentity, AuthError> {
        if bearer.is_empty() {
            return Err(AuthError::malformed("empty bearer token"));
        }
        let (subject, role) = match bearer.split_once('@') {
            Some((subject, role)) => (subject, Role::parse_lenient(role)),
            None => (bearer, Role::Viewer),
        };
        Ok(TokenIdentity {
            subject: subject.to_string(),
            role,
        })
    }
}
