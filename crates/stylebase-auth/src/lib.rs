pub mod account;
pub mod authn;
pub mod errors;
pub mod prelude;

use std::sync::Arc;

use crate::account::AccountService;
use crate::authn::Authenticator;
use crate::errors::AuthError;
use stylebase_types::prelude::ResolvedPrincipal;

/// Front door for request handling: verifies the bearer credential and
/// resolves it to a stable internal principal, creating the account on
/// first sight.
#[derive(Clone)]
pub struct AuthFacade {
    authenticator: Arc<dyn Authenticator>,
    accounts: AccountService,
}

impl AuthFacade {
    pub fn new(authenticator: Arc<dyn Authenticator>, accounts: AccountService) -> Self {
        Self {
            authenticator,
            accounts,
        }
    }

    pub fn accounts(&self) -> &AccountService {
        &self.accounts
    }

    pub async fn resolve(&self, bearer: Option<&str>) -> Result<ResolvedPrincipal, AuthError> {
        let token = bearer.ok_or_else(AuthError::no_credential)?;
        let identity = self.authenticator.authenticate(token).await?;
        let principal = self.accounts.ensure(&identity).await?;
        Ok(ResolvedPrincipal {
            principal_id: principal.principal_id,
            subject: identity.subject,
            role: identity.role,
        })
    }
}
