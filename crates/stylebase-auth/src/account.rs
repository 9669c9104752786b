use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use stylebase_ledger::prelude::{GrantReason, Ledger};
use stylebase_types::prelude::{PrincipalId, Role};
use tracing::info;

use crate::authn::TokenIdentity;
use crate::errors::AuthError;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Principal {
    pub principal_id: PrincipalId,
    pub subject: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Profile {
    pub principal_id: PrincipalId,
    pub display_name: String,
    pub avatar_seed: String,
    pub created_at: DateTime<Utc>,
}

/// Durable principal/profile records keyed by the external auth subject.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn lookup(&self, subject: &str) -> Result<Option<Principal>, AuthError>;

    /// Creates the principal and its profile when the subject is new;
    /// returns the existing record otherwise. `created` reports which.
    async fn upsert(&self, identity: &TokenIdentity) -> Result<(Principal, bool), AuthError>;

    async fn profile(&self, principal: &PrincipalId) -> Result<Option<Profile>, AuthError>;
}

#[derive(Clone, Default)]
pub struct MemoryAccountStore {
    principals: Arc<RwLock<HashMap<String, Principal>>>,
    profiles: Arc<RwLock<HashMap<PrincipalId, Profile>>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn lookup(&self, subject: &str) -> Result<Option<Principal>, AuthError> {
        Ok(self.principals.read().get(subject).cloned())
    }

    async fn upsert(&self, identity: &TokenIdentity) -> Result<(Principal, bool), AuthError> {
        let mut principals = self.principals.write();
        if let Some(existing) = principals.get(&identity.subject) {
            return Ok((existing.clone(), false));
        }

        let principal = Principal {
            principal_id: PrincipalId::mint(),
            subject: identity.subject.clone(),
            role: identity.role,
            created_at: Utc::now(),
        };
        principals.insert(identity.subject.clone(), principal.clone());

        let profile = Profile {
            principal_id: principal.principal_id.clone(),
            display_name: identity.subject.clone(),
            avatar_seed: principal.principal_id.0.clone(),
            created_at: principal.created_at,
        };
        self.profiles
            .write()
            .insert(principal.principal_id.clone(), profile);

        Ok((principal, true))
    }

    async fn profile(&self, principal: &PrincipalId) -> Result<Option<Profile>, AuthError> {
        Ok(self.profiles.read().get(principal).cloned())
    }
}

#[derive(Clone, Debug)]
pub struct AccountConfig {
    pub welcome_tokens: i64,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self { welcome_tokens: 5 }
    }
}

/// Idempotent ensure-account: principal + profile upsert plus a
/// once-per-lifetime welcome grant. The grant is gated on the ledger's
/// transaction log, not on whether this call created the principal row,
/// so concurrent first calls cannot double-grant.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn AccountStore>,
    ledger: Arc<dyn Ledger>,
    config: AccountConfig,
}

impl AccountService {
    pub fn new(store: Arc<dyn AccountStore>, ledger: Arc<dyn Ledger>, config: AccountConfig) -> Self {
        Self {
            store,
            ledger,
            config,
        }
    }

    pub async fn ensure(&self, identity: &TokenIdentity) -> Result<Principal, AuthError> {
        let (principal, created) = self.store.upsert(identity).await?;

        if self.config.welcome_tokens > 0 {
            let granted = self
                .ledger
                .grant_initial(
                    &principal.principal_id,
                    self.config.welcome_tokens,
                    GrantReason::Welcome,
                )
                .await?;
            if granted {
                info!(
                    principal = %principal.principal_id,
                    tokens = self.config.welcome_tokens,
                    "welcome grant issued"
                );
            }
        }

        if created {
            info!(principal = %principal.principal_id, subject = %principal.subject, "account created");
        }

        Ok(principal)
    }

    pub async fn lookup(&self, subject: &str) -> Result<Option<Principal>, AuthError> {
        self.store.lookup(subject).await
    }

    pub async fn profile(&self, principal: &PrincipalId) -> Result<Option<Profile>, AuthError> {
        self.store.profile(principal).await
    }
}
