pub use crate::account::{
    AccountConfig, AccountService, AccountStore, MemoryAccountStore, Principal, Profile,
};
pub use crate::authn::jwks::{JwkConfig, JwkSource, JwksAuthenticator, JwksConfig};
pub use crate::authn::{Authenticator, StaticAuthenticator, TokenIdentity};
pub use crate::errors::AuthError;
pub use crate::AuthFacade;
