use serde::{Deserialize, Serialize};

use crate::id::Id;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrincipalId(pub String);

impl PrincipalId {
    pub fn mint() -> Self {
        Self(Id::with_prefix("usr").0)
    }
}

impl std::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Viewer,
    Pro,
    Publisher,
    Admin,
}

impl Role {
    /// Lenient parse for role claims coming off a token; anything
    /// unrecognized collapses to the lowest privilege.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "publisher" => Role::Publisher,
            "pro" => Role::Pro,
            _ => Role::Viewer,
        }
    }
}

/// An authenticated end user as seen by every component downstream of
/// credential verification.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolvedPrincipal {
    pub principal_id: PrincipalId,
    pub subject: String,
    pub role: Role,
}
