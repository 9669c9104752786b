use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use jsonwebtoken::errors::ErrorKind;
use parking_lot::RwLock;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use stylebase_types::prelude::Role;
use tracing::warn;

use crate::authn::{Authenticator, TokenIdentity};
use crate::errors::AuthError;

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);
const JWKS_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JwkConfig {
    pub kid: String,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default)]
    pub kty: String,
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
    #[serde(default)]
    pub k: Option<String>,
}

#[derive(Clone, Debug)]
pub enum JwkSource {
    Static(Vec<JwkConfig>),
    Http { uri: String, cache_ttl: Duration },
}

#[derive(Clone, Debug)]
pub struct JwksConfig {
    pub issuer: String,
    pub audience: Vec<String>,
    pub subject_claim: String,
    pub role_claim: String,
    pub jwk_source: JwkSource,
    pub algorithms: Vec<jsonwebtoken::Algorithm>,
    pub admin_subjects: HashSet<String>,
}

impl JwksConfig {
    pub fn builder(issuer: impl Into<String>) -> JwksConfigBuilder {
        JwksConfigBuilder {
            issuer: issuer.into(),
            audience: Vec::new(),
            subject_claim: "sub".into(),
            role_claim: "role".into(),
            jwk_source: JwkSource::Static(Vec::new()),
            algorithms: vec![jsonwebtoken::Algorithm::RS256],
            admin_subjects: HashSet::new(),
        }
    }
}

pub struct JwksConfigBuilder {
    issuer: String,
    audience: Vec<String>,
    subject_claim: String,
    role_claim: String,
    jwk_source: JwkSource,
    algorithms: Vec<jsonwebtoken::Algorithm>,
    admin_subjects: HashSet<String>,
}

impl JwksConfigBuilder {
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience.push(audience.into());
        self
    }

    pub fn subject_claim(mut self, claim: impl Into<String>) -> Self {
        self.subject_claim = claim.into();
        self
    }

    pub fn role_claim(mut self, claim: impl Into<String>) -> Self {
        self.role_claim = claim.into();
        self
    }

    pub fn static_keys(mut self, keys: Vec<JwkConfig>) -> Self {
        self.jwk_source = JwkSource::Static(keys);
        self
    }

    pub fn jwks_uri(mut self, uri: impl Into<String>) -> Self {
        self.jwk_source = JwkSource::Http {
            uri: uri.into(),
            cache_ttl: DEFAULT_CACHE_TTL,
        };
        self
    }

    pub fn jwks_uri_with_ttl(mut self, uri: impl Into<String>, ttl: Duration) -> Self {
        self.jwk_source = JwkSource::Http {
            uri: uri.into(),
            cache_ttl: ttl,
        };
        self
    }

    pub fn algorithms(mut self, algs: Vec<jsonwebtoken::Algorithm>) -> Self {
        self.algorithms = algs;
        self
    }

    pub fn admin_subjects(mut self, subjects: impl IntoIterator<Item = String>) -> Self {
        self.admin_subjects = subjects.into_iter().collect();
        self
    }

    pub fn build(self) -> JwksConfig {
        JwksConfig {
            issuer: self.issuer,
            audience: self.audience,
            subject_claim: self.subject_claim,
            role_claim: self.role_claim,
            jwk_source: self.jwk_source,
            algorithms: self.algorithms,
            admin_subjects: self.admin_subjects,
        }
    }
}

#[derive(Clone)]
struct CachedKeys {
    keys: HashMap<String, JwkConfig>,
    expires_at: Option<Instant>,
}

/// Verifies bearer JWTs against a cached set of published signing keys.
/// The key cache refreshes at most once per TTL window; a refresh failure
/// with a stale-but-present cache is logged and the stale keys served.
pub struct JwksAuthenticator {
    config: Arc<JwksConfig>,
    client: Option<reqwest::Client>,
    cache: Arc<RwLock<Option<CachedKeys>>>,
}

impl JwksAuthenticator {
    pub fn new(config: JwksConfig) -> Result<Self, AuthError> {
        let client = match &config.jwk_source {
            JwkSource::Http { .. } => {
                let built = reqwest::Client::builder()
                    .timeout(JWKS_FETCH_TIMEOUT)
                    .build()
                    .map_err(|err| AuthError::config(&format!("jwks http client build: {err}")))?;
                Some(built)
            }
            JwkSource::Static(keys) => {
                if keys.is_empty() {
                    return Err(AuthError::config("no signing keys configured"));
                }
                None
            }
        };
        Ok(Self {
            config: Arc::new(config),
            client,
            cache: Arc::new(RwLock::new(None)),
        })
    }

    async fn ensure_keys(&self) -> Result<(), AuthError> {
        let needs_refresh = {
            let guard = self.cache.read();
            match guard.as_ref() {
                Some(cache) => match cache.expires_at {
                    Some(expiry) => expiry <= Instant::now(),
                    None => false,
                },
                None => true,
            }
        };
        if !needs_refresh {
            return Ok(());
        }

        let fresh = match &self.config.jwk_source {
            JwkSource::Static(keys) => Ok(CachedKeys {
                keys: keys.iter().map(|k| (k.kid.clone(), k.clone())).collect(),
                expires_at: None,
            }),
            JwkSource::Http { uri, cache_ttl } => {
                self.fetch_remote(uri).await.map(|keys| CachedKeys {
                    keys,
                    expires_at: Some(Instant::now() + *cache_ttl),
                })
            }
        };

        match fresh {
            Ok(cache) => {
                let mut guard = self.cache.write();
                *guard = Some(cache);
                Ok(())
            }
            Err(err) => {
                // A stale key set beats an outage; signatures against
                // rotated-out keys still fail verification below.
                let has_stale = self.cache.read().is_some();
                if has_stale {
                    warn!(error = %err, "jwks refresh failed, serving stale key set");
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn fetch_remote(&self, uri: &str) -> Result<HashMap<String, JwkConfig>, AuthError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| AuthError::config("jwks http client not initialised"))?;
        let response = client
            .get(uri)
            .send()
            .await
            .map_err(|err| AuthError::config(&format!("jwks fetch error: {err}")))?;
        if response.status() != StatusCode::OK {
            return Err(AuthError::config(&format!(
                "jwks fetch status: {}",
                response.status()
            )));
        }
        let body: JwkSet = response
            .json()
            .await
            .map_err(|err| AuthError::config(&format!("jwks decode error: {err}")))?;
        Ok(body.keys.into_iter().map(|k| (k.kid.clone(), k)).collect())
    }

    fn select_algorithm(&self, alg: Option<&str>) -> Result<jsonwebtoken::Algorithm, AuthError> {
        if let Some(alg) = alg {
            let parsed = jsonwebtoken::Algorithm::from_str(alg)
                .map_err(|_| AuthError::config(&format!("unsupported jwk algorithm: {alg}")))?;
            if self.config.algorithms.contains(&parsed) {
                return Ok(parsed);
            }
            return Err(AuthError::config(&format!("algorithm {alg} not allowed")));
        }
        self.config
            .algorithms
            .first()
            .cloned()
            .ok_or_else(|| AuthError::config("no algorithms configured"))
    }

    fn decoding_key(&self, jwk: &JwkConfig) -> Result<jsonwebtoken::DecodingKey, AuthError> {
        match jwk.kty.as_str() {
            "RSA" => {
                let n = jwk
                    .n
                    .as_ref()
                    .ok_or_else(|| AuthError::config("jwks rsa modulus missing"))?;
                let e = jwk
                    .e
                    .as_ref()
                    .ok_or_else(|| AuthError::config("jwks rsa exponent missing"))?;
                jsonwebtoken::DecodingKey::from_rsa_components(n, e)
                    .map_err(|err| AuthError::config(&format!("failed to build rsa key: {err}")))
            }
            "oct" => {
                let secret = jwk
                    .k
                    .as_ref()
                    .ok_or_else(|| AuthError::config("jwks secret missing"))?;
                let bytes = base64::engine::general_purpose::URL_SAFE
                    .decode(secret)
                    .map_err(|err| AuthError::config(&format!("secret decode error: {err}")))?;
                Ok(jsonwebtoken::DecodingKey::from_secret(&bytes))
            }
            other => Err(AuthError::config(&format!(
                "unsupported jwk key type: {other}"
            ))),
        }
    }

    async fn get_key(
        &self,
        kid: Option<&str>,
    ) -> Result<(jsonwebtoken::DecodingKey, jsonwebtoken::Algorithm), AuthError> {
        self.ensure_keys().await?;
        let guard = self.cache.read();
        let cache = guard
            .as_ref()
            .ok_or_else(|| AuthError::config("jwks cache missing"))?;
        let kid = kid.ok_or_else(|| AuthError::malformed("token missing kid header"))?;
        let jwk = cache
            .keys
            .get(kid)
            .ok_or_else(|| AuthError::unknown_key(format!("no jwk for kid {kid}")))?
            .clone();
        drop(guard);
        let alg = self.select_algorithm(jwk.alg.as_deref())?;
        let key = self.decoding_key(&jwk)?;
        Ok((key, alg))
    }

    fn build_validation(&self, alg: jsonwebtoken::Algorithm) -> jsonwebtoken::Validation {
        let mut validation = jsonwebtoken::Validation::new(alg);
        validation.set_required_spec_claims(&["exp", "iat"]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(std::slice::from_ref(&self.config.issuer));
        if !self.config.audience.is_empty() {
            validation.set_audience(&self.config.audience);
        } else {
            validation.validate_aud = false;
        }
        validation
    }

    fn map_decode_error(err: jsonwebtoken::errors::Error) -> AuthError {
        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::expired(err.to_string()),
            ErrorKind::ImmatureSignature => AuthError::not_yet_valid(err.to_string()),
            ErrorKind::InvalidSignature => AuthError::invalid_signature(err.to_string()),
            ErrorKind::InvalidIssuer | ErrorKind::InvalidAudience => {
                AuthError::invalid_signature(err.to_string())
            }
            _ => AuthError::malformed(err.to_string()),
        }
    }

    fn extract_subject(&self, claims: &Map<String, Value>) -> Result<String, AuthError> {
        match claims.get(self.config.subject_claim.as_str()) {
            Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            Some(Value::Number(num)) => Ok(num.to_string()),
            _ => Err(AuthError::malformed(format!(
                "claim {} missing or not a string",
                self.config.subject_claim
            ))),
        }
    }

    fn resolve_role(&self, subject: &str, claims: &Map<String, Value>) -> Role {
        if self.config.admin_subjects.contains(subject) {
            return Role::Admin;
        }
        match claims.get(self.config.role_claim.as_str()) {
            Some(Value::String(s)) => Role::parse_lenient(s),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .map(Role::parse_lenient)
                .find(|role| *role != Role::Viewer)
                .unwrap_or(Role::Viewer),
            _ => Role::Viewer,
        }
    }
}

#[async_trait]
impl Authenticator for JwksAuthenticator {
    async fn authenticate(&self, bearer: &str) -> Result<TokenIdentity, AuthError> {
        if bearer.is_empty() {
            return Err(AuthError::no_credential());
        }

        let header = jsonwebtoken::decode_header(bearer)
            .map_err(|err| AuthError::malformed(format!("invalid token header: {err}")))?;
        let (key, alg) = self.get_key(header.kid.as_deref()).await?;
        let validation = self.build_validation(alg);

        let data = jsonwebtoken::decode::<Value>(bearer, &key, &validation)
            .map_err(Self::map_decode_error)?;

        let claims = match data.claims {
            Value::Object(map) => map,
            _ => return Err(AuthError::malformed("jwt claims must be an object")),
        };

        let subject = self.extract_subject(&claims)?;
        let role = self.resolve_role(&subject, &claims);

        Ok(TokenIdentity { subject, role })
    }
}

#[derive(Deserialize)]
struct JwkSet {
    keys: Vec<JwkConfig>,
}
